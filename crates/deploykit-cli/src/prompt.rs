//! Terminal prompt collaborator.

use std::io::Write;
use std::sync::Mutex;

use console::style;

use deploykit_core::host::Prompt;
use deploykit_core::types::{PromptKind, Severity};

/// Writes user-facing messages to a terminal stream.
pub struct ConsolePrompt<W: Write> {
    writer: Mutex<W>,
}

impl ConsolePrompt<std::io::Stderr> {
    pub fn stderr() -> Self {
        Self::new(std::io::stderr())
    }
}

impl<W: Write> ConsolePrompt<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer: Mutex::new(writer),
        }
    }

    #[cfg(test)]
    fn into_inner(self) -> W {
        self.writer
            .into_inner()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl<W: Write> Prompt for ConsolePrompt<W> {
    fn show_message(&self, text: &str, kind: PromptKind) {
        let marker = match (kind, kind.severity()) {
            (_, Severity::Error) => style("✗").red().bold(),
            (PromptKind::Completion, _) => style("✓").green().bold(),
            (PromptKind::Welcome, _) => style("»").cyan().bold(),
            _ => style("•").dim(),
        };
        let Ok(mut writer) = self.writer.lock() else {
            return;
        };
        // Display failures must never affect the deployment.
        let _ = writeln!(writer, "{marker} {text}");
    }
}
