//! Dotted numeric versions and comparison helpers.

pub mod compare;

pub use compare::{Version, VersionComparator};
