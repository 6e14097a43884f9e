//! Stemcell platform metadata
//!
//! Static table of the operating system distros stemcells are published
//! for, and the infrastructures each one supports.

pub mod distros;

pub use distros::{all_distros, find_distro, Distro, Infrastructure, OsMatch, ALL_INFRASTRUCTURES};
