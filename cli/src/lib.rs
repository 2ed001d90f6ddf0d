//! treeforge-cli library: modules exposed for the binary and for tests.

pub mod commands;
pub mod error;
pub mod logging;
pub mod manifest;
pub mod units;
