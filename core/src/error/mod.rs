pub mod build;
pub mod unit;

pub use build::{BuildError, BuildFailure};
pub use unit::{LegacyErrorInfo, SourceLocation, UnitError, UnitFailure};

pub use crate::config::ConfigError;
