use std::path::PathBuf;

use serde::Serialize;
use thiserror::Error;

use super::build::BuildError;

/// Where in user sources a unit failure originated, if the unit knows.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SourceLocation {
    pub file: Option<String>,
    pub line: Option<u32>,
    pub column: Option<u32>,
}

impl SourceLocation {
    pub fn is_empty(&self) -> bool {
        self.file.is_none() && self.line.is_none() && self.column.is_none()
    }
}

/// Error metadata attached by legacy units.
///
/// The revision adapter moves the position hints into [`SourceLocation`] and
/// drops `tree_dir`, which only ever made sense inside the legacy contract.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LegacyErrorInfo {
    pub file: Option<String>,
    pub first_line: Option<u32>,
    pub first_column: Option<u32>,
    pub tree_dir: Option<PathBuf>,
}

/// A failure raised by a unit's own read or rebuild logic.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct UnitFailure {
    pub message: String,
    pub location: SourceLocation,
    pub legacy: Option<LegacyErrorInfo>,
    #[source]
    pub cause: Option<anyhow::Error>,
}

impl UnitFailure {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            location: SourceLocation::default(),
            legacy: None,
            cause: None,
        }
    }

    /// Normalize a bare string thrown by a unit, keeping its text.
    pub fn from_thrown_string(text: impl AsRef<str>) -> Self {
        Self::new(format!("{} [string exception]", text.as_ref()))
    }

    pub fn at(mut self, file: impl Into<String>, line: Option<u32>, column: Option<u32>) -> Self {
        self.location = SourceLocation {
            file: Some(file.into()),
            line,
            column,
        };
        self
    }

    pub fn with_legacy_info(mut self, info: LegacyErrorInfo) -> Self {
        self.legacy = Some(info);
        self
    }

    pub fn with_cause(mut self, cause: anyhow::Error) -> Self {
        self.cause = Some(cause);
        self
    }

    /// Replace the location with the legacy position hints and strip the
    /// legacy-only fields. A failure without legacy metadata is unchanged.
    pub(crate) fn promote_legacy_info(mut self) -> Self {
        if let Some(info) = self.legacy.take() {
            self.location = SourceLocation {
                file: info.file,
                line: info.first_line,
                column: info.first_column,
            };
        }
        self
    }
}

impl From<anyhow::Error> for UnitFailure {
    fn from(err: anyhow::Error) -> Self {
        Self::new(err.to_string()).with_cause(err)
    }
}

/// What a unit's read/rebuild returns on failure.
///
/// `Build` carries errors the unit got back from the resolver (cycles,
/// cancellation, failures further down); the orchestrator passes those
/// through untouched. `Failed` is the unit's own failure and gets wrapped
/// into a [`crate::BuildFailure`] envelope.
#[derive(Debug, Error)]
pub enum UnitError {
    #[error(transparent)]
    Build(#[from] BuildError),

    #[error(transparent)]
    Failed(#[from] UnitFailure),
}

impl UnitError {
    pub fn message(text: impl Into<String>) -> Self {
        Self::Failed(UnitFailure::new(text))
    }
}

impl From<anyhow::Error> for UnitError {
    fn from(err: anyhow::Error) -> Self {
        Self::Failed(err.into())
    }
}

impl From<std::io::Error> for UnitError {
    fn from(err: std::io::Error) -> Self {
        Self::Failed(anyhow::Error::new(err).into())
    }
}

impl From<String> for UnitError {
    fn from(text: String) -> Self {
        Self::Failed(UnitFailure::from_thrown_string(text))
    }
}

impl From<&str> for UnitError {
    fn from(text: &str) -> Self {
        Self::Failed(UnitFailure::from_thrown_string(text))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn thrown_strings_keep_their_text() {
        let err = UnitError::from("boom");
        assert_eq!(err.to_string(), "boom [string exception]");
    }

    #[test]
    fn legacy_info_replaces_location() {
        let failure = UnitFailure::new("bad syntax")
            .at("ignored.js", Some(1), None)
            .with_legacy_info(LegacyErrorInfo {
                file: Some("app.js".into()),
                first_line: Some(12),
                first_column: Some(4),
                tree_dir: Some(PathBuf::from("/tmp/in")),
            })
            .promote_legacy_info();

        assert!(failure.legacy.is_none());
        assert_eq!(failure.location.file.as_deref(), Some("app.js"));
        assert_eq!(failure.location.line, Some(12));
        assert_eq!(failure.location.column, Some(4));
    }

    #[test]
    fn anyhow_errors_become_failures_with_a_cause() {
        let err: UnitError = anyhow::anyhow!("disk full").into();
        match err {
            UnitError::Failed(failure) => {
                assert_eq!(failure.message, "disk full");
                assert!(failure.cause.is_some());
            }
            other => panic!("unexpected {other:?}"),
        }
    }
}
