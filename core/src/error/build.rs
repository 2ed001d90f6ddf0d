use std::sync::Arc;

use thiserror::Error;

use super::unit::{SourceLocation, UnitFailure};
use crate::unit::Unit;

/// Errors surfaced by a build pass or by `cleanup()`.
///
/// Cloneable so that a settled pass outcome can be observed both by the
/// `build()` caller and by a concurrent `cleanup()`.
#[derive(Debug, Clone, Error)]
pub enum BuildError {
    /// Cooperative cancellation signal; not a failure of any unit.
    #[error("Build Canceled")]
    Canceled,

    #[error("cannot build this builder, as it has been previously canceled")]
    Terminated,

    #[error("a build pass is already running on this builder")]
    PassInFlight,

    #[error("Tree cycle detected at `{0}`")]
    CycleDetected(String),

    #[error("Parallel readTree call detected in `{0}`; read inputs in sequence")]
    ParallelRead(String),

    #[error("Invalid unit `{description}`: {reason}")]
    InvalidUnit { description: String, reason: String },

    #[error("{0}: .read must return a directory")]
    MissingDirectory(String),

    #[error("{0}: .read returned before readTree finished")]
    ReadReturnedEarly(String),

    #[error("{0}")]
    UnitFailed(Arc<BuildFailure>),

    #[error("teardown of `{description}` failed: {message}")]
    Teardown { description: String, message: String },
}

impl BuildError {
    /// True for the cancellation signal, which callers of `cleanup()` treat
    /// as expected.
    pub fn was_canceled(&self) -> bool {
        matches!(self, Self::Canceled)
    }

    pub fn failure(&self) -> Option<&BuildFailure> {
        match self {
            Self::UnitFailed(failure) => Some(failure),
            _ => None,
        }
    }

    pub(crate) fn invalid_unit(description: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidUnit {
            description: description.into(),
            reason: reason.into(),
        }
    }
}

/// Envelope around the first unit failure of a pass.
#[derive(Debug, Error)]
#[error("Build failed: ran into an error with `{description}`{}: {message}", plugin_suffix(.plugin_name))]
pub struct BuildFailure {
    pub unit: Unit,
    pub description: String,
    pub plugin_name: Option<String>,
    pub message: String,
    pub location: SourceLocation,
    /// Where the unit was declared, when the unit reports it.
    pub instantiation_stack: Option<String>,
    #[source]
    pub cause: UnitFailure,
}

impl BuildFailure {
    pub(crate) fn new(unit: &Unit, cause: UnitFailure) -> Self {
        let info = unit.info();
        Self {
            unit: unit.clone(),
            description: unit.description(),
            plugin_name: unit.plugin_name(),
            message: cause.message.clone(),
            location: cause.location.clone(),
            instantiation_stack: info.instantiation_stack,
            cause,
        }
    }
}

fn plugin_suffix(plugin_name: &Option<String>) -> String {
    match plugin_name {
        Some(name) => format!(" ({name} plugin)"),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::unit::UnitInfo;

    #[test]
    fn only_the_cancel_signal_was_canceled() {
        assert!(BuildError::Canceled.was_canceled());
        assert!(!BuildError::Terminated.was_canceled());
        assert!(!BuildError::CycleDetected("x".into()).was_canceled());
    }

    #[test]
    fn envelope_message_names_the_unit() {
        let unit = Unit::from("src");
        let failure = BuildFailure::new(&unit, UnitFailure::new("missing file"));
        assert_eq!(
            failure.to_string(),
            "Build failed: ran into an error with `src`: missing file"
        );
        assert!(failure.location.is_empty());
        assert_eq!(UnitInfo::default().describe(), "<anonymous unit>");
    }
}
