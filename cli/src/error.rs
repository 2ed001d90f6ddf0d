use thiserror::Error;
use treeforge_core::api::{BuildError, ConfigError};

#[derive(Error, Debug)]
pub enum CliError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    #[error("manifest error: {0}")]
    Manifest(String),
    #[error("{0}")]
    Build(#[from] BuildError),
    #[error("logging setup failed: {0}")]
    Logging(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("anyhow error: {0}")]
    Anyhow(#[from] anyhow::Error),
}

impl CliError {
    // 0: success
    // 11: config / manifest error
    // 20: build, teardown or IO error
    // 50: internal/uncategorized
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Config(_) | Self::Manifest(_) => 11,
            Self::Build(BuildError::InvalidUnit { .. }) => 11,
            Self::Build(_) | Self::Io(_) => 20,
            Self::Logging(_) | Self::Anyhow(_) => 50,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_codes_follow_the_error_kind() {
        assert_eq!(CliError::Manifest("x".into()).exit_code(), 11);
        assert_eq!(CliError::Build(BuildError::Canceled).exit_code(), 20);
        assert_eq!(
            CliError::Build(BuildError::InvalidUnit {
                description: "u".into(),
                reason: "r".into()
            })
            .exit_code(),
            11
        );
        assert_eq!(CliError::Anyhow(anyhow::anyhow!("boom")).exit_code(), 50);
    }
}
