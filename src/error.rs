//! Plan Assembly Errors
//!
//! Every fallible operation in the crate returns [`PlanError`]. Assembly has
//! no recovery path: the first failure aborts the whole build and the caller
//! decides how to report it.

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while assembling, validating, or exporting a plan.
#[derive(Debug, Error)]
pub enum PlanError {
    /// A required configuration option is absent.
    #[error("missing option '{option}' in section [{section}]")]
    MissingOption { section: String, option: String },

    /// The same option resolves to different values under different tags.
    #[error("option '{option}' in section [{section}] has conflicting values across tagged sections")]
    AmbiguousOption { section: String, option: String },

    /// No program entry for the executable in the [executables] section.
    #[error("no program configured for executable '{0}'")]
    UnknownExecutable(String),

    /// Analysis window whose end is not after its start.
    #[error("invalid analysis window: start {start} is not before end {end}")]
    InvalidWindow { start: u64, end: u64 },

    /// The detector list is empty or malformed.
    #[error("invalid detector set: {0}")]
    InvalidDetectors(String),

    /// A stage was enabled without a pattern it needs.
    #[error("stage '{stage}' is enabled but the '{pattern}' pattern is not set")]
    MissingPattern { stage: String, pattern: String },

    /// A remote or local resource could not be fetched.
    #[error("failed to fetch '{url}': {reason}")]
    Fetch { url: String, reason: String },

    /// An external program could not be run or exited unsuccessfully.
    #[error("external call '{program}' failed ({status}); logs under {}", .log_dir.display())]
    ExternalCall {
        program: String,
        status: String,
        log_dir: PathBuf,
    },

    /// The assembled graph contains a dependency cycle.
    #[error("plan contains cyclic dependencies")]
    CyclicDependency,

    /// An edge references a node outside the arena.
    #[error("edge references unknown node {0}")]
    UnknownNode(usize),

    /// Malformed configuration content.
    #[error("configuration error: {0}")]
    Config(String),

    /// Filesystem failure.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML parse or render failure.
    #[error("yaml error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// JSON render failure.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, PlanError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_option_display() {
        let err = PlanError::MissingOption {
            section: "executables".to_string(),
            option: "trigger_plots".to_string(),
        };
        assert!(err.to_string().contains("[executables]"));
        assert!(err.to_string().contains("trigger_plots"));
    }

    #[test]
    fn test_external_call_display_names_log_dir() {
        let err = PlanError::ExternalCall {
            program: "segment-query".to_string(),
            status: "exit status: 1".to_string(),
            log_dir: PathBuf::from("/tmp/hwinj/logs"),
        };
        assert!(err.to_string().contains("segment-query"));
        assert!(err.to_string().contains("/tmp/hwinj/logs"));
    }

    #[test]
    fn test_io_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err = PlanError::from(io);
        assert!(matches!(err, PlanError::Io(_)));
    }
}
