use std::path::PathBuf;

/// Errors raised while resolving, installing or version-checking an
/// external tool.
///
/// Every message names the manual remediation so the user can recover
/// without reading the source.
#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    /// The binary is not on `PATH`.
    #[error("`{tool}` was not found on PATH; install it manually with `{install}` (minimum version {min_version})")]
    NotFound {
        tool: &'static str,
        install: &'static str,
        min_version: &'static str,
    },

    /// `--version` output could not be understood.
    #[error("could not read the version of `{tool}` from {output:?}; reinstall it with `{install}` (minimum version {min_version})")]
    BadVersion {
        tool: &'static str,
        output: String,
        install: &'static str,
        min_version: &'static str,
    },

    /// The installed binary is older than required.
    #[error("`{tool}` {found} is older than the minimum {min_version}; upgrade it with `{install}`")]
    VersionTooOld {
        tool: &'static str,
        found: String,
        install: &'static str,
        min_version: &'static str,
    },

    /// The install command ran but exited unsuccessfully.
    #[error("installing `{tool}` failed ({status}): {stderr}; install it manually with `{install}` (minimum version {min_version})")]
    InstallFailed {
        tool: &'static str,
        status: String,
        stderr: String,
        install: &'static str,
        min_version: &'static str,
    },

    /// The install command did not finish inside the bounded wait.
    #[error("installing `{tool}` timed out after {secs}s; install it manually with `{install}` (minimum version {min_version})")]
    Timeout {
        tool: &'static str,
        secs: u64,
        install: &'static str,
        min_version: &'static str,
    },
}

/// Error type for every stage of a generation run.
///
/// The driver stops at the first error it sees, so a single value of this
/// type describes why a whole run produced no output.
#[derive(Debug, thiserror::Error)]
pub enum RepogenError {
    /// A plugin parameter was malformed, repeated or unknown.
    #[error("invalid argument: {0}")]
    Argument(String),

    /// A schema struct or a previously generated file could not be parsed.
    #[error("parse error in {context}: {message}")]
    Parse { context: String, message: String },

    /// A rendered buffer was rejected by the canonical formatter.
    #[error("failed to format {path}: {message}")]
    Format { path: String, message: String },

    /// Reading or writing a file failed.
    #[error("I/O error on '{}': {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A request or response could not be (de)serialized.
    #[error("invalid request payload: {0}")]
    Json(#[from] serde_json::Error),

    /// Persisting a staged temp file failed.
    #[error("failed to persist generated file: {0}")]
    Persist(#[from] tempfile::PersistError),

    /// An external tool could not be used.
    #[error(transparent)]
    Tool(#[from] ToolError),
}

impl RepogenError {
    pub(crate) fn parse(context: impl Into<String>, message: impl ToString) -> Self {
        Self::Parse {
            context: context.into(),
            message: message.to_string(),
        }
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Convenience Result type for repogen operations.
pub type Result<T> = std::result::Result<T, RepogenError>;
