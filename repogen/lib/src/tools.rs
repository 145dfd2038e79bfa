//! Locating, version-checking and installing external tools.
//!
//! Installation runs on a helper thread and the caller waits on a channel
//! for at most [`INSTALL_TIMEOUT`]. A timeout is reported separately from an
//! install command that exits unsuccessfully.

use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread;
use std::time::Duration;

use semver::Version;
use tracing::{debug, info, instrument, warn};

use crate::error::ToolError;

/// Upper bound on how long an install command may run.
pub const INSTALL_TIMEOUT: Duration = Duration::from_secs(30);

/// Everything needed to find, check and install one tool.
#[derive(Debug, Clone, Copy)]
pub struct ToolSpec {
    pub name: &'static str,
    pub min_version: &'static str,
    /// Program and arguments that install the tool.
    pub install: &'static [&'static str],
    /// The same command as a copy-pasteable string for error messages.
    pub install_hint: &'static str,
}

pub const RUSTFMT: ToolSpec = ToolSpec {
    name: "rustfmt",
    min_version: "1.4.0",
    install: &["rustup", "component", "add", "rustfmt"],
    install_hint: "rustup component add rustfmt",
};

/// Finds the tool on `PATH`.
pub fn locate(spec: &ToolSpec) -> Result<PathBuf, ToolError> {
    which::which(spec.name).map_err(|_| ToolError::NotFound {
        tool: spec.name,
        install: spec.install_hint,
        min_version: spec.min_version,
    })
}

/// Runs `<binary> --version` and checks it against the minimum.
#[instrument(skip(spec), fields(tool = spec.name))]
pub fn check_version(spec: &ToolSpec, binary: &Path) -> Result<Version, ToolError> {
    let bad_version = |output: String| ToolError::BadVersion {
        tool: spec.name,
        output,
        install: spec.install_hint,
        min_version: spec.min_version,
    };

    let output = Command::new(binary)
        .arg("--version")
        .output()
        .map_err(|e| bad_version(e.to_string()))?;
    let text = String::from_utf8_lossy(&output.stdout).into_owned();
    let found = parse_version(&text).ok_or_else(|| bad_version(text.trim().to_string()))?;
    let minimum = Version::parse(spec.min_version).map_err(|e| bad_version(e.to_string()))?;

    debug!(%found, %minimum, "checked tool version");
    if found < minimum {
        return Err(ToolError::VersionTooOld {
            tool: spec.name,
            found: found.to_string(),
            install: spec.install_hint,
            min_version: spec.min_version,
        });
    }
    Ok(found)
}

/// Runs the install command, waiting at most `timeout`.
///
/// The subprocess is not killed on timeout; it is left to finish or fail
/// on its own.
#[instrument(skip(spec), fields(tool = spec.name))]
pub fn install(spec: &ToolSpec, timeout: Duration) -> Result<(), ToolError> {
    let install_failed = |status: String, stderr: String| ToolError::InstallFailed {
        tool: spec.name,
        status,
        stderr,
        install: spec.install_hint,
        min_version: spec.min_version,
    };

    let Some((program, args)) = spec.install.split_first() else {
        return Err(install_failed("no install command".into(), String::new()));
    };

    info!(command = spec.install_hint, "installing missing tool");
    let (tx, rx) = mpsc::channel::<std::io::Result<Output>>();
    let program = program.to_string();
    let args: Vec<String> = args.iter().map(|a| a.to_string()).collect();
    thread::spawn(move || {
        let _ = tx.send(Command::new(program).args(args).output());
    });

    match rx.recv_timeout(timeout) {
        Ok(Ok(output)) if output.status.success() => {
            info!("tool installed");
            Ok(())
        }
        Ok(Ok(output)) => Err(install_failed(
            output.status.to_string(),
            String::from_utf8_lossy(&output.stderr).trim().to_string(),
        )),
        Ok(Err(e)) => Err(install_failed("could not start".into(), e.to_string())),
        Err(RecvTimeoutError::Timeout) => {
            warn!(secs = timeout.as_secs(), "tool installation timed out");
            Err(ToolError::Timeout {
                tool: spec.name,
                secs: timeout.as_secs(),
                install: spec.install_hint,
                min_version: spec.min_version,
            })
        }
        Err(RecvTimeoutError::Disconnected) => Err(install_failed(
            "installer thread exited".into(),
            String::new(),
        )),
    }
}

/// Locates the tool, installing it once if missing, and checks its version.
pub fn ensure(spec: &ToolSpec) -> Result<PathBuf, ToolError> {
    let binary = match locate(spec) {
        Ok(path) => path,
        Err(ToolError::NotFound { .. }) => {
            install(spec, INSTALL_TIMEOUT)?;
            locate(spec)?
        }
        Err(e) => return Err(e),
    };
    check_version(spec, &binary)?;
    Ok(binary)
}

/// Extracts the first semantic version from `--version` output.
///
/// Accepts a leading `v` and ignores a `-suffix` such as `-stable`.
pub fn parse_version(output: &str) -> Option<Version> {
    output.split_whitespace().find_map(|token| {
        let token = token.trim_start_matches('v');
        let core = token.split_once('-').map_or(token, |(core, _)| core);
        Version::parse(core).ok()
    })
}
