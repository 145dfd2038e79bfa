//! Canonical formatting of rendered buffers.
//!
//! Every buffer is parsed with `syn` first, so a syntax error surfaces as
//! [`RepogenError::Format`] regardless of backend. The default backend is
//! `prettyplease`; `rustfmt` can be selected for its house style. Only
//! freshly rendered code reaches a formatter, so neither backend touches
//! text kept from a previous run.

use std::io::Write;
use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::thread;

use tracing::{debug, instrument};

use crate::args::Formatter;
use crate::error::{RepogenError, Result};
use crate::tools::{self, RUSTFMT};

/// First line of every generated file.
pub const NOTICE_PREFIX: &str = "// Code generated by repogen";

/// Turns a rendered buffer into canonical source.
pub trait CanonicalFormatter {
    /// `path` only labels errors.
    fn format(&self, path: &str, source: &str) -> Result<String>;
}

/// In-process formatting with `prettyplease`.
#[derive(Debug, Default, Clone, Copy)]
pub struct PrettyPleaseFormatter;

impl CanonicalFormatter for PrettyPleaseFormatter {
    #[instrument(skip(self, source), fields(source_len = source.len()))]
    fn format(&self, path: &str, source: &str) -> Result<String> {
        let file = validate(path, source)?;
        Ok(prettyplease::unparse(&file))
    }
}

/// Formatting through an external `rustfmt` binary.
#[derive(Debug, Clone)]
pub struct RustfmtFormatter {
    binary: PathBuf,
}

impl RustfmtFormatter {
    /// Resolves `rustfmt`, installing it if missing.
    pub fn locate() -> Result<Self> {
        let binary = tools::ensure(&RUSTFMT)?;
        debug!(binary = %binary.display(), "using rustfmt");
        Ok(Self { binary })
    }
}

impl CanonicalFormatter for RustfmtFormatter {
    #[instrument(skip(self, source), fields(source_len = source.len()))]
    fn format(&self, path: &str, source: &str) -> Result<String> {
        validate(path, source)?;
        let format_error = |message: String| RepogenError::Format {
            path: path.to_string(),
            message,
        };

        let mut child = Command::new(&self.binary)
            .args(["--edition", "2024", "--emit", "stdout"])
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| format_error(e.to_string()))?;

        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| format_error("rustfmt stdin unavailable".into()))?;
        let input = source.to_string();
        let writer = thread::spawn(move || stdin.write_all(input.as_bytes()));

        let output = child
            .wait_with_output()
            .map_err(|e| format_error(e.to_string()))?;
        match writer.join() {
            Ok(Ok(())) => {}
            Ok(Err(e)) => return Err(format_error(e.to_string())),
            Err(_) => return Err(format_error("rustfmt writer thread panicked".into())),
        }

        if !output.status.success() {
            return Err(format_error(
                String::from_utf8_lossy(&output.stderr).trim().to_string(),
            ));
        }
        String::from_utf8(output.stdout).map_err(|e| format_error(e.to_string()))
    }
}

/// Builds the formatter selected by the `formatter` option.
pub fn formatter_for(kind: Formatter) -> Result<Box<dyn CanonicalFormatter>> {
    Ok(match kind {
        Formatter::PrettyPlease => Box::new(PrettyPleaseFormatter),
        Formatter::Rustfmt => Box::new(RustfmtFormatter::locate()?),
    })
}

pub(crate) fn validate(path: &str, source: &str) -> Result<syn::File> {
    syn::parse_file(source).map_err(|e| {
        debug!("syntax validation failed: {e}");
        RepogenError::Format {
            path: path.to_string(),
            message: e.to_string(),
        }
    })
}

/// Replaces any existing generated-code notice with the current one.
pub fn with_notice(source: &str) -> String {
    let body: Vec<&str> = source
        .lines()
        .skip_while(|line| line.starts_with(NOTICE_PREFIX))
        .collect();
    let body = body.join("\n");
    format!(
        "{NOTICE_PREFIX} v{}. Methods added by hand are kept on regeneration.\n{}\n",
        env!("CARGO_PKG_VERSION"),
        body.trim_end()
    )
}
