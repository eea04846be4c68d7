//! Shared CLI input/output plumbing.
//!
//! Every subcommand in `apps/qmf-cli` reads its input the same way (file,
//! inline string, or stdin) and writes JSON the same way; this module
//! centralizes both so the subcommands stay thin.

use crate::error::{io_error_with_path, FoundationError, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::io::{self, Read, Write};
use std::path::Path;

/// Reads input from a file path, an inline string, or stdin, in that
/// priority order.
pub fn read_input(file: Option<&str>, inline: Option<&str>) -> Result<String> {
    if let Some(path_str) = file {
        let path = Path::new(path_str);
        std::fs::read_to_string(path).map_err(|e| io_error_with_path(e, path, "read file"))
    } else if let Some(content) = inline {
        Ok(content.to_string())
    } else {
        let mut buffer = String::new();
        io::stdin()
            .read_to_string(&mut buffer)
            .map_err(|e| FoundationError::Io(e).with_context("reading from stdin"))?;
        Ok(buffer)
    }
}

/// Reads and parses JSON from a file path, or stdin when `path` is `"-"`.
pub fn read_json<T: DeserializeOwned>(path: &str) -> Result<T> {
    let content = if path == "-" {
        read_input(None, None)?
    } else {
        read_input(Some(path), None)?
    };
    serde_json::from_str(&content).map_err(FoundationError::Serialization)
}

/// Writes a value as pretty JSON to a file, or to stdout when `path` is `None`.
pub fn write_json<T: Serialize>(value: &T, path: Option<&str>) -> Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    match path {
        Some(path) => std::fs::write(path, json).map_err(FoundationError::Io),
        None => {
            let mut stdout = io::stdout();
            writeln!(stdout, "{json}").map_err(FoundationError::Io)
        }
    }
}

/// Writes plain text to a file, or to stdout when `path` is `None`.
pub fn write_text(text: &str, path: Option<&str>) -> Result<()> {
    match path {
        Some(path) => std::fs::write(path, text).map_err(FoundationError::Io),
        None => {
            let mut stdout = io::stdout();
            writeln!(stdout, "{text}").map_err(FoundationError::Io)
        }
    }
}
