use std::fmt;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use chrono::{DateTime, SecondsFormat, Utc};

use crate::core::message::Message;

const MARKDOWN_SEPARATOR: &str = "\n---\n\n";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Markdown,
    Json,
}

impl ExportFormat {
    pub fn extension(self) -> &'static str {
        match self {
            ExportFormat::Markdown => "md",
            ExportFormat::Json => "json",
        }
    }
}

impl FromStr for ExportFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "markdown" | "md" => Ok(ExportFormat::Markdown),
            "json" => Ok(ExportFormat::Json),
            other => Err(format!("unknown export format '{other}' (use markdown or json)")),
        }
    }
}

#[derive(Debug)]
pub enum ExportError {
    Empty,
    Exists(PathBuf),
    Io(std::io::Error),
    Json(serde_json::Error),
}

impl fmt::Display for ExportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExportError::Empty => write!(f, "No conversation to export - the chat history is empty."),
            ExportError::Exists(path) => write!(
                f,
                "File '{}' already exists. Choose a different output path.",
                path.display()
            ),
            ExportError::Io(err) => write!(f, "Export failed: {err}"),
            ExportError::Json(err) => write!(f, "Export failed to serialize: {err}"),
        }
    }
}

impl std::error::Error for ExportError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ExportError::Io(err) => Some(err),
            ExportError::Json(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for ExportError {
    fn from(err: std::io::Error) -> Self {
        ExportError::Io(err)
    }
}

impl From<serde_json::Error> for ExportError {
    fn from(err: serde_json::Error) -> Self {
        ExportError::Json(err)
    }
}

pub fn to_markdown(messages: &[Message]) -> Result<String, ExportError> {
    if messages.is_empty() {
        return Err(ExportError::Empty);
    }
    let sections: Vec<String> = messages
        .iter()
        .map(|msg| format!("### {}\n\n{}\n", msg.role.title(), msg.content))
        .collect();
    Ok(sections.join(MARKDOWN_SEPARATOR))
}

/// Pretty-printed message array (two-space indentation).
pub fn to_json(messages: &[Message]) -> Result<String, ExportError> {
    if messages.is_empty() {
        return Err(ExportError::Empty);
    }
    Ok(serde_json::to_string_pretty(messages)?)
}

pub fn render(messages: &[Message], format: ExportFormat) -> Result<String, ExportError> {
    match format {
        ExportFormat::Markdown => to_markdown(messages),
        ExportFormat::Json => to_json(messages),
    }
}

/// `chat-export-2025-03-01T12:00:00.123Z.md`
pub fn default_filename(format: ExportFormat, at: DateTime<Utc>) -> String {
    format!(
        "chat-export-{}.{}",
        at.to_rfc3339_opts(SecondsFormat::Millis, true),
        format.extension()
    )
}

/// Render `messages` and write them to `path`. Refuses to replace an
/// existing file unless `overwrite` is set.
pub fn write_export(
    messages: &[Message],
    format: ExportFormat,
    path: &Path,
    overwrite: bool,
) -> Result<(), ExportError> {
    let rendered = render(messages, format)?;

    if !overwrite && path.exists() {
        return Err(ExportError::Exists(path.to_path_buf()));
    }

    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);
    writer.write_all(rendered.as_bytes())?;
    writer.flush()?;
    Ok(())
}
