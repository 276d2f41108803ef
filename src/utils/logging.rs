use crate::core::message::{Message, Role};
use std::fs::OpenOptions;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

pub const LOG_ENV: &str = "ROUTECHAT_LOG";

/// Install the global `tracing` subscriber, writing to stderr so that
/// streamed answers on stdout stay clean. `ROUTECHAT_LOG` takes precedence
/// over the `verbose` default.
pub fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_env(LOG_ENV)
        .unwrap_or_else(|_| EnvFilter::new(format!("routechat={default_level}")));

    // A second init (tests, embedding) keeps the first subscriber.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

/// Plain-text transcript of a conversation, appended to as messages are
/// exchanged.
pub struct TranscriptLog {
    file_path: PathBuf,
}

impl TranscriptLog {
    pub fn new(path: impl Into<PathBuf>) -> Result<Self, Box<dyn std::error::Error>> {
        let file_path = path.into();
        test_file_access(&file_path)?;
        Ok(TranscriptLog { file_path })
    }

    pub fn log_message(&self, message: &Message) -> Result<(), Box<dyn std::error::Error>> {
        match message.role {
            Role::User => {
                let mut text = format!("You: {}", message.content);
                if message.has_image() {
                    text.push_str("\n[image attached]");
                }
                self.write_to_log(&text)
            }
            Role::Assistant if message.content.is_empty() => Ok(()),
            Role::Assistant => self.write_to_log(&message.content),
        }
    }

    /// Log a `## ` prefixed note, such as an error that cut a reply short.
    pub fn log_note(&self, note: &str) -> Result<(), Box<dyn std::error::Error>> {
        self.write_to_log(&format!("## {note}"))
    }

    fn write_to_log(&self, content: &str) -> Result<(), Box<dyn std::error::Error>> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.file_path)?;

        let mut writer = BufWriter::with_capacity(64 * 1024, file);
        for line in content.lines() {
            writeln!(writer, "{line}")?;
        }
        // Blank line between messages
        writeln!(writer)?;

        writer.flush()?;
        Ok(())
    }
}

fn test_file_access(path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    file.flush()?;
    Ok(())
}
