//! `export` and `clear` commands.

use std::error::Error;
use std::path::PathBuf;

use crate::core::export::{default_filename, write_export, ExportFormat};
use crate::core::message::now_millis;
use crate::core::store::HistoryStore;

pub fn run_export(format: ExportFormat, output: Option<PathBuf>) -> Result<(), Box<dyn Error>> {
    let store = HistoryStore::open_default()?;
    let messages = store.messages();
    let path = output.unwrap_or_else(|| PathBuf::from(default_filename(format, now_millis())));

    match write_export(&messages, format, &path, false) {
        Ok(()) => {
            println!("✅ Exported {} messages to {}", messages.len(), path.display());
            Ok(())
        }
        Err(err) => {
            eprintln!("❌ {err}");
            std::process::exit(1);
        }
    }
}

pub fn run_clear() -> Result<(), Box<dyn Error>> {
    let mut store = HistoryStore::open_default()?;
    let count = store.messages().len();
    store.clear_messages();
    store.save()?;
    println!("🗑️  Deleted {count} messages");
    Ok(())
}
