//! Newline-delimited JSON journal on the local filesystem.

use std::fs::OpenOptions;
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::error::JournalError;
use crate::message::JournalMessage;
use crate::traits::Journal;

/// A journal stored as one JSON message per line.
///
/// Appends are serialized by an async lock and each one ends with
/// `sync_data`. A crash mid-append can leave a trailing line without its
/// newline: replay skips it, and the next append truncates it first.
#[derive(Debug)]
pub struct FileJournal {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileJournal {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        FileJournal {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn io_error(path: &Path, e: std::io::Error) -> JournalError {
    JournalError::Io {
        path: path.display().to_string(),
        message: e.to_string(),
    }
}

/// Cut a trailing partial line left by an interrupted append.
fn truncate_partial_line(file: &mut std::fs::File, path: &Path) -> Result<(), JournalError> {
    let len = file.metadata().map_err(|e| io_error(path, e))?.len();
    if len == 0 {
        return Ok(());
    }
    let mut last = [0u8; 1];
    file.seek(SeekFrom::Start(len - 1))
        .map_err(|e| io_error(path, e))?;
    file.read_exact(&mut last).map_err(|e| io_error(path, e))?;
    if last[0] == b'\n' {
        return Ok(());
    }

    let mut contents = Vec::new();
    file.seek(SeekFrom::Start(0)).map_err(|e| io_error(path, e))?;
    file.read_to_end(&mut contents)
        .map_err(|e| io_error(path, e))?;
    let keep = contents
        .iter()
        .rposition(|b| *b == b'\n')
        .map(|i| i + 1)
        .unwrap_or(0);
    tracing::warn!(
        path = %path.display(),
        dropped_bytes = contents.len() - keep,
        "truncating partial journal line left by an interrupted append"
    );
    file.set_len(keep as u64).map_err(|e| io_error(path, e))?;
    file.seek(SeekFrom::End(0)).map_err(|e| io_error(path, e))?;
    Ok(())
}

fn append_line(path: &Path, line: &str) -> Result<(), JournalError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).map_err(|e| io_error(parent, e))?;
        }
    }
    let mut file = OpenOptions::new()
        .read(true)
        .append(true)
        .create(true)
        .open(path)
        .map_err(|e| io_error(path, e))?;
    truncate_partial_line(&mut file, path)?;

    let mut buf = Vec::with_capacity(line.len() + 1);
    buf.extend_from_slice(line.as_bytes());
    buf.push(b'\n');
    file.write_all(&buf).map_err(|e| io_error(path, e))?;
    file.sync_data().map_err(|e| io_error(path, e))
}

/// Parse journal text. A final line without a newline is an interrupted
/// append and is skipped when it does not parse.
pub fn parse_journal(text: &str) -> Result<Vec<JournalMessage>, JournalError> {
    let complete = text.ends_with('\n');
    let lines: Vec<&str> = text.lines().collect();
    let mut messages = Vec::with_capacity(lines.len());
    for (i, line) in lines.iter().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        match JournalMessage::from_line(line) {
            Ok(msg) => messages.push(msg),
            Err(e) if i + 1 == lines.len() && !complete => {
                tracing::warn!(line = i + 1, error = %e, "ignoring partial trailing journal line");
            }
            Err(e) => {
                return Err(JournalError::Corrupt {
                    line: i + 1,
                    message: e.to_string(),
                })
            }
        }
    }
    Ok(messages)
}

#[async_trait]
impl Journal for FileJournal {
    async fn append(&self, message: &JournalMessage) -> Result<(), JournalError> {
        let line = message
            .to_line()
            .map_err(|e| JournalError::Serialize(e.to_string()))?;
        let _guard = self.lock.lock().await;
        let path = self.path.clone();
        tokio::task::spawn_blocking(move || append_line(&path, &line))
            .await
            .map_err(|e| JournalError::Backend(format!("append task failed: {}", e)))??;
        tracing::debug!(kind = message.type_name(), "journaled");
        Ok(())
    }

    async fn replay(&self) -> Result<Vec<JournalMessage>, JournalError> {
        let _guard = self.lock.lock().await;
        let path = self.path.clone();
        let text = tokio::task::spawn_blocking(move || match std::fs::read_to_string(&path) {
            Ok(text) => Ok(text),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(String::new()),
            Err(e) => Err(io_error(&path, e)),
        })
        .await
        .map_err(|e| JournalError::Backend(format!("replay task failed: {}", e)))??;
        parse_journal(&text)
    }
}
