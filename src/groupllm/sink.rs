//! Handing freshly appended log entries to durable storage.
//!
//! The orchestrator calls [`ConversationSink::persist`] after every round with exactly
//! the entries that round appended (the user entry is included with the first round of
//! a turn). When and how to flush is up to the sink. Failures are logged by the caller
//! and never interrupt the conversation; the in-memory log stays authoritative.
//!
//! [`JsonlConversationSink`] is the bundled implementation: one append-only JSON-lines
//! file per session.

use crate::groupllm::session::ConversationEntry;
use async_trait::async_trait;
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;

/// Receives the entries each round appends.
#[async_trait]
pub trait ConversationSink: Send + Sync {
    async fn persist(&self, session_id: &str, entries: &[ConversationEntry]) -> io::Result<()>;
}

/// Appends entries as JSON lines to `<dir>/<safe-session-id>-<fingerprint>.jsonl`.
#[derive(Debug, Clone)]
pub struct JsonlConversationSink {
    dir: PathBuf,
}

impl JsonlConversationSink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Full path of the log file backing `session_id`.
    pub fn path_for(&self, session_id: &str) -> PathBuf {
        self.dir.join(session_filename(session_id))
    }

    /// Read every persisted entry of `session_id`, oldest first. A session that was
    /// never persisted yields an empty log.
    pub fn load(&self, session_id: &str) -> io::Result<Vec<ConversationEntry>> {
        let path = self.path_for(session_id);
        if !path.exists() {
            return Ok(Vec::new());
        }

        let reader = BufReader::new(File::open(&path)?);
        let mut entries = Vec::new();
        for line in reader.lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let entry: ConversationEntry = serde_json::from_str(&line).map_err(|e| {
                io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!("Failed to parse conversation entry: {}", e),
                )
            })?;
            entries.push(entry);
        }
        Ok(entries)
    }
}

#[async_trait]
impl ConversationSink for JsonlConversationSink {
    async fn persist(&self, session_id: &str, entries: &[ConversationEntry]) -> io::Result<()> {
        if entries.is_empty() {
            return Ok(());
        }

        let mut buf = String::new();
        for entry in entries {
            let json = serde_json::to_string(entry).map_err(|e| {
                io::Error::new(
                    io::ErrorKind::Other,
                    format!("Failed to serialize conversation entry: {}", e),
                )
            })?;
            buf.push_str(&json);
            buf.push('\n');
        }

        tokio::fs::create_dir_all(&self.dir).await?;
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.path_for(session_id))
            .await?;
        file.write_all(buf.as_bytes()).await?;
        file.flush().await
    }
}

/// File name for a session log.
///
/// Format: `{safe_id}-{sha256(session_id)[..16]}.jsonl`. The id is made filesystem
/// safe by replacing everything except alphanumerics, `-` and `_` with `_`; the
/// fingerprint keeps ids that sanitize to the same text apart.
pub fn session_filename(session_id: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(session_id.as_bytes());
    let digest = format!("{:x}", hasher.finalize());
    let fingerprint = &digest[..16];

    let safe_id: String = session_id
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();

    format!("{}-{}.jsonl", safe_id, fingerprint)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::groupllm::fragment::{Fragment, FragmentContent};

    #[test]
    fn test_filename_is_safe_and_distinct() {
        let a = session_filename("team/chat");
        let b = session_filename("team:chat");
        assert!(a.starts_with("team_chat-"));
        assert!(a.ends_with(".jsonl"));
        assert_ne!(a, b);
        assert_eq!(a, session_filename("team/chat"));
    }

    #[tokio::test]
    async fn test_persist_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let sink = JsonlConversationSink::new(dir.path().join("logs"));

        let first = vec![ConversationEntry::user("hello")];
        let second = vec![
            ConversationEntry::from_fragment(&Fragment::text("a", "hi")),
            ConversationEntry::from_fragment(&Fragment::new(
                "a",
                FragmentContent::Sticker("wave".into()),
            )),
        ];
        sink.persist("s1", &first).await.unwrap();
        sink.persist("s1", &second).await.unwrap();
        sink.persist("s1", &[]).await.unwrap();

        let loaded = sink.load("s1").unwrap();
        assert_eq!(loaded.len(), 3);
        assert_eq!(loaded[0], first[0]);
        assert_eq!(loaded[2], second[1]);
        assert!(sink.load("never-written").unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_recalled_entry_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let sink = JsonlConversationSink::new(dir.path());

        let mut entry = ConversationEntry::user("secret");
        entry.recall();
        sink.persist("s", &[entry.clone()]).await.unwrap();

        let loaded = sink.load("s").unwrap();
        assert!(loaded[0].is_recalled());
        assert_eq!(loaded[0].original_content(), Some("secret"));
    }
}
