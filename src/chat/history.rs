use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::sync::Mutex;

use super::message::{Message, Sender};
use crate::utils::ensure_dir;

/// Maximum entries kept in the on-screen log and in durable storage.
pub const MAX_LOG_ENTRIES: usize = 50;
/// Entries restored from durable storage when a session starts.
pub const RESTORE_LIMIT: usize = 20;

// ── In-memory log ───────────────────────────────────────────────────────

/// Insertion-ordered message log capped at [`MAX_LOG_ENTRIES`].
///
/// When the log was started with a welcome message, that first entry is
/// pinned and never evicted.
#[derive(Debug, Default, Clone)]
pub struct MessageLog {
    entries: Vec<Message>,
    pinned_first: bool,
}

impl MessageLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_welcome(welcome: Message) -> Self {
        Self {
            entries: vec![welcome],
            pinned_first: true,
        }
    }

    /// Append a message, evicting the oldest unpinned entries past the cap.
    pub fn push(&mut self, message: Message) {
        self.entries.push(message);
        let first_evictable = usize::from(self.pinned_first);
        while self.entries.len() > MAX_LOG_ENTRIES {
            self.entries.remove(first_evictable);
        }
    }

    /// Drop everything except the pinned welcome entry.
    pub fn reset(&mut self) {
        let keep = usize::from(self.pinned_first).min(self.entries.len());
        self.entries.truncate(keep);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn first(&self) -> Option<&Message> {
        self.entries.first()
    }

    pub fn last(&self) -> Option<&Message> {
        self.entries.last()
    }

    pub fn messages(&self) -> &[Message] {
        &self.entries
    }
}

// ── Durable storage ─────────────────────────────────────────────────────

/// Shape of one persisted history entry.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct PersistedEntry {
    pub message: String,
    pub sender: Sender,
    pub timestamp: String,
}

impl From<&Message> for PersistedEntry {
    fn from(m: &Message) -> Self {
        Self {
            message: m.body.clone(),
            sender: m.sender,
            timestamp: m.timestamp.clone(),
        }
    }
}

impl PersistedEntry {
    pub fn into_message(self) -> Message {
        Message {
            body: self.message,
            sender: self.sender,
            kind: super::message::MessageKind::Normal,
            timestamp: self.timestamp,
        }
    }
}

/// A single key of durable storage holding the raw JSON history array.
pub trait HistoryStore: Send {
    fn read(&self) -> Result<Option<String>>;
    fn write(&self, raw: &str) -> Result<()>;
    fn clear(&self) -> Result<()>;
}

/// History kept in a JSON file on disk.
#[derive(Debug, Clone)]
pub struct FileHistoryStore {
    path: PathBuf,
}

impl FileHistoryStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &PathBuf {
        &self.path
    }
}

impl HistoryStore for FileHistoryStore {
    fn read(&self) -> Result<Option<String>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let raw = fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read history {}", self.path.display()))?;
        Ok(Some(raw))
    }

    fn write(&self, raw: &str) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                ensure_dir(parent)?;
            }
        }
        fs::write(&self.path, raw)
            .with_context(|| format!("Failed to write history {}", self.path.display()))
    }

    fn clear(&self) -> Result<()> {
        if self.path.exists() {
            fs::remove_file(&self.path)
                .with_context(|| format!("Failed to remove history {}", self.path.display()))?;
        }
        Ok(())
    }
}

/// History kept in memory; for hosts without a writable disk and for tests.
#[derive(Debug, Default)]
pub struct MemoryHistoryStore {
    slot: Mutex<Option<String>>,
}

impl MemoryHistoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_raw(raw: impl Into<String>) -> Self {
        Self {
            slot: Mutex::new(Some(raw.into())),
        }
    }

    pub fn raw(&self) -> Option<String> {
        self.slot.lock().ok().and_then(|s| s.clone())
    }
}

impl HistoryStore for MemoryHistoryStore {
    fn read(&self) -> Result<Option<String>> {
        let slot = self
            .slot
            .lock()
            .map_err(|_| anyhow::anyhow!("history store poisoned"))?;
        Ok(slot.clone())
    }

    fn write(&self, raw: &str) -> Result<()> {
        let mut slot = self
            .slot
            .lock()
            .map_err(|_| anyhow::anyhow!("history store poisoned"))?;
        *slot = Some(raw.to_string());
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        self.write("[]")
    }
}

/// Parse every persisted entry. Errors mean the stored value is unreadable or
/// corrupt; callers treat that as an empty history.
pub fn try_load_entries(store: &dyn HistoryStore) -> Result<Vec<PersistedEntry>> {
    match store.read()? {
        None => Ok(Vec::new()),
        Some(raw) if raw.trim().is_empty() => Ok(Vec::new()),
        Some(raw) => serde_json::from_str(&raw).context("Corrupt chat history"),
    }
}

/// The last `limit` persisted entries, in original order. Corrupt data yields
/// an empty list.
pub fn restore_recent(store: &dyn HistoryStore, limit: usize) -> Vec<PersistedEntry> {
    take_recent(try_load_entries(store).unwrap_or_default(), limit)
}

/// Keep the last `limit` of already-parsed entries, in original order.
pub fn take_recent(mut entries: Vec<PersistedEntry>, limit: usize) -> Vec<PersistedEntry> {
    let skip = entries.len().saturating_sub(limit);
    entries.drain(..skip);
    entries
}

/// Append one entry to durable storage, keeping at most [`MAX_LOG_ENTRIES`].
/// A corrupt stored value is replaced rather than appended to.
pub fn append_entry(store: &dyn HistoryStore, entry: PersistedEntry) -> Result<()> {
    let mut entries = try_load_entries(store).unwrap_or_default();
    entries.push(entry);
    let overflow = entries.len().saturating_sub(MAX_LOG_ENTRIES);
    entries.drain(..overflow);
    let raw = serde_json::to_string(&entries).context("Failed to serialize chat history")?;
    store.write(&raw)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(text: &str) -> PersistedEntry {
        PersistedEntry {
            message: text.to_string(),
            sender: Sender::User,
            timestamp: "09:30".to_string(),
        }
    }

    #[test]
    fn test_log_cap_keeps_welcome() {
        let mut log = MessageLog::with_welcome(Message::bot("Welcome!"));
        for i in 0..120 {
            log.push(Message::user(format!("msg {i}")));
            assert!(log.len() <= MAX_LOG_ENTRIES);
        }
        assert_eq!(log.len(), MAX_LOG_ENTRIES);
        assert_eq!(log.first().unwrap().body, "Welcome!");
        assert_eq!(log.messages()[1].body, "msg 71");
        assert_eq!(log.last().unwrap().body, "msg 119");
    }

    #[test]
    fn test_log_cap_without_welcome_evicts_oldest() {
        let mut log = MessageLog::new();
        for i in 0..51 {
            log.push(Message::user(format!("msg {i}")));
        }
        assert_eq!(log.len(), MAX_LOG_ENTRIES);
        assert_eq!(log.first().unwrap().body, "msg 1");
    }

    #[test]
    fn test_log_reset_keeps_welcome_only() {
        let mut log = MessageLog::with_welcome(Message::bot("Welcome!"));
        log.push(Message::user("a"));
        log.push(Message::bot("b"));
        log.reset();
        assert_eq!(log.len(), 1);
        assert_eq!(log.first().unwrap().body, "Welcome!");
    }

    #[test]
    fn test_append_entry_caps_storage() {
        let store = MemoryHistoryStore::new();
        for i in 0..60 {
            append_entry(&store, entry(&format!("q{i}"))).unwrap();
        }
        let all = try_load_entries(&store).unwrap();
        assert_eq!(all.len(), MAX_LOG_ENTRIES);
        assert_eq!(all[0].message, "q10");
        assert_eq!(all[49].message, "q59");
    }

    #[test]
    fn test_restore_recent_returns_last_twenty_in_order() {
        let store = MemoryHistoryStore::new();
        for i in 0..35 {
            append_entry(&store, entry(&format!("q{i}"))).unwrap();
        }
        let restored = restore_recent(&store, RESTORE_LIMIT);
        assert_eq!(restored.len(), RESTORE_LIMIT);
        assert_eq!(restored[0].message, "q15");
        assert_eq!(restored[19].message, "q34");
    }

    #[test]
    fn test_restore_fewer_than_limit() {
        let store = MemoryHistoryStore::new();
        append_entry(&store, entry("only one")).unwrap();
        let restored = restore_recent(&store, RESTORE_LIMIT);
        assert_eq!(restored, vec![entry("only one")]);
    }

    #[test]
    fn test_corrupt_storage_treated_as_empty() {
        let store = MemoryHistoryStore::with_raw("{not json");
        assert!(try_load_entries(&store).is_err());
        assert!(restore_recent(&store, RESTORE_LIMIT).is_empty());

        // Appending over corrupt data starts a fresh history
        append_entry(&store, entry("fresh")).unwrap();
        assert_eq!(try_load_entries(&store).unwrap(), vec![entry("fresh")]);
    }

    #[test]
    fn test_file_store_round_trip() {
        let dir = PathBuf::from("test_agro_history_store");
        let _ = fs::remove_dir_all(&dir);
        let store = FileHistoryStore::new(dir.join("chat_history.json"));

        assert!(store.read().unwrap().is_none());
        append_entry(&store, entry("stored on disk")).unwrap();
        assert!(store.path().exists());
        assert_eq!(restore_recent(&store, RESTORE_LIMIT).len(), 1);

        store.clear().unwrap();
        assert!(restore_recent(&store, RESTORE_LIMIT).is_empty());

        let _ = fs::remove_dir_all(&dir);
    }
}
