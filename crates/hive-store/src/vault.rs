// hive-store/src/vault.rs
// ============================================================================
// Module: Vault Store
// Description: Append-only, hash-chained JSONL event log, one file per scope.
// Purpose: Concrete hive_core::EventStore backend with no SQL dependency.
// Dependencies: hive_core::{Event, EventStore, EventStoreError}
// ============================================================================

use std::collections::HashMap;
use std::fs::File;
use std::fs::OpenOptions;
use std::io::BufRead;
use std::io::BufReader;
use std::io::Write;
use std::path::Path;
use std::path::PathBuf;
use std::sync::Mutex;

use async_trait::async_trait;
use hive_core::ColonyId;
use hive_core::Episode;
use hive_core::EpisodeStore;
use hive_core::Event;
use hive_core::EventStore;
use hive_core::EventStoreError;
use hive_core::RunId;
use thiserror::Error;
use tracing::warn;

/// How aggressively the vault flushes writes to disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VaultSyncMode {
    /// Call `sync_all` after every append. Slower, safe against power loss.
    Full,
    /// Rely on the OS page cache; only `flush` after every append.
    Normal,
}

/// Vault store configuration.
#[derive(Debug, Clone)]
pub struct VaultConfig {
    /// Directory holding one subdirectory per scope.
    pub root: PathBuf,
    /// Durability/performance tradeoff for appends.
    pub sync_mode: VaultSyncMode,
}

impl VaultConfig {
    /// Creates a config rooted at `root` with [`VaultSyncMode::Full`].
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into(), sync_mode: VaultSyncMode::Full }
    }
}

/// Errors raised by the vault store.
#[derive(Debug, Error)]
pub enum VaultError {
    /// Filesystem I/O failure.
    #[error("vault io error: {0}")]
    Io(String),
    /// A JSON line failed to parse.
    #[error("vault decode error: {0}")]
    Decode(String),
    /// The appended event's `prev_hash` does not match the scope's current
    /// head hash.
    #[error("chain violation in scope {scope}: expected prev {expected:?}, got {actual:?}")]
    ChainViolation {
        /// Scope the append targeted.
        scope: String,
        /// Head hash the vault actually holds.
        expected: Option<String>,
        /// `prev_hash` the caller supplied.
        actual: Option<String>,
    },
    /// A stored event's hash does not match its recomputed hash.
    #[error("corrupted event {event_id} in scope {scope}: stored {stored}, computed {computed}")]
    Corruption {
        /// Scope the corrupt record was found in.
        scope: String,
        /// Event identifier.
        event_id: String,
        /// Hash stored in the record.
        stored: String,
        /// Hash recomputed from the record's content.
        computed: String,
    },
}

impl From<VaultError> for EventStoreError {
    fn from(err: VaultError) -> Self {
        match err {
            VaultError::Io(msg) | VaultError::Decode(msg) => EventStoreError::Io(msg),
            VaultError::ChainViolation { scope, expected, actual } => EventStoreError::ChainViolation(format!(
                "scope {scope}: expected prev {expected:?}, got {actual:?}"
            )),
            VaultError::Corruption { scope, event_id, stored, computed } => EventStoreError::ChainViolation(format!(
                "scope {scope}: event {event_id} corrupted (stored {stored}, computed {computed})"
            )),
        }
    }
}

/// One scope's open log handle, guarded for single-writer appends.
struct ScopeHandle {
    file: Mutex<File>,
    path: PathBuf,
}

/// JSONL, hash-chained `EventStore` rooted at a directory on disk.
///
/// Each scope (a Run, a Colony, or the `meta-decisions` bucket) gets its own
/// `events.jsonl` file under `root/<scope>/events.jsonl`. Appends to a given
/// scope serialize through that scope's `Mutex<File>`; different scopes
/// never contend with each other.
pub struct VaultStore {
    config: VaultConfig,
    scopes: Mutex<HashMap<String, std::sync::Arc<ScopeHandle>>>,
}

impl VaultStore {
    /// Opens (creating if absent) a vault rooted at `config.root`.
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::Io`] if the root directory cannot be created.
    pub fn open(config: VaultConfig) -> Result<Self, VaultError> {
        std::fs::create_dir_all(&config.root).map_err(|e| VaultError::Io(e.to_string()))?;
        Ok(Self { config, scopes: Mutex::new(HashMap::new()) })
    }

    fn scope_key(event: &Event) -> String {
        if let Some(run_id) = &event.run_id {
            format!("run-{}", run_id.as_str())
        } else if let Some(colony_id) = &event.colony_id {
            format!("colony-{}", colony_id.as_str())
        } else {
            "meta-decisions".to_string()
        }
    }

    fn handle_for(&self, scope: &str) -> Result<std::sync::Arc<ScopeHandle>, VaultError> {
        let mut guard = self.scopes.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        if let Some(handle) = guard.get(scope) {
            return Ok(handle.clone());
        }
        let dir = self.config.root.join(scope);
        std::fs::create_dir_all(&dir).map_err(|e| VaultError::Io(e.to_string()))?;
        let path = dir.join("events.jsonl");
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .read(true)
            .open(&path)
            .map_err(|e| VaultError::Io(e.to_string()))?;
        let handle = std::sync::Arc::new(ScopeHandle { file: Mutex::new(file), path });
        guard.insert(scope.to_string(), handle.clone());
        Ok(handle)
    }

    /// Reads every well-formed event line from `path`, in file order.
    ///
    /// A truncated final line (e.g. from a crash mid-write) is logged and
    /// discarded rather than treated as corruption: it was never
    /// acknowledged to a caller, so dropping it is safe.
    fn read_scope_file(path: &Path) -> Result<Vec<Event>, VaultError> {
        if !path.exists() {
            return Ok(Vec::new());
        }
        let file = File::open(path).map_err(|e| VaultError::Io(e.to_string()))?;
        let reader = BufReader::new(file);
        let mut events = Vec::new();
        let lines: Vec<_> = reader.lines().collect::<Result<_, _>>().map_err(|e| VaultError::Io(e.to_string()))?;
        let count = lines.len();
        for (idx, line) in lines.into_iter().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            match Event::from_line(&line) {
                Ok(event) => events.push(event),
                Err(err) => {
                    if idx + 1 == count {
                        warn!(path = %path.display(), error = %err, "discarding truncated tail line");
                        break;
                    }
                    return Err(VaultError::Decode(err.to_string()));
                }
            }
        }
        Ok(events)
    }

    fn verify_chain(scope: &str, events: &[Event]) -> Result<(), VaultError> {
        for event in events {
            event.verify_hash().map_err(|_| VaultError::Corruption {
                scope: scope.to_string(),
                event_id: event.id.to_string(),
                stored: event.hash.clone(),
                computed: String::from("mismatch"),
            })?;
        }
        for window in events.windows(2) {
            let (prev, next) = (&window[0], &window[1]);
            if next.prev_hash.as_deref() != Some(prev.hash.as_str()) {
                return Err(VaultError::ChainViolation {
                    scope: scope.to_string(),
                    expected: Some(prev.hash.clone()),
                    actual: next.prev_hash.clone(),
                });
            }
        }
        Ok(())
    }

    /// Appends `event` to its scope's log, rejecting the append if the
    /// event's `prev_hash` does not match the scope's current head.
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::ChainViolation`] on a stale or forked
    /// `prev_hash`, or [`VaultError::Io`] on a filesystem failure.
    pub fn append_event(&self, event: Event) -> Result<(), VaultError> {
        let scope = Self::scope_key(&event);
        let handle = self.handle_for(&scope)?;
        let mut file = handle.file.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        let existing = Self::read_scope_file(&handle.path)?;
        let head = existing.last().map(|e| e.hash.clone());
        if event.prev_hash != head {
            return Err(VaultError::ChainViolation { scope, expected: head, actual: event.prev_hash.clone() });
        }
        let line = event.to_line().map_err(|e| VaultError::Decode(e.to_string()))?;
        file.write_all(line.as_bytes()).map_err(|e| VaultError::Io(e.to_string()))?;
        file.write_all(b"\n").map_err(|e| VaultError::Io(e.to_string()))?;
        match self.config.sync_mode {
            VaultSyncMode::Full => file.sync_all().map_err(|e| VaultError::Io(e.to_string()))?,
            VaultSyncMode::Normal => file.flush().map_err(|e| VaultError::Io(e.to_string()))?,
        }
        Ok(())
    }

    /// Reads and verifies every event in scope `scope`.
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::Corruption`] or [`VaultError::ChainViolation`]
    /// if the on-disk log fails hash-chain verification.
    pub fn read_scope(&self, scope: &str) -> Result<Vec<Event>, VaultError> {
        let path = self.config.root.join(scope).join("events.jsonl");
        let events = Self::read_scope_file(&path)?;
        Self::verify_chain(scope, &events)?;
        Ok(events)
    }

    /// Lists every scope directory under the vault root whose name starts
    /// with `run-`, stripping the prefix.
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::Io`] if the root cannot be read.
    pub fn list_run_ids(&self) -> Result<Vec<RunId>, VaultError> {
        let mut runs = Vec::new();
        for entry in std::fs::read_dir(&self.config.root).map_err(|e| VaultError::Io(e.to_string()))? {
            let entry = entry.map_err(|e| VaultError::Io(e.to_string()))?;
            let Some(name) = entry.file_name().to_str().map(str::to_string) else { continue };
            if let Some(stripped) = name.strip_prefix("run-") {
                runs.push(RunId::new(stripped));
            }
        }
        runs.sort_by(|a, b| a.as_str().cmp(b.as_str()));
        Ok(runs)
    }

    /// Appends an episode summary to its Colony's `episodes.jsonl`.
    ///
    /// Unlike [`Self::append_event`], this file is not hash-chained: there is
    /// no head to check and no `prev_hash` to validate, since an `Episode`
    /// is a derived summary rather than an authoritative history record.
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::Io`] on a filesystem failure or
    /// [`VaultError::Decode`] if `episode` cannot be serialized.
    pub fn append_episode_record(&self, colony_id: &ColonyId, episode: &Episode) -> Result<(), VaultError> {
        let scope = format!("colony-{}", colony_id.as_str());
        let dir = self.config.root.join(&scope);
        std::fs::create_dir_all(&dir).map_err(|e| VaultError::Io(e.to_string()))?;
        let path = dir.join("episodes.jsonl");
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| VaultError::Io(e.to_string()))?;
        let line = serde_json::to_string(episode).map_err(|e| VaultError::Decode(e.to_string()))?;
        file.write_all(line.as_bytes()).map_err(|e| VaultError::Io(e.to_string()))?;
        file.write_all(b"\n").map_err(|e| VaultError::Io(e.to_string()))?;
        match self.config.sync_mode {
            VaultSyncMode::Full => file.sync_all().map_err(|e| VaultError::Io(e.to_string()))?,
            VaultSyncMode::Normal => file.flush().map_err(|e| VaultError::Io(e.to_string()))?,
        }
        Ok(())
    }

    /// Reads every episode recorded for a Colony, in append order. A
    /// truncated final line is discarded rather than treated as corruption,
    /// matching [`Self::read_scope_file`]'s handling of the event log.
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::Io`] on a filesystem failure.
    pub fn read_episodes(&self, colony_id: &ColonyId) -> Result<Vec<Episode>, VaultError> {
        let path = self.config.root.join(format!("colony-{}", colony_id.as_str())).join("episodes.jsonl");
        if !path.exists() {
            return Ok(Vec::new());
        }
        let file = File::open(&path).map_err(|e| VaultError::Io(e.to_string()))?;
        let reader = BufReader::new(file);
        let lines: Vec<_> = reader.lines().collect::<Result<_, _>>().map_err(|e| VaultError::Io(e.to_string()))?;
        let count = lines.len();
        let mut episodes = Vec::new();
        for (idx, line) in lines.into_iter().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<Episode>(&line) {
                Ok(episode) => episodes.push(episode),
                Err(err) => {
                    if idx + 1 == count {
                        warn!(path = %path.display(), error = %err, "discarding truncated episode tail line");
                        break;
                    }
                    return Err(VaultError::Decode(err.to_string()));
                }
            }
        }
        Ok(episodes)
    }
}

#[async_trait]
impl EpisodeStore for VaultStore {
    async fn append_episode(&self, episode: Episode) -> Result<(), EventStoreError> {
        let colony_id = episode.colony_id.clone().unwrap_or_else(|| ColonyId::new(episode.run_id.as_str()));
        self.append_episode_record(&colony_id, &episode).map_err(Into::into)
    }

    async fn list_episodes(&self, colony_id: &ColonyId) -> Result<Vec<Episode>, EventStoreError> {
        self.read_episodes(colony_id).map_err(Into::into)
    }
}

#[async_trait]
impl EventStore for VaultStore {
    async fn append(&self, event: Event) -> Result<(), EventStoreError> {
        self.append_event(event).map_err(Into::into)
    }

    async fn read_run(&self, run_id: &RunId) -> Result<Vec<Event>, EventStoreError> {
        self.read_scope(&format!("run-{}", run_id.as_str())).map_err(Into::into)
    }

    async fn read_colony(&self, colony_id: &ColonyId) -> Result<Vec<Event>, EventStoreError> {
        self.read_scope(&format!("colony-{}", colony_id.as_str())).map_err(Into::into)
    }

    async fn list_runs(&self) -> Result<Vec<RunId>, EventStoreError> {
        self.list_run_ids().map_err(Into::into)
    }

    async fn head_hash(&self, run_id: &RunId) -> Result<Option<String>, EventStoreError> {
        let events = self.read_run(run_id).await?;
        Ok(events.last().map(|e| e.hash.clone()))
    }

    async fn head_hash_for_colony(&self, colony_id: &ColonyId) -> Result<Option<String>, EventStoreError> {
        let events = self.read_colony(colony_id).await?;
        Ok(events.last().map(|e| e.hash.clone()))
    }

    async fn read_meta(&self) -> Result<Vec<Event>, EventStoreError> {
        self.read_scope("meta-decisions").map_err(Into::into)
    }

    async fn head_hash_for_meta(&self) -> Result<Option<String>, EventStoreError> {
        let events = self.read_meta().await?;
        Ok(events.last().map(|e| e.hash.clone()))
    }
}

#[cfg(test)]
mod tests {
    use hive_core::Actor;
    use hive_core::EventType;
    use hive_core::NewEvent;
    use hive_core::Timestamp;
    use serde_json::json;

    use super::*;

    fn new_event(run_id: &RunId, prev_hash: Option<String>, seq: i64) -> Event {
        Event::new(
            hive_core::EventId::new(format!("evt-{seq}")),
            NewEvent {
                event_type: EventType::Heartbeat,
                timestamp: Timestamp::from_unix_millis(seq),
                actor: Actor::System { subsystem: "test".to_string() },
                run_id: Some(run_id.clone()),
                task_id: None,
                colony_id: None,
                requirement_id: None,
                payload: json!({}),
                parents: Vec::new(),
                prev_hash,
            },
        )
        .expect("event construction")
    }

    #[test]
    fn append_then_read_round_trips() {
        let dir = tempfile::tempdir().expect("tempdir");
        let vault = VaultStore::open(VaultConfig::new(dir.path())).expect("open vault");
        let run_id = RunId::new("run-1");
        let first = new_event(&run_id, None, 1);
        let first_hash = first.hash.clone();
        vault.append_event(first).expect("append first");
        let second = new_event(&run_id, Some(first_hash), 2);
        vault.append_event(second).expect("append second");

        let events = vault.read_scope("run-run-1").expect("read scope");
        assert_eq!(events.len(), 2);
    }

    #[test]
    fn stale_prev_hash_is_rejected() {
        let dir = tempfile::tempdir().expect("tempdir");
        let vault = VaultStore::open(VaultConfig::new(dir.path())).expect("open vault");
        let run_id = RunId::new("run-1");
        vault.append_event(new_event(&run_id, None, 1)).expect("append first");
        let err = vault.append_event(new_event(&run_id, None, 2));
        assert!(matches!(err, Err(VaultError::ChainViolation { .. })));
    }

    #[test]
    fn list_run_ids_finds_every_run_scope() {
        let dir = tempfile::tempdir().expect("tempdir");
        let vault = VaultStore::open(VaultConfig::new(dir.path())).expect("open vault");
        vault.append_event(new_event(&RunId::new("a"), None, 1)).expect("append a");
        vault.append_event(new_event(&RunId::new("b"), None, 1)).expect("append b");
        let mut ids: Vec<String> = vault.list_run_ids().expect("list").into_iter().map(|r| r.into_inner()).collect();
        ids.sort();
        assert_eq!(ids, vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn corrupted_hash_is_detected_on_read() {
        let dir = tempfile::tempdir().expect("tempdir");
        let vault = VaultStore::open(VaultConfig::new(dir.path())).expect("open vault");
        let run_id = RunId::new("run-1");
        vault.append_event(new_event(&run_id, None, 1)).expect("append first");
        let path = dir.path().join("run-run-1").join("events.jsonl");
        let contents = std::fs::read_to_string(&path).expect("read file");
        let tampered = contents.replace("\"subsystem\":\"test\"", "\"subsystem\":\"tampered\"");
        std::fs::write(&path, tampered).expect("write tampered");
        let err = vault.read_scope("run-run-1");
        assert!(matches!(err, Err(VaultError::Corruption { .. }) | Err(VaultError::Decode(_))));
    }
}
