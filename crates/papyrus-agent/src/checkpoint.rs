//! Checkpoint persistence for graph threads
//!
//! Every node transition appends one [`Checkpoint`]. Loading a thread reads
//! back the newest one, which is enough to resume a run that paused for
//! approval, including after a restart.

use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::graph::PendingApproval;
use crate::state::{ConversationState, Node};

/// Snapshot taken after a node transition
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Checkpoint {
    /// Steps taken in the run that wrote this checkpoint
    pub step: u32,
    /// Node to execute next
    pub next: Node,
    pub state: ConversationState,
    /// Set while the thread waits for approval
    #[serde(default)]
    pub pending: Option<PendingApproval>,
    pub created_at: i64,
}

pub trait CheckpointStore: Send + Sync {
    /// Append a checkpoint for `thread`
    fn put(&self, thread: &str, checkpoint: &Checkpoint) -> Result<()>;

    /// Newest checkpoint for `thread`, if the thread exists
    fn latest(&self, thread: &str) -> Result<Option<Checkpoint>>;

    /// Known thread ids, sorted
    fn threads(&self) -> Result<Vec<String>>;
}

/// JSONL entry types
#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum Entry {
    Metadata { thread_id: String, created_at: i64 },
    Checkpoint(Checkpoint),
}

/// One `<thread>.jsonl` file per thread
pub struct FileCheckpointStore {
    dir: PathBuf,
    write_lock: Mutex<()>,
}

impl FileCheckpointStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            write_lock: Mutex::new(()),
        }
    }

    /// File name for `thread`: ASCII letters, digits and `-` are kept, any
    /// other byte becomes `_XX`, so distinct ids never share a file
    fn path_for(&self, thread: &str) -> PathBuf {
        let mut name = String::with_capacity(thread.len() + 6);
        for b in thread.bytes() {
            if b.is_ascii_alphanumeric() || b == b'-' {
                name.push(b as char);
            } else {
                name.push_str(&format!("_{:02X}", b));
            }
        }
        name.push_str(".jsonl");
        self.dir.join(name)
    }
}

/// Thread id recorded in the metadata line at the top of `path`
fn recorded_thread_id(path: &Path) -> Option<String> {
    let mut first = String::new();
    BufReader::new(File::open(path).ok()?)
        .read_line(&mut first)
        .ok()?;
    match serde_json::from_str::<Entry>(&first) {
        Ok(Entry::Metadata { thread_id, .. }) => Some(thread_id),
        _ => None,
    }
}

impl CheckpointStore for FileCheckpointStore {
    fn put(&self, thread: &str, checkpoint: &Checkpoint) -> Result<()> {
        let _guard = self.write_lock.lock();
        fs::create_dir_all(&self.dir)?;
        let path = self.path_for(thread);
        let is_new = !path.exists();

        let file = File::options().create(true).append(true).open(&path)?;
        let mut writer = BufWriter::new(file);
        if is_new {
            let metadata = Entry::Metadata {
                thread_id: thread.to_string(),
                created_at: chrono::Utc::now().timestamp_millis(),
            };
            writeln!(writer, "{}", serde_json::to_string(&metadata)?)?;
        }
        writeln!(
            writer,
            "{}",
            serde_json::to_string(&Entry::Checkpoint(checkpoint.clone()))?
        )?;
        writer.flush()?;
        Ok(())
    }

    fn latest(&self, thread: &str) -> Result<Option<Checkpoint>> {
        let path = self.path_for(thread);
        if !path.exists() {
            return Ok(None);
        }
        let raw = fs::read_to_string(&path)?;
        let lines: Vec<&str> = raw.lines().collect();

        // Newest entry is last; only parse back to the first good checkpoint.
        for (lineno, line) in lines.iter().enumerate().rev() {
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<Entry>(line) {
                Ok(Entry::Checkpoint(cp)) => return Ok(Some(cp)),
                Ok(Entry::Metadata { .. }) => {}
                Err(e) => {
                    tracing::warn!(path = %path.display(), line = lineno + 1, error = %e, "skipping bad checkpoint line");
                }
            }
        }
        Ok(None)
    }

    fn threads(&self) -> Result<Vec<String>> {
        let read_dir = match fs::read_dir(&self.dir) {
            Ok(d) => d,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        let mut ids: Vec<String> = read_dir
            .flatten()
            .map(|entry| entry.path())
            .filter(|p| p.extension().is_some_and(|ext| ext == "jsonl"))
            .filter_map(|p| {
                recorded_thread_id(&p)
                    .or_else(|| p.file_stem().map(|s| s.to_string_lossy().into_owned()))
            })
            .collect();
        ids.sort();
        Ok(ids)
    }
}

/// In-process store for tests and throwaway sessions
#[derive(Default)]
pub struct MemoryCheckpointStore {
    threads: Mutex<HashMap<String, Vec<Checkpoint>>>,
}

impl MemoryCheckpointStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every checkpoint written for `thread`, oldest first
    pub fn history(&self, thread: &str) -> Vec<Checkpoint> {
        self.threads.lock().get(thread).cloned().unwrap_or_default()
    }
}

impl CheckpointStore for MemoryCheckpointStore {
    fn put(&self, thread: &str, checkpoint: &Checkpoint) -> Result<()> {
        self.threads
            .lock()
            .entry(thread.to_string())
            .or_default()
            .push(checkpoint.clone());
        Ok(())
    }

    fn latest(&self, thread: &str) -> Result<Option<Checkpoint>> {
        Ok(self
            .threads
            .lock()
            .get(thread)
            .and_then(|cps| cps.last().cloned()))
    }

    fn threads(&self) -> Result<Vec<String>> {
        let mut ids: Vec<String> = self.threads.lock().keys().cloned().collect();
        ids.sort();
        Ok(ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use papyrus_ai::Message;

    fn checkpoint(step: u32, next: Node, text: &str) -> Checkpoint {
        Checkpoint {
            step,
            next,
            state: ConversationState {
                messages: vec![Message::user(text)],
                decision: None,
            },
            pending: None,
            created_at: chrono::Utc::now().timestamp_millis(),
        }
    }

    #[test]
    fn test_file_store_latest_wins_and_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        {
            let store = FileCheckpointStore::new(dir.path());
            store.put("t-1", &checkpoint(1, Node::Tools, "first")).unwrap();
            store.put("t-1", &checkpoint(2, Node::End, "second")).unwrap();
        }

        let store = FileCheckpointStore::new(dir.path());
        let latest = store.latest("t-1").unwrap().unwrap();
        assert_eq!(latest.step, 2);
        assert_eq!(latest.next, Node::End);
        assert_eq!(latest.state.messages[0].text(), "second");

        let raw = fs::read_to_string(dir.path().join("t-1.jsonl")).unwrap();
        let first_line: serde_json::Value =
            serde_json::from_str(raw.lines().next().unwrap()).unwrap();
        assert_eq!(first_line["type"], "metadata");
        assert_eq!(first_line["thread_id"], "t-1");
        assert_eq!(raw.lines().count(), 3);
    }

    #[test]
    fn test_file_store_skips_corrupt_lines() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileCheckpointStore::new(dir.path());
        store.put("t", &checkpoint(1, Node::Assistant, "ok")).unwrap();
        let path = dir.path().join("t.jsonl");
        let mut raw = fs::read_to_string(&path).unwrap();
        raw.push_str("{not json\n");
        fs::write(&path, raw).unwrap();

        assert_eq!(store.latest("t").unwrap().unwrap().step, 1);
    }

    #[test]
    fn test_file_store_threads() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileCheckpointStore::new(dir.path().join("missing-yet"));
        assert!(store.threads().unwrap().is_empty());
        assert!(store.latest("nope").unwrap().is_none());

        store.put("b", &checkpoint(1, Node::End, "x")).unwrap();
        store.put("a", &checkpoint(1, Node::End, "x")).unwrap();
        assert_eq!(store.threads().unwrap(), ["a", "b"]);
    }

    #[test]
    fn test_thread_id_cannot_escape_dir() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileCheckpointStore::new(dir.path());
        store.put("../evil", &checkpoint(1, Node::End, "x")).unwrap();
        assert!(dir.path().join("_2E_2E_2Fevil.jsonl").exists());
        assert_eq!(store.threads().unwrap(), ["../evil"]);
    }

    #[test]
    fn test_similar_thread_ids_keep_separate_files() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileCheckpointStore::new(dir.path());
        store.put("a.b", &checkpoint(1, Node::End, "dot")).unwrap();
        store.put("a_b", &checkpoint(2, Node::End, "underscore")).unwrap();

        assert_eq!(store.latest("a.b").unwrap().unwrap().step, 1);
        assert_eq!(store.latest("a_b").unwrap().unwrap().step, 2);
        assert_eq!(store.threads().unwrap(), ["a.b", "a_b"]);
    }

    #[test]
    fn test_memory_store() {
        let store = MemoryCheckpointStore::new();
        store.put("t", &checkpoint(1, Node::Tools, "a")).unwrap();
        store.put("t", &checkpoint(2, Node::End, "b")).unwrap();
        assert_eq!(store.latest("t").unwrap().unwrap().step, 2);
        assert_eq!(store.history("t").len(), 2);
        assert_eq!(store.threads().unwrap(), ["t"]);
    }
}
