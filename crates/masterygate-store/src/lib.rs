//! File-backed [`Persistence`] for masterygate.
//!
//! Layout under the store root:
//!
//! ```text
//! learners/<learner>/attempts.jsonl
//! learners/<learner>/achievements.jsonl
//! learners/<learner>/decisions.jsonl
//! learners/<learner>/profile.json
//! learners/<learner>/progress/<concept>.json
//! learners/<learner>/counters/level-<n>.json
//! ```
//!
//! Logs are append-only JSON lines, fsynced after every append. Records are
//! replaced atomically: written to a temp file in the same directory, synced,
//! then renamed over the old file. Path components are percent-encoded so
//! any id maps to one safe file name and back.
//!
//! A root belongs to a single process. Nothing here takes a file lock, and
//! the engine's per-learner locking does not reach across processes, so two
//! processes writing one root can interleave a learner's record updates.

use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, ErrorKind, Write};
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;

use masterygate_core::error::StorageError;
use masterygate_core::model::{
    Attempt, BlockedAttemptCounter, ConceptProgress, LearnerId, LearnerProfile, MasteryAchievement,
    ProgressionDecision,
};
use masterygate_core::store::Persistence;

const LEARNERS_DIR: &str = "learners";
const ATTEMPTS_LOG: &str = "attempts.jsonl";
const ACHIEVEMENTS_LOG: &str = "achievements.jsonl";
const DECISIONS_LOG: &str = "decisions.jsonl";
const PROFILE_FILE: &str = "profile.json";
const PROGRESS_DIR: &str = "progress";
const COUNTERS_DIR: &str = "counters";

/// Durable store rooted at a data directory.
#[derive(Debug, Clone)]
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    /// Open (creating if needed) a store at `root`.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let root = root.into();
        let learners = root.join(LEARNERS_DIR);
        fs::create_dir_all(&learners).map_err(|e| io_err(&learners, e))?;
        tracing::debug!(root = %root.display(), "opened file store");
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn learner_dir(&self, learner_id: &str) -> PathBuf {
        self.root.join(LEARNERS_DIR).join(encode_component(learner_id))
    }

    fn progress_path(&self, learner_id: &str, concept_id: &str) -> PathBuf {
        self.learner_dir(learner_id)
            .join(PROGRESS_DIR)
            .join(format!("{}.json", encode_component(concept_id)))
    }

    fn counter_path(&self, learner_id: &str, target_level: u32) -> PathBuf {
        self.learner_dir(learner_id)
            .join(COUNTERS_DIR)
            .join(format!("level-{target_level}.json"))
    }
}

impl Persistence for FileStore {
    fn load_progress(
        &self,
        learner_id: &str,
        concept_id: &str,
    ) -> Result<Option<ConceptProgress>, StorageError> {
        read_record(&self.progress_path(learner_id, concept_id))
    }

    fn save_progress(&self, progress: &ConceptProgress) -> Result<(), StorageError> {
        write_record(
            &self.progress_path(&progress.learner_id, &progress.concept_id),
            progress,
        )
    }

    fn list_progress(&self, learner_id: &str) -> Result<Vec<ConceptProgress>, StorageError> {
        let dir = self.learner_dir(learner_id).join(PROGRESS_DIR);
        let mut all = Vec::new();
        for path in list_dir(&dir)? {
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            if let Some(progress) = read_record::<ConceptProgress>(&path)? {
                all.push(progress);
            }
        }
        all.sort_by(|a, b| a.concept_id.cmp(&b.concept_id));
        Ok(all)
    }

    fn append_attempt(&self, attempt: &Attempt) -> Result<(), StorageError> {
        append_line(&self.learner_dir(&attempt.learner_id).join(ATTEMPTS_LOG), attempt)
    }

    fn attempts(&self, learner_id: &str) -> Result<Vec<Attempt>, StorageError> {
        read_lines(&self.learner_dir(learner_id).join(ATTEMPTS_LOG))
    }

    fn append_achievement(&self, achievement: &MasteryAchievement) -> Result<(), StorageError> {
        append_line(
            &self.learner_dir(&achievement.learner_id).join(ACHIEVEMENTS_LOG),
            achievement,
        )
    }

    fn achievements(&self, learner_id: &str) -> Result<Vec<MasteryAchievement>, StorageError> {
        read_lines(&self.learner_dir(learner_id).join(ACHIEVEMENTS_LOG))
    }

    fn append_decision(&self, decision: &ProgressionDecision) -> Result<(), StorageError> {
        append_line(&self.learner_dir(&decision.learner_id).join(DECISIONS_LOG), decision)
    }

    fn decisions(&self, learner_id: &str) -> Result<Vec<ProgressionDecision>, StorageError> {
        read_lines(&self.learner_dir(learner_id).join(DECISIONS_LOG))
    }

    fn load_profile(&self, learner_id: &str) -> Result<Option<LearnerProfile>, StorageError> {
        read_record(&self.learner_dir(learner_id).join(PROFILE_FILE))
    }

    fn save_profile(&self, profile: &LearnerProfile) -> Result<(), StorageError> {
        write_record(&self.learner_dir(&profile.learner_id).join(PROFILE_FILE), profile)
    }

    fn load_block_counter(
        &self,
        learner_id: &str,
        target_level: u32,
    ) -> Result<Option<BlockedAttemptCounter>, StorageError> {
        read_record(&self.counter_path(learner_id, target_level))
    }

    fn save_block_counter(&self, counter: &BlockedAttemptCounter) -> Result<(), StorageError> {
        write_record(
            &self.counter_path(&counter.learner_id, counter.target_level),
            counter,
        )
    }

    fn learners(&self) -> Result<Vec<LearnerId>, StorageError> {
        let mut learners = Vec::new();
        for path in list_dir(&self.root.join(LEARNERS_DIR))? {
            if !path.is_dir() {
                continue;
            }
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            match decode_component(name) {
                Some(id) => learners.push(id),
                None => tracing::warn!(dir = %path.display(), "skipping unrecognized learner directory"),
            }
        }
        learners.sort();
        Ok(learners)
    }
}

fn io_err(path: &Path, source: std::io::Error) -> StorageError {
    StorageError::io(path.display().to_string(), source)
}

/// Entries of a directory, or nothing if it does not exist yet.
fn list_dir(dir: &Path) -> Result<Vec<PathBuf>, StorageError> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(io_err(dir, e)),
    };
    entries
        .map(|entry| entry.map(|e| e.path()).map_err(|e| io_err(dir, e)))
        .collect()
}

fn read_record<T: DeserializeOwned>(path: &Path) -> Result<Option<T>, StorageError> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(io_err(path, e)),
    };
    serde_json::from_str(&content)
        .map(Some)
        .map_err(|e| StorageError::Serialization(format!("{}: {e}", path.display())))
}

fn write_record<T: Serialize>(path: &Path, value: &T) -> Result<(), StorageError> {
    let dir = path
        .parent()
        .ok_or_else(|| StorageError::Serialization(format!("no parent for {}", path.display())))?;
    fs::create_dir_all(dir).map_err(|e| io_err(dir, e))?;

    let json = serde_json::to_vec_pretty(value)?;
    let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(|e| io_err(dir, e))?;
    tmp.write_all(&json).map_err(|e| io_err(tmp.path(), e))?;
    tmp.as_file().sync_all().map_err(|e| io_err(tmp.path(), e))?;
    tmp.persist(path).map_err(|e| io_err(path, e.error))?;
    sync_dir(dir)
}

fn append_line<T: Serialize>(path: &Path, value: &T) -> Result<(), StorageError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| io_err(parent, e))?;
    }
    let mut line = serde_json::to_string(value)?;
    line.push('\n');

    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| io_err(path, e))?;
    file.write_all(line.as_bytes()).map_err(|e| io_err(path, e))?;
    file.sync_all().map_err(|e| io_err(path, e))
}

/// Read a JSON-lines log. A line that fails to parse (a torn final write,
/// or a newer record format) is skipped with a warning.
fn read_lines<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>, StorageError> {
    let file = match File::open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(io_err(path, e)),
    };
    let mut records = Vec::new();
    for (i, line) in BufReader::new(file).lines().enumerate() {
        let line = line.map_err(|e| io_err(path, e))?;
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str(&line) {
            Ok(record) => records.push(record),
            Err(e) => tracing::warn!(
                file = %path.display(),
                line = i + 1,
                "skipping malformed record: {e}"
            ),
        }
    }
    Ok(records)
}

#[cfg(unix)]
fn sync_dir(dir: &Path) -> Result<(), StorageError> {
    File::open(dir)
        .and_then(|d| d.sync_all())
        .map_err(|e| io_err(dir, e))
}

#[cfg(not(unix))]
fn sync_dir(_: &Path) -> Result<(), StorageError> {
    Ok(())
}

fn is_plain(b: u8) -> bool {
    b.is_ascii_alphanumeric() || matches!(b, b'-' | b'_' | b'.')
}

/// Percent-encode an id into a single path component.
fn encode_component(id: &str) -> String {
    let mut out = String::with_capacity(id.len());
    for (i, &b) in id.as_bytes().iter().enumerate() {
        // A leading dot would make "." / ".." or a hidden file.
        if is_plain(b) && !(i == 0 && b == b'.') {
            out.push(b as char);
        } else {
            out.push_str(&format!("%{b:02X}"));
        }
    }
    if out.is_empty() {
        out.push('%');
    }
    out
}

fn decode_component(name: &str) -> Option<String> {
    if name == "%" {
        return Some(String::new());
    }
    let bytes = name.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let hex = name.get(i + 1..i + 3)?;
            out.push(u8::from_str_radix(hex, 16).ok()?);
            i += 3;
        } else if is_plain(bytes[i]) {
            out.push(bytes[i]);
            i += 1;
        } else {
            return None;
        }
    }
    String::from_utf8(out).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn component_encoding_is_reversible() {
        for id in ["alice", "a/b", "../etc", ".hidden", "ünï cødé", "x%y", "", "C1.2"] {
            let encoded = encode_component(id);
            assert!(!encoded.contains('/'));
            assert!(!encoded.starts_with('.'));
            assert_eq!(decode_component(&encoded).as_deref(), Some(id), "{encoded}");
        }
    }

    #[test]
    fn plain_ids_stay_readable() {
        assert_eq!(encode_component("learner-42_b.v2"), "learner-42_b.v2");
        assert_eq!(encode_component("a b"), "a%20b");
    }

    #[test]
    fn decode_rejects_foreign_names() {
        assert_eq!(decode_component("bad name"), None);
        assert_eq!(decode_component("%Z1"), None);
        assert_eq!(decode_component("%4"), None);
    }

    #[test]
    fn missing_files_read_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::open(dir.path()).unwrap();
        assert!(store.attempts("nobody").unwrap().is_empty());
        assert!(store.load_profile("nobody").unwrap().is_none());
        assert!(store.list_progress("nobody").unwrap().is_empty());
        assert!(store.learners().unwrap().is_empty());
    }
}
