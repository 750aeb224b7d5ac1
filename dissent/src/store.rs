//! Transcript store — JSON files for finished debates.
//!
//! The store only ever receives a transcript the engine has already made
//! immutable; it never edits one. Storage is one pretty-printed JSON file
//! per transcript, named by id, so stored debates stay greppable and
//! diffable.

use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, info};

use crate::debate::transcript::DebateTranscript;

/// Environment variable overriding the data directory.
pub const DATA_ENV: &str = "DISSENT_DATA";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("transcript '{0}' not found")]
    NotFound(String),

    #[error("transcript id '{0}' is ambiguous ({1} matches)")]
    Ambiguous(String, usize),

    #[error("store I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("transcript (de)serialization failed: {0}")]
    Serde(#[from] serde_json::Error),
}

/// Lightweight listing entry.
#[derive(Debug, Clone)]
pub struct TranscriptSummary {
    pub id: String,
    pub query: String,
    pub panel: Vec<String>,
    pub rounds: usize,
    pub has_synthesis: bool,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

/// File-backed transcript storage.
pub struct TranscriptStore {
    root: PathBuf,
}

impl TranscriptStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Default data directory: `$DISSENT_DATA`, else
    /// `$HOME/.local/share/dissent/transcripts`.
    pub fn default_root() -> PathBuf {
        if let Some(path) = std::env::var_os(DATA_ENV) {
            return PathBuf::from(path);
        }
        std::env::var_os("HOME")
            .map(PathBuf::from)
            .unwrap_or_default()
            .join(".local/share/dissent/transcripts")
    }

    /// Open the default store, creating its directory if needed.
    pub fn open_default() -> Result<Self, StoreError> {
        let root = Self::default_root();
        std::fs::create_dir_all(&root)?;
        Ok(Self::new(root))
    }

    fn path_for(&self, id: &str) -> PathBuf {
        self.root.join(format!("{id}.json"))
    }

    /// Persist a finished transcript. Returns the file it landed in.
    pub fn save(&self, transcript: &DebateTranscript) -> Result<PathBuf, StoreError> {
        std::fs::create_dir_all(&self.root)?;
        let path = self.path_for(&transcript.id);
        let json = serde_json::to_string_pretty(transcript)?;
        std::fs::write(&path, json)?;
        info!(id = %transcript.id, path = %path.display(), "transcript saved");
        Ok(path)
    }

    /// Load by exact id, or by unique id prefix.
    pub fn load(&self, id: &str) -> Result<DebateTranscript, StoreError> {
        let exact = self.path_for(id);
        if exact.exists() {
            return self.read_file(&exact);
        }

        let matches: Vec<PathBuf> = self
            .transcript_files()?
            .into_iter()
            .filter(|path| {
                path.file_stem()
                    .and_then(|stem| stem.to_str())
                    .is_some_and(|stem| stem.starts_with(id))
            })
            .collect();
        match matches.len() {
            0 => Err(StoreError::NotFound(id.to_string())),
            1 => self.read_file(&matches[0]),
            n => Err(StoreError::Ambiguous(id.to_string(), n)),
        }
    }

    /// Every stored transcript, newest first.
    pub fn list(&self) -> Result<Vec<TranscriptSummary>, StoreError> {
        let mut summaries = Vec::new();
        for path in self.transcript_files()? {
            // A foreign file in the data dir should not break listing.
            match self.read_file(&path) {
                Ok(t) => summaries.push(TranscriptSummary {
                    id: t.id.clone(),
                    query: t.query.clone(),
                    panel: t.panel.clone(),
                    rounds: t.rounds.len(),
                    has_synthesis: t.synthesis.is_some(),
                    created_at: t.created_at,
                }),
                Err(err) => debug!(path = %path.display(), "skipping unreadable file: {err}"),
            }
        }
        summaries.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(summaries)
    }

    fn transcript_files(&self) -> Result<Vec<PathBuf>, StoreError> {
        if !self.root.exists() {
            return Ok(Vec::new());
        }
        let mut files = Vec::new();
        for entry in std::fs::read_dir(&self.root)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) == Some("json") {
                files.push(path);
            }
        }
        files.sort();
        Ok(files)
    }

    fn read_file(&self, path: &Path) -> Result<DebateTranscript, StoreError> {
        let raw = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::debate::transcript::{DebateRound, ModelResponse, SYNTHESIS_ROUND};

    fn sample(query: &str) -> DebateTranscript {
        let mut t = DebateTranscript::new(query, vec!["a".into(), "b".into()], "a", 1);
        t.push_round(DebateRound::new(
            0,
            vec![
                ModelResponse::success("a", "a", 0, "alpha", None, 5),
                ModelResponse::success("b", "b", 0, "beta", None, 5),
            ],
        ))
        .unwrap();
        t.set_synthesis(ModelResponse::success(
            "a",
            "a",
            SYNTHESIS_ROUND,
            "final",
            None,
            5,
        ))
        .unwrap();
        t
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = TranscriptStore::new(dir.path());
        let transcript = sample("What?");

        let path = store.save(&transcript).unwrap();
        assert!(path.exists());

        let loaded = store.load(&transcript.id).unwrap();
        assert_eq!(loaded.id, transcript.id);
        assert_eq!(loaded.rounds.len(), 1);
        assert_eq!(loaded.synthesis.unwrap().content, "final");
    }

    #[test]
    fn test_load_by_unique_prefix() {
        let dir = tempfile::tempdir().unwrap();
        let store = TranscriptStore::new(dir.path());
        let transcript = sample("What?");
        store.save(&transcript).unwrap();

        let prefix = &transcript.id[..8];
        let loaded = store.load(prefix).unwrap();
        assert_eq!(loaded.id, transcript.id);
    }

    #[test]
    fn test_missing_transcript_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let store = TranscriptStore::new(dir.path());
        let err = store.load("does-not-exist").unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
    }

    #[test]
    fn test_ambiguous_prefix_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let store = TranscriptStore::new(dir.path());
        store.save(&sample("one")).unwrap();
        store.save(&sample("two")).unwrap();

        // Every uuid here shares the empty prefix; a one-char prefix is
        // very likely ambiguous only if both ids start the same, so use "".
        let err = store.load("").unwrap_err();
        assert!(matches!(err, StoreError::Ambiguous(_, 2)));
    }

    #[test]
    fn test_list_is_newest_first_and_skips_foreign_files() {
        let dir = tempfile::tempdir().unwrap();
        let store = TranscriptStore::new(dir.path());

        let mut older = sample("older");
        older.created_at = chrono::Utc::now() - chrono::Duration::minutes(5);
        store.save(&older).unwrap();
        let newer = sample("newer");
        store.save(&newer).unwrap();
        std::fs::write(dir.path().join("junk.json"), "not a transcript").unwrap();

        let listing = store.list().unwrap();
        assert_eq!(listing.len(), 2);
        assert_eq!(listing[0].query, "newer");
        assert_eq!(listing[1].query, "older");
        assert!(listing[0].has_synthesis);
    }

    #[test]
    fn test_list_on_missing_directory_is_empty() {
        let store = TranscriptStore::new("/nonexistent/dissent-test-store");
        assert!(store.list().unwrap().is_empty());
    }
}
