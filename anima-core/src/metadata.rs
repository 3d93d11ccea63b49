//! Metadata Log — append-only side table mapping ordinal → source record.
//!
//! Backed by one JSON object per line (`<index>_meta.jsonl`).  A record's
//! ordinal is its position in the in-memory sequence and is stamped into
//! the record as `vector_id` before it is stored.

use std::fs::{self, File};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{AnimaError, Result};
use crate::types::{FactDimension, FactOrigin, Ordinal, SourceType};

// ---------------------------------------------------------------------------
// Record
// ---------------------------------------------------------------------------

/// One metadata line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetadataRecord {
    /// Position in the log; equal to the vector ordinal.
    #[serde(default)]
    pub vector_id: Ordinal,
    /// Kind of record this line points at.
    pub source_type: SourceType,
    /// Id of the source document.
    pub source_id: String,
    /// Owning NPC, if any.
    #[serde(default)]
    pub npc_id: Option<String>,
    /// Importance in \[0, 1\].
    pub importance: f32,
    /// Creation timestamp.
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    /// Truncated text used for prompts and debugging.
    pub summary: String,
    /// Persona / world chunk label (`traits`, `law`, ...).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chunk_type: Option<String>,
    /// Owning persona of a persona fact.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub persona_id: Option<String>,
    /// Persona fact dimension.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dimension: Option<FactDimension>,
    /// Full persona fact content.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    /// Where a persona fact came from.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub origin: Option<FactOrigin>,
}

impl MetadataRecord {
    /// A bare record with only the common fields set.
    #[must_use]
    pub fn new(
        source_type: SourceType,
        source_id: impl Into<String>,
        npc_id: Option<String>,
        importance: f32,
        summary: impl Into<String>,
    ) -> Self {
        Self {
            vector_id: 0,
            source_type,
            source_id: source_id.into(),
            npc_id,
            importance,
            created_at: Utc::now(),
            summary: summary.into(),
            chunk_type: None,
            persona_id: None,
            dimension: None,
            content: None,
            origin: None,
        }
    }

    /// Whether a reader restricted to `npc_id` may see this record.
    ///
    /// Persona and world chunks are shared; persona facts are visible when
    /// unowned or owned by `npc_id`; episodic memories only to their owner.
    #[must_use]
    pub fn visible_to(&self, npc_id: &str) -> bool {
        match self.source_type {
            SourceType::Persona | SourceType::World => true,
            SourceType::PersonaFact => self.npc_id.as_deref().is_none_or(|owner| owner == npc_id),
            SourceType::Episodic => self.npc_id.as_deref() == Some(npc_id),
        }
    }
}

/// Truncate `s` to at most `max` characters on a char boundary.
#[must_use]
pub fn truncate_chars(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

// ---------------------------------------------------------------------------
// Log
// ---------------------------------------------------------------------------

/// File-backed, append-only metadata sequence for one index.
#[derive(Debug)]
pub struct MetadataLog {
    name: String,
    path: PathBuf,
    records: Vec<MetadataRecord>,
}

impl MetadataLog {
    /// Bind a log named `name` under `dir`.  Nothing is read yet.
    #[must_use]
    pub fn new(name: &str, dir: &Path) -> Self {
        Self {
            name: name.to_string(),
            path: dir.join(format!("{name}_meta.jsonl")),
            records: Vec::new(),
        }
    }

    /// Backing file path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Replace the in-memory sequence with the file contents.
    ///
    /// A missing file loads as empty.  Blank lines are skipped; ordinals
    /// are re-stamped from position.
    ///
    /// # Errors
    ///
    /// Returns [`AnimaError::Serialization`] naming the first malformed line.
    pub fn load(&mut self) -> Result<usize> {
        self.records.clear();
        if !self.path.is_file() {
            return Ok(0);
        }
        let reader = BufReader::new(File::open(&self.path)?);
        for (lineno, line) in reader.lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let mut record: MetadataRecord = serde_json::from_str(&line).map_err(|e| {
                AnimaError::Serialization(format!(
                    "{}:{}: {e}",
                    self.path.display(),
                    lineno + 1
                ))
            })?;
            record.vector_id = self.records.len();
            self.records.push(record);
        }
        info!(log = %self.name, records = self.records.len(), "loaded metadata log");
        Ok(self.records.len())
    }

    /// Append a record, stamping and returning its ordinal.
    pub fn add(&mut self, mut record: MetadataRecord) -> Ordinal {
        let ordinal = self.records.len();
        record.vector_id = ordinal;
        self.records.push(record);
        ordinal
    }

    /// Bounds-checked lookup.
    #[must_use]
    pub fn get(&self, ordinal: Ordinal) -> Option<&MetadataRecord> {
        self.records.get(ordinal)
    }

    /// Every record in ordinal order.
    #[must_use]
    pub fn get_all(&self) -> &[MetadataRecord] {
        &self.records
    }

    /// All records pointing at one source document.
    #[must_use]
    pub fn get_by_source(&self, source_type: SourceType, source_id: &str) -> Vec<&MetadataRecord> {
        self.records
            .iter()
            .filter(|r| r.source_type == source_type && r.source_id == source_id)
            .collect()
    }

    /// Number of records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the log is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Drop every record at or past ordinal `len`.
    pub fn truncate(&mut self, len: usize) {
        self.records.truncate(len);
    }

    /// Empty the in-memory sequence.  The file is untouched until `save`.
    pub fn clear(&mut self) {
        self.records.clear();
    }

    /// Overwrite the backing file with the in-memory sequence.
    ///
    /// # Errors
    ///
    /// Returns an I/O or serialization error.
    pub fn save(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let tmp = self.path.with_extension("jsonl.tmp");
        {
            let mut writer = BufWriter::new(File::create(&tmp)?);
            for record in &self.records {
                serde_json::to_writer(&mut writer, record)?;
                writer.write_all(b"\n")?;
            }
            writer.flush()?;
        }
        fs::rename(&tmp, &self.path)?;
        debug!(log = %self.name, records = self.records.len(), "saved metadata log");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn episodic(id: &str, npc: &str) -> MetadataRecord {
        MetadataRecord::new(SourceType::Episodic, id, Some(npc.to_string()), 0.8, "x")
    }

    #[test]
    fn add_stamps_position() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut log = MetadataLog::new("episodic", dir.path());
        let mut rec = episodic("mem_1", "npc_1");
        rec.vector_id = 99;
        assert_eq!(log.add(rec), 0);
        assert_eq!(log.add(episodic("mem_2", "npc_1")), 1);
        assert_eq!(log.get(1).map(|r| r.vector_id), Some(1));
        assert_eq!(log.get(0).map(|r| r.vector_id), Some(0));
    }

    #[test]
    fn get_out_of_range_is_none() {
        let dir = tempfile::tempdir().expect("tempdir");
        let log = MetadataLog::new("episodic", dir.path());
        assert!(log.get(0).is_none());
        assert!(log.get(usize::MAX).is_none());
    }

    #[test]
    fn clear_does_not_touch_file_until_save() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut log = MetadataLog::new("world", dir.path());
        log.add(MetadataRecord::new(SourceType::World, "w1", None, 1.0, "Law: no magic"));
        log.save().expect("save");

        log.clear();
        assert!(log.is_empty());
        let mut reread = MetadataLog::new("world", dir.path());
        assert_eq!(reread.load().expect("load"), 1);

        log.save().expect("save");
        assert_eq!(reread.load().expect("load"), 0);
    }

    #[test]
    fn load_skips_blank_lines_and_restamps() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("persona_meta.jsonl");
        let line = r#"{"vector_id":7,"source_type":"persona","source_id":"p1","importance":1.0,"summary":"Background: old"}"#;
        std::fs::write(&path, format!("{line}\n\n{line}\n")).expect("write");

        let mut log = MetadataLog::new("persona", dir.path());
        assert_eq!(log.load().expect("load"), 2);
        assert_eq!(log.get(0).map(|r| r.vector_id), Some(0));
        assert_eq!(log.get(1).map(|r| r.vector_id), Some(1));
        assert_eq!(log.get(0).and_then(|r| r.npc_id.clone()), None);
    }

    #[test]
    fn malformed_line_names_position() {
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::write(dir.path().join("world_meta.jsonl"), "{not json}\n").expect("write");
        let mut log = MetadataLog::new("world", dir.path());
        let err = log.load().expect_err("malformed");
        assert!(err.to_string().contains(":1:"));
    }

    #[test]
    fn visibility_rules() {
        let mine = episodic("m1", "npc_a");
        let theirs = episodic("m2", "npc_b");
        let shared_fact = MetadataRecord::new(SourceType::PersonaFact, "f1", None, 1.0, "brave");
        let owned_fact =
            MetadataRecord::new(SourceType::PersonaFact, "f2", Some("npc_b".into()), 1.0, "x");
        let world = MetadataRecord::new(SourceType::World, "w", None, 1.0, "Law");
        assert!(mine.visible_to("npc_a"));
        assert!(!theirs.visible_to("npc_a"));
        assert!(shared_fact.visible_to("npc_a"));
        assert!(!owned_fact.visible_to("npc_a"));
        assert!(world.visible_to("npc_a"));
    }

    #[test]
    fn truncate_respects_char_boundaries() {
        assert_eq!(truncate_chars("héllo", 2), "hé");
        assert_eq!(truncate_chars("abc", 10), "abc");
    }
}
