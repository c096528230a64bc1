//! Dump and restore raw API payloads.
//!
//! A snapshot stores the memberlist and customlists bodies exactly as the API
//! returned them, so a later run can replay them offline through the same
//! decoding and validation path as live responses.

use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::client::{decode_customlists, decode_member_envelope};
use crate::error::{ApiError, Result};
use crate::types::ListSummary;
use crate::validate::{BatchOutcome, RecordValidator};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub memberlist: Value,
    pub customlists: Value,
}

impl Snapshot {
    pub fn new(memberlist: Value, customlists: Value) -> Self {
        Self {
            memberlist,
            customlists,
        }
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let mut writer = BufWriter::new(File::create(path)?);
        serde_json::to_writer(&mut writer, self)
            .map_err(|e| ApiError::SerializationError(e.to_string()))?;
        writer.flush()?;
        tracing::info!(path = %path.display(), "Saved snapshot");
        Ok(())
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let reader = BufReader::new(File::open(path)?);
        let snapshot = serde_json::from_reader(reader)
            .map_err(|e| ApiError::DeserializationError(e.to_string()))?;
        tracing::info!(path = %path.display(), "Restored snapshot");
        Ok(snapshot)
    }

    /// Decode and validate the stored memberlist.
    pub fn members(&self, validator: &RecordValidator) -> Result<BatchOutcome> {
        let records = decode_member_envelope(&self.memberlist)?;
        Ok(validator.validate_batch(&records))
    }

    pub fn list_summaries(&self) -> Result<Vec<ListSummary>> {
        decode_customlists(&self.customlists)
    }
}
