//! Candidate record persistence

use crate::error::{AtsGateError, Result};
use crate::pipeline::state::CandidateRecord;
use crate::storage::write_json_atomic;
use log::debug;
use parking_lot::{Mutex, RwLock};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

pub trait RecordStore: Send + Sync {
    fn create(&self, record: CandidateRecord) -> Result<()>;
    fn get(&self, candidate_id: &str) -> Result<CandidateRecord>;
    fn update(&self, record: &CandidateRecord) -> Result<()>;
    fn list(&self) -> Result<Vec<CandidateRecord>>;
}

#[derive(Default)]
pub struct InMemoryRecordStore {
    records: RwLock<BTreeMap<String, CandidateRecord>>,
}

impl InMemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl RecordStore for InMemoryRecordStore {
    fn create(&self, record: CandidateRecord) -> Result<()> {
        let mut records = self.records.write();
        if records.contains_key(&record.candidate_id) {
            return Err(AtsGateError::DuplicateRecord(record.candidate_id));
        }
        records.insert(record.candidate_id.clone(), record);
        Ok(())
    }

    fn get(&self, candidate_id: &str) -> Result<CandidateRecord> {
        self.records
            .read()
            .get(candidate_id)
            .cloned()
            .ok_or_else(|| AtsGateError::RecordNotFound(candidate_id.to_string()))
    }

    fn update(&self, record: &CandidateRecord) -> Result<()> {
        let mut records = self.records.write();
        match records.get_mut(&record.candidate_id) {
            Some(existing) => {
                *existing = record.clone();
                Ok(())
            }
            None => Err(AtsGateError::RecordNotFound(record.candidate_id.clone())),
        }
    }

    fn list(&self) -> Result<Vec<CandidateRecord>> {
        Ok(self.records.read().values().cloned().collect())
    }
}

/// All records in one JSON document, rewritten atomically on every change
pub struct JsonFileRecordStore {
    path: PathBuf,
    records: RwLock<BTreeMap<String, CandidateRecord>>,
    writer: Mutex<()>,
}

impl JsonFileRecordStore {
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let records = if path.exists() {
            let content = std::fs::read_to_string(&path)?;
            serde_json::from_str(&content)
                .map_err(|e| AtsGateError::Storage(format!("Corrupt record file {}: {}", path.display(), e)))?
        } else {
            BTreeMap::new()
        };
        Ok(Self {
            path,
            records: RwLock::new(records),
            writer: Mutex::new(()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn write_with<F>(&self, change: F) -> Result<()>
    where
        F: FnOnce(&mut BTreeMap<String, CandidateRecord>) -> Result<()>,
    {
        let _guard = self.writer.lock();
        let mut next = self.records.read().clone();
        change(&mut next)?;
        write_json_atomic(&self.path, &next)?;

        *self.records.write() = next;
        debug!("Saved candidate records to {}", self.path.display());
        Ok(())
    }
}

impl RecordStore for JsonFileRecordStore {
    fn create(&self, record: CandidateRecord) -> Result<()> {
        self.write_with(|records| {
            if records.contains_key(&record.candidate_id) {
                return Err(AtsGateError::DuplicateRecord(record.candidate_id.clone()));
            }
            records.insert(record.candidate_id.clone(), record);
            Ok(())
        })
    }

    fn get(&self, candidate_id: &str) -> Result<CandidateRecord> {
        self.records
            .read()
            .get(candidate_id)
            .cloned()
            .ok_or_else(|| AtsGateError::RecordNotFound(candidate_id.to_string()))
    }

    fn update(&self, record: &CandidateRecord) -> Result<()> {
        self.write_with(|records| match records.get_mut(&record.candidate_id) {
            Some(existing) => {
                *existing = record.clone();
                Ok(())
            }
            None => Err(AtsGateError::RecordNotFound(record.candidate_id.clone())),
        })
    }

    fn list(&self) -> Result<Vec<CandidateRecord>> {
        Ok(self.records.read().values().cloned().collect())
    }
}
