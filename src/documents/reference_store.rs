//! Append-only corpus of known-authentic document features
//!
//! Readers share an `RwLock`ed snapshot. Writers are serialized by a separate
//! mutex, persist the next snapshot through a temp file and atomic rename,
//! and only then swap it in.

use crate::documents::classifier::DocumentType;
use crate::documents::features::DocumentFeatures;
use crate::error::{AtsGateError, Result};
use crate::storage::write_json_atomic;
use chrono::{DateTime, Utc};
use log::{debug, info};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferenceEntry {
    pub features: DocumentFeatures,
    pub content_hash: String,
    pub added_at: DateTime<Utc>,
}

pub type ReferenceCorpus = BTreeMap<DocumentType, BTreeMap<String, ReferenceEntry>>;

/// SHA-256 hex digest over text, layout and visual features
pub fn content_hash(features: &DocumentFeatures) -> String {
    let mut hasher = Sha256::new();
    hasher.update(features.text_content.as_bytes());
    for value in features.layout_embedding.iter().chain(features.visual_features.iter()) {
        hasher.update(value.to_le_bytes());
    }
    format!("{:x}", hasher.finalize())
}

pub struct ReferenceStore {
    path: Option<PathBuf>,
    snapshot: RwLock<Arc<ReferenceCorpus>>,
    writer: Mutex<()>,
}

impl ReferenceStore {
    pub fn in_memory() -> Self {
        Self {
            path: None,
            snapshot: RwLock::new(Arc::new(ReferenceCorpus::new())),
            writer: Mutex::new(()),
        }
    }

    /// Open a persisted store; a missing file is an empty corpus.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let corpus = if path.exists() {
            let content = std::fs::read_to_string(&path)?;
            serde_json::from_str(&content)
                .map_err(|e| AtsGateError::Storage(format!("Corrupt reference store {}: {}", path.display(), e)))?
        } else {
            ReferenceCorpus::new()
        };

        let store = Self {
            path: Some(path),
            snapshot: RwLock::new(Arc::new(corpus)),
            writer: Mutex::new(()),
        };
        info!("Opened reference store with {} references", store.len());
        Ok(store)
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Consistent view of the corpus; never observes a partial registration.
    pub fn snapshot(&self) -> Arc<ReferenceCorpus> {
        Arc::clone(&self.snapshot.read())
    }

    pub fn references(&self, doc_type: DocumentType) -> Vec<(String, ReferenceEntry)> {
        self.snapshot()
            .get(&doc_type)
            .map(|entries| entries.iter().map(|(id, e)| (id.clone(), e.clone())).collect())
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.snapshot().values().map(BTreeMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Register `features` under its document type. Ids are unique per type
    /// and entries are never replaced.
    pub fn add(&self, reference_id: &str, features: DocumentFeatures) -> Result<ReferenceEntry> {
        if reference_id.trim().is_empty() {
            return Err(AtsGateError::InvalidInput("Reference id must not be empty".to_string()));
        }

        let _guard = self.writer.lock();
        let current = self.snapshot();
        let doc_type = features.document_type;

        if current
            .get(&doc_type)
            .map(|entries| entries.contains_key(reference_id))
            .unwrap_or(false)
        {
            return Err(AtsGateError::DuplicateReference(format!("{}/{}", doc_type, reference_id)));
        }

        let entry = ReferenceEntry {
            content_hash: content_hash(&features),
            features,
            added_at: Utc::now(),
        };

        let mut next = (*current).clone();
        next.entry(doc_type)
            .or_default()
            .insert(reference_id.to_string(), entry.clone());

        if let Some(path) = &self.path {
            write_json_atomic(path, &next)?;
            debug!("Persisted reference store to {}", path.display());
        }
        *self.snapshot.write() = Arc::new(next);

        info!("Registered reference {} for type {}", reference_id, doc_type);
        Ok(entry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::documents::features::{DocumentMetadata, VISUAL_FEATURES_LEN};
    use tempfile::TempDir;

    fn features(text: &str, doc_type: DocumentType) -> DocumentFeatures {
        DocumentFeatures {
            text_content: text.to_string(),
            layout_embedding: vec![0.5, 0.5],
            visual_features: vec![0.1; VISUAL_FEATURES_LEN],
            ocr_confidence: 0.9,
            document_type: doc_type,
            classified_type: doc_type,
            declared_type: None,
            metadata: DocumentMetadata {
                source: None,
                processed_at: Utc::now(),
                text_length: text.len(),
                layout_elements: 1,
                width: 10,
                height: 10,
            },
            alerts: Vec::new(),
        }
    }

    #[test]
    fn test_add_and_lookup() {
        let store = ReferenceStore::in_memory();
        let entry = store.add("ref-1", features("carte nationale", DocumentType::Cin)).unwrap();

        assert_eq!(entry.content_hash.len(), 64);
        assert_eq!(store.len(), 1);
        assert_eq!(store.references(DocumentType::Cin).len(), 1);
        assert!(store.references(DocumentType::Bac).is_empty());
    }

    #[test]
    fn test_duplicate_id_rejected() {
        let store = ReferenceStore::in_memory();
        store.add("ref-1", features("carte nationale", DocumentType::Cin)).unwrap();
        let result = store.add("ref-1", features("another card", DocumentType::Cin));
        assert!(matches!(result, Err(AtsGateError::DuplicateReference(_))));

        // same id under another type is a different reference
        assert!(store.add("ref-1", features("permis", DocumentType::Permis)).is_ok());
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_hash_depends_on_content() {
        let a = features("carte nationale", DocumentType::Cin);
        let b = features("carte nationale.", DocumentType::Cin);
        assert_eq!(content_hash(&a), content_hash(&a.clone()));
        assert_ne!(content_hash(&a), content_hash(&b));
    }

    #[test]
    fn test_persistence_round_trip() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("refs").join("references.json");

        let store = ReferenceStore::open(&path).unwrap();
        assert!(store.is_empty());
        store.add("ref-1", features("licence en informatique", DocumentType::Licence)).unwrap();
        assert!(path.exists());

        let reopened = ReferenceStore::open(&path).unwrap();
        let refs = reopened.references(DocumentType::Licence);
        assert_eq!(refs.len(), 1);
        assert_eq!(refs[0].0, "ref-1");
        assert_eq!(refs[0].1.features.text_content, "licence en informatique");
    }

    #[test]
    fn test_snapshot_is_stable_across_writes() {
        let store = ReferenceStore::in_memory();
        let before = store.snapshot();
        store.add("ref-1", features("master", DocumentType::Master)).unwrap();
        assert!(before.is_empty());
        assert_eq!(store.snapshot().len(), 1);
    }

    #[test]
    fn test_concurrent_registrations() {
        let store = Arc::new(ReferenceStore::in_memory());
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let store = Arc::clone(&store);
                std::thread::spawn(move || store.add(&format!("ref-{}", i), features("bac", DocumentType::Bac)))
            })
            .collect();
        for handle in handles {
            handle.join().unwrap().unwrap();
        }
        assert_eq!(store.references(DocumentType::Bac).len(), 8);
    }
}
