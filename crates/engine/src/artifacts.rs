//! In-memory artifact registry.
//!
//! Append-only: artifacts are immutable once registered and there is no
//! update or delete. Safe to share between tasks behind an `Arc`.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, PoisonError, RwLock};

use adapters::{Clock, IdFactory, SeededIdFactory, SystemClock};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::debug;

use crate::error::EngineError;
use crate::hashing::hash_value;
use crate::models::RunResult;

pub type ArtifactMetadata = BTreeMap<String, Value>;

/// A named, typed output recorded for later retrieval.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Artifact {
    pub id: String,
    pub metadata: ArtifactMetadata,
    pub payload: Value,
    /// SHA-256 of the canonical payload.
    pub content_hash: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug)]
pub struct ArtifactRegistry {
    ids: Arc<dyn IdFactory>,
    clock: Arc<dyn Clock>,
    store: RwLock<Store>,
}

/// Registration-ordered artifacts plus an id index into them.
#[derive(Debug, Default)]
struct Store {
    ordered: Vec<Arc<Artifact>>,
    by_id: HashMap<String, usize>,
}

impl ArtifactRegistry {
    pub fn new(ids: Arc<dyn IdFactory>, clock: Arc<dyn Clock>) -> Self {
        Self {
            ids,
            clock,
            store: RwLock::new(Store::default()),
        }
    }

    /// Registry with seed-derived IDs (`artifact-<digest>-NNNNNN`) and the
    /// system clock.
    pub fn seeded(seed: &str) -> Self {
        Self::new(
            Arc::new(SeededIdFactory::new(seed, "artifact")),
            Arc::new(SystemClock),
        )
    }

    pub fn register(&self, metadata: ArtifactMetadata, payload: Value) -> Arc<Artifact> {
        let artifact = Arc::new(Artifact {
            id: self.ids.next_id(),
            content_hash: hash_value(&payload),
            metadata,
            payload,
            created_at: self.clock.now(),
        });
        debug!("registered artifact '{}' ({})", artifact.id, artifact.content_hash);

        let mut store = self.store.write().unwrap_or_else(PoisonError::into_inner);
        let index = store.ordered.len();
        store.by_id.insert(artifact.id.clone(), index);
        store.ordered.push(Arc::clone(&artifact));
        artifact
    }

    /// Store a run result, tagged with its identity and hash.
    ///
    /// # Errors
    /// [`EngineError::Serialization`] if the result cannot be converted to JSON.
    pub fn record_run(&self, result: &RunResult) -> Result<Arc<Artifact>, EngineError> {
        let payload = serde_json::to_value(result)?;
        let metadata: ArtifactMetadata = [
            ("type".to_string(), json!("run_result")),
            ("plan_id".to_string(), json!(result.plan_id)),
            ("run_id".to_string(), json!(result.run_id)),
            ("status".to_string(), json!(result.status)),
            ("hash".to_string(), json!(result.hash)),
        ]
        .into_iter()
        .collect();
        Ok(self.register(metadata, payload))
    }

    pub fn get(&self, id: &str) -> Option<Arc<Artifact>> {
        let store = self.store.read().unwrap_or_else(PoisonError::into_inner);
        store.by_id.get(id).map(|&i| Arc::clone(&store.ordered[i]))
    }

    /// Artifacts whose metadata satisfies `predicate`, in registration order.
    pub fn query<P>(&self, predicate: P) -> Vec<Arc<Artifact>>
    where
        P: Fn(&ArtifactMetadata) -> bool,
    {
        self.store
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .ordered
            .iter()
            .filter(|a| predicate(&a.metadata))
            .cloned()
            .collect()
    }

    /// Artifacts whose payload hashes to `content_hash`.
    pub fn find_by_hash(&self, content_hash: &str) -> Vec<Arc<Artifact>> {
        self.store
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .ordered
            .iter()
            .filter(|a| a.content_hash == content_hash)
            .cloned()
            .collect()
    }

    /// Every artifact, in registration order.
    pub fn list(&self) -> Vec<Arc<Artifact>> {
        self.query(|_| true)
    }

    pub fn len(&self) -> usize {
        self.store
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .ordered
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
