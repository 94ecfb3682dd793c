//! Image lineage: which object was produced from which.
//!
//! Every derived object has at most one relation row pointing at its parent.
//! Reading a lineage walks those parent pointers from the requested object
//! back to its root, bounded by [`MAX_HOPS`].

pub mod stage;
pub mod store;

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use crate::database::models::{ImageRelation, NewRelation};
use crate::database::DatabaseError;
use crate::storage::{validate_path, ObjectStore};

pub use stage::{RelationKind, Stage, UnknownVariant};
pub use store::LineageStore;

/// Parent pointers followed before a walk is cut off
pub const MAX_HOPS: usize = 8;

#[derive(Debug, Error)]
pub enum LineageError {
    #[error("Invalid relation: {0}")]
    InvalidRelation(String),

    #[error(transparent)]
    Database(#[from] DatabaseError),
}

/// One object in a reconstructed chain
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LineageNode {
    pub path: String,
    pub stage: Stage,
    pub url: String,
    /// How this object was derived from the previous node, if it was
    pub relation: Option<RelationKind>,
    pub metadata: Option<Value>,
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Lineage {
    pub path: String,
    /// Root first, requested object last
    pub chain: Vec<LineageNode>,
    /// Direct derivatives of the requested object
    pub children: Vec<LineageNode>,
    /// The walk stopped at the hop limit or on a cycle, not at a root
    pub truncated: bool,
}

impl Lineage {
    pub fn root(&self) -> Option<&LineageNode> {
        self.chain.first()
    }
}

pub struct LineageService {
    store: Arc<dyn LineageStore>,
    storage: Arc<dyn ObjectStore>,
}

impl LineageService {
    pub fn new(store: Arc<dyn LineageStore>, storage: Arc<dyn ObjectStore>) -> Self {
        Self { store, storage }
    }

    /// Record that `child` was produced from `parent`, replacing any earlier parent of `child`
    pub async fn record(
        &self,
        parent: &str,
        child: &str,
        relation: RelationKind,
        metadata: Value,
    ) -> Result<ImageRelation, LineageError> {
        validate_path(parent).map_err(|e| LineageError::InvalidRelation(e.to_string()))?;
        validate_path(child).map_err(|e| LineageError::InvalidRelation(e.to_string()))?;
        if parent == child {
            return Err(LineageError::InvalidRelation(format!(
                "'{}' cannot be its own parent",
                child
            )));
        }

        let row = self
            .store
            .upsert(&NewRelation {
                child_path: child.to_string(),
                parent_path: parent.to_string(),
                relation,
                metadata,
            })
            .await?;

        tracing::info!("Recorded {} relation {} -> {}", relation, parent, child);
        Ok(row)
    }

    pub async fn chain(&self, path: &str) -> Result<Lineage, LineageError> {
        validate_path(path).map_err(|e| LineageError::InvalidRelation(e.to_string()))?;

        let mut seen = HashSet::from([path.to_string()]);
        let mut link = self.store.parent_of(path).await?;
        let mut nodes = vec![self.node(path, link.as_ref())];
        let mut truncated = false;
        let mut hops = 0;

        while let Some(relation) = link {
            if hops == MAX_HOPS {
                truncated = true;
                break;
            }
            let parent = relation.parent_path;
            if !seen.insert(parent.clone()) {
                tracing::warn!("Lineage cycle detected at '{}' while walking '{}'", parent, path);
                truncated = true;
                break;
            }
            hops += 1;

            link = self.store.parent_of(&parent).await?;
            nodes.push(self.node(&parent, link.as_ref()));
        }

        nodes.reverse();

        let children = self
            .store
            .children_of(path)
            .await?
            .iter()
            .map(|row| self.node(&row.child_path, Some(row)))
            .collect();

        Ok(Lineage {
            path: path.to_string(),
            chain: nodes,
            children,
            truncated,
        })
    }

    /// Drop the relations of a deleted object. Derivatives keep their files
    /// and become roots of their own chains.
    pub async fn forget(&self, path: &str) -> Result<u64, LineageError> {
        let removed = self.store.delete_for_path(path).await?;
        if removed > 0 {
            tracing::info!("Removed {} lineage relation(s) for '{}'", removed, path);
        }
        Ok(removed)
    }

    fn node(&self, path: &str, relation: Option<&ImageRelation>) -> LineageNode {
        LineageNode {
            path: path.to_string(),
            stage: relation.map(|r| r.child_stage).unwrap_or_else(|| Stage::of_path(path)),
            url: self.storage.public_url(path),
            relation: relation.map(|r| r.relation),
            metadata: relation.map(|r| r.metadata.clone()),
            created_at: relation.map(|r| r.created_at),
        }
    }
}
