use async_trait::async_trait;

use crate::database::models::{ImageRelation, NewRelation};
use crate::database::DatabaseError;

/// Relation table behind the lineage service. One row per child path.
#[async_trait]
pub trait LineageStore: Send + Sync {
    /// Insert or replace the relation that produced `relation.child_path`
    async fn upsert(&self, relation: &NewRelation) -> Result<ImageRelation, DatabaseError>;

    async fn parent_of(&self, child_path: &str) -> Result<Option<ImageRelation>, DatabaseError>;

    async fn children_of(&self, parent_path: &str) -> Result<Vec<ImageRelation>, DatabaseError>;

    /// Remove every row the path takes part in, as child or parent
    async fn delete_for_path(&self, path: &str) -> Result<u64, DatabaseError>;
}
