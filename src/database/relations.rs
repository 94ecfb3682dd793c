use async_trait::async_trait;
use sqlx::PgPool;

use crate::database::manager::DatabaseError;
use crate::database::models::{ImageRelation, NewRelation};
use crate::lineage::{LineageStore, Stage};

const RELATION_COLUMNS: &str =
    "id, child_path, parent_path, relation, child_stage, parent_stage, metadata, created_at, updated_at";

pub struct PgLineageStore {
    pool: PgPool,
}

impl PgLineageStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl LineageStore for PgLineageStore {
    async fn upsert(&self, relation: &NewRelation) -> Result<ImageRelation, DatabaseError> {
        let query = format!(
            r#"
            INSERT INTO image_relations
                (child_path, parent_path, relation, child_stage, parent_stage, metadata)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (child_path) DO UPDATE SET
                parent_path = EXCLUDED.parent_path,
                relation = EXCLUDED.relation,
                child_stage = EXCLUDED.child_stage,
                parent_stage = EXCLUDED.parent_stage,
                metadata = EXCLUDED.metadata,
                updated_at = now()
            RETURNING {RELATION_COLUMNS}
            "#
        );

        let row = sqlx::query_as::<_, ImageRelation>(&query)
            .bind(&relation.child_path)
            .bind(&relation.parent_path)
            .bind(relation.relation.as_str())
            .bind(Stage::of_path(&relation.child_path).as_str())
            .bind(Stage::of_path(&relation.parent_path).as_str())
            .bind(&relation.metadata)
            .fetch_one(&self.pool)
            .await?;

        Ok(row)
    }

    async fn parent_of(&self, child_path: &str) -> Result<Option<ImageRelation>, DatabaseError> {
        let query = format!("SELECT {RELATION_COLUMNS} FROM image_relations WHERE child_path = $1");
        let row = sqlx::query_as::<_, ImageRelation>(&query)
            .bind(child_path)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    async fn children_of(&self, parent_path: &str) -> Result<Vec<ImageRelation>, DatabaseError> {
        let query = format!(
            "SELECT {RELATION_COLUMNS} FROM image_relations WHERE parent_path = $1 ORDER BY created_at ASC, id ASC"
        );
        let rows = sqlx::query_as::<_, ImageRelation>(&query)
            .bind(parent_path)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    async fn delete_for_path(&self, path: &str) -> Result<u64, DatabaseError> {
        let result = sqlx::query("DELETE FROM image_relations WHERE child_path = $1 OR parent_path = $1")
            .bind(path)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}
