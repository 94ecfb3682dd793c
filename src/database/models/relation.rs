use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::{postgres::PgRow, FromRow, Row};

use crate::lineage::{RelationKind, Stage};

/// One parent → child hop of an image's history, keyed by the child path
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ImageRelation {
    pub id: i64,
    pub child_path: String,
    pub parent_path: String,
    pub relation: RelationKind,
    pub child_stage: Stage,
    pub parent_stage: Stage,
    pub metadata: Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewRelation {
    pub child_path: String,
    pub parent_path: String,
    pub relation: RelationKind,
    pub metadata: Value,
}

fn decode_column<T, E>(column: &str, value: Result<T, E>) -> Result<T, sqlx::Error>
where
    E: std::error::Error + Send + Sync + 'static,
{
    value.map_err(|e| sqlx::Error::ColumnDecode {
        index: column.to_string(),
        source: Box::new(e),
    })
}

impl<'r> FromRow<'r, PgRow> for ImageRelation {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        let relation: String = row.try_get("relation")?;
        let child_stage: String = row.try_get("child_stage")?;
        let parent_stage: String = row.try_get("parent_stage")?;

        Ok(Self {
            id: row.try_get("id")?,
            child_path: row.try_get("child_path")?,
            parent_path: row.try_get("parent_path")?,
            relation: decode_column("relation", relation.parse())?,
            child_stage: decode_column("child_stage", child_stage.parse())?,
            parent_stage: decode_column("parent_stage", parent_stage.parse())?,
            metadata: row.try_get("metadata")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}
