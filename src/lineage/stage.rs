use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Where an object sits in the image pipeline, derived from its top-level folder
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Stage {
    Original,
    Gallery,
    N8nCompatible,
    N8nGenerated,
    Optimized,
}

impl Stage {
    pub const ALL: [Stage; 5] = [
        Stage::Original,
        Stage::Gallery,
        Stage::N8nCompatible,
        Stage::N8nGenerated,
        Stage::Optimized,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Stage::Original => "original",
            Stage::Gallery => "gallery",
            Stage::N8nCompatible => "n8n-compatible",
            Stage::N8nGenerated => "n8n-generated",
            Stage::Optimized => "optimized",
        }
    }

    /// Storage folder for objects at this stage
    pub fn prefix(self) -> &'static str {
        match self {
            Stage::Original => "uploads/",
            Stage::Gallery => "gallery/",
            Stage::N8nCompatible => "n8n-compatible/",
            Stage::N8nGenerated => "n8n-generated/",
            Stage::Optimized => "optimized/",
        }
    }

    /// Objects outside the known folders count as originals
    pub fn of_path(path: &str) -> Stage {
        Stage::ALL
            .into_iter()
            .find(|stage| path.starts_with(stage.prefix()))
            .unwrap_or(Stage::Original)
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a child object was produced from its parent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RelationKind {
    Upload,
    N8nConversion,
    N8nGeneration,
    Optimization,
}

impl RelationKind {
    pub const ALL: [RelationKind; 4] = [
        RelationKind::Upload,
        RelationKind::N8nConversion,
        RelationKind::N8nGeneration,
        RelationKind::Optimization,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            RelationKind::Upload => "upload",
            RelationKind::N8nConversion => "n8n-conversion",
            RelationKind::N8nGeneration => "n8n-generation",
            RelationKind::Optimization => "optimization",
        }
    }
}

impl fmt::Display for RelationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown value '{0}'")]
pub struct UnknownVariant(pub String);

impl FromStr for Stage {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Stage::ALL
            .into_iter()
            .find(|stage| stage.as_str() == s)
            .ok_or_else(|| UnknownVariant(s.to_string()))
    }
}

impl FromStr for RelationKind {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        RelationKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| UnknownVariant(s.to_string()))
    }
}
