//! JSON plans: an ordered list of engine operations applied one after the
//! other. The first failing step aborts the plan.
//!
//! ```json
//! { "steps": [
//!     { "op": "reproject", "relation": "commune", "srid": 2154 },
//!     { "op": "intersect", "a": "commune", "b": "troncon", "fields_b": ["nature"] },
//!     { "op": "drop", "kind": "view", "names": ["troncon_tmp"] }
//! ] }
//! ```

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{error, info, instrument};

use geoproc_core::{DissolveOptions, IntersectOptions, RelationKind, SpatialProcessor};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Step {
    Reproject {
        relation: String,
        srid: i32,
    },
    #[serde(rename = "flatten_to_2d")]
    FlattenTo2d {
        relation: String,
        srid: i32,
    },
    SinglepartToMultipart {
        relation: String,
    },
    Intersect {
        a: String,
        b: String,
        #[serde(flatten)]
        options: IntersectOptions,
    },
    Dissolve {
        a: String,
        b: String,
        out_name: String,
        #[serde(flatten)]
        options: DissolveOptions,
    },
    Drop {
        /// `table` or `view`, checked when the step runs.
        kind: String,
        names: Vec<String>,
    },
    CreateIndex {
        relation: String,
    },
}

impl Step {
    pub fn op(&self) -> &'static str {
        match self {
            Step::Reproject { .. } => "reproject",
            Step::FlattenTo2d { .. } => "flatten_to_2d",
            Step::SinglepartToMultipart { .. } => "singlepart_to_multipart",
            Step::Intersect { .. } => "intersect",
            Step::Dissolve { .. } => "dissolve",
            Step::Drop { .. } => "drop",
            Step::CreateIndex { .. } => "create_index",
        }
    }

    pub async fn apply(&self, processor: &SpatialProcessor) -> geoproc_core::Result<()> {
        match self {
            Step::Reproject { relation, srid } => processor.reproject(relation, *srid).await,
            Step::FlattenTo2d { relation, srid } => processor.flatten_to_2d(relation, *srid).await,
            Step::SinglepartToMultipart { relation } => {
                processor.singlepart_to_multipart(relation).await
            }
            Step::Intersect { a, b, options } => processor.intersect(a, b, options).await,
            Step::Dissolve {
                a,
                b,
                out_name,
                options,
            } => processor.dissolve(a, b, out_name, options).await,
            Step::Drop { kind, names } => {
                let kind = kind.parse::<RelationKind>()?;
                processor.drop_relations(kind, names.as_slice()).await
            }
            Step::CreateIndex { relation } => processor.create_spatial_index(relation).await,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Plan {
    pub steps: Vec<Step>,
}

impl Plan {
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("failed to read plan {}", path.display()))?;
        serde_json::from_str(&raw).with_context(|| format!("invalid plan {}", path.display()))
    }

    #[instrument(skip_all, fields(steps = self.steps.len()))]
    pub async fn run(&self, processor: &SpatialProcessor) -> Result<()> {
        for (index, step) in self.steps.iter().enumerate() {
            let op = step.op();
            if let Err(err) = step.apply(processor).await {
                error!(step = index + 1, op, error = %err, "plan aborted");
                return Err(err).with_context(|| format!("step {} ({op}) failed", index + 1));
            }
            info!(step = index + 1, op, "step applied");
        }
        Ok(())
    }
}
