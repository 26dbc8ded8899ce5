//! Relation lifecycle: cascading drops, spatial indexes and the two-phase
//! replacement of a relation by a staged one.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, instrument, warn};

use crate::{
    error::{ProcessorError, Result},
    journal::{JournalAction, JournalEntry},
    SpatialProcessor,
};

/// Suffix of the relation an in-place operation stages its result under.
pub const STAGING_SUFFIX: &str = "_tmp";

/// Drops `target` and renames the staged relation in its place. Sent as a
/// single multi-statement round-trip.
const COMMIT_REPLACEMENT: &str = r#"
DROP TABLE {0}."{2}";

ALTER {3} {0}."{1}"
  RENAME TO "{2}";
"#;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RelationKind {
    Table,
    View,
}

impl RelationKind {
    pub fn from_view_flag(as_view: bool) -> Self {
        if as_view {
            RelationKind::View
        } else {
            RelationKind::Table
        }
    }

    pub fn as_sql(&self) -> &'static str {
        match self {
            RelationKind::Table => "TABLE",
            RelationKind::View => "VIEW",
        }
    }
}

impl fmt::Display for RelationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_sql())
    }
}

impl FromStr for RelationKind {
    type Err = ProcessorError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_uppercase().as_str() {
            "TABLE" => Ok(RelationKind::Table),
            "VIEW" => Ok(RelationKind::View),
            _ => Err(ProcessorError::InvalidRelationKind(s.to_owned())),
        }
    }
}

/// Name of the GiST index built on a relation's geometry column.
pub fn spatial_index_name(relation: &str) -> String {
    format!("{relation}_geom_idx")
}

/// A relation created under a temporary name, waiting to replace `target`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedRelation {
    pub staged: String,
    pub target: String,
    pub kind: RelationKind,
}

impl SpatialProcessor {
    /// Drops each relation with `CASCADE`, in order. The first failure is
    /// logged and returned; the remaining names are left untouched.
    #[instrument(skip(self, names))]
    pub async fn drop_relations<S: AsRef<str>>(&self, kind: RelationKind, names: &[S]) -> Result<()> {
        for name in names {
            let name = name.as_ref();
            if let Err(err) = self
                .run_template("drop_relation", &[self.schema(), kind.as_sql().into(), name.into()])
                .await
            {
                error!(relation = name, %kind, error = %err, "failed to drop relation");
                return Err(ProcessorError::RelationDrop {
                    name: name.to_owned(),
                    source: Box::new(err),
                });
            }

            info!(relation = name, %kind, "relation dropped");
            self.record(JournalEntry::new(name, JournalAction::Dropped { kind }))
                .await;
        }
        Ok(())
    }

    /// Builds a GiST index named `<relation>_geom_idx`. No existence check is
    /// made: a second call fails in the engine.
    #[instrument(skip(self))]
    pub async fn create_spatial_index(&self, relation: &str) -> Result<()> {
        self.run_template("create_spatial_index", &[self.schema(), relation.into()])
            .await?;

        let index = spatial_index_name(relation);
        info!(relation, index = %index, "spatial index built");
        self.record(JournalEntry::new(relation, JournalAction::Indexed { index }))
            .await;
        Ok(())
    }

    /// Reserves the staging name for a replacement of `target`. Nothing is
    /// sent to the engine.
    pub fn stage_replacement(&self, target: &str, kind: RelationKind) -> StagedRelation {
        StagedRelation {
            staged: format!("{target}{STAGING_SUFFIX}"),
            target: target.to_owned(),
            kind,
        }
    }

    /// Second phase: drops the target and renames the staged relation to it.
    #[instrument(skip(self))]
    pub async fn commit_replacement(&self, staged: &StagedRelation) -> Result<()> {
        if staged.kind == RelationKind::View {
            return Err(ProcessorError::InvalidOperation(format!(
                "view '{}' cannot replace '{}' it reads from",
                staged.staged, staged.target
            )));
        }

        self.executor()
            .run_literal(
                COMMIT_REPLACEMENT,
                &[
                    self.schema(),
                    (&staged.staged).into(),
                    (&staged.target).into(),
                    staged.kind.as_sql().into(),
                ],
            )
            .await
            .map_err(|err| {
                warn!(
                    staged = %staged.staged,
                    target = %staged.target,
                    error = %err,
                    "replacement not committed; staged relation left in place"
                );
                err
            })?;

        info!(staged = %staged.staged, target = %staged.target, "relation replaced");
        self.record(JournalEntry::new(
            &staged.target,
            JournalAction::Replaced {
                staged: staged.staged.clone(),
            },
        ))
        .await;
        Ok(())
    }

    /// Discards a staged relation without touching its target.
    pub async fn abandon_replacement(&self, staged: StagedRelation) -> Result<()> {
        self.drop_relations(staged.kind, &[staged.staged]).await
    }

    /// Staged relations whose replacement was neither committed nor
    /// abandoned, according to the journal, and that still exist. Each one
    /// can be handed to [`Self::commit_replacement`] or
    /// [`Self::abandon_replacement`].
    #[instrument(skip(self))]
    pub async fn unresolved_replacements(&self) -> Result<Vec<StagedRelation>> {
        let journal = self.journal().ok_or_else(|| {
            ProcessorError::Configuration(
                "unresolved replacements are read from the operation journal, which is disabled"
                    .into(),
            )
        })?;
        let open = journal
            .open_replacements()
            .await
            .map_err(ProcessorError::Journal)?;

        let mut unresolved = Vec::with_capacity(open.len());
        for staged in open {
            if self.relation_exists(&staged.staged).await? {
                unresolved.push(staged);
            } else {
                debug!(staged = %staged.staged, "staged relation no longer exists");
            }
        }
        Ok(unresolved)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_parsing_is_case_insensitive() {
        assert_eq!("table".parse::<RelationKind>().unwrap(), RelationKind::Table);
        assert_eq!("VIEW".parse::<RelationKind>().unwrap(), RelationKind::View);
        let err = "INDEX".parse::<RelationKind>().unwrap_err();
        assert!(matches!(err, ProcessorError::InvalidRelationKind(kind) if kind == "INDEX"));
    }

    #[test]
    fn index_and_staging_names() {
        assert_eq!(spatial_index_name("b"), "b_geom_idx");
        assert_eq!(RelationKind::from_view_flag(true).as_sql(), "VIEW");
        assert_eq!(RelationKind::from_view_flag(false).to_string(), "TABLE");
    }
}
