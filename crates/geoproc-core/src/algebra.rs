//! Geometric operations over named relations.
//!
//! Every operation validates its preconditions through the inspector before
//! the first mutating statement is sent. Multi-step operations are not
//! atomic: a failure after the create step leaves the created relation in
//! place (see [`SpatialProcessor::relation_exists`]).

use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use crate::{
    error::{ProcessorError, Result},
    executor::Param,
    geometry::GeometryKind,
    journal::{JournalAction, JournalEntry},
    lifecycle::RelationKind,
    SpatialProcessor,
};

/// Output column names the intersection always produces.
const RESERVED_COLUMNS: [&str; 2] = ["id", "geometry"];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IntersectOptions {
    /// Attributes of the first relation carried into the result.
    pub fields_a: Vec<String>,
    /// Attributes of the second relation carried into the result.
    pub fields_b: Vec<String>,
    pub as_view: bool,
    /// Name of the relation to create. When unset the second relation is
    /// replaced in place.
    pub out_name: Option<String>,
    pub build_index: bool,
}

impl Default for IntersectOptions {
    fn default() -> Self {
        Self {
            fields_a: Vec::new(),
            fields_b: Vec::new(),
            as_view: false,
            out_name: None,
            build_index: true,
        }
    }
}

impl IntersectOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fields_a<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fields_a = fields.into_iter().map(Into::into).collect();
        self
    }

    pub fn fields_b<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fields_b = fields.into_iter().map(Into::into).collect();
        self
    }

    pub fn as_view(mut self, as_view: bool) -> Self {
        self.as_view = as_view;
        self
    }

    pub fn out_name(mut self, name: impl Into<String>) -> Self {
        self.out_name = Some(name.into());
        self
    }

    pub fn build_index(mut self, build_index: bool) -> Self {
        self.build_index = build_index;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DissolveOptions {
    pub as_view: bool,
    pub build_index: bool,
    /// DBSCAN `eps`: geometries closer than this end up in one feature.
    /// Zero merges touching or overlapping geometries only.
    pub cluster_tolerance: f64,
}

impl Default for DissolveOptions {
    fn default() -> Self {
        Self {
            as_view: false,
            build_index: true,
            cluster_tolerance: 0.0,
        }
    }
}

impl SpatialProcessor {
    /// Reprojects `relation` into `srid`, keeping its (possibly multipart)
    /// geometry type.
    #[instrument(skip(self))]
    pub async fn reproject(&self, relation: &str, srid: i32) -> Result<()> {
        let geometry_type = self.map_geometry_type(relation, true).await?;
        self.run_template(
            "alter_geometry_srid",
            &[
                self.schema(),
                relation.into(),
                (&geometry_type).into(),
                srid.into(),
            ],
        )
        .await?;

        info!(relation, geometry_type = %geometry_type, srid, "relation reprojected");
        self.record(JournalEntry::new(
            relation,
            JournalAction::Reprojected {
                geometry_type,
                srid,
            },
        ))
        .await;
        Ok(())
    }

    /// Drops the third ordinate of every geometry. The column is swapped for
    /// a 2D one of the same type at `srid`.
    #[instrument(skip(self))]
    pub async fn flatten_to_2d(&self, relation: &str, srid: i32) -> Result<()> {
        let geometry_type = self.map_geometry_type(relation, true).await?;
        self.run_template(
            "alter_geometry_force_2d",
            &[
                self.schema(),
                relation.into(),
                (&geometry_type).into(),
                srid.into(),
            ],
        )
        .await?;

        info!(relation, geometry_type = %geometry_type, srid, "relation flattened to 2D");
        self.record(JournalEntry::new(
            relation,
            JournalAction::Flattened {
                geometry_type,
                srid,
            },
        ))
        .await;
        Ok(())
    }

    /// Rewrites every geometry to its multipart form. Idempotent.
    #[instrument(skip(self))]
    pub async fn singlepart_to_multipart(&self, relation: &str) -> Result<()> {
        let srid = self.srid(relation).await?;
        self.run_template(
            "singlepart_to_multipart",
            &[self.schema(), relation.into(), srid.into()],
        )
        .await?;

        info!(relation, srid, "relation converted to multipart");
        self.record(JournalEntry::new(relation, JournalAction::MadeMultipart { srid }))
            .await;
        Ok(())
    }

    /// Intersects every pair of intersecting geometries of `relation_a` and
    /// `relation_b`, keeping the parts whose dimension matches the geometry
    /// kind of `relation_b`.
    ///
    /// The result is named `options.out_name`; without one it is staged as
    /// `<relation_b>_tmp` and then replaces `relation_b`.
    #[instrument(skip(self, options))]
    pub async fn intersect(
        &self,
        relation_a: &str,
        relation_b: &str,
        options: &IntersectOptions,
    ) -> Result<()> {
        let srid = self.shared_srid(relation_a, relation_b).await?;

        let kind = RelationKind::from_view_flag(options.as_view);
        let (created, staged) = match &options.out_name {
            Some(name) => (name.clone(), None),
            None if kind == RelationKind::View => {
                return Err(ProcessorError::InvalidOperation(format!(
                    "a view cannot replace '{relation_b}' in place; provide an output name"
                )))
            }
            None => {
                let staged = self.stage_replacement(relation_b, kind);
                (staged.staged.clone(), Some(staged))
            }
        };

        let geometry_type = self.map_geometry_type(relation_b, false).await?;
        let dimension = geometry_type.parse::<GeometryKind>()?.dimension();

        self.run_template(
            "create_intersection_geometries",
            &[
                self.schema(),
                kind.as_sql().into(),
                (&created).into(),
                projected_fields(&options.fields_a, &options.fields_b).into(),
                relation_a.into(),
                relation_b.into(),
                dimension.into(),
            ],
        )
        .await?;

        info!(relation = %created, %kind, dimension, "intersection created");
        let action = match &staged {
            Some(staged) => JournalAction::Staged {
                target: staged.target.clone(),
                kind,
            },
            None => JournalAction::Created { kind, srid },
        };
        self.record(JournalEntry::new(&created, action)).await;

        let target = match staged {
            Some(staged) => {
                self.commit_replacement(&staged).await?;
                staged.target
            }
            None => created,
        };

        if options.build_index && kind == RelationKind::Table {
            self.create_spatial_index(&target).await?;
        }
        Ok(())
    }

    /// Unions the geometries of both relations and splits the result into
    /// connected polygon features stored in `out_name`.
    #[instrument(skip(self, options))]
    pub async fn dissolve(
        &self,
        relation_a: &str,
        relation_b: &str,
        out_name: &str,
        options: &DissolveOptions,
    ) -> Result<()> {
        let srid = self.shared_srid(relation_a, relation_b).await?;

        if !options.cluster_tolerance.is_finite() || options.cluster_tolerance < 0.0 {
            return Err(ProcessorError::InvalidOperation(format!(
                "cluster tolerance must be a non-negative distance, got {}",
                options.cluster_tolerance
            )));
        }

        let kind = RelationKind::from_view_flag(options.as_view);
        self.run_template(
            "create_dissolve_geometries",
            &[
                self.schema(),
                kind.as_sql().into(),
                out_name.into(),
                srid.into(),
                relation_a.into(),
                relation_b.into(),
                Param::Float(options.cluster_tolerance),
            ],
        )
        .await?;

        info!(relation = out_name, %kind, srid, "dissolve created");
        self.record(JournalEntry::new(out_name, JournalAction::Created { kind, srid }))
            .await;

        if options.build_index && kind == RelationKind::Table {
            self.create_spatial_index(out_name).await?;
        }
        Ok(())
    }
}

/// Select-list fragment for the carried attributes, qualified with the
/// relation alias and followed by `", "` when non-empty. Columns that would
/// clash with `id`, `geometry` or a column of the other side are aliased
/// `a_<field>` / `b_<field>`.
fn projected_fields(fields_a: &[String], fields_b: &[String]) -> String {
    let project = |alias: &str, fields: &[String], other: &[String]| -> Vec<String> {
        fields
            .iter()
            .map(|field| {
                let clashes = RESERVED_COLUMNS.contains(&field.as_str()) || other.contains(field);
                if clashes {
                    format!(r#"{alias}."{field}" AS "{alias}_{field}""#)
                } else {
                    format!(r#"{alias}."{field}""#)
                }
            })
            .collect()
    };

    let mut columns = project("a", fields_a, fields_b);
    columns.extend(project("b", fields_b, fields_a));

    if columns.is_empty() {
        String::new()
    } else {
        format!("{}, ", columns.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn no_fields_render_nothing() {
        assert_eq!(projected_fields(&[], &[]), "");
    }

    #[test]
    fn fields_are_qualified_and_aliased_on_clash() {
        let rendered = projected_fields(&strings(&["code", "nom"]), &strings(&["id", "nom"]));
        assert_eq!(
            rendered,
            r#"a."code", a."nom" AS "a_nom", b."id" AS "b_id", b."nom" AS "b_nom", "#
        );
    }

    #[test]
    fn option_defaults_build_index() {
        let options = IntersectOptions::new().fields_b(["id"]);
        assert!(options.build_index);
        assert!(options.out_name.is_none());
        assert_eq!(options.fields_b, vec!["id".to_string()]);
        assert!(DissolveOptions::default().build_index);
        assert_eq!(DissolveOptions::default().cluster_tolerance, 0.0);
    }

    #[test]
    fn options_deserialize_with_defaults() {
        let options: IntersectOptions =
            serde_json::from_str(r#"{ "fields_a": ["classe"], "out_name": "c" }"#).unwrap();
        assert_eq!(options.out_name.as_deref(), Some("c"));
        assert!(options.build_index);
        assert!(!options.as_view);
    }
}
