//! Relation metadata inspection: geometry types and SRIDs.

use std::collections::BTreeSet;

use tracing::{instrument, warn};

use crate::{
    config::SridPolicy,
    engine::Value,
    error::{ProcessorError, Result},
    geometry::{convert_st_to_type, singlepart},
    invariant::{require_same_srid, require_single_geometry_type},
    SpatialProcessor,
};

impl SpatialProcessor {
    /// Distinct geometry types of `relation`, normalized with multipart
    /// prefixes preserved (`ST_MultiPolygon` → `MultiPolygon`).
    #[instrument(skip(self))]
    pub async fn geometry_types(&self, relation: &str) -> Result<BTreeSet<String>> {
        let rows = self
            .run_template(
                "select_distinct_geometry_type",
                &[self.schema(), relation.into()],
            )
            .await?;

        rows.flatten()
            .filter(|value| !value.is_null())
            .map(|value| match value {
                Value::Text(native) => convert_st_to_type(&native, true),
                other => Err(ProcessorError::UnexpectedRow(format!(
                    "geometry type of '{relation}' is not text: {other:?}"
                ))),
            })
            .collect()
    }

    /// SRID of `relation`. Several distinct SRIDs are resolved according to
    /// the configured [`SridPolicy`].
    #[instrument(skip(self))]
    pub async fn srid(&self, relation: &str) -> Result<i32> {
        let rows = self
            .run_template("select_srid", &[self.schema(), relation.into()])
            .await?;

        let srids = rows
            .flatten()
            .filter(|value| !value.is_null())
            .map(|value| {
                value
                    .as_i64()
                    .and_then(|srid| i32::try_from(srid).ok())
                    .ok_or_else(|| {
                        ProcessorError::UnexpectedRow(format!(
                            "SRID of '{relation}' is not an integer: {value:?}"
                        ))
                    })
            })
            .collect::<Result<Vec<i32>>>()?;

        match (srids.as_slice(), self.config().srid_policy) {
            ([], _) => Err(ProcessorError::MissingSrid(relation.to_owned())),
            ([only], _) => Ok(*only),
            ([first, ..], SridPolicy::FirstFound) => {
                warn!(
                    relation,
                    ?srids,
                    srid = first,
                    "relation holds several SRIDs; using the first"
                );
                Ok(*first)
            }
            (_, SridPolicy::Strict) => Err(ProcessorError::MixedSrid {
                relation: relation.to_owned(),
                srids: srids.to_vec(),
            }),
        }
    }

    pub async fn same_srid(&self, relation_a: &str, relation_b: &str) -> Result<bool> {
        Ok(self.srid(relation_a).await? == self.srid(relation_b).await?)
    }

    /// Fails with [`ProcessorError::SridMismatch`] unless both relations
    /// share one SRID, which is returned.
    pub(crate) async fn shared_srid(&self, relation_a: &str, relation_b: &str) -> Result<i32> {
        let srid_a = self.srid(relation_a).await?;
        let srid_b = self.srid(relation_b).await?;
        require_same_srid(relation_a, srid_a, relation_b, srid_b)?;
        Ok(srid_a)
    }

    /// The single generic geometry type of `relation`; multipart types are
    /// collapsed to their singlepart kind when `allow_multi` is false.
    pub async fn map_geometry_type(&self, relation: &str, allow_multi: bool) -> Result<String> {
        let types = self.geometry_types(relation).await?;
        let single = require_single_geometry_type(&types)?;
        if allow_multi {
            Ok(single)
        } else {
            Ok(singlepart(&single).to_owned())
        }
    }

    #[instrument(skip(self))]
    pub async fn relation_exists(&self, relation: &str) -> Result<bool> {
        let rows = self
            .run_template("select_relation_exists", &[self.schema(), relation.into()])
            .await?;
        rows.first_value()
            .and_then(Value::as_bool)
            .ok_or_else(|| {
                ProcessorError::UnexpectedRow(format!(
                    "existence check for '{relation}' returned no boolean"
                ))
            })
    }
}
