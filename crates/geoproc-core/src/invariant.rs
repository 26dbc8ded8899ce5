//! Preconditions checked before type-sensitive or binary operations.

use std::collections::BTreeSet;

use crate::error::{ProcessorError, Result};

/// Returns the sole geometry type of a relation, or fails when the relation
/// holds zero or several distinct types.
pub fn require_single_geometry_type(types: &BTreeSet<String>) -> Result<String> {
    let mut iter = types.iter();
    match (iter.next(), iter.next()) {
        (Some(only), None) => Ok(only.clone()),
        _ => Err(ProcessorError::MixedGeometryType(
            types.iter().cloned().collect(),
        )),
    }
}

pub fn require_same_srid(relation_a: &str, srid_a: i32, relation_b: &str, srid_b: i32) -> Result<()> {
    if srid_a == srid_b {
        Ok(())
    } else {
        Err(ProcessorError::SridMismatch {
            relation_a: relation_a.to_owned(),
            srid_a,
            relation_b: relation_b.to_owned(),
            srid_b,
        })
    }
}
