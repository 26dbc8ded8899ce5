//! Geometry type vocabulary shared by the inspector and the operations.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::error::{ProcessorError, Result};

/// Prefix PostGIS puts in front of every `ST_GeometryType` result.
pub const VENDOR_PREFIX: &str = "ST_";

/// Prefix marking multipart geometry types.
pub const MULTI_PREFIX: &str = "Multi";

/// Singlepart geometry kinds understood by the operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GeometryKind {
    Point,
    LineString,
    Polygon,
}

/// Topological dimension of each geometry kind.
pub const DIMENSION: [(GeometryKind, u8); 3] = [
    (GeometryKind::Point, 0),
    (GeometryKind::LineString, 1),
    (GeometryKind::Polygon, 2),
];

impl GeometryKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            GeometryKind::Point => "Point",
            GeometryKind::LineString => "LineString",
            GeometryKind::Polygon => "Polygon",
        }
    }

    pub fn dimension(&self) -> u8 {
        DIMENSION
            .iter()
            .find(|(kind, _)| kind == self)
            .map(|(_, dimension)| *dimension)
            .unwrap_or_default()
    }
}

impl fmt::Display for GeometryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for GeometryKind {
    type Err = ProcessorError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "Point" => Ok(GeometryKind::Point),
            "LineString" => Ok(GeometryKind::LineString),
            "Polygon" => Ok(GeometryKind::Polygon),
            other => Err(ProcessorError::UnsupportedGeometryKind(other.to_owned())),
        }
    }
}

/// Converts a PostGIS geometry type (`ST_MultiPolygon`) to its generic form
/// (`MultiPolygon`). With `allow_multi == false` the multipart prefix is
/// dropped as well (`Polygon`).
pub fn convert_st_to_type(geometry: &str, allow_multi: bool) -> Result<String> {
    let generic = geometry
        .strip_prefix(VENDOR_PREFIX)
        .ok_or_else(|| ProcessorError::InvalidGeometryType(geometry.to_owned()))?;

    if allow_multi {
        Ok(generic.to_owned())
    } else {
        Ok(singlepart(generic).to_owned())
    }
}

/// Drops a leading `Multi` from a generic geometry type.
pub fn singlepart(generic: &str) -> &str {
    generic.strip_prefix(MULTI_PREFIX).unwrap_or(generic)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_vendor_prefix() {
        assert_eq!(convert_st_to_type("ST_MultiPolygon", true).unwrap(), "MultiPolygon");
        assert_eq!(convert_st_to_type("ST_LineString", true).unwrap(), "LineString");
    }

    #[test]
    fn collapses_multipart_when_not_allowed() {
        assert_eq!(convert_st_to_type("ST_MultiPolygon", false).unwrap(), "Polygon");
        assert_eq!(convert_st_to_type("ST_MultiPoint", false).unwrap(), "Point");
        assert_eq!(convert_st_to_type("ST_Point", false).unwrap(), "Point");
        assert_eq!(singlepart("MultiLineString"), "LineString");
    }

    #[test]
    fn rejects_foreign_prefixes() {
        let err = convert_st_to_type("XY_Polygon", true).unwrap_err();
        assert!(matches!(err, ProcessorError::InvalidGeometryType(t) if t == "XY_Polygon"));
        assert!(convert_st_to_type("Polygon", false).is_err());
    }

    #[test]
    fn dimension_table() {
        assert_eq!(GeometryKind::Point.dimension(), 0);
        assert_eq!(GeometryKind::LineString.dimension(), 1);
        assert_eq!("Polygon".parse::<GeometryKind>().unwrap().dimension(), 2);
        assert!(matches!(
            "GeometryCollection".parse::<GeometryKind>(),
            Err(ProcessorError::UnsupportedGeometryKind(_))
        ));
    }
}
