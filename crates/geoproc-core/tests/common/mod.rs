#![allow(dead_code)]

use std::sync::Arc;

use anyhow::anyhow;
use geoproc_core::{ProcessorConfig, RecordingEngine, SpatialProcessor, Value};

/// Relation known to the fake engine.
#[derive(Debug, Clone)]
pub struct FakeRelation {
    pub name: &'static str,
    pub srids: Vec<i32>,
    pub types: Vec<&'static str>,
}

impl FakeRelation {
    pub fn new(name: &'static str, srid: i32, types: &[&'static str]) -> Self {
        Self {
            name,
            srids: vec![srid],
            types: types.to_vec(),
        }
    }

    pub fn with_srids(mut self, srids: &[i32]) -> Self {
        self.srids = srids.to_vec();
        self
    }
}

/// Name of the first schema-qualified relation referenced by `statement`.
pub fn referenced_relation(statement: &str) -> Option<&str> {
    let start = statement.find("public.\"")? + "public.\"".len();
    let len = statement[start..].find('"')?;
    Some(&statement[start..start + len])
}

pub fn is_metadata_query(statement: &str) -> bool {
    statement.contains("ST_SRID(geometry)")
        || statement.contains("ST_GeometryType(geometry)")
        || statement.contains("to_regclass")
}

/// Engine answering metadata queries from `relations`. Any statement that
/// contains `failing` is rejected.
pub fn fake_postgis(relations: Vec<FakeRelation>, failing: Option<&'static str>) -> Arc<RecordingEngine> {
    Arc::new(RecordingEngine::new(move |statement| {
        if let Some(pattern) = failing {
            if statement.contains(pattern) {
                return Err(anyhow!("engine rejected statement containing {pattern}"));
            }
        }

        if !is_metadata_query(statement) {
            return Ok(Vec::new());
        }

        let name = referenced_relation(statement).ok_or_else(|| anyhow!("no relation in query"))?;
        let relation = relations.iter().find(|relation| relation.name == name);

        if statement.contains("to_regclass") {
            return Ok(vec![vec![Value::Bool(relation.is_some())]]);
        }

        let relation = relation.ok_or_else(|| anyhow!("relation \"{name}\" does not exist"))?;
        if statement.contains("ST_SRID(geometry)") {
            Ok(relation.srids.iter().map(|srid| vec![Value::Int((*srid).into())]).collect())
        } else {
            Ok(relation.types.iter().map(|t| vec![Value::from(*t)]).collect())
        }
    }))
}

pub fn processor(engine: &Arc<RecordingEngine>) -> SpatialProcessor {
    SpatialProcessor::with_engine(engine.clone(), ProcessorConfig::default())
}

pub fn mutating(engine: &RecordingEngine) -> Vec<String> {
    engine
        .statements()
        .into_iter()
        .filter(|statement| !is_metadata_query(statement))
        .collect()
}
