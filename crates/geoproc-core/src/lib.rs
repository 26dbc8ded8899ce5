//! Spatial-relation processing engine on top of PostGIS.
//!
//! The crate introspects geometry metadata of stored relations, checks the
//! invariants an operation depends on (single geometry type, shared SRID) and
//! then runs a fixed vocabulary of geometric operations (reprojection,
//! 3D→2D flattening, multipart normalization, intersection, dissolve,
//! relation replacement, spatial indexing) through SQL templates. Relation
//! contents never leave the engine; only names and metadata are handled here.

pub mod algebra;
pub mod config;
pub mod engine;
pub mod error;
pub mod executor;
pub mod geometry;
pub mod inspect;
pub mod invariant;
pub mod journal;
pub mod lifecycle;
pub mod template;

use std::sync::Arc;

use tracing::warn;

pub use algebra::{DissolveOptions, IntersectOptions};
pub use config::{Credentials, ProcessorConfig, SridPolicy};
pub use engine::{GeometryEngine, PgGeometryEngine, RecordingEngine, Row, RowSet, Value};
pub use error::{ProcessorError, Result};
pub use executor::{Param, QueryMode, TemplateExecutor};
pub use geometry::{convert_st_to_type, GeometryKind, DIMENSION, VENDOR_PREFIX};
pub use journal::{JournalAction, JournalConfig, JournalEntry, OperationJournal};
pub use lifecycle::{RelationKind, StagedRelation};
pub use template::{DirectoryTemplates, EmbeddedTemplates, TemplateSource};

/// Entry point of the engine: owns the executor, the settings and the
/// optional operation journal.
#[derive(Debug, Clone)]
pub struct SpatialProcessor {
    executor: TemplateExecutor,
    config: ProcessorConfig,
    journal: Option<Arc<OperationJournal>>,
}

impl SpatialProcessor {
    pub fn new(executor: TemplateExecutor, config: ProcessorConfig) -> Self {
        let journal = if config.journal.enabled {
            match OperationJournal::open(&config.journal) {
                Ok(journal) => Some(Arc::new(journal)),
                Err(err) => {
                    warn!(error = %err, "failed to initialize operation journal; disabling it");
                    None
                }
            }
        } else {
            None
        };

        Self {
            executor,
            config,
            journal,
        }
    }

    /// Builds a processor over `engine`, loading templates from
    /// `config.template_dir` or from the embedded set.
    pub fn with_engine(engine: Arc<dyn GeometryEngine>, config: ProcessorConfig) -> Self {
        let templates: Arc<dyn TemplateSource> = match &config.template_dir {
            Some(dir) => Arc::new(DirectoryTemplates::new(dir.clone())),
            None => Arc::new(EmbeddedTemplates),
        };
        let executor = TemplateExecutor::new(engine).with_templates(templates);
        Self::new(executor, config)
    }

    /// Connects to PostGIS and builds a processor over the connection pool.
    pub async fn connect(database_url: &str, config: ProcessorConfig) -> Result<Self> {
        let engine = PgGeometryEngine::connect(database_url)
            .await
            .map_err(ProcessorError::Engine)?;
        Ok(Self::with_engine(Arc::new(engine), config))
    }

    pub fn executor(&self) -> &TemplateExecutor {
        &self.executor
    }

    pub fn config(&self) -> &ProcessorConfig {
        &self.config
    }

    pub(crate) fn journal(&self) -> Option<&OperationJournal> {
        self.journal.as_deref()
    }

    pub(crate) fn schema(&self) -> Param {
        Param::from(&self.config.schema)
    }

    pub(crate) async fn run_template(&self, id: &str, params: &[Param]) -> Result<RowSet> {
        self.executor.run_template(id, params).await
    }

    pub(crate) async fn record(&self, entry: JournalEntry) {
        if let Some(journal) = self.journal.as_ref() {
            if let Err(err) = journal.append(&entry).await {
                warn!(
                    relation = %entry.relation,
                    journal = %journal.path().display(),
                    error = %err,
                    "failed to append journal entry"
                );
            }
        }
    }
}
