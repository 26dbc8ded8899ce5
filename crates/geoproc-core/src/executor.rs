//! Template executor: resolves a statement, substitutes its parameters and
//! runs it against the geometry engine.

use std::{fmt, str::FromStr, sync::Arc};

use tracing::{debug, warn};

use crate::{
    engine::{GeometryEngine, RowSet},
    error::{ProcessorError, Result},
    template::{render, TemplateSource},
};

/// How [`TemplateExecutor::run`] interprets its statement argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryMode {
    /// The statement is the text to execute.
    Literal,
    /// The statement is a template identifier.
    Template,
}

impl QueryMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            QueryMode::Literal => "literal",
            QueryMode::Template => "template",
        }
    }
}

impl FromStr for QueryMode {
    type Err = ProcessorError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "literal" => Ok(QueryMode::Literal),
            "template" => Ok(QueryMode::Template),
            other => Err(ProcessorError::UnsupportedMode(other.to_owned())),
        }
    }
}

/// Positional statement parameter. Rendered verbatim into the statement text.
#[derive(Debug, Clone, PartialEq)]
pub enum Param {
    Text(String),
    Int(i64),
    Float(f64),
}

impl fmt::Display for Param {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Param::Text(text) => f.write_str(text),
            Param::Int(value) => write!(f, "{value}"),
            Param::Float(value) => write!(f, "{value:?}"),
        }
    }
}

impl From<&str> for Param {
    fn from(value: &str) -> Self {
        Param::Text(value.to_owned())
    }
}

impl From<String> for Param {
    fn from(value: String) -> Self {
        Param::Text(value)
    }
}

impl From<&String> for Param {
    fn from(value: &String) -> Self {
        Param::Text(value.clone())
    }
}

impl From<i32> for Param {
    fn from(value: i32) -> Self {
        Param::Int(value.into())
    }
}

impl From<u8> for Param {
    fn from(value: u8) -> Self {
        Param::Int(value.into())
    }
}

impl From<i64> for Param {
    fn from(value: i64) -> Self {
        Param::Int(value)
    }
}

impl From<f64> for Param {
    fn from(value: f64) -> Self {
        Param::Float(value)
    }
}

/// Runs literal or templated statements against a [`GeometryEngine`].
#[derive(Clone)]
pub struct TemplateExecutor {
    engine: Arc<dyn GeometryEngine>,
    templates: Option<Arc<dyn TemplateSource>>,
}

impl TemplateExecutor {
    /// Executor without a template source; only literal mode is usable.
    pub fn new(engine: Arc<dyn GeometryEngine>) -> Self {
        Self {
            engine,
            templates: None,
        }
    }

    pub fn with_templates(mut self, templates: Arc<dyn TemplateSource>) -> Self {
        self.templates = Some(templates);
        self
    }

    /// Resolves `statement` according to `mode`, substitutes `params`
    /// positionally and performs one engine round-trip.
    pub async fn run(&self, mode: QueryMode, statement: &str, params: &[Param]) -> Result<RowSet> {
        let text = match mode {
            QueryMode::Literal => statement.to_owned(),
            QueryMode::Template => {
                let templates = self.templates.as_ref().ok_or_else(|| {
                    ProcessorError::Configuration(format!(
                        "template '{statement}' requested but no template source is configured"
                    ))
                })?;
                templates.load(statement)?
            }
        };

        let rendered = render(&text, params)?;
        debug!(mode = mode.as_str(), statement = %rendered, "executing statement");

        match self.engine.execute(&rendered).await {
            Ok(rows) => Ok(RowSet::new(rows)),
            Err(err) => {
                warn!(mode = mode.as_str(), error = %err, "statement failed");
                Err(ProcessorError::Engine(err))
            }
        }
    }

    /// Shorthand for [`QueryMode::Template`].
    pub async fn run_template(&self, id: &str, params: &[Param]) -> Result<RowSet> {
        self.run(QueryMode::Template, id, params).await
    }

    /// Shorthand for [`QueryMode::Literal`].
    pub async fn run_literal(&self, statement: &str, params: &[Param]) -> Result<RowSet> {
        self.run(QueryMode::Literal, statement, params).await
    }
}

impl fmt::Debug for TemplateExecutor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TemplateExecutor")
            .field("templates", &self.templates)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{engine::RecordingEngine, template::EmbeddedTemplates};

    #[test]
    fn mode_parsing_rejects_unknown_values() {
        assert_eq!("literal".parse::<QueryMode>().unwrap(), QueryMode::Literal);
        assert_eq!("template".parse::<QueryMode>().unwrap(), QueryMode::Template);
        let err = "file".parse::<QueryMode>().unwrap_err();
        assert!(matches!(err, ProcessorError::UnsupportedMode(mode) if mode == "file"));
    }

    #[test]
    fn float_params_keep_a_decimal_point() {
        assert_eq!(Param::from(0.0).to_string(), "0.0");
        assert_eq!(Param::from(2154).to_string(), "2154");
    }

    #[tokio::test]
    async fn literal_mode_substitutes_parameters() {
        let engine = Arc::new(RecordingEngine::silent());
        let executor = TemplateExecutor::new(engine.clone());

        executor
            .run_literal(r#"DROP TABLE {0}."{1}";"#, &["public".into(), "b".into()])
            .await
            .unwrap();

        assert_eq!(engine.statements(), vec![r#"DROP TABLE public."b";"#]);
    }

    #[tokio::test]
    async fn template_mode_requires_a_source() {
        let engine = Arc::new(RecordingEngine::silent());
        let executor = TemplateExecutor::new(engine.clone());

        let err = executor
            .run_template("select_srid", &["public".into(), "a".into()])
            .await
            .unwrap_err();

        assert!(matches!(err, ProcessorError::Configuration(_)));
        assert!(engine.statements().is_empty());
    }

    #[tokio::test]
    async fn template_mode_loads_and_renders() {
        let engine = Arc::new(RecordingEngine::silent());
        let executor = TemplateExecutor::new(engine.clone()).with_templates(Arc::new(EmbeddedTemplates));

        executor
            .run_template("select_srid", &["public".into(), "commune".into()])
            .await
            .unwrap();

        let statements = engine.statements();
        assert_eq!(statements.len(), 1);
        assert!(statements[0].contains("ST_SRID(geometry)"));
        assert!(statements[0].contains(r#"public."commune""#));
    }

    #[tokio::test]
    async fn engine_failures_are_wrapped() {
        let engine = Arc::new(RecordingEngine::new(|_| {
            Err(anyhow::anyhow!("relation \"x\" does not exist"))
        }));
        let executor = TemplateExecutor::new(engine);

        let err = executor.run_literal("SELECT 1;", &[]).await.unwrap_err();
        assert!(err.is_engine());
        assert!(err.to_string().contains("does not exist"));
    }
}
