//! Statement templates and positional substitution.
//!
//! Templates carry ordinal placeholders (`{0}`, `{1}`, ...). Substitution is
//! textual: values land in the statement verbatim, including in identifier
//! position. This is an unsafe substitution boundary; callers passing
//! untrusted relation or column names must sanitize them first.

use std::{fmt, fs, path::PathBuf};

use crate::error::{ProcessorError, Result};

/// Resolves a template identifier to its statement text.
pub trait TemplateSource: Send + Sync + fmt::Debug {
    fn load(&self, id: &str) -> Result<String>;
}

/// Templates stored as `<dir>/<id>.sql`.
#[derive(Debug, Clone)]
pub struct DirectoryTemplates {
    root: PathBuf,
}

impl DirectoryTemplates {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl TemplateSource for DirectoryTemplates {
    fn load(&self, id: &str) -> Result<String> {
        let path = self.root.join(format!("{id}.sql"));
        fs::read_to_string(&path).map_err(|err| {
            ProcessorError::Template(format!("reading {}: {err}", path.display()))
        })
    }
}

/// PostGIS templates compiled into the crate.
#[derive(Debug, Clone, Copy, Default)]
pub struct EmbeddedTemplates;

impl EmbeddedTemplates {
    const TEMPLATES: &'static [(&'static str, &'static str)] = &[
        (
            "alter_geometry_force_2d",
            include_str!("../sql/alter_geometry_force_2d.sql"),
        ),
        (
            "alter_geometry_srid",
            include_str!("../sql/alter_geometry_srid.sql"),
        ),
        (
            "create_dissolve_geometries",
            include_str!("../sql/create_dissolve_geometries.sql"),
        ),
        (
            "create_intersection_geometries",
            include_str!("../sql/create_intersection_geometries.sql"),
        ),
        (
            "create_spatial_index",
            include_str!("../sql/create_spatial_index.sql"),
        ),
        ("drop_relation", include_str!("../sql/drop_relation.sql")),
        (
            "select_distinct_geometry_type",
            include_str!("../sql/select_distinct_geometry_type.sql"),
        ),
        (
            "select_relation_exists",
            include_str!("../sql/select_relation_exists.sql"),
        ),
        ("select_srid", include_str!("../sql/select_srid.sql")),
        (
            "singlepart_to_multipart",
            include_str!("../sql/singlepart_to_multipart.sql"),
        ),
    ];

    pub fn ids() -> impl Iterator<Item = &'static str> {
        Self::TEMPLATES.iter().map(|(id, _)| *id)
    }
}

impl TemplateSource for EmbeddedTemplates {
    fn load(&self, id: &str) -> Result<String> {
        Self::TEMPLATES
            .iter()
            .find(|(name, _)| *name == id)
            .map(|(_, body)| (*body).to_owned())
            .ok_or_else(|| ProcessorError::Template(format!("unknown template '{id}'")))
    }
}

/// Replaces `{n}` with the n-th parameter. `{{` and `}}` yield literal braces.
pub fn render<P: fmt::Display>(text: &str, params: &[P]) -> Result<String> {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();

    while let Some(ch) = chars.next() {
        match ch {
            '{' if chars.peek() == Some(&'{') => {
                chars.next();
                out.push('{');
            }
            '}' if chars.peek() == Some(&'}') => {
                chars.next();
                out.push('}');
            }
            '{' => {
                let mut digits = String::new();
                loop {
                    match chars.next() {
                        Some('}') => break,
                        Some(d) if d.is_ascii_digit() => digits.push(d),
                        _ => {
                            return Err(ProcessorError::Template(format!(
                                "malformed placeholder '{{{digits}' in template"
                            )))
                        }
                    }
                }
                let index: usize = digits.parse().map_err(|_| {
                    ProcessorError::Template("empty placeholder '{}' in template".into())
                })?;
                let param = params.get(index).ok_or_else(|| {
                    ProcessorError::Template(format!(
                        "placeholder {{{index}}} has no parameter ({} given)",
                        params.len()
                    ))
                })?;
                out.push_str(&param.to_string());
            }
            '}' => {
                return Err(ProcessorError::Template(
                    "unmatched '}' in template".into(),
                ))
            }
            other => out.push(other),
        }
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn substitutes_by_position() {
        let text = r#"DELETE FROM {0}."{1}" WHERE "{2}" LIKE '{3}';"#;
        let rendered = render(text, &["public", "commune", "INSEE_COM", "97%"]).unwrap();
        assert_eq!(
            rendered,
            r#"DELETE FROM public."commune" WHERE "INSEE_COM" LIKE '97%';"#
        );
    }

    #[test]
    fn repeated_placeholders_and_escapes() {
        let rendered = render("{0}-{0} {{literal}}", &[7]).unwrap();
        assert_eq!(rendered, "7-7 {literal}");
    }

    #[test]
    fn missing_parameter_is_rejected() {
        let err = render("SELECT {0}, {1};", &["a"]).unwrap_err();
        assert!(matches!(err, ProcessorError::Template(_)));
        assert!(render("SELECT {x};", &["a"]).is_err());
        assert!(render("SELECT 1 };", &["a"]).is_err());
    }

    #[test]
    fn embedded_templates_are_complete() {
        let templates = EmbeddedTemplates;
        for id in EmbeddedTemplates::ids() {
            assert!(!templates.load(id).unwrap().trim().is_empty(), "{id}");
        }
        assert!(templates.load("missing").is_err());
    }

    #[test]
    fn directory_templates_read_sql_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("count.sql"), "SELECT count(*) FROM {0};").unwrap();

        let templates = DirectoryTemplates::new(dir.path());
        assert_eq!(templates.load("count").unwrap(), "SELECT count(*) FROM {0};");
        assert!(matches!(
            templates.load("absent"),
            Err(ProcessorError::Template(_))
        ));
    }
}
