//! Bootstrap script templates.
//!
//! A template is plain text with `{NAME}` placeholders, where `NAME` matches
//! `[A-Z][A-Z0-9_]*`. Templates are parsed once into literal and placeholder
//! segments; a placeholder only ever matches its whole name, so `{PASSWORD}`
//! and `{SYSADMIN_PASSWORD}` never interfere. Anything that is not a valid
//! placeholder (lowercase braces, shell `${VAR}` expansions) is copied
//! through untouched.

use crate::error::{ProvisionError, Result};
use crate::types::BootstrapScript;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use tracing::debug;

static PLACEHOLDER_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\{([A-Z][A-Z0-9_]*)\}").expect("Invalid placeholder regex")
});

/// Placeholder values used for rendering.
pub type TemplateValues = BTreeMap<String, String>;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Placeholder(String),
}

/// Parsed bootstrap template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BootstrapTemplate {
    id: String,
    segments: Vec<Segment>,
}

/// Output of [`BootstrapTemplate::render`].
#[derive(Debug, Clone)]
pub struct Rendered {
    pub script: BootstrapScript,
    /// Placeholder names left unmapped (emitted literally), sorted.
    pub unresolved: Vec<String>,
}

impl BootstrapTemplate {
    /// Parse template text.
    pub fn parse(id: impl Into<String>, content: &str) -> Self {
        let mut segments = Vec::new();
        let mut cursor = 0;

        for captures in PLACEHOLDER_REGEX.captures_iter(content) {
            let (Some(whole), Some(name)) = (captures.get(0), captures.get(1)) else {
                continue;
            };
            // `${NAME}` is a shell expansion, not a placeholder.
            if whole.start() > 0 && content.as_bytes()[whole.start() - 1] == b'$' {
                continue;
            }
            if whole.start() > cursor {
                segments.push(Segment::Literal(content[cursor..whole.start()].to_string()));
            }
            segments.push(Segment::Placeholder(name.as_str().to_string()));
            cursor = whole.end();
        }
        if cursor < content.len() {
            segments.push(Segment::Literal(content[cursor..].to_string()));
        }

        Self { id: id.into(), segments }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Distinct placeholder names, sorted.
    pub fn placeholders(&self) -> BTreeSet<&str> {
        self.segments
            .iter()
            .filter_map(|segment| match segment {
                Segment::Placeholder(name) => Some(name.as_str()),
                Segment::Literal(_) => None,
            })
            .collect()
    }

    /// Substitute every mapped placeholder. Unmapped placeholders are
    /// re-emitted as `{NAME}` and reported in [`Rendered::unresolved`].
    pub fn render(&self, values: &TemplateValues) -> Rendered {
        let mut out = String::new();
        let mut unresolved = BTreeSet::new();

        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::Placeholder(name) => match values.get(name) {
                    Some(value) => out.push_str(value),
                    None => {
                        out.push('{');
                        out.push_str(name);
                        out.push('}');
                        unresolved.insert(name.clone());
                    }
                },
            }
        }

        Rendered {
            script: BootstrapScript::new(out),
            unresolved: unresolved.into_iter().collect(),
        }
    }
}

/// Loads templates from a directory tree (`<root>/<template id>`).
#[derive(Debug, Clone)]
pub struct TemplateLoader {
    root: PathBuf,
}

impl TemplateLoader {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Read and parse one template.
    pub fn load(&self, template_id: &str) -> Result<BootstrapTemplate> {
        let path = self.root.join(template_id);
        let content =
            std::fs::read_to_string(&path).map_err(|e| ProvisionError::TemplateUnavailable {
                template: path.display().to_string(),
                reason: e.to_string(),
            })?;

        let template = BootstrapTemplate::parse(template_id, &content);
        debug!(
            template = %template_id,
            placeholders = template.placeholders().len(),
            "Loaded bootstrap template"
        );
        Ok(template)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn values(pairs: &[(&str, &str)]) -> TemplateValues {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn test_complete_mapping_leaves_no_placeholders() {
        let template = BootstrapTemplate::parse(
            "t",
            "#cloud-config\nuser: {DB_USER}\npass: {DB_PASSWORD}\nagain: {DB_USER}\n",
        );
        let rendered =
            template.render(&values(&[("DB_USER", "alice"), ("DB_PASSWORD", "s3cret")]));

        assert!(rendered.unresolved.is_empty());
        assert_eq!(
            rendered.script.to_string_lossy(),
            "#cloud-config\nuser: alice\npass: s3cret\nagain: alice\n"
        );
    }

    #[test]
    fn test_unmapped_placeholder_kept_literally() {
        let template = BootstrapTemplate::parse("t", "a={A}\nb={B}\n");
        let rendered = template.render(&values(&[("A", "1")]));

        assert_eq!(rendered.script.to_string_lossy(), "a=1\nb={B}\n");
        assert_eq!(rendered.unresolved, vec!["B".to_string()]);
    }

    #[test]
    fn test_overlapping_names_do_not_collide() {
        let template = BootstrapTemplate::parse("t", "{PASSWORD} {SYSADMIN_PASSWORD}");
        let rendered =
            template.render(&values(&[("PASSWORD", "short"), ("SYSADMIN_PASSWORD", "long")]));
        assert_eq!(rendered.script.to_string_lossy(), "short long");
    }

    #[test]
    fn test_non_placeholders_pass_through() {
        let content = "echo ${HOME} {lower} {1X} {}\njson: {\"k\": 1}\n";
        let template = BootstrapTemplate::parse("t", content);
        assert!(template.placeholders().is_empty());
        assert_eq!(template.render(&TemplateValues::new()).script.to_string_lossy(), content);
    }

    #[test]
    fn test_placeholders_listed_once() {
        let template = BootstrapTemplate::parse("t", "{B}{A}{B}");
        let names: Vec<&str> = template.placeholders().into_iter().collect();
        assert_eq!(names, vec!["A", "B"]);
    }

    #[test]
    fn test_loader_reads_from_root() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("lms")).unwrap();
        std::fs::write(dir.path().join("lms/base.yml"), "pw: {DB_PASSWORD}\n").unwrap();

        let loader = TemplateLoader::new(dir.path());
        let template = loader.load("lms/base.yml").unwrap();
        assert_eq!(template.id(), "lms/base.yml");
        assert!(template.placeholders().contains("DB_PASSWORD"));
    }

    #[test]
    fn test_loader_missing_template() {
        let dir = tempfile::tempdir().unwrap();
        let loader = TemplateLoader::new(dir.path());
        let err = loader.load("meeting/base.yml").unwrap_err();
        assert!(matches!(err, ProvisionError::TemplateUnavailable { .. }));
        assert!(err.is_fatal());
    }
}
