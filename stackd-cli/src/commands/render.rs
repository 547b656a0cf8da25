//! `stackd render` command

use anyhow::Result;
use colored::Colorize;
use stackd_core::profiles::ProfileRegistry;
use stackd_core::secrets::SecretSet;
use stackd_core::templates::{TemplateLoader, TemplateValues};
use stackd_core::types::StackKind;
use std::io::Write;
use std::path::Path;

/// Render a stack's bootstrap template with fresh secrets
pub fn render(stack: StackKind, template_dir: &Path, set: Vec<(String, String)>) -> Result<()> {
    let registry = ProfileRegistry::new();
    let profile = registry.get(stack)?;

    let template = TemplateLoader::new(template_dir).load(&profile.template_id)?;
    let secrets = SecretSet::generate(&profile.secrets);

    let mut values: TemplateValues = set.into_iter().collect();
    values.insert("STACK".to_string(), stack.as_str().to_string());
    for (token, value) in secrets.iter() {
        values.insert(token.to_string(), value.to_string());
    }

    let rendered = template.render(&values);

    let mut stdout = std::io::stdout().lock();
    stdout.write_all(rendered.script.as_bytes())?;
    stdout.flush()?;

    if !rendered.unresolved.is_empty() {
        eprintln!(
            "{} Unresolved placeholders in {}: {}",
            "⚠".yellow().bold(),
            template.id().bold(),
            rendered.unresolved.join(", ")
        );
    }

    Ok(())
}
