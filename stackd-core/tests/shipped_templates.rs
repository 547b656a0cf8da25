//! Shipped bootstrap templates stay in sync with the built-in profiles.

use stackd_core::profiles::ProfileRegistry;
use stackd_core::templates::{TemplateLoader, TemplateValues};
use std::path::PathBuf;

fn loader() -> TemplateLoader {
    TemplateLoader::new(PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../files"))
}

#[test]
fn test_every_profile_has_a_template() {
    let loader = loader();
    for profile in ProfileRegistry::new().list() {
        let template = loader.load(&profile.template_id);
        assert!(template.is_ok(), "missing template for {}", profile.kind);
    }
}

#[test]
fn test_generated_secrets_are_used() {
    let loader = loader();
    for profile in ProfileRegistry::new().list() {
        let template = loader.load(&profile.template_id).unwrap();
        let placeholders = template.placeholders();
        for secret in &profile.secrets {
            assert!(
                placeholders.contains(secret.token.as_str()),
                "{} never uses secret {}",
                profile.template_id,
                secret.token
            );
        }
    }
}

#[test]
fn test_shell_expansions_survive_rendering() {
    let template = loader().load("generic-db/base.yml").unwrap();
    let rendered = template.render(&TemplateValues::new());
    let script = rendered.script.to_string_lossy();
    assert!(script.contains("$(ls -d /etc/postgresql/*/main)"));
    assert!(rendered.unresolved.contains(&"DB_PASSWORD".to_string()));
}
