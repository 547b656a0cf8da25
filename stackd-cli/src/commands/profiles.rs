//! `stackd profiles` command

use anyhow::Result;
use stackd_core::profiles::ProfileRegistry;
use tabled::{settings::Style, Table, Tabled};

#[derive(Tabled)]
struct ProfileRow {
    #[tabled(rename = "STACK")]
    stack: String,
    #[tabled(rename = "NAME")]
    name: String,
    #[tabled(rename = "TEMPLATE")]
    template: String,
    #[tabled(rename = "BOOT")]
    boot: String,
    #[tabled(rename = "DISK")]
    disk: String,
    #[tabled(rename = "RULES")]
    rules: String,
    #[tabled(rename = "FLAVORS")]
    flavor_family: String,
}

/// List built-in stack profiles
pub fn profiles() -> Result<()> {
    let registry = ProfileRegistry::new();

    let rows: Vec<ProfileRow> = registry
        .list()
        .into_iter()
        .map(|profile| ProfileRow {
            stack: profile.kind.to_string(),
            name: profile.name.clone(),
            template: profile.template_id.clone(),
            boot: profile.boot_mode.to_string(),
            disk: format!("{}G", profile.default_disk_gb),
            rules: if profile.accepts_request_ports {
                format!("{} + request", profile.rules.len())
            } else {
                profile.rules.len().to_string()
            },
            flavor_family: profile.flavor_family.clone(),
        })
        .collect();

    let mut table = Table::new(rows);
    table.with(Style::modern());

    println!("{}", table);

    Ok(())
}
