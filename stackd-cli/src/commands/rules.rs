//! `stackd rules` command

use anyhow::Result;
use colored::Colorize;
use stackd_core::profiles::ProfileRegistry;
use stackd_core::rules::DEFAULT_GROUP;
use stackd_core::types::{normalize_cidr, PortRule, StackKind};
use tabled::{settings::Style, Table, Tabled};

#[derive(Tabled)]
struct RuleRow {
    #[tabled(rename = "LABEL")]
    label: String,
    #[tabled(rename = "DIRECTION")]
    direction: String,
    #[tabled(rename = "PROTOCOL")]
    protocol: String,
    #[tabled(rename = "PORTS")]
    ports: String,
    #[tabled(rename = "SOURCE")]
    cidr: String,
}

/// Show the ingress rules a stack would open for a requester
pub fn rules(stack: StackKind, allowed_ip: &str, ports: &[PortRule]) -> Result<()> {
    let registry = ProfileRegistry::new();
    let profile = registry.get(stack)?;

    if !ports.is_empty() && !profile.accepts_request_ports {
        eprintln!(
            "{} {} does not accept extra ports, ignoring {}",
            "⚠".yellow().bold(),
            stack.to_string().bold(),
            ports.len()
        );
    }

    let requester_cidr = normalize_cidr(allowed_ip)?;
    let specs = profile.rules_with_ports(ports)?;

    if specs.is_empty() {
        println!("No ingress rules for {}", stack);
        return Ok(());
    }

    let rows: Vec<RuleRow> = specs
        .iter()
        .map(|spec| spec.resolve(DEFAULT_GROUP, &requester_cidr))
        .map(|rule| RuleRow {
            label: rule.label,
            direction: rule.direction.to_string(),
            protocol: rule.protocol.to_string(),
            ports: if rule.port_min == rule.port_max {
                rule.port_min.to_string()
            } else {
                format!("{}-{}", rule.port_min, rule.port_max)
            },
            cidr: rule.cidr,
        })
        .collect();

    let mut table = Table::new(rows);
    table.with(Style::modern());

    println!("{}", table);
    println!("{} rules on security group {}", specs.len(), DEFAULT_GROUP.bold());

    Ok(())
}
