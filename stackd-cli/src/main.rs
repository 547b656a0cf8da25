use anyhow::Result;
use clap::{Parser, Subcommand};
use stackd_core::config::Config;
use stackd_core::types::{PortRule, StackKind};
use std::path::{Path, PathBuf};

mod commands;

#[derive(Parser)]
#[command(name = "stackd")]
#[command(about = "Stack provisioning orchestrator tooling", long_about = None)]
struct Cli {
    /// Configuration file (JSON)
    #[arg(short, long, global = true, env = "STACKD_CONFIG", default_value = "/etc/stackd/config.json")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List built-in stack profiles
    Profiles,

    /// Show the ingress rules a stack would open
    Rules {
        /// Stack type (e.g., "generic-db", "lms")
        stack: String,

        /// Requester source address or CIDR
        #[arg(long)]
        allowed_ip: String,

        /// Extra ports (PORT:SOURCE:LABEL, source and label optional)
        #[arg(short, long)]
        port: Vec<String>,
    },

    /// Render a stack's bootstrap template to stdout
    Render {
        /// Stack type
        stack: String,

        /// Template directory (overrides the configured one)
        #[arg(long)]
        template_dir: Option<PathBuf>,

        /// Placeholder values (KEY=VALUE)
        #[arg(short, long)]
        set: Vec<String>,
    },

    /// Post a payload to a callback URL and report the acknowledgement
    Notify {
        /// Callback URL
        url: String,

        /// JSON payload file (defaults to a sample payload)
        #[arg(long)]
        payload: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = load_config(&cli.config)?;
    stackd_core::init_observability(&config.log_level, config.metrics_port)
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))?;

    match cli.command {
        Commands::Profiles => {
            commands::profiles()?;
        }

        Commands::Rules { stack, allowed_ip, port } => {
            let ports = port.iter().map(|p| parse_port(p)).collect::<Result<Vec<_>>>()?;
            commands::rules(parse_stack(&stack)?, &allowed_ip, &ports)?;
        }

        Commands::Render { stack, template_dir, set } => {
            let values = set
                .iter()
                .map(|kv| {
                    let parts: Vec<&str> = kv.splitn(2, '=').collect();
                    if parts.len() != 2 {
                        return Err(anyhow::anyhow!("Invalid value format: {}", kv));
                    }
                    Ok((parts[0].to_string(), parts[1].to_string()))
                })
                .collect::<Result<Vec<_>>>()?;

            let dir = template_dir.unwrap_or_else(|| config.template_dir.clone());
            commands::render(parse_stack(&stack)?, &dir, values)?;
        }

        Commands::Notify { url, payload } => {
            commands::notify(&url, payload.as_deref(), config.callback_timeout()).await?;
        }
    }

    stackd_core::shutdown_observability();
    Ok(())
}

fn load_config(path: &Path) -> Result<Config> {
    let mut config = Config::load_from(path)?;
    config.apply_env()?;
    Ok(config)
}

fn parse_stack(stack: &str) -> Result<StackKind> {
    StackKind::parse(stack).ok_or_else(|| {
        let known: Vec<&str> = StackKind::ALL.iter().map(|k| k.as_str()).collect();
        anyhow::anyhow!("Unknown stack: {} (expected one of: {})", stack, known.join(", "))
    })
}

/// Parse `PORT[:SOURCE[:LABEL]]`.
fn parse_port(spec: &str) -> Result<PortRule> {
    let mut parts = spec.splitn(3, ':');
    let port = parts
        .next()
        .unwrap_or_default()
        .parse::<u16>()
        .map_err(|e| anyhow::anyhow!("Invalid port format: {}: {}", spec, e))?;
    Ok(PortRule {
        port,
        source: parts.next().unwrap_or_default().to_string(),
        label: parts.next().unwrap_or_default().to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_port() {
        let rule = parse_port("8443").unwrap();
        assert_eq!(rule.port, 8443);
        assert!(rule.source.is_empty());

        let rule = parse_port("22:0.0.0.0/0:ssh").unwrap();
        assert_eq!(rule.source, "0.0.0.0/0");
        assert_eq!(rule.label, "ssh");

        assert!(parse_port("http").is_err());
    }

    #[test]
    fn test_load_config_keeps_metrics_port() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"metrics_port": 9464, "log_level": "debug"}"#).unwrap();

        let config = load_config(&path).unwrap();
        if std::env::var("STACKD_METRICS_PORT").is_err() {
            assert_eq!(config.metrics_port, Some(9464));
        }
        assert_eq!(config.log_level, "debug");
    }

    #[test]
    fn test_parse_stack() {
        assert_eq!(parse_stack("generic-db").unwrap(), StackKind::GenericDb);
        assert!(parse_stack("mainframe").is_err());
    }
}
