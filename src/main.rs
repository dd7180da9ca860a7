// Local MCP Gateway - Main Entry Point
// Copyright 2026 Joseph Stone - All Rights Reserved
//
// CLI and MCP stdio server. All tool calls route through this gateway.
// Usage:
//   local-mcp [serve]                 # Run MCP server (stdio)
//   local-mcp tools                   # Print the tool catalogue
//   local-mcp check-path <path>       # One-shot path containment check
//   local-mcp check-sql <sql>         # One-shot SQL write-policy check
//   local-mcp status                  # Show loaded configuration

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use local_mcp::{config::Config, mcp, paths, policy, registry};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "local-mcp")]
#[command(author = "Joseph Stone")]
#[command(version)]
#[command(about = "Local MCP Gateway - policy-gated filesystem, git, search, Postgres and nerdctl tools over stdio")]
struct Cli {
    /// Config file (default: $LOCAL_MCP_CONFIG, config.yaml beside the binary, ~/.mcp/config.yaml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run MCP server (stdio JSON-RPC). The default.
    Serve,

    /// Print the tool catalogue as JSON
    Tools,

    /// Check whether a path is inside the allowed roots; exit 1 if not
    CheckPath {
        path: String,
    },

    /// Check a write statement against the SQL write policy; exit 1 if blocked
    CheckSql {
        sql: String,
    },

    /// Show the loaded configuration
    Status,
}

fn init_logging(config: &Config) {
    // RUST_LOG wins; otherwise logging.level from config.yaml
    let env = env_logger::Env::default().default_filter_or(config.logging.filter());
    let _ = env_logger::Builder::from_env(env).target(env_logger::Target::Stderr).try_init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Tool catalogue is static: no config needed
    if let Some(Commands::Tools) = &cli.command {
        println!("{}", serde_json::to_string_pretty(&registry::descriptors())?);
        return Ok(());
    }

    let (config, config_path) = Config::discover(cli.config.as_deref()).with_context(|| {
        format!(
            "Failed to load configuration (pass --config or set {})",
            paths::CONFIG_ENV
        )
    })?;
    init_logging(&config);
    log::info!("Config: {}", config_path.display());

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => {
            mcp::run_stdio(&config).context("stdio server failed")?;
        }

        Commands::Tools => {}

        Commands::CheckPath { path } => match policy::ensure_path_allowed(&path, &config.allowed_roots) {
            Ok(resolved) => println!("ALLOWED {}", resolved.display()),
            Err(e) => {
                println!("BLOCKED {}", e);
                std::process::exit(1);
            }
        },

        Commands::CheckSql { sql } => match policy::admit_sql_write(&sql, config.write_policy()) {
            Ok(statement) => println!("ALLOWED {}", statement),
            Err(e) => {
                println!("BLOCKED {}", e);
                std::process::exit(1);
            }
        },

        Commands::Status => {
            let policy = config.write_policy();
            println!("Local MCP Gateway v{}", env!("CARGO_PKG_VERSION"));
            println!("Config: {}", config_path.display());
            println!();
            println!("Allowed roots ({}):", config.allowed_roots.len());
            for root in &config.allowed_roots {
                println!("  + {}", root);
            }
            println!();
            println!("Postgres connections: {}", join_keys(config.postgres.connections.keys()));
            println!(
                "Write policy: allow_ddl={} allow_truncate={} require_where={} allow_multi_statement={}",
                policy.allow_ddl, policy.allow_truncate, policy.require_where, policy.allow_multi_statement
            );
            println!("ssh hosts: {}", join_keys(config.ssh.hosts.keys()));
            println!("nerdctl: {}", config.nerdctl.local_path);
            println!("Tool timeout: {}s", config.tool_timeout().as_secs());
            println!("Audit log: {}", config.logging.audit_log.as_deref().unwrap_or("(off)"));
        }
    }

    Ok(())
}

fn join_keys<'a>(keys: impl Iterator<Item = &'a String>) -> String {
    let names: Vec<&str> = keys.map(String::as_str).collect();
    if names.is_empty() {
        "(none)".to_string()
    } else {
        names.join(", ")
    }
}
