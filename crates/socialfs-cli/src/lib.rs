//! socialfs command-line caller.
//!
//! ```bash
//! socialfs init
//! socialfs run --role user --user amy append post.txt "hello"
//! socialfs run --role moderator move /socialmedia/users/amy/post.txt /socialmedia/moderators/flagged
//! socialfs ops --role moderator
//! ```

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use socialfs_kernel::config::default_config_path;
use socialfs_kernel::{Dispatcher, NamespaceConfig, Principal, Role, RoleGate, bootstrap};

#[derive(Debug, Parser)]
#[command(name = "socialfs", version, about = "Role-gated filesystem commands")]
pub struct Cli {
    /// Config file (default: $XDG_CONFIG_HOME/socialfs/config.toml).
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Create the namespace directories with their modes.
    Init,
    /// List the operations a role may run.
    Ops {
        #[arg(long)]
        role: Role,
    },
    /// Dispatch one operation.
    Run {
        #[arg(long)]
        role: Role,
        /// Username behind the role; scopes regular users to their subtree.
        #[arg(long)]
        user: Option<String>,
        operation: String,
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        args: Vec<String>,
    },
}

/// Explicit path, then the XDG file, then defaults.
pub fn load_config(path: Option<&Path>) -> Result<NamespaceConfig> {
    match path {
        Some(path) => NamespaceConfig::load(path)
            .with_context(|| format!("Failed to load config from {}", path.display())),
        None => NamespaceConfig::load_default().with_context(|| {
            format!(
                "Failed to load config from {}",
                default_config_path().display()
            )
        }),
    }
}

/// Run a parsed command. `Ok(false)` means the operation itself failed.
pub async fn run(cli: Cli) -> Result<bool> {
    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Command::Init => {
            bootstrap(&config)
                .await
                .context("Failed to bootstrap namespace")?;
            println!("namespace ready at {}", config.base.display());
            Ok(true)
        }
        Command::Ops { role } => {
            for op in RoleGate::allowed(role) {
                let marker = if op.is_mutating() { "w" } else { "r" };
                println!("{marker} {:<8} {}", op.name(), op.shape().describe());
            }
            Ok(true)
        }
        Command::Run {
            role,
            user,
            operation,
            args,
        } => {
            let principal = match user {
                Some(name) => Principal::user(role, name),
                None => Principal::new(role),
            };
            let dispatcher = Dispatcher::new(config);
            tracing::debug!(base = %dispatcher.config().base.display(), "dispatching");
            let result = dispatcher.dispatch_named(principal, &operation, args).await;

            if let Some(warning) = &result.audit_warning {
                eprintln!("warning: {warning}");
            }
            if result.ok() {
                let text = result.render();
                if !text.is_empty() {
                    println!("{text}");
                }
                Ok(true)
            } else {
                eprintln!("{}", result.render());
                Ok(false)
            }
        }
    }
}
