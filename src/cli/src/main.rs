//! AccessGate CLI - Command-line interface for the AccessGate access control server.
//!
//! Provides commands for roles, permissions, the page access matrix,
//! navigation, health, and local configuration.

mod client;
mod commands;
mod output;

use anyhow::Result;
use clap::{Parser, Subcommand};

use commands::{config, health, matrix, nav, permissions, roles};
use output::OutputFormat;

/// AccessGate - Role-based page and permission access control CLI
#[derive(Parser)]
#[command(
    name = "accessgate",
    version,
    about = "AccessGate - Role-based page and permission access control",
    long_about = "CLI tool for inspecting roles and permissions and editing the page access matrix.",
    propagate_version = true
)]
pub struct Cli {
    /// Output format
    #[arg(short, long, global = true, default_value = "table")]
    output: OutputFormat,

    /// API server URL
    #[arg(long, global = true, env = "ACCESSGATE_API_URL")]
    api_url: Option<String>,

    /// Role id to act as (sent in the X-Role-Id header)
    #[arg(long = "as-role", global = true, env = "ACCESSGATE_ROLE")]
    as_role: Option<i64>,

    /// Disable colored output
    #[arg(long, global = true)]
    no_color: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Role listing
    #[command(subcommand)]
    Roles(roles::RoleCommands),

    /// Permission catalog and role grants
    #[command(subcommand)]
    Permissions(permissions::PermissionCommands),

    /// Page access matrix operations
    #[command(subcommand)]
    Matrix(matrix::MatrixCommands),

    /// Show the navigation menu for the acting role
    Nav(nav::NavArgs),

    /// Check system health
    Health(health::HealthArgs),

    /// Configuration management
    #[command(subcommand)]
    Config(config::ConfigCommands),
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if cli.no_color {
        colored::control::set_override(false);
    }

    let api_url = cli
        .api_url
        .clone()
        .or_else(config::load_api_url)
        .unwrap_or_else(|| "http://localhost:8080".to_string());
    let role_id = cli.as_role.or_else(config::load_role);

    let client = client::ApiClient::new(&api_url, role_id)?;
    let format = cli.output;

    let result = match cli.command {
        Commands::Roles(cmd) => roles::execute(cmd, &client, format).await,
        Commands::Permissions(cmd) => permissions::execute(cmd, &client, format).await,
        Commands::Matrix(cmd) => matrix::execute(cmd, &client, format).await,
        Commands::Nav(args) => nav::execute(args, &client, format).await,
        Commands::Health(args) => health::execute(args, &client, format).await,
        Commands::Config(cmd) => config::execute(cmd, format).await,
    };

    if let Err(e) = result {
        output::print_error(&format!("{:#}", e));
        std::process::exit(1);
    }

    Ok(())
}
