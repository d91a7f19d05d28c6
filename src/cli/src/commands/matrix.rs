//! Page access matrix commands.
//!
//! `apply` reads a JSON or YAML list of `{pageUrl, roleId, accessLevel}`
//! entries, drops the ones that already match the server, and submits the
//! rest as one batch.

use anyhow::{Context, Result};
use clap::Subcommand;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use super::roles::RoleInfo;
use super::Level;
use crate::client::ApiClient;
use crate::output::{self, OutputFormat};

#[derive(Subcommand)]
pub enum MatrixCommands {
    /// Show the full page-by-role matrix
    Show,

    /// Show the acting role's effective level on a page
    Access {
        /// Page URL or a location below it
        page: String,
    },

    /// Set one cell of the matrix
    Set {
        /// Page URL
        page: String,
        /// Role ID
        role_id: i64,
        /// Access level
        #[arg(value_enum)]
        level: Level,
    },

    /// Apply a batch of changes from a JSON or YAML file
    Apply {
        /// Path to the change file
        file: PathBuf,

        /// Print the changes without saving them
        #[arg(long)]
        dry_run: bool,
    },

    /// Create a rule for every role and page pair that has none
    CreateAll {
        /// Skip confirmation
        #[arg(short, long)]
        force: bool,
    },
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
struct PageInfo {
    url: String,
    name: String,
    #[serde(default)]
    category: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
struct Cell {
    page_url: String,
    role_id: i64,
    access_level: String,
}

#[derive(Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
struct Configuration {
    roles: Vec<RoleInfo>,
    pages: Vec<PageInfo>,
    current_access: Vec<Cell>,
}

#[derive(Debug, Deserialize, Serialize)]
struct CommitReport {
    changes: usize,
    attempts: u32,
}

#[derive(Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
struct PageAccess {
    page_url: String,
    access_level: String,
    can_view: bool,
    can_edit: bool,
    can_create: bool,
    can_delete: bool,
}

#[derive(Debug, Deserialize, Serialize)]
struct Created {
    created: u64,
}

const CONFIGURATION: &str = "/api/v1/page-access/configuration";
const BULK_UPDATE: &str = "/api/v1/page-access/bulk-update";

impl Configuration {
    fn level(&self, page_url: &str, role_id: i64) -> &str {
        self.current_access
            .iter()
            .find(|c| c.page_url == page_url && c.role_id == role_id)
            .map(|c| c.access_level.as_str())
            .unwrap_or("none")
    }
}

/// Read a change file. The format follows the extension; anything other than
/// `.yaml`/`.yml` is parsed as JSON.
fn read_changes(path: &Path) -> Result<Vec<Cell>> {
    let content =
        std::fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;
    let is_yaml = matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("yaml") | Some("yml")
    );
    let cells: Vec<Cell> = if is_yaml {
        serde_yaml::from_str(&content).context("Failed to parse YAML change file")?
    } else {
        serde_json::from_str(&content).context("Failed to parse JSON change file")?
    };
    Ok(cells)
}

/// Cells that differ from the current matrix. Duplicate cells keep the last entry.
fn pending_changes(config: &Configuration, requested: Vec<Cell>) -> Vec<Cell> {
    let mut latest: BTreeMap<(String, i64), Cell> = BTreeMap::new();
    for cell in requested {
        latest.insert((cell.page_url.clone(), cell.role_id), cell);
    }
    latest
        .into_values()
        .filter(|c| config.level(&c.page_url, c.role_id) != c.access_level)
        .collect()
}

async fn submit(client: &ApiClient, changes: &[Cell], format: OutputFormat) -> Result<()> {
    let (report, message): (CommitReport, Option<String>) = client.post(BULK_UPDATE, &changes).await?;
    match format {
        OutputFormat::Table => output::print_success(
            &message.unwrap_or_else(|| format!("Saved {} change(s)", report.changes)),
        ),
        _ => output::print_item(&report, format)?,
    }
    Ok(())
}

pub async fn execute(cmd: MatrixCommands, client: &ApiClient, format: OutputFormat) -> Result<()> {
    match cmd {
        MatrixCommands::Show => {
            let config: Configuration = client.get(CONFIGURATION).await?;
            match format {
                OutputFormat::Table => {
                    let mut header = vec!["Page".to_string()];
                    header.extend(config.roles.iter().map(|r| r.name.clone()));
                    let rows = config
                        .pages
                        .iter()
                        .map(|page| {
                            let mut row = vec![page.url.clone()];
                            row.extend(config.roles.iter().map(|role| {
                                if role.is_superuser && role.is_active {
                                    output::level_cell("create")
                                } else {
                                    output::level_cell(config.level(&page.url, role.id))
                                }
                            }));
                            row
                        })
                        .collect();
                    output::print_grid(header, rows);
                }
                _ => output::print_item(&config, format)?,
            }
        }

        MatrixCommands::Access { page } => {
            let access: PageAccess = client
                .get(&format!("/api/v1/me/access?page={}", encode_query(&page)))
                .await?;
            match format {
                OutputFormat::Table => {
                    output::print_header(&access.page_url);
                    output::print_detail("Level", &output::level_cell(&access.access_level));
                    output::print_detail("View", &access.can_view.to_string());
                    output::print_detail("Edit", &access.can_edit.to_string());
                    output::print_detail("Create", &access.can_create.to_string());
                    output::print_detail("Delete", &access.can_delete.to_string());
                }
                _ => output::print_item(&access, format)?,
            }
        }

        MatrixCommands::Set {
            page,
            role_id,
            level,
        } => {
            let change = Cell {
                page_url: page,
                role_id,
                access_level: level.as_str().to_string(),
            };
            submit(client, &[change], format).await?;
        }

        MatrixCommands::Apply { file, dry_run } => {
            let requested = read_changes(&file)?;
            let config: Configuration = client.get(CONFIGURATION).await?;
            let changes = pending_changes(&config, requested);

            if changes.is_empty() {
                output::print_info("No changes to save");
                return Ok(());
            }

            if dry_run {
                match format {
                    OutputFormat::Table => {
                        let rows = changes
                            .iter()
                            .map(|c| {
                                vec![
                                    c.page_url.clone(),
                                    c.role_id.to_string(),
                                    output::level_cell(config.level(&c.page_url, c.role_id)),
                                    output::level_cell(&c.access_level),
                                ]
                            })
                            .collect();
                        output::print_grid(
                            vec!["Page".into(), "Role".into(), "Current".into(), "New".into()],
                            rows,
                        );
                    }
                    _ => output::print_item(&changes, format)?,
                }
                return Ok(());
            }

            submit(client, &changes, format).await?;
        }

        MatrixCommands::CreateAll { force } => {
            if !force {
                output::print_info(
                    "This will create a rule for every role and page without one. Use --force to confirm.",
                );
                return Ok(());
            }
            let created: Created = client.post_empty("/api/v1/page-access/create-all").await?;
            match format {
                OutputFormat::Table => output::print_success(&format!("Created {} rule(s)", created.created)),
                _ => output::print_item(&created, format)?,
            }
        }
    }

    Ok(())
}

/// Percent-encode a query value. Page URLs only need the reserved characters handled.
fn encode_query(value: &str) -> String {
    value
        .bytes()
        .map(|b| match b {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' | b'/' => (b as char).to_string(),
            other => format!("%{:02X}", other),
        })
        .collect()
}
