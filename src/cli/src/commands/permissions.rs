//! Permission catalog and grant commands.
//!
//! `list` shows the whole catalog, `mine` the acting role's grants, and
//! `grants` the grants of any role. `grant` and `revoke` edit one edge.

use anyhow::Result;
use clap::Subcommand;
use serde::{Deserialize, Serialize};
use tabled::Tabled;

use crate::client::ApiClient;
use crate::output::{self, OutputFormat};

#[derive(Subcommand)]
pub enum PermissionCommands {
    /// List the permission catalog
    List {
        /// Only show permissions in this module
        #[arg(short, long)]
        module: Option<String>,
    },

    /// Show the acting role's own permissions
    Mine,

    /// Show the permissions granted to a role
    Grants {
        /// Role ID
        role_id: i64,
    },

    /// Grant a permission to a role
    Grant {
        /// Role ID
        role_id: i64,
        /// Permission ID
        permission_id: i64,
    },

    /// Revoke a permission from a role
    Revoke {
        /// Role ID
        role_id: i64,
        /// Permission ID
        permission_id: i64,

        /// Skip confirmation
        #[arg(short, long)]
        force: bool,
    },
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
struct PermissionInfo {
    id: i64,
    module: String,
    resource: String,
    action: String,
    display_name: String,
    #[serde(default)]
    description: String,
    is_active: bool,
}

#[derive(Debug, Serialize, Tabled)]
struct PermissionRow {
    #[tabled(rename = "ID")]
    id: i64,
    #[tabled(rename = "Module")]
    module: String,
    #[tabled(rename = "Key")]
    key: String,
    #[tabled(rename = "Name")]
    display_name: String,
    #[tabled(rename = "Active")]
    active: String,
}

impl From<&PermissionInfo> for PermissionRow {
    fn from(p: &PermissionInfo) -> Self {
        Self {
            id: p.id,
            module: p.module.clone(),
            key: format!("{}:{}", p.resource, p.action),
            display_name: p.display_name.clone(),
            active: if p.is_active { "yes" } else { "no" }.to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
struct MyPermissions {
    role_id: i64,
    is_superuser: bool,
    permissions: Vec<PermissionInfo>,
}

#[derive(Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
struct GrantResult {
    role_id: i64,
    permission_id: i64,
    granted: bool,
}

fn print_permissions(perms: &[PermissionInfo], format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Table => {
            let rows: Vec<PermissionRow> = perms.iter().map(PermissionRow::from).collect();
            output::print_list(&rows, format)
        }
        _ => output::print_item(&perms, format),
    }
}

pub async fn execute(cmd: PermissionCommands, client: &ApiClient, format: OutputFormat) -> Result<()> {
    match cmd {
        PermissionCommands::List { module } => {
            let perms: Vec<PermissionInfo> = client
                .get::<Vec<PermissionInfo>>("/api/v1/permissions")
                .await?
                .into_iter()
                .filter(|p| module.as_deref().map_or(true, |m| p.module == m))
                .collect();
            print_permissions(&perms, format)?;
        }

        PermissionCommands::Mine => {
            let mine: MyPermissions = client.get("/api/v1/me/permissions").await?;
            match format {
                OutputFormat::Table => {
                    output::print_header(&format!("Role {}", mine.role_id));
                    if mine.is_superuser {
                        output::print_info("Superuser: every permission check passes");
                    }
                    print_permissions(&mine.permissions, format)?;
                }
                _ => output::print_item(&mine, format)?,
            }
        }

        PermissionCommands::Grants { role_id } => {
            let perms: Vec<PermissionInfo> = client
                .get(&format!("/api/v1/roles/{}/permissions", role_id))
                .await?;
            print_permissions(&perms, format)?;
        }

        PermissionCommands::Grant {
            role_id,
            permission_id,
        } => {
            let result: GrantResult = client
                .post_empty(&format!("/api/v1/roles/{}/permissions/{}", role_id, permission_id))
                .await?;
            match format {
                OutputFormat::Table => output::print_success(&format!(
                    "Granted permission {} to role {}",
                    result.permission_id, result.role_id
                )),
                _ => output::print_item(&result, format)?,
            }
        }

        PermissionCommands::Revoke {
            role_id,
            permission_id,
            force,
        } => {
            if !force {
                output::print_info(&format!(
                    "This will revoke permission {} from role {}. Use --force to confirm.",
                    permission_id, role_id
                ));
                return Ok(());
            }

            let result: GrantResult = client
                .delete(&format!("/api/v1/roles/{}/permissions/{}", role_id, permission_id))
                .await?;
            match format {
                OutputFormat::Table => output::print_success(&format!(
                    "Revoked permission {} from role {}",
                    result.permission_id, result.role_id
                )),
                _ => output::print_item(&result, format)?,
            }
        }
    }

    Ok(())
}
