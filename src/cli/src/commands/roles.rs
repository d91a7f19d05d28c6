//! Role commands.

use anyhow::Result;
use clap::Subcommand;
use serde::{Deserialize, Serialize};
use tabled::Tabled;

use crate::client::ApiClient;
use crate::output::{self, OutputFormat};

#[derive(Subcommand)]
pub enum RoleCommands {
    /// List all roles
    List {
        /// Include inactive roles
        #[arg(short, long)]
        all: bool,
    },
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoleInfo {
    pub id: i64,
    pub name: String,
    pub display_name: String,
    pub level: i32,
    pub is_active: bool,
    pub is_superuser: bool,
}

#[derive(Debug, Serialize, Tabled)]
struct RoleRow {
    #[tabled(rename = "ID")]
    id: i64,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Display Name")]
    display_name: String,
    #[tabled(rename = "Level")]
    level: i32,
    #[tabled(rename = "Active")]
    active: String,
    #[tabled(rename = "Superuser")]
    superuser: String,
}

impl From<&RoleInfo> for RoleRow {
    fn from(r: &RoleInfo) -> Self {
        Self {
            id: r.id,
            name: r.name.clone(),
            display_name: r.display_name.clone(),
            level: r.level,
            active: yes_no(r.is_active),
            superuser: yes_no(r.is_superuser),
        }
    }
}

fn yes_no(flag: bool) -> String {
    if flag { "yes" } else { "no" }.to_string()
}

/// Fetch the role list, sorted by rank then id.
pub async fn fetch_roles(client: &ApiClient) -> Result<Vec<RoleInfo>> {
    let mut roles: Vec<RoleInfo> = client.get("/api/v1/roles").await?;
    roles.sort_by(|a, b| b.level.cmp(&a.level).then(a.id.cmp(&b.id)));
    Ok(roles)
}

pub async fn execute(cmd: RoleCommands, client: &ApiClient, format: OutputFormat) -> Result<()> {
    match cmd {
        RoleCommands::List { all } => {
            let roles: Vec<RoleInfo> = fetch_roles(client)
                .await?
                .into_iter()
                .filter(|r| all || r.is_active)
                .collect();

            match format {
                OutputFormat::Table => {
                    let rows: Vec<RoleRow> = roles.iter().map(RoleRow::from).collect();
                    output::print_list(&rows, format)?;
                }
                _ => output::print_item(&roles, format)?,
            }
        }
    }
    Ok(())
}
