//! Navigation command: the menu the acting role would see.

use anyhow::Result;
use clap::Args;
use colored::*;
use serde::{Deserialize, Serialize};

use crate::client::ApiClient;
use crate::output::{self, OutputFormat};

#[derive(Args)]
pub struct NavArgs {
    /// Only show this category
    #[arg(short, long)]
    category: Option<String>,
}

#[derive(Debug, Deserialize, Serialize)]
struct NavPage {
    url: String,
    name: String,
}

#[derive(Debug, Deserialize, Serialize)]
struct NavGroup {
    category: Option<String>,
    pages: Vec<NavPage>,
}

pub async fn execute(args: NavArgs, client: &ApiClient, format: OutputFormat) -> Result<()> {
    let groups: Vec<NavGroup> = client
        .get::<Vec<NavGroup>>("/api/v1/me/navigation")
        .await?
        .into_iter()
        .filter(|g| match &args.category {
            Some(wanted) => g.category.as_deref() == Some(wanted.as_str()),
            None => true,
        })
        .collect();

    match format {
        OutputFormat::Table => {
            if groups.is_empty() {
                output::print_info("No accessible pages.");
                return Ok(());
            }
            for group in &groups {
                output::print_header(group.category.as_deref().unwrap_or("Other"));
                for page in &group.pages {
                    println!("  {}  {}", page.name, page.url.dimmed());
                }
            }
        }
        _ => output::print_item(&groups, format)?,
    }

    Ok(())
}
