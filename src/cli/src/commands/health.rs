//! Health check command.
//!
//! Queries the `/health` endpoint and displays server status.

use anyhow::Result;
use chrono::{DateTime, Local, Utc};
use clap::Args;

use crate::client::ApiClient;
use crate::output::{self, OutputFormat};

#[derive(Args)]
pub struct HealthArgs {
    /// Show timestamps in local time instead of UTC
    #[arg(short, long)]
    local: bool,
}

pub async fn execute(args: HealthArgs, client: &ApiClient, format: OutputFormat) -> Result<()> {
    let health: serde_json::Value = client.get_raw("/health").await?;

    match format {
        OutputFormat::Table => {
            let status = health
                .get("status")
                .and_then(|v| v.as_str())
                .unwrap_or("unknown");

            output::print_header("System Health");
            output::print_detail("Status", status);
            output::print_detail("API URL", client.base_url());

            if let Some(store) = health.get("store").and_then(|v| v.as_str()) {
                output::print_detail("Store", store);
            }

            if let Some(version) = health.get("version").and_then(|v| v.as_str()) {
                output::print_detail("Version", version);
            }

            if let Some(ts) = health.get("timestamp").and_then(|v| v.as_str()) {
                output::print_detail("Timestamp", &format_timestamp(ts, args.local));
            }

            if status == "healthy" {
                output::print_success("All systems operational");
            } else {
                output::print_error(&format!("System status: {}", status));
            }
        }
        _ => output::print_item(&health, format)?,
    }

    Ok(())
}

fn format_timestamp(raw: &str, local: bool) -> String {
    match DateTime::parse_from_rfc3339(raw) {
        Ok(ts) if local => ts.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S %Z").to_string(),
        Ok(ts) => ts.with_timezone(&Utc).format("%Y-%m-%d %H:%M:%S UTC").to_string(),
        Err(_) => raw.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_timestamp() {
        assert_eq!(
            format_timestamp("2026-03-01T10:15:00+00:00", false),
            "2026-03-01 10:15:00 UTC"
        );
        assert_eq!(format_timestamp("not a time", false), "not a time");
    }
}
