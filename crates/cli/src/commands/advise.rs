//! Advisory lookup command

use anyhow::Result;
use colored::Colorize;

use crate::client::{AdvisoryRequest, AdvisoryResponse, ApiClient};
use crate::output::{print_json, print_warning, OutputFormat};

/// Fetch study tips for an existing set of predictions
pub async fn advise(client: &ApiClient, request: &AdvisoryRequest, format: OutputFormat) -> Result<()> {
    let result: AdvisoryResponse = client.post("advisory", request).await?;

    match format {
        OutputFormat::Json => print_json(&result)?,
        OutputFormat::Table => {
            if result.advisory.is_empty() {
                print_warning("No advice for these predictions");
                return Ok(());
            }
            println!("{}", "Advisory".bold());
            println!("{}", "-".repeat(50));
            for tip in &result.advisory {
                println!("  {}", tip);
            }
        }
    }

    Ok(())
}
