//! AckVision CLI
//!
//! A command-line tool for requesting student predictions, advisory tips,
//! model metrics and service health from the AckVision API.

mod client;
mod commands;
mod config;
mod output;

use anyhow::Result;
use clap::{Parser, Subcommand};
use commands::{advise, predict, status};
use std::path::PathBuf;

/// AckVision CLI
#[derive(Parser)]
#[command(name = "ackv")]
#[command(author, version, about = "CLI for the AckVision student performance service", long_about = None)]
pub struct Cli {
    /// API endpoint URL (can also be set via ACKV_API_URL or ~/.config/ackv/config.json)
    #[arg(long, env = "ACKV_API_URL")]
    pub api_url: Option<String>,

    /// Output format
    #[arg(long, short, default_value = "table")]
    pub format: output::OutputFormat,

    /// Enable verbose output
    #[arg(long, short)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Predict exam score, pass/fail, performance and risk for one student
    Predict(StudentArgs),

    /// Predict every row of a CSV file
    Batch {
        /// CSV file with one student per row
        file: PathBuf,
    },

    /// Get study tips for a set of predictions
    Advise {
        /// Predicted exam score
        #[arg(long, default_value_t = 0.0)]
        score: f64,

        /// Pass/fail label
        #[arg(long)]
        pass_fail: String,

        /// Performance category
        #[arg(long)]
        performance: String,

        /// Risk cluster label
        #[arg(long)]
        risk: String,

        #[arg(long)]
        attendance: Option<f64>,

        #[arg(long)]
        study_hours: Option<f64>,

        #[arg(long)]
        sleep_hours: Option<f64>,

        #[arg(long)]
        internet_usage: Option<f64>,
    },

    /// Show evaluation metrics for every model
    Metrics,

    /// Show service health and readiness
    Health,
}

#[derive(clap::Args)]
pub struct StudentArgs {
    /// Attendance percentage
    #[arg(long)]
    pub attendance: f64,

    /// Study hours per day
    #[arg(long)]
    pub study_hours: f64,

    /// Average assignment score
    #[arg(long)]
    pub assignment_score: f64,

    /// Previous GPA
    #[arg(long)]
    pub previous_gpa: f64,

    /// Participation level (Low, Medium, High)
    #[arg(long)]
    pub participation: String,

    /// Daily internet usage in hours
    #[arg(long)]
    pub internet_usage: f64,

    /// Nightly sleep hours
    #[arg(long)]
    pub sleep_hours: f64,

    /// Family support rating
    #[arg(long)]
    pub family_support: f64,

    /// Extra-curricular activities (Yes, No)
    #[arg(long)]
    pub extra_curricular: String,
}

impl From<StudentArgs> for client::StudentRecord {
    fn from(args: StudentArgs) -> Self {
        Self {
            attendance: args.attendance,
            study_hours: args.study_hours,
            assignment_score: args.assignment_score,
            previous_gpa: args.previous_gpa,
            participation_level: args.participation,
            internet_usage: args.internet_usage,
            sleep_hours: args.sleep_hours,
            family_support: args.family_support,
            extra_curricular: args.extra_curricular,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = config::Config::load()?;
    let api_url = config.resolve_api_url(cli.api_url.as_deref());
    if cli.verbose {
        eprintln!("Using API at {}", api_url);
    }

    // Initialize client
    let client = client::ApiClient::new(&api_url)?;

    // Execute command
    match cli.command {
        Commands::Predict(args) => {
            predict::predict(&client, &args.into(), cli.format).await?;
        }
        Commands::Batch { file } => {
            predict::batch(&client, &file, cli.format).await?;
        }
        Commands::Advise {
            score,
            pass_fail,
            performance,
            risk,
            attendance,
            study_hours,
            sleep_hours,
            internet_usage,
        } => {
            let request = client::AdvisoryRequest {
                exam_score: score,
                pass_fail,
                performance,
                risk_cluster: risk,
                attendance,
                study_hours,
                sleep_hours,
                internet_usage,
            };
            advise::advise(&client, &request, cli.format).await?;
        }
        Commands::Metrics => {
            status::show_metrics(&client, cli.format).await?;
        }
        Commands::Health => {
            status::show_health(&client, cli.format).await?;
        }
    }

    Ok(())
}
