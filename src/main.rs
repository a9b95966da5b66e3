use std::path::{Path, PathBuf};

use anyhow::Context;
use chrono::Utc;
use clap::{Parser, Subcommand};
use sqlx::sqlite::SqlitePoolOptions;
use tracing_subscriber::EnvFilter;

mod anomaly;
mod comparative;
mod db;
mod error;
mod evaluation;
mod events;
mod ingest;
mod models;
mod pipeline;
mod report;
mod stats;
mod trends;

use events::ArtifactLog;
use models::RestaurantData;
use pipeline::{Session, AD_EVALUATION_ARTIFACT, TRENDS_ARTIFACT};

#[derive(Parser)]
#[command(name = "restaurant-insights")]
#[command(about = "Performance trends, anomalies and peer comparison for restaurant partners", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run trends, anomaly detection and the markdown summary for one session
    Analyze {
        #[arg(long)]
        input: PathBuf,
        /// Daily metrics CSV replacing the document's daily series
        #[arg(long)]
        metrics_csv: Option<PathBuf>,
        #[arg(long)]
        ad_evaluation: Option<PathBuf>,
        #[arg(long)]
        session_id: Option<String>,
        #[arg(long, default_value = ".artifacts")]
        artifacts_dir: PathBuf,
    },
    /// Compute performance trends and peer comparison
    Trends {
        #[arg(long)]
        input: PathBuf,
        #[arg(long)]
        metrics_csv: Option<PathBuf>,
        #[arg(long)]
        session_id: String,
        #[arg(long, default_value = ".artifacts")]
        artifacts_dir: PathBuf,
    },
    /// Detect anomalies using the session's saved trends
    Anomalies {
        #[arg(long)]
        input: PathBuf,
        #[arg(long)]
        metrics_csv: Option<PathBuf>,
        #[arg(long)]
        ad_evaluation: Option<PathBuf>,
        #[arg(long)]
        session_id: String,
        #[arg(long, default_value = ".artifacts")]
        artifacts_dir: PathBuf,
    },
    /// Score a session with the standard rubric or a rubric file
    Score {
        #[arg(long, required_unless_present = "rubric", conflicts_with = "rubric")]
        data_accuracy: Option<f64>,
        #[arg(long, required_unless_present = "rubric", conflicts_with = "rubric")]
        insight_quality: Option<f64>,
        #[arg(long, required_unless_present = "rubric", conflicts_with = "rubric")]
        completeness: Option<f64>,
        #[arg(long, required_unless_present = "rubric", conflicts_with = "rubric")]
        confidence_calibration: Option<f64>,
        /// JSON object of dimension -> {score, weight}
        #[arg(long)]
        rubric: Option<PathBuf>,
    },
    /// Summarize the evaluation history
    EvalTrends {
        #[arg(long)]
        workflow_type: Option<String>,
        #[arg(long, default_value_t = 10)]
        limit: i64,
        #[arg(long)]
        json: bool,
    },
}

fn load_input(input: &Path, metrics_csv: Option<&Path>) -> anyhow::Result<RestaurantData> {
    let mut data = ingest::load_restaurant_data(input)?;
    if let Some(csv) = metrics_csv {
        data.daily_metrics = ingest::read_daily_metrics_csv(csv)?;
    }
    Ok(data)
}

fn ad_evaluation_path(session: &Session<'_>, explicit: Option<PathBuf>) -> PathBuf {
    explicit.unwrap_or_else(|| session.artifact(AD_EVALUATION_ARTIFACT))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Analyze {
            input,
            metrics_csv,
            ad_evaluation,
            session_id,
            artifacts_dir,
        } => {
            let session_id = session_id.unwrap_or_else(pipeline::new_session_id);
            let log = ArtifactLog::new(artifacts_dir.join(&session_id));
            let session = Session::new(session_id, &artifacts_dir, Utc::now(), &log);

            let data = load_input(&input, metrics_csv.as_deref())?;
            let ads = ingest::load_ad_evaluation(&ad_evaluation_path(&session, ad_evaluation))?;

            let trends_report = session.trends(&data)?;
            let anomaly_report =
                session.anomalies(&data, &trends_report.performance_trends, &ads)?;
            let summary = session.summary(&trends_report, &anomaly_report)?;

            println!("Session {} complete.", session.id);
            println!(
                "{} anomalies, overall risk {:?}.",
                anomaly_report.anomaly_summary.total_anomalies,
                anomaly_report.risk_assessment.overall_risk_level
            );
            println!("Report written to {}.", summary.display());
        }
        Commands::Trends {
            input,
            metrics_csv,
            session_id,
            artifacts_dir,
        } => {
            let log = ArtifactLog::new(artifacts_dir.join(&session_id));
            let session = Session::new(session_id, &artifacts_dir, Utc::now(), &log);

            let data = load_input(&input, metrics_csv.as_deref())?;
            session.trends(&data)?;
            println!("Trends written to {}.", session.artifact(TRENDS_ARTIFACT).display());
        }
        Commands::Anomalies {
            input,
            metrics_csv,
            ad_evaluation,
            session_id,
            artifacts_dir,
        } => {
            let log = ArtifactLog::new(artifacts_dir.join(&session_id));
            let session = Session::new(session_id, &artifacts_dir, Utc::now(), &log);

            let data = load_input(&input, metrics_csv.as_deref())?;
            let trends = pipeline::load_trends(&session.artifact(TRENDS_ARTIFACT))
                .context("run the trends command for this session first")?;
            let ads = ingest::load_ad_evaluation(&ad_evaluation_path(&session, ad_evaluation))?;

            let report = session.anomalies(&data, &trends, &ads)?;
            println!("{}", serde_json::to_string_pretty(&report.anomaly_summary)?);
        }
        Commands::Score {
            data_accuracy,
            insight_quality,
            completeness,
            confidence_calibration,
            rubric,
        } => {
            let rubric = match rubric {
                Some(path) => ingest::read_json::<evaluation::Rubric>(&path)?,
                None => evaluation::standard_rubric([
                    data_accuracy.unwrap_or_default(),
                    insight_quality.unwrap_or_default(),
                    completeness.unwrap_or_default(),
                    confidence_calibration.unwrap_or_default(),
                ]),
            };
            let scorecard = evaluation::Scorecard::from_rubric(rubric);
            println!("{}", serde_json::to_string_pretty(&scorecard)?);
        }
        Commands::EvalTrends {
            workflow_type,
            limit,
            json,
        } => {
            let database_url = std::env::var("DATABASE_URL")
                .context("DATABASE_URL must point at the evaluation history SQLite database")?;

            let pool = SqlitePoolOptions::new()
                .max_connections(5)
                .connect(&database_url)
                .await
                .context("failed to connect to SQLite")?;

            let history = db::fetch_evaluations(&pool, workflow_type.as_deref(), limit).await?;
            if history.is_empty() {
                println!("No evaluations found.");
                return Ok(());
            }

            let trend = evaluation::score_trend(&history)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&trend)?);
                return Ok(());
            }

            let latest = &trend.latest_evaluation;
            println!(
                "Latest: evaluation {} of {} (session {}) at {}",
                latest.evaluation_id,
                latest.workflow_type,
                latest.session_id,
                latest
                    .created_at
                    .map(|t| t.to_string())
                    .unwrap_or_else(|| "unknown time".to_string())
            );
            println!(
                "{} evaluations, average {:.2}, latest {:.2} ({:?})",
                trend.total_evaluations, trend.average_score, trend.latest_score, trend.trend
            );
            println!(
                "Range {:.2} (lowest {:.2}, highest {:.2})",
                trend.score_range, trend.lowest_score, trend.highest_score
            );
            for (dimension, score) in &trend.latest_rubric_breakdown {
                println!("- {dimension}: {score:.1}");
            }
            if let Some(err) = &trend.rubric_error {
                println!("Latest rubric unreadable: {err}");
            }
        }
    }

    Ok(())
}
