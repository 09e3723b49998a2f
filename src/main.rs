use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use threatsentry::config::EngineConfig;

#[derive(Parser)]
#[command(
    name = "threatsentry",
    about = "Continuously-retrained anomaly detection for security event streams",
    version,
    long_about = None
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the daemon (API server + background trainer)
    Serve {
        /// Bind address
        #[arg(long, default_value = "0.0.0.0:8080")]
        bind: String,

        /// SQLite database path
        #[arg(long, default_value = "data/threatsentry.db")]
        db: String,
    },

    /// Run one training cycle and exit
    TrainOnce {
        /// SQLite database path
        #[arg(long, default_value = "data/threatsentry.db")]
        db: String,
    },

    /// List audit logs
    Logs {
        /// Which audit trail to list
        #[arg(value_enum)]
        kind: LogKind,

        /// Maximum entries to print, most recent first
        #[arg(long, default_value = "20")]
        limit: usize,

        /// SQLite database path
        #[arg(long, default_value = "data/threatsentry.db")]
        db: String,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum LogKind {
    Training,
    Detections,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = EngineConfig::from_env();

    match cli.command {
        Commands::Serve { bind, db } => {
            tracing::info!(%bind, "Starting threatsentry daemon");
            threatsentry::serve(&bind, &db, config).await?;
        }
        Commands::TrainOnce { db } => {
            use threatsentry::detect::model::ModelHolder;
            use threatsentry::trainer::{CycleOutcome, Trainer};

            let pool = threatsentry::storage::open_pool(&db)?;
            let holder = std::sync::Arc::new(ModelHolder::new());
            let trainer = Trainer::new(pool, holder.clone(), &config);

            match trainer.train_cycle().await? {
                CycleOutcome::Trained { count } => {
                    println!("Model trained on {} events.", count);
                    if let Some(at) = holder.last_trained_at() {
                        println!("Trained at: {}", at.to_rfc3339());
                    }
                }
                CycleOutcome::Skipped { have, needed } => {
                    println!(
                        "Not enough events to train: have {}, need {}.",
                        have, needed
                    );
                }
            }
        }
        Commands::Logs { kind, limit, db } => {
            let pool = threatsentry::storage::open_pool(&db)?;
            match kind {
                LogKind::Training => {
                    let logs = threatsentry::storage::list_training_logs(&pool, limit)?;
                    if logs.is_empty() {
                        println!("No training logs found.");
                    } else {
                        println!("{:<27} | {:<8} | Details", "Trained At", "Events");
                        println!("{:-<27}-|-{:-<8}-|-{:-<40}", "", "", "");
                        for log in logs {
                            println!(
                                "{:<27} | {:<8} | {}",
                                log.timestamp.to_rfc3339(),
                                log.record_count,
                                log.details
                            );
                        }
                    }
                }
                LogKind::Detections => {
                    let logs = threatsentry::storage::list_detection_logs(&pool, limit)?;
                    if logs.is_empty() {
                        println!("No detection logs found.");
                    } else {
                        println!(
                            "{:<27} | {:<16} | {:<10} | {:<9} | Score",
                            "Scored At", "IP", "User", "Verdict"
                        );
                        println!(
                            "{:-<27}-|-{:-<16}-|-{:-<10}-|-{:-<9}-|-{:-<10}",
                            "", "", "", "", ""
                        );
                        for log in logs {
                            println!(
                                "{:<27} | {:<16} | {:<10} | {:<9} | {:.4}",
                                log.timestamp.to_rfc3339(),
                                log.ip_address,
                                log.username,
                                log.prediction.to_string(),
                                log.anomaly_score
                            );
                        }
                    }
                }
            }
        }
    }

    Ok(())
}
