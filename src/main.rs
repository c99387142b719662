use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use courier::auth::{Credentials, TokenProvider};
use courier::banner::{BannerInfo, print_banner};
use courier::broker::camunda::CamundaBroker;
use courier::config::Settings;
use courier::handlers::{Registry, lead};
use courier::worker::{Worker, WorkerOptions};

#[derive(Parser)]
#[command(name = "courier", version, about = "Fetches external tasks, delivers results.")]
struct Cli {
    /// Env file with the cluster credentials
    #[arg(long, default_value = ".env")]
    env_file: PathBuf,

    /// Worker id reported to the broker
    #[arg(long)]
    worker_id: Option<String>,

    /// Maximum tasks locked per poll
    #[arg(long)]
    max_tasks: Option<usize>,

    /// Run a single poll cycle and exit (deployment smoke test)
    #[arg(long, default_value_t = false)]
    once: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // A missing env file is fine — the variables may already be in the
    // real environment (e.g. in a container).
    let _ = dotenvy::from_path(&cli.env_file);

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    // Fail here, before any network call, if credentials are missing
    let settings = Settings::from_env()?;

    let mut options = WorkerOptions::default();
    if let Some(worker_id) = cli.worker_id {
        options.worker_id = worker_id;
    }
    if let Some(max_tasks) = cli.max_tasks {
        options.max_tasks = max_tasks;
    }

    let tokens = TokenProvider::new(Credentials::from(&settings));
    let broker = Arc::new(CamundaBroker::new(settings.address.clone(), tokens));

    let registry = Arc::new(Registry::new());
    lead::subscribe_all(&registry).await?;

    let topics = registry.topics().await;
    print_banner(&BannerInfo {
        worker_id: &options.worker_id,
        address: &settings.address,
        topics: &topics,
        max_tasks: options.max_tasks,
    });

    let worker = Worker::new(broker, registry, options);

    if cli.once {
        let handled = worker.poll_once().await?;
        info!(handled, "single poll done");
        return Ok(());
    }

    // Block until terminated. Ctrl+C is a normal shutdown, exit code 0.
    tokio::select! {
        result = worker.run() => result,
        _ = tokio::signal::ctrl_c() => {
            info!("shutting down");
            Ok(())
        }
    }
}
