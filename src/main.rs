use std::path::PathBuf;
use std::sync::Arc;
use std::thread;

use anyhow::Context;
use chrono::Utc;
use clap::Parser;

use metar_monitor::alert::channel::WebhookChannel;
use metar_monitor::alert::cooldown::{CooldownStore, MemoryCooldownStore};
use metar_monitor::alert::router::{CooldownRouter, RouterPolicy};
use metar_monitor::config::MonitorConfig;
use metar_monitor::cycle::CycleRunner;
use metar_monitor::ingest::aviationweather::AviationWeatherSource;
use metar_monitor::logging::{self, Component};
use metar_monitor::stations::MemoryRegistry;
use metar_monitor::store::memory::{MemoryObservationStore, MemoryRunStore};
use metar_monitor::store::postgres::PgStore;
use metar_monitor::store::{self, ObservationStore, Retention, RunStore};

#[derive(Debug, Parser)]
#[command(version, about = "METAR station health monitor", long_about = None)]
struct Args {
    /// Monitor configuration file
    #[arg(long, default_value = "monitor.toml", env = "METAR_MONITOR_CONFIG")]
    config: PathBuf,

    /// Run a single cycle and exit
    #[arg(long)]
    once: bool,

    /// Default log filter; RUST_LOG takes precedence
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Append logs to this file instead of stderr
    #[arg(long)]
    log_file: Option<PathBuf>,

    /// Omit timestamps from console output (e.g. under journald)
    #[arg(long)]
    no_timestamps: bool,
}

struct Stores {
    runs: Arc<dyn RunStore>,
    observations: Arc<dyn ObservationStore>,
    cooldowns: Arc<dyn CooldownStore>,
}

fn open_stores(config: &MonitorConfig) -> anyhow::Result<Stores> {
    match &config.database_url {
        Some(url) => {
            let pg = Arc::new(PgStore::connect_and_verify(url).context("connecting to PostgreSQL")?);
            Ok(Stores {
                runs: pg.clone(),
                observations: pg.clone(),
                cooldowns: pg,
            })
        }
        None => {
            tracing::warn!(
                component = %Component::Store,
                "DATABASE_URL not set; run records and cooldowns are kept in memory only"
            );
            Ok(Stores {
                runs: Arc::new(MemoryRunStore::new()),
                observations: Arc::new(MemoryObservationStore::new()),
                cooldowns: Arc::new(MemoryCooldownStore::new()),
            })
        }
    }
}

fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    let args = Args::parse();

    logging::init_logger(&args.log_level, args.log_file.as_deref(), !args.no_timestamps)
        .map_err(anyhow::Error::msg)?;

    let config = MonitorConfig::load(&args.config, |key| std::env::var(key).ok())
        .with_context(|| format!("loading {}", args.config.display()))?;
    let registry = Arc::new(
        MemoryRegistry::load_from_path(&config.registry_path)
            .with_context(|| format!("loading station registry {}", config.registry_path.display()))?,
    );
    tracing::info!(
        component = %Component::System,
        stations = registry.station_count(),
        cooldown_minutes = config.cooldown_minutes.unwrap_or_default(),
        "metar monitor starting"
    );

    let stores = open_stores(&config)?;
    let source = Arc::new(
        AviationWeatherSource::new(&config.source_url, config.lookback_hours, config.fetch_timeout())
            .context("building observation client")?,
    );
    let channel = Arc::new(WebhookChannel::new(config.fetch_timeout()).context("building webhook client")?);
    let router = CooldownRouter::new(
        registry.clone(),
        stores.cooldowns.clone(),
        channel,
        RouterPolicy::from_config(&config),
    );
    let runner = CycleRunner::new(&config, registry, source, stores.runs.clone(), router)
        .with_observation_store(stores.observations.clone());

    let retention = Retention::from_config(&config);

    loop {
        if let Err(e) = runner.run_cycle_now() {
            tracing::error!(component = %Component::System, "cycle aborted: {}", e);
        }
        store::sweep_expired(
            stores.runs.as_ref(),
            Some(stores.observations.as_ref()),
            Some(stores.cooldowns.as_ref()),
            Utc::now(),
            &retention,
        );

        if args.once {
            return Ok(());
        }
        thread::sleep(config.poll_interval());
    }
}
