use anyhow::{bail, Context};
use clap::{Parser, Subcommand, ValueEnum};
use modelvault_core::{Metadata, TaskType};
use modelvault_features::{DemandInput, Period, ProductProfile, SalesHistory, ShippingInput};
use modelvault_serving::{PredictionService, ReferenceSet};
use modelvault_similarity::CatalogQuery;
use modelvault_storage::{ArtifactStore, StoreConfig};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

/// Model serving and versioning for the analytics app
#[derive(Parser, Debug)]
#[command(name = "modelvault")]
#[command(about = "Versioned model store and prediction service", long_about = None)]
struct Args {
    /// Path to the model store
    #[arg(long, default_value = "./models")]
    models_dir: PathBuf,

    /// Directory of bundled default artifacts
    #[arg(long)]
    bundled_dir: Option<PathBuf>,

    /// Directory of reference tables (seller dispatch, regions, baselines, catalog)
    #[arg(long)]
    reference_dir: Option<PathBuf>,

    /// Store configuration file; overrides --models-dir and --bundled-dir
    #[arg(long)]
    config: Option<PathBuf>,

    /// Log level
    #[arg(long, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Show the model status of every task
    Status,
    /// Validate and install a new active artifact
    Upload {
        #[arg(value_parser = parse_task)]
        task: TaskType,
        file: PathBuf,
        /// Metadata entry, `key=value`; the value is read as JSON when it parses
        #[arg(long = "meta", value_parser = parse_meta)]
        meta: Vec<(String, Value)>,
    },
    /// List archived artifacts, most recent first
    History {
        #[arg(value_parser = parse_task)]
        task: TaskType,
    },
    /// Make an archived artifact active again
    Restore {
        #[arg(value_parser = parse_task)]
        task: TaskType,
        id: String,
    },
    /// Delete one archived artifact
    Delete {
        #[arg(value_parser = parse_task)]
        task: TaskType,
        id: String,
    },
    /// Rank the active model's input features
    Importance {
        #[arg(value_parser = parse_task)]
        task: TaskType,
        #[arg(long, default_value_t = 10)]
        top: usize,
    },
    /// Search the reference catalog with a JSON query file
    Search { query: PathBuf },
    /// List catalog categories
    Categories {
        /// Print per-category counts, prices, ratings and orders
        #[arg(long)]
        stats: bool,
    },
    /// Run a prediction from a JSON request file (an array for batches)
    Predict {
        #[arg(value_enum)]
        kind: PredictKind,
        request: PathBuf,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum PredictKind {
    Shipping,
    Demand,
    Forecast,
    Sentiment,
    Similar,
}

#[derive(Deserialize)]
struct ForecastRequest {
    start: Period,
    periods: usize,
    #[serde(default)]
    product: ProductProfile,
    #[serde(default)]
    history: SalesHistory,
}

#[derive(Deserialize)]
struct SimilarRequest {
    item_id: Option<String>,
    vector: Option<Vec<f32>>,
    #[serde(default = "default_k")]
    k: usize,
    #[serde(default)]
    min_similarity: f64,
}

fn default_k() -> usize {
    5
}

#[derive(Deserialize)]
#[serde(untagged)]
enum OneOrMany<T> {
    Many(Vec<T>),
    One(T),
}

fn parse_task(s: &str) -> Result<TaskType, String> {
    s.parse().map_err(|e: modelvault_core::Error| e.to_string())
}

fn parse_meta(s: &str) -> Result<(String, Value), String> {
    let (key, raw) = s.split_once('=').ok_or_else(|| format!("expected key=value, got '{}'", s))?;
    let value = serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()));
    Ok((key.trim().to_string(), value))
}

fn read_json<T: for<'de> Deserialize<'de>>(path: &Path) -> anyhow::Result<T> {
    let bytes = std::fs::read(path).with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_slice(&bytes).with_context(|| format!("parsing {}", path.display()))
}

fn print<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn rows_json<T: Serialize>(rows: Vec<modelvault_core::Result<T>>) -> anyhow::Result<Value> {
    let rows = rows
        .into_iter()
        .map(|row| match row {
            Ok(prediction) => serde_json::to_value(prediction),
            Err(e) => Ok(serde_json::json!({ "error": e.to_string() })),
        })
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Value::Array(rows))
}

fn load_reference(dir: Option<&Path>) -> anyhow::Result<ReferenceSet> {
    match dir {
        Some(dir) => Ok(ReferenceSet::load_dir(dir)?),
        None => Ok(ReferenceSet::default()),
    }
}

fn predict(service: &PredictionService, kind: PredictKind, request: &Path) -> anyhow::Result<()> {
    match kind {
        PredictKind::Shipping => match read_json::<OneOrMany<ShippingInput>>(request)? {
            OneOrMany::One(input) => print(&service.predict_shipping(&input)?),
            OneOrMany::Many(inputs) => print(&rows_json(service.predict_shipping_batch(&inputs)?)?),
        },
        PredictKind::Demand => match read_json::<OneOrMany<DemandInput>>(request)? {
            OneOrMany::One(input) => print(&service.predict_demand(&input)?),
            OneOrMany::Many(inputs) => print(&rows_json(service.predict_demand_batch(&inputs)?)?),
        },
        PredictKind::Forecast => {
            let req: ForecastRequest = read_json(request)?;
            print(&service.forecast(req.start, req.periods, &req.product, &req.history)?)
        }
        PredictKind::Sentiment => match read_json::<OneOrMany<String>>(request)? {
            OneOrMany::One(text) => print(&service.predict_sentiment(&text)?),
            OneOrMany::Many(texts) => print(&rows_json(service.predict_sentiment_batch(&texts))?),
        },
        PredictKind::Similar => {
            let req: SimilarRequest = read_json(request)?;
            let recs = match (req.item_id, req.vector) {
                (Some(id), _) => service.recommend(&id, req.k, req.min_similarity)?,
                (None, Some(vector)) => service.recommend_by_vector(&vector, req.k)?,
                (None, None) => bail!("similar request needs an item_id or a vector"),
            };
            print(&recs)
        }
    }
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let log_level = match args.log_level.as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let config = match &args.config {
        Some(path) => StoreConfig::from_json_file(path)?,
        None => {
            let config = StoreConfig::new(&args.models_dir);
            match &args.bundled_dir {
                Some(dir) => config.with_bundled(dir),
                None => config,
            }
        }
    };
    info!("modelvault v{}", env!("CARGO_PKG_VERSION"));
    info!("Model store: {:?}", config.root);

    let store = Arc::new(ArtifactStore::open(config)?);

    match args.command {
        Command::Status => {
            let service = PredictionService::new(store, ReferenceSet::default());
            print(&service.status())?;
        }
        Command::Upload { task, file, meta } => {
            let bytes = std::fs::read(&file).with_context(|| format!("reading {}", file.display()))?;
            let metadata: Metadata = meta.into_iter().collect();
            let receipt = store.upload(task, &bytes, metadata)?;
            info!("Installed {} version {}", task, receipt.version);
            print(&receipt)?;
        }
        Command::History { task } => print(&store.list_history(task)?)?,
        Command::Restore { task, id } => {
            store.restore(task, &id)?;
            info!("Restored {} from {}", task, id);
            print(&store.status(task))?;
        }
        Command::Delete { task, id } => {
            store.delete(task, &id)?;
            info!("Deleted {} history entry {}", task, id);
        }
        Command::Importance { task, top } => {
            let service = PredictionService::new(store, ReferenceSet::default());
            match service.feature_importance(task, top)? {
                Some(ranked) => print(&ranked)?,
                None => bail!("the active {} model does not report feature importances", task),
            }
        }
        Command::Search { query } => {
            let service = PredictionService::new(store, load_reference(args.reference_dir.as_deref())?);
            let query: CatalogQuery = read_json(&query)?;
            print(&service.search_catalog(&query))?;
        }
        Command::Categories { stats } => {
            let service = PredictionService::new(store, load_reference(args.reference_dir.as_deref())?);
            if stats {
                print(&service.category_stats())?;
            } else {
                print(&service.categories())?;
            }
        }
        Command::Predict { kind, request } => {
            let service = PredictionService::new(store, load_reference(args.reference_dir.as_deref())?);
            predict(&service, kind, &request)?;
        }
    }

    Ok(())
}
