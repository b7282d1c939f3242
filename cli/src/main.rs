use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use serde_json::{json, Map, Value};

use saferoute_kernel::config::ServiceConfig;
use saferoute_kernel::draft::ItemKind;
use saferoute_kernel::service::MapService;
use saferoute_kernel::snapshot::SystemClock;
use saferoute_kernel::store::FsBlobStore;

/// SafeRoute map annotation store
#[derive(Parser, Debug)]
#[command(name = "saferoute")]
#[command(about = "Edit map markers and polygons, save versions, roll back", long_about = None)]
struct Cli {
    /// Path to service config JSON
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Storage directory (overrides the config)
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create the draft, ledger, and default map if missing
    Init,

    /// Add an item to the draft
    Add {
        #[arg(long, value_enum)]
        kind: Kind,

        /// Item fields as a JSON object
        fields: String,
    },

    /// Replace an item's fields in the draft
    Update {
        #[arg(long, value_enum)]
        kind: Kind,

        id: String,

        /// Item fields as a JSON object
        fields: String,
    },

    /// Remove an item from the draft
    Delete {
        #[arg(long, value_enum)]
        kind: Kind,

        id: String,
    },

    /// Print the draft
    Draft,

    /// Commit the draft as a new version
    Save {
        #[arg(long)]
        name: Option<String>,

        #[arg(long)]
        comment: Option<String>,
    },

    /// Replace the draft with a map's current document
    Load {
        #[arg(long)]
        name: Option<String>,
    },

    /// List versions, newest first
    History {
        #[arg(long)]
        name: Option<String>,
    },

    /// Roll a map back to a snapshot
    Restore {
        #[arg(long)]
        name: Option<String>,

        #[arg(long)]
        snapshot: String,
    },

    /// Dump the raw ledger
    DebugVersions,

    /// Check a map's stored state for inconsistencies
    Audit {
        #[arg(long)]
        name: Option<String>,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum Kind {
    Marker,
    Polygon,
}

impl From<Kind> for ItemKind {
    fn from(kind: Kind) -> Self {
        match kind {
            Kind::Marker => ItemKind::Marker,
            Kind::Polygon => ItemKind::Polygon,
        }
    }
}

/// Response envelope on stdout
#[derive(Debug, Serialize)]
struct CliOutput {
    success: bool,
    #[serde(flatten)]
    body: Map<String, Value>,
}

fn setup_logging() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info,saferoute_kernel=info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .init();
}

fn parse_fields(raw: &str) -> Result<Map<String, Value>> {
    match serde_json::from_str::<Value>(raw).context("item fields are not valid JSON")? {
        Value::Object(fields) => Ok(fields),
        other => bail!("item fields must be a JSON object, got {other}"),
    }
}

fn load_config(cli: &Cli) -> Result<ServiceConfig> {
    let mut config = match &cli.config {
        Some(path) => ServiceConfig::from_json_file(path)?,
        None => ServiceConfig::default_config(),
    };
    if let Some(dir) = &cli.data_dir {
        config.data_dir = dir.clone();
    }
    Ok(config)
}

fn run(cli: Cli) -> Result<Value> {
    let config = load_config(&cli)?;
    let store = Arc::new(FsBlobStore::new(&config.data_dir));
    let service = MapService::new(Arc::clone(&store), SystemClock, config);

    let body = match cli.command {
        Command::Init => {
            service.initialize()?;
            json!({ "path": store.root() })
        }
        Command::Add { kind, fields } => {
            let id = service.add_item(kind.into(), parse_fields(&fields)?)?;
            json!({ "id": id })
        }
        Command::Update { kind, id, fields } => {
            service.update_item(kind.into(), &id, parse_fields(&fields)?)?;
            json!({})
        }
        Command::Delete { kind, id } => {
            service.delete_item(kind.into(), &id)?;
            json!({})
        }
        Command::Draft => json!({ "data": service.get_draft()? }),
        Command::Save { name, comment } => {
            let record = service.commit(name.as_deref(), comment.as_deref())?;
            json!({ "message": "map saved", "version": record })
        }
        Command::Load { name } => json!({ "data": service.load(name.as_deref())? }),
        Command::History { name } => json!({ "versions": service.history(name.as_deref())? }),
        Command::Restore { name, snapshot } => {
            let outcome = service.restore(name.as_deref(), &snapshot)?;
            json!({ "message": "version restored", "restore": outcome })
        }
        Command::DebugVersions => serde_json::to_value(service.inspect_versions()?)?,
        Command::Audit { name } => json!({ "report": service.audit(name.as_deref())? }),
    };

    Ok(body)
}

fn print(output: &CliOutput) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(output)?);
    Ok(())
}

fn main() -> Result<ExitCode> {
    setup_logging();
    let cli = Cli::parse();

    match run(cli) {
        Ok(Value::Object(body)) => {
            print(&CliOutput {
                success: true,
                body,
            })?;
            Ok(ExitCode::SUCCESS)
        }
        Ok(other) => {
            let mut body = Map::new();
            body.insert("data".into(), other);
            print(&CliOutput {
                success: true,
                body,
            })?;
            Ok(ExitCode::SUCCESS)
        }
        Err(err) => {
            tracing::error!("{err:#}");
            let mut body = Map::new();
            body.insert("error".into(), Value::String(format!("{err:#}")));
            print(&CliOutput {
                success: false,
                body,
            })?;
            Ok(ExitCode::FAILURE)
        }
    }
}
