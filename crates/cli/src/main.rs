use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use serde::Serialize;
use tracing::{info, warn};
use wings_api::{ClientConfig, ConfigOverrides, RequestContext, WingsClient};
use wings_provider::{Diagnostics, ResourceLifecycle, ValueResource, ValueResourceModel, to_value, variant_counts};

#[derive(Debug, Parser)]
#[command(name = "wings", version, about = "Manage Wings feature values declaratively")]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Args)]
struct GlobalArgs {
    /// Base URL of the Wings API (falls back to WINGS_ENDPOINT).
    #[arg(long, global = true)]
    endpoint: Option<String>,

    /// API key id (falls back to WINGS_API_KEY_ID).
    #[arg(long, global = true)]
    api_key_id: Option<String>,

    /// API key (falls back to WINGS_API_KEY).
    #[arg(long, global = true)]
    api_key: Option<String>,

    /// Overall deadline for each operation, retries included.
    #[arg(long, global = true)]
    timeout_secs: Option<u64>,

    #[arg(long, global = true, value_enum, default_value_t = OutputFormat::Yaml)]
    output: OutputFormat,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum OutputFormat {
    Json,
    Yaml,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Fetch a value and print it as declarative state.
    Import { id: String },
    /// Create, update or replace the value described in FILE.
    Apply {
        file: PathBuf,
        /// Prior state written by an earlier apply or import.
        #[arg(long)]
        state: Option<PathBuf>,
    },
    /// Delete a value by id.
    Delete { id: String },
    /// Validate FILE and map it to the API shape without network access.
    Validate { file: PathBuf },
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let output = cli.global.output;

    match cli.command {
        Command::Validate { file } => run_validate(&file, output),
        Command::Import { id } => {
            let (resource, ctx) = connect(&cli.global)?;
            let state = resource.import(&ctx, &id).await.map_err(report)?;
            print_output(&state, output)
        }
        Command::Apply { file, state } => {
            let config = load_model(&file)?;
            let prior = state.as_deref().map(load_model).transpose()?;
            let (resource, ctx) = connect(&cli.global)?;
            let next = resource.apply(&ctx, prior.as_ref(), &config).await.map_err(report)?;
            print_output(&next, output)
        }
        Command::Delete { id } => {
            let (resource, ctx) = connect(&cli.global)?;
            let state = ValueResourceModel {
                id: Some(id.clone()),
                value_id: id,
                ..ValueResourceModel::default()
            };
            resource.delete(&ctx, &state).await.map_err(report)
        }
    }
}

fn init_tracing() {
    let filter = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into());
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

/// Lifecycle controller and request context for the networked commands.
fn connect(global: &GlobalArgs) -> Result<(ValueResource, RequestContext)> {
    let config = ClientConfig::resolve(ConfigOverrides {
        endpoint: global.endpoint.clone(),
        api_key_id: global.api_key_id.clone(),
        api_key: global.api_key.clone(),
    })?;
    let resource = ValueResource::new(WingsClient::new(config)?);
    Ok((resource, request_context(global.timeout_secs)))
}

/// Context cancelled by Ctrl-C and bounded by `--timeout-secs`.
fn request_context(timeout_secs: Option<u64>) -> RequestContext {
    let mut ctx = RequestContext::new();
    if let Some(secs) = timeout_secs {
        ctx = ctx.with_timeout(Duration::from_secs(secs));
    }

    let token = ctx.cancellation_token().clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupted; cancelling in-flight request");
            token.cancel();
        }
    });
    ctx
}

fn run_validate(file: &Path, output: OutputFormat) -> Result<()> {
    let model = load_model(file)?;
    let diagnostics = model.validate();
    for warning in diagnostics.warnings() {
        warn!("{warning}");
    }
    if diagnostics.has_error() {
        return Err(report(diagnostics));
    }

    let value = to_value(&model).with_context(|| format!("mapping {}", file.display()))?;
    for (kind, count) in variant_counts(&value) {
        info!(kind = %kind, count, "variants");
    }
    print_output(&value, output)
}

fn load_model(path: &Path) -> Result<ValueResourceModel> {
    let text = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    let is_json = path.extension().is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
    let model = if is_json {
        serde_json::from_str(&text).with_context(|| format!("parsing {} as JSON", path.display()))?
    } else {
        serde_yaml::from_str(&text).with_context(|| format!("parsing {} as YAML", path.display()))?
    };
    Ok(model)
}

fn print_output<T: Serialize>(data: &T, output: OutputFormat) -> Result<()> {
    let rendered = match output {
        OutputFormat::Json => serde_json::to_string_pretty(data)?,
        OutputFormat::Yaml => serde_yaml::to_string(data)?,
    };
    println!("{}", rendered.trim_end());
    Ok(())
}

fn report(diagnostics: Diagnostics) -> anyhow::Error {
    anyhow::anyhow!("{diagnostics}")
}
