use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use serde::Deserialize;
use serde_json::json;
use tracing::info;
use vistrita_contracts::schema::sample_shapes;
use vistrita_contracts::{
    ClientInputError, CopyRequest, ImagePayload, ProductInput, ProductLog, Tone,
};
use vistrita_engine::{EngineConfig, PipelineError, VistritaEngine};

mod logging;

const EXIT_CLIENT_INPUT: i32 = 2;
const EXIT_UPSTREAM: i32 = 3;
const EXIT_COMPOSITE: i32 = 4;

#[derive(Debug, Parser)]
#[command(
    name = "vistrita",
    version,
    about = "Generate structured e-commerce product copy from product data or images"
)]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Args)]
struct GlobalArgs {
    /// Generative backend (gemini or dryrun). Overrides VISTRITA_BACKEND.
    #[arg(long, global = true)]
    backend: Option<String>,
    #[arg(long, global = true)]
    vision_model: Option<String>,
    #[arg(long, global = true)]
    text_model: Option<String>,
    /// JSONL product log. Overrides VISTRITA_PRODUCT_LOG.
    #[arg(long, global = true)]
    product_log: Option<PathBuf>,
    /// Recorded as the author of product log entries.
    #[arg(long, global = true)]
    user: Option<String>,
    #[arg(long, global = true)]
    concurrency: Option<usize>,
    /// Emit logs as JSON lines.
    #[arg(long, global = true)]
    log_json: bool,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Write copy for one product.
    Generate(GenerateArgs),
    /// Extract visual attributes from a product image.
    Extract(ImageArgs),
    /// Image to attributes to copy.
    Compose(ComposeArgs),
    /// Write copy for every product in a batch file.
    Bulk(BulkArgs),
    /// Show recent product log entries.
    History(HistoryArgs),
    /// Print the input and output shapes of `generate`.
    Schema,
}

#[derive(Debug, Args)]
struct GenerateArgs {
    /// Product JSON file (`-` for stdin). Flags below fill in fields it leaves empty.
    #[arg(long)]
    input: Option<PathBuf>,
    #[arg(long)]
    title: Option<String>,
    #[arg(long)]
    category: Option<String>,
    #[arg(long = "feature")]
    features: Vec<String>,
    #[arg(long)]
    tone: Option<String>,
    #[arg(long, conflicts_with = "image_base64")]
    image: Option<PathBuf>,
    #[arg(long)]
    image_base64: Option<String>,
}

#[derive(Debug, Args)]
#[group(required = true, multiple = false)]
struct ImageArgs {
    /// Image file.
    #[arg(long)]
    image: Option<PathBuf>,
    /// Base64 image, optionally with a `data:<mime>;base64,` prefix.
    #[arg(long)]
    image_base64: Option<String>,
}

#[derive(Debug, Args)]
struct ComposeArgs {
    #[command(flatten)]
    image: ImageArgs,
    #[arg(long)]
    tone: Option<String>,
}

#[derive(Debug, Args)]
struct BulkArgs {
    /// JSON array of products, or `{"products": [...]}` (`-` for stdin).
    #[arg(long)]
    input: PathBuf,
}

#[derive(Debug, Args)]
struct HistoryArgs {
    #[arg(long, default_value_t = 20)]
    limit: usize,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum BatchFile {
    Items(Vec<ProductInput>),
    Wrapped { products: Vec<ProductInput> },
}

fn main() {
    let cli = Cli::parse();
    logging::init_tracing(cli.global.log_json);
    match run(cli) {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("vistrita error: {err:#}");
            std::process::exit(exit_code(&err));
        }
    }
}

fn run(cli: Cli) -> Result<i32> {
    let config = apply_overrides(EngineConfig::from_env(), &cli.global);
    let user = cli.global.user.as_deref();
    match cli.command {
        Command::Schema => {
            print_json(&sample_shapes())?;
            Ok(0)
        }
        Command::History(args) => run_history(&config, args),
        Command::Generate(args) => run_generate(&build_engine(config, user)?, args),
        Command::Extract(args) => run_extract(&build_engine(config, user)?, args),
        Command::Compose(args) => run_compose(&build_engine(config, user)?, args),
        Command::Bulk(args) => run_bulk(&build_engine(config, user)?, args),
    }
}

fn build_engine(config: EngineConfig, user: Option<&str>) -> Result<VistritaEngine> {
    let engine = VistritaEngine::from_config(config)?;
    Ok(match non_empty(user) {
        Some(user) => engine.with_user(user),
        None => engine,
    })
}

fn apply_overrides(mut config: EngineConfig, global: &GlobalArgs) -> EngineConfig {
    if let Some(backend) = non_empty(global.backend.as_deref()) {
        config.backend = backend.to_ascii_lowercase();
    }
    if let Some(model) = non_empty(global.vision_model.as_deref()) {
        config.vision_model = Some(model.to_string());
    }
    if let Some(model) = non_empty(global.text_model.as_deref()) {
        config.text_model = Some(model.to_string());
    }
    if let Some(path) = global.product_log.as_ref() {
        config.product_log = Some(path.clone());
    }
    if let Some(concurrency) = global.concurrency {
        config.bulk_concurrency = concurrency.clamp(1, 16);
    }
    config
}

fn run_generate(engine: &VistritaEngine, args: GenerateArgs) -> Result<i32> {
    let mut input = match args.input.as_deref() {
        Some(path) => serde_json::from_str::<ProductInput>(&read_input(path)?)
            .map_err(|err| ClientInputError::InvalidJson(err.to_string()))?,
        None => ProductInput::default(),
    };
    fill_missing(&mut input.title, args.title);
    fill_missing(&mut input.category, args.category);
    if input.features.is_empty() {
        input.features = args.features;
    }
    if args.tone.is_some() {
        input.tone = args.tone;
    }
    if args.image_base64.is_some() {
        input.image = args.image_base64;
    }

    let mut request = input.into_request()?;
    if let Some(path) = args.image.as_deref() {
        request.source_image = Some(load_image_file(path)?);
    }

    let recorded = engine.generate(&request);
    print_json(recorded.value.result())?;
    Ok(if recorded.value.is_failed() {
        EXIT_UPSTREAM
    } else {
        0
    })
}

fn run_extract(engine: &VistritaEngine, args: ImageArgs) -> Result<i32> {
    let image = load_image(&args)?;
    let attributes = engine.extract(&image);
    print_json(&json!({ "attributes": attributes }))?;
    Ok(if attributes.is_sentinel() {
        EXIT_UPSTREAM
    } else {
        0
    })
}

fn run_compose(engine: &VistritaEngine, args: ComposeArgs) -> Result<i32> {
    let tone = parse_tone(args.tone.as_deref())?;
    let recorded = match (&args.image.image, &args.image.image_base64) {
        (_, Some(raw)) => engine.compose_encoded(raw, tone)?,
        _ => engine.compose(load_image(&args.image)?, tone)?,
    };
    print_json(&recorded.value)?;
    Ok(if recorded.value.generation.is_failed() {
        EXIT_UPSTREAM
    } else {
        0
    })
}

fn run_bulk(engine: &VistritaEngine, args: BulkArgs) -> Result<i32> {
    let requests = parse_batch(&read_input(&args.input)?)?;
    info!(items = requests.len(), "starting bulk generation");
    let report = engine.bulk(&requests);
    print_json(&report)?;
    Ok(0)
}

fn run_history(config: &EngineConfig, args: HistoryArgs) -> Result<i32> {
    let Some(path) = config.product_log.as_ref() else {
        bail!("no product log configured (set VISTRITA_PRODUCT_LOG or pass --product-log)");
    };
    let entries = ProductLog::new(path)
        .read_entries()
        .with_context(|| format!("failed to read product log {}", path.display()))?;
    let skip = entries.len().saturating_sub(args.limit);
    print_json(&entries[skip..])?;
    Ok(0)
}

/// Validates every item before anything is generated.
fn parse_batch(raw: &str) -> Result<Vec<CopyRequest>, ClientInputError> {
    let file: BatchFile =
        serde_json::from_str(raw).map_err(|err| ClientInputError::InvalidJson(err.to_string()))?;
    let items = match file {
        BatchFile::Items(items) | BatchFile::Wrapped { products: items } => items,
    };
    if items.is_empty() {
        return Err(ClientInputError::EmptyBatch);
    }
    items
        .into_iter()
        .enumerate()
        .map(|(index, item)| item.into_request().map_err(|err| err.at_index(index)))
        .collect()
}

fn parse_tone(raw: Option<&str>) -> Result<Tone, ClientInputError> {
    match non_empty(raw) {
        Some(raw) => raw.parse(),
        None => Ok(Tone::default()),
    }
}

fn load_image(args: &ImageArgs) -> Result<ImagePayload> {
    match (&args.image, &args.image_base64) {
        (_, Some(raw)) => Ok(ImagePayload::decode_text(raw).map_err(ClientInputError::from)?),
        (Some(path), None) => load_image_file(path),
        (None, None) => Err(ClientInputError::MissingField("image").into()),
    }
}

fn load_image_file(path: &Path) -> Result<ImagePayload> {
    let bytes =
        fs::read(path).with_context(|| format!("failed to read image {}", path.display()))?;
    Ok(ImagePayload::from_bytes(bytes).map_err(ClientInputError::from)?)
}

fn read_input(path: &Path) -> Result<String> {
    if path == Path::new("-") {
        let mut raw = String::new();
        io::stdin()
            .read_to_string(&mut raw)
            .context("failed to read stdin")?;
        return Ok(raw);
    }
    fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))
}

fn fill_missing(field: &mut String, flag: Option<String>) {
    if field.trim().is_empty() {
        if let Some(value) = flag {
            *field = value;
        }
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|value| !value.is_empty())
}

fn print_json<T: serde::Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn exit_code(err: &anyhow::Error) -> i32 {
    if let Some(pipeline) = err.downcast_ref::<PipelineError>() {
        return match pipeline {
            PipelineError::Input(_) => EXIT_CLIENT_INPUT,
            PipelineError::Composite(_) => EXIT_COMPOSITE,
        };
    }
    if err
        .chain()
        .any(|cause| cause.downcast_ref::<ClientInputError>().is_some())
    {
        return EXIT_CLIENT_INPUT;
    }
    1
}
