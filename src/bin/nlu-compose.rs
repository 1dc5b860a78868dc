//! nlu-compose CLI - train, inspect and run composite entity post-processing
//!
//! Builds a model directory from a schema feed and synonym data, then runs the
//! decomposer and synonym normalizer over single values or NDJSON messages.

use clap::{Parser, Subcommand};
use indexmap::IndexMap;
use std::fs::{self, File};
use std::io::{self, BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::process;

use nlu_compose::{
    parse_ndjson_line, read_ndjson, validate_schema, CompositeDecomposer, EngineConfig,
    EntityProcessor, EntityValue, Message, ModelDir, NdjsonWriter, NormalizerConfig, SchemaStore,
    SynonymNormalizer, SynonymTable, Warning,
};

#[derive(Parser)]
#[command(name = "nlu-compose")]
#[command(version, about = "Composite entity decomposition and synonym normalization", long_about = None)]
struct Cli {
    /// Engine configuration file (YAML)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the schema store and synonym table and persist them
    Train {
        /// Schema feed with lookup_tables and composite_entities (YAML or JSON)
        #[arg(short, long)]
        schema: PathBuf,

        /// Synonym mapping of surface string to canonical value (YAML or JSON)
        #[arg(long)]
        synonyms: Option<PathBuf>,

        /// Annotated training messages (NDJSON) whose entity spans add synonyms
        #[arg(short, long)]
        examples: Option<PathBuf>,

        /// Model directory to write
        #[arg(short, long, default_value = "model")]
        output: PathBuf,
    },

    /// Decompose a single value as an entity of the given type
    Decompose {
        /// Model directory (default: model_dir from config, then ./model)
        #[arg(short, long)]
        model_dir: Option<PathBuf>,

        /// Entity type, e.g. meal
        #[arg(short, long)]
        entity: String,

        value: String,
    },

    /// Normalize a single value against the synonym table
    Normalize {
        #[arg(short, long)]
        model_dir: Option<PathBuf>,

        /// Enable fuzzy matching
        #[arg(long)]
        fuzzy: bool,

        /// Fuzzy similarity threshold in [0, 1]
        #[arg(long)]
        threshold: Option<f64>,

        value: String,
    },

    /// Decompose then normalize every entity of NDJSON messages
    Process {
        #[arg(short, long)]
        model_dir: Option<PathBuf>,

        /// Input NDJSON file (default: stdin)
        #[arg(short, long)]
        input: Option<PathBuf>,

        #[arg(long)]
        fuzzy: bool,

        #[arg(long)]
        threshold: Option<f64>,
    },

    /// Check a schema feed for unresolvable refs and reference cycles
    Validate {
        #[arg(short, long)]
        schema: PathBuf,
    },
}

fn main() {
    dotenv::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();

    let result = load_engine_config(cli.config.as_deref()).and_then(|config| match cli.command {
        Commands::Train { schema, synonyms, examples, output } => {
            train(schema, synonyms, examples, output)
        }
        Commands::Decompose { model_dir, entity, value } => {
            decompose(&config, model_dir, &entity, &value)
        }
        Commands::Normalize { model_dir, fuzzy, threshold, value } => {
            normalize(&config, model_dir, fuzzy, threshold, &value)
        }
        Commands::Process { model_dir, input, fuzzy, threshold } => {
            process_messages(&config, model_dir, input, fuzzy, threshold)
        }
        Commands::Validate { schema } => validate(schema),
    });

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

fn load_engine_config(path: Option<&Path>) -> Result<EngineConfig, String> {
    match path {
        Some(path) => EngineConfig::load_from_file(path).map_err(|e| e.to_string()),
        None => Ok(EngineConfig::default()),
    }
}

/// Resolve normalizer settings: config file, then environment, then flags.
fn normalizer_config(
    config: &EngineConfig,
    fuzzy: bool,
    threshold: Option<f64>,
) -> Result<NormalizerConfig, String> {
    let mut normalizer = config.normalizer.clone();
    normalizer.apply_env().map_err(|e| e.to_string())?;

    if fuzzy {
        normalizer.fuzzy_matching = true;
    }
    if let Some(threshold) = threshold {
        normalizer.fuzzy_threshold = threshold;
    }
    normalizer.validate().map_err(|e| e.to_string())?;
    Ok(normalizer)
}

fn resolve_model_dir(config: &EngineConfig, model_dir: Option<PathBuf>) -> ModelDir {
    let path = model_dir
        .or_else(|| config.model_dir.clone())
        .unwrap_or_else(|| PathBuf::from("model"));
    ModelDir::new(path)
}

fn print_warnings(warnings: &[Warning]) {
    for warning in warnings {
        eprintln!("  ⚠ {}", warning);
    }
}

fn load_decomposer(model_dir: &ModelDir) -> Result<CompositeDecomposer, String> {
    let (schema, warnings) = model_dir.load_schema().map_err(|e| e.to_string())?.into_parts();
    print_warnings(&warnings);
    Ok(CompositeDecomposer::new(schema))
}

fn load_normalizer(
    model_dir: &ModelDir,
    config: NormalizerConfig,
) -> Result<SynonymNormalizer, String> {
    let (synonyms, warnings) = model_dir.load_synonyms().map_err(|e| e.to_string())?.into_parts();
    print_warnings(&warnings);
    Ok(SynonymNormalizer::new(synonyms, config))
}

fn open_lines(path: &Path) -> Result<BufReader<File>, String> {
    File::open(path)
        .map(BufReader::new)
        .map_err(|e| format!("Failed to open {}: {}", path.display(), e))
}

/// Build both stores and write them to the model directory
fn train(
    schema: PathBuf,
    synonyms: Option<PathBuf>,
    examples: Option<PathBuf>,
    output: PathBuf,
) -> Result<(), String> {
    println!("🔧 Training from {}...", schema.display());

    let store = SchemaStore::load_from_file(&schema).map_err(|e| e.to_string())?;
    println!(
        "  ✓ Loaded {} lookup tables and {} composite definitions",
        store.lookup_tables().count(),
        store.composite_definitions().count()
    );
    print_warnings(&validate_schema(&store));

    let pairs: IndexMap<String, String> = match &synonyms {
        Some(path) => {
            let contents = fs::read_to_string(path)
                .map_err(|e| format!("Failed to read {}: {}", path.display(), e))?;
            serde_yaml::from_str(&contents)
                .map_err(|e| format!("Failed to parse {}: {}", path.display(), e))?
        }
        None => {
            println!("  ℹ No synonym file given (optional)");
            IndexMap::new()
        }
    };

    let messages: Vec<Message> = match &examples {
        Some(path) => read_ndjson::<Message, _>(open_lines(path)?)
            .collect::<Result<_, _>>()
            .map_err(|e| format!("Failed to read {}: {}", path.display(), e))?,
        None => Vec::new(),
    };

    let (table, warnings) = SynonymTable::train(pairs, &messages).into_parts();
    println!("  ✓ Built {} synonyms", table.len());
    print_warnings(&warnings);

    let model_dir = ModelDir::new(&output);
    model_dir.persist_schema(&store).map_err(|e| e.to_string())?;
    model_dir.persist_synonyms(&table).map_err(|e| e.to_string())?;

    println!("✨ Model written to {}", output.display());
    Ok(())
}

fn decompose(
    config: &EngineConfig,
    model_dir: Option<PathBuf>,
    entity: &str,
    value: &str,
) -> Result<(), String> {
    let decomposer = load_decomposer(&resolve_model_dir(config, model_dir))?;

    match decomposer.decompose(entity, value) {
        Some(decomposed) => {
            let json = serde_json::to_string_pretty(&decomposed).map_err(|e| e.to_string())?;
            println!("{}", json);
        }
        None => println!("  ℹ No composite definition for '{}'; value unchanged", entity),
    }
    Ok(())
}

fn normalize(
    config: &EngineConfig,
    model_dir: Option<PathBuf>,
    fuzzy: bool,
    threshold: Option<f64>,
    value: &str,
) -> Result<(), String> {
    let settings = normalizer_config(config, fuzzy, threshold)?;
    let normalizer = load_normalizer(&resolve_model_dir(config, model_dir), settings)?;

    match normalizer.canonical(&EntityValue::text(value)) {
        Some(canonical) => println!("{}", canonical),
        None => println!("{}", value),
    }
    Ok(())
}

fn process_messages(
    config: &EngineConfig,
    model_dir: Option<PathBuf>,
    input: Option<PathBuf>,
    fuzzy: bool,
    threshold: Option<f64>,
) -> Result<(), String> {
    let settings = normalizer_config(config, fuzzy, threshold)?;
    let model_dir = resolve_model_dir(config, model_dir);
    let decomposer = load_decomposer(&model_dir)?;
    let normalizer = load_normalizer(&model_dir, settings)?;

    let reader: Box<dyn BufRead> = match &input {
        Some(path) => Box::new(open_lines(path)?),
        None => Box::new(BufReader::new(io::stdin())),
    };

    let stdout = io::stdout();
    let mut writer = NdjsonWriter::new(stdout.lock());
    let mut passed_through = 0usize;

    for (index, line) in reader.lines().enumerate() {
        let line = line.map_err(|e| format!("Failed to read input: {}", e))?;
        if line.trim().is_empty() {
            continue;
        }

        match parse_ndjson_line::<Message>(index + 1, &line) {
            Ok(mut message) => {
                decomposer.process(&mut message.entities);
                normalizer.process(&mut message.entities);
                writer.write(&message).map_err(|e| e.to_string())?;
            }
            Err(e) => {
                // Echo the record so output stays aligned with input
                tracing::warn!("Passing record through unchanged: {}", e);
                passed_through += 1;
                writer.write_raw(&line).map_err(|e| e.to_string())?;
            }
        }
    }
    writer.flush().map_err(|e| e.to_string())?;

    if passed_through > 0 {
        tracing::warn!("{} malformed records passed through unchanged", passed_through);
    }
    Ok(())
}

fn validate(schema: PathBuf) -> Result<(), String> {
    println!("🔍 Validating {}...", schema.display());

    let store = SchemaStore::load_from_file(&schema).map_err(|e| e.to_string())?;
    let warnings = validate_schema(&store);

    if warnings.is_empty() {
        println!("  ✓ Schema is consistent");
        return Ok(());
    }

    print_warnings(&warnings);
    Err(format!("{} schema issue(s) found", warnings.len()))
}
