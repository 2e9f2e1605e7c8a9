pub mod cli;
pub mod config;
pub mod data;
pub mod ddl;
pub mod detect;
pub mod error;
pub mod import;
pub mod infer;
pub mod io_utils;
pub mod mapper;
pub mod parsers;
pub mod primary_key;
pub mod sanitize;
pub mod schema;
pub mod store;
pub mod table;

use std::{env, sync::OnceLock};

use anyhow::{Context, Result, bail};
use clap::Parser;
use log::{LevelFilter, debug, info};

use crate::{
    cli::{Cli, Commands, InputArgs},
    config::AppConfig,
    import::{ImportOptions, ImportSource, ImportStatus, Importer, UploadGuard},
    parsers::ParseOptions,
    schema::TablePlan,
    store::{RelationalStore, TenantStoreFactory, memory::MemoryStore},
};

static LOGGER: OnceLock<()> = OnceLock::new();

fn init_logging() {
    LOGGER.get_or_init(|| {
        let mut builder = env_logger::Builder::from_env(env_logger::Env::default());
        if env::var("RUST_LOG").is_err() {
            builder.filter_module("tabular_import", LevelFilter::Info);
        }
        let _ = builder.format_timestamp_millis().try_init();
    });
}

pub fn run() -> Result<()> {
    init_logging();
    let cli = Cli::parse();
    let config = AppConfig::load_or_default(cli.config.as_deref())?;
    match cli.command {
        Commands::Probe(args) => handle_probe(&args, &config),
        Commands::Map(args) => handle_map(&args, &config),
        Commands::Import(args) => handle_import(&args, &config),
    }
}

fn build_source(args: &InputArgs, config: &AppConfig) -> Result<ImportSource> {
    let encoding = io_utils::resolve_encoding(args.input_encoding.as_deref())?;
    Ok(ImportSource {
        path: args.input.clone(),
        format: args.format,
        mime: args.mime.clone(),
        parse: ParseOptions {
            encoding,
            delimiter: args.delimiter,
            max_file_bytes: args.max_file_bytes.unwrap_or(config.defaults.max_file_bytes),
        },
        temporary: false,
    })
}

fn sample_rows(args: &InputArgs, config: &AppConfig) -> usize {
    args.sample_rows.unwrap_or(config.defaults.sample_rows)
}

/// Explicit schema, then the tenant's configured schema, then `public`.
fn resolve_schema(
    explicit: Option<&str>,
    tenant: Option<&str>,
    factory: &TenantStoreFactory,
) -> Result<String> {
    if let Some(schema) = explicit {
        return Ok(schema.to_string());
    }
    match tenant {
        Some(code) => Ok(factory.default_schema(code)?.to_string()),
        None => Ok(store::memory::DEFAULT_SCHEMA.to_string()),
    }
}

fn handle_probe(args: &cli::ProbeArgs, config: &AppConfig) -> Result<()> {
    let source = build_source(&args.input, config)?;
    info!("Probing '{}'", source.path.display());
    let (parsed, plan) = import::probe(&source, sample_rows(&args.input, config))
        .with_context(|| format!("Inferring table plan from {:?}", source.path))?;
    if let Some(structure) = parsed.structure {
        info!(
            "Detected delimiter '{}', header {}, encoding {}",
            printable_delimiter(structure.delimiter),
            if structure.has_header { "present" } else { "absent" },
            structure.encoding.name()
        );
    }
    info!(
        "Inferred {} column(s) from {} row(s)",
        plan.columns.len(),
        parsed.rows.len()
    );
    print!("{}", table::render_plan(&plan));

    if let Some(output) = &args.output {
        plan.save(output)
            .with_context(|| format!("Writing plan to {output:?}"))?;
        info!("Plan written to {output:?}");
    }
    Ok(())
}

fn handle_map(args: &cli::MapArgs, config: &AppConfig) -> Result<()> {
    let source = build_source(&args.input, config)?;
    let (_, plan) = import::probe(&source, sample_rows(&args.input, config))
        .with_context(|| format!("Inferring table plan from {:?}", source.path))?;

    let targets = match (&args.target, &args.tenant) {
        (Some(target), _) => TablePlan::load(target)
            .with_context(|| format!("Loading target plan {target:?}"))?
            .as_table_columns(),
        (None, Some(tenant)) => {
            let factory = TenantStoreFactory::new(config.tenants.clone());
            let schema = resolve_schema(args.schema.as_deref(), Some(tenant), &factory)?;
            let mut store = factory.open(tenant)?;
            let columns = store
                .get_column_schema(&schema, &args.table)
                .with_context(|| format!("Reading columns of {schema}.{}", args.table))?;
            if columns.is_empty() {
                bail!("Table {schema}.{} does not exist", args.table);
            }
            columns
        }
        (None, None) => bail!("Either --target or --tenant is required"),
    };
    debug!("Mapping against {} target column(s)", targets.len());

    let report = mapper::map_columns(&plan.source_columns(), &targets);
    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print!("{}", table::render_mapping(&report));
    }
    Ok(())
}

fn handle_import(args: &cli::ImportArgs, config: &AppConfig) -> Result<()> {
    let source = build_source(&args.input, config)?.temporary(args.remove_source);
    let _upload = UploadGuard::new(&source);
    let factory = TenantStoreFactory::new(config.tenants.clone());
    let schema = resolve_schema(args.schema.as_deref(), args.tenant.as_deref(), &factory)?;

    let options = ImportOptions {
        schema: schema.clone(),
        table_name: args.table.clone(),
        create_table_if_missing: args.create_table || args.dry_run,
        truncate_before_import: args.truncate,
        skip_row_errors: args.skip_row_errors,
        batch_size: args.batch_size.unwrap_or(config.defaults.batch_size),
        map_columns: args.map_columns,
        sample_rows: sample_rows(&args.input, config),
        error_preview_limit: args
            .error_preview_limit
            .unwrap_or(config.defaults.error_preview_limit),
    };
    let mut importer = Importer::new(options);
    if let Some(plan_path) = &args.plan {
        let plan = TablePlan::load(plan_path)
            .with_context(|| format!("Loading plan {plan_path:?}"))?;
        importer = importer.with_plan(plan);
    }

    let mut store: Box<dyn RelationalStore> = if args.dry_run {
        info!("Dry run: importing into an in-memory store");
        let mut memory = MemoryStore::new();
        memory
            .create_schema(&schema)
            .with_context(|| format!("Preparing schema {schema}"))?;
        Box::new(memory)
    } else {
        let tenant = args
            .tenant
            .as_deref()
            .context("--tenant is required unless --dry-run is set")?;
        factory.open(tenant)?
    };

    let result = importer
        .run(&mut store, &source)
        .with_context(|| format!("Importing {:?} into {schema}.{}", source.path, args.table))?;
    println!("{}", serde_json::to_string_pretty(&result)?);

    match result.status {
        ImportStatus::Completed => Ok(()),
        ImportStatus::Aborted => {
            let reason = result
                .errors
                .first()
                .map(|e| format!("row {}: {}", e.row, e.error))
                .unwrap_or_default();
            bail!("Import aborted at {reason}")
        }
        ImportStatus::Cancelled => bail!(
            "Import cancelled after {} row(s)",
            result.total_rows
        ),
    }
}

pub(crate) fn printable_delimiter(delimiter: u8) -> String {
    match delimiter {
        b'\t' => "\\t".to_string(),
        other => char::from(other).escape_default().to_string(),
    }
}
