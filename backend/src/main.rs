//! Catalog Buddy CLI - Transform product catalog exports into marketplace CSVs
//!
//! # Main Commands
//!
//! ```bash
//! catalog-buddy serve                                        # Start HTTP server (port 3000)
//! catalog-buddy transform products.csv -t noon -m map.json   # Write the target CSV
//! catalog-buddy preview products.csv -t noon -m @map.json    # Print preview JSON
//! catalog-buddy template list                                # List templates
//! catalog-buddy columns products.csv                         # Inspect an upload
//! ```

use clap::{Args, Parser, Subcommand};
use catalog_buddy::{
    parse_file, prepare, AppConfig, ProductValuePolicy, TemplateRegistry, TemplateStore,
    TransformRequest, Transformation, VariantColumns,
};
use serde_json::json;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "catalog-buddy")]
#[command(about = "Transform product catalog exports into marketplace CSV templates", long_about = None)]
struct Cli {
    /// Template directory (overrides CATALOG_BUDDY_TEMPLATES_DIR)
    #[arg(long, global = true)]
    templates_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start HTTP server
    Serve {
        /// Port to listen on (overrides CATALOG_BUDDY_PORT)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Transform a catalog export into a template CSV
    Transform {
        #[command(flatten)]
        run: RunArgs,

        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Print the preview JSON of a transformation
    Preview {
        #[command(flatten)]
        run: RunArgs,

        /// Number of rows to show (overrides CATALOG_BUDDY_PREVIEW_ROWS)
        #[arg(long)]
        rows: Option<usize>,
    },

    /// Inspect the templates directory
    Template {
        #[command(subcommand)]
        action: TemplateAction,
    },

    /// Show detected encoding, delimiter and columns of a CSV file
    Columns {
        /// Input CSV file
        input: PathBuf,
    },
}

#[derive(Args)]
struct RunArgs {
    /// Input CSV file
    input: PathBuf,

    /// Template key
    #[arg(short, long)]
    template: String,

    /// Mapping JSON object, or @file to read it from a file
    #[arg(short, long, default_value = "{}")]
    mapping: String,

    /// Column to apply text cleanup to (repeatable)
    #[arg(short, long)]
    cleanup: Vec<String>,

    /// Keep each row's own value for per-product fields when present
    #[arg(long)]
    own_values: bool,
}

#[derive(Subcommand)]
enum TemplateAction {
    /// List all available templates
    List,

    /// Show a template as JSON
    Show {
        /// Template key
        key: String,
    },
}

#[tokio::main]
async fn main() {
    // Load .env file (if present)
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    let config = AppConfig::from_env().with_templates_dir(cli.templates_dir);

    let result = match cli.command {
        Commands::Serve { port } => cmd_serve(config.with_port(port)).await,

        Commands::Transform { run, output } => cmd_transform(&config, run, output.as_deref()),

        Commands::Preview { run, rows } => {
            cmd_preview(&config, run, rows.unwrap_or(config.preview_rows))
        }

        Commands::Template { action } => cmd_template(&config, action),

        Commands::Columns { input } => cmd_columns(&input),
    };

    if let Err(e) = result {
        eprintln!("❌ Error: {}", e);
        std::process::exit(1);
    }
}

async fn cmd_serve(config: AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    catalog_buddy::server::start_server(config).await
}

fn run_transformation(config: &AppConfig, args: RunArgs) -> Result<Transformation, Box<dyn std::error::Error>> {
    let registry = TemplateRegistry::with_dir(&config.templates_dir);

    let mapping = match args.mapping.strip_prefix('@') {
        Some(path) => fs::read_to_string(path)?,
        None => args.mapping,
    };
    let cleanup = if args.cleanup.is_empty() {
        String::new()
    } else {
        json!({ "columns": args.cleanup }).to_string()
    };
    let policy = if args.own_values {
        ProductValuePolicy::Own
    } else {
        ProductValuePolicy::Product
    };

    eprintln!("📄 Processing: {}", args.input.display());
    let request = TransformRequest::new(fs::read(&args.input)?, args.template)
        .with_mapping(mapping)
        .with_cleanup(cleanup)
        .with_policy(policy);

    Ok(prepare(request, &registry, &VariantColumns::default())?)
}

fn cmd_transform(
    config: &AppConfig,
    args: RunArgs,
    output: Option<&Path>,
) -> Result<(), Box<dyn std::error::Error>> {
    let run = run_transformation(config, args)?;

    match output {
        Some(path) => {
            let mut file = fs::File::create(path)?;
            let mut rows = 0usize;
            // BOM and header line come first
            for (i, chunk) in run.stream().enumerate() {
                file.write_all(&chunk?)?;
                rows += usize::from(i > 1);
            }
            eprintln!("💾 {} rows written to: {}", rows, path.display());
        }
        None => {
            let mut stdout = std::io::stdout().lock();
            for chunk in run.stream() {
                stdout.write_all(&chunk?)?;
            }
            stdout.flush()?;
        }
    }

    Ok(())
}

fn cmd_preview(config: &AppConfig, args: RunArgs, rows: usize) -> Result<(), Box<dyn std::error::Error>> {
    let run = run_transformation(config, args)?;
    let preview = run.preview(rows);
    println!("{}", serde_json::to_string_pretty(&preview)?);
    Ok(())
}

fn cmd_template(config: &AppConfig, action: TemplateAction) -> Result<(), Box<dyn std::error::Error>> {
    let registry = TemplateRegistry::with_dir(&config.templates_dir);

    match action {
        TemplateAction::List => {
            let templates = registry.list();
            if templates.is_empty() {
                eprintln!("📋 No templates in {}", registry.templates_dir().display());
                return Ok(());
            }

            eprintln!("📋 Templates ({}):\n", templates.len());
            for t in templates {
                println!("  📄 {} ({})", t.display_name(), t.template_key);
                println!("     Fields: {}", t.fields.len());
                println!("     Required: {}", t.required_label());
                println!();
            }
        }

        TemplateAction::Show { key } => match registry.get(&key) {
            Some(t) => println!("{}", serde_json::to_string_pretty(t)?),
            None => return Err(format!("Template not found: {}", key).into()),
        },
    }

    Ok(())
}

fn cmd_columns(input: &Path) -> Result<(), Box<dyn std::error::Error>> {
    eprintln!("📄 Parsing CSV: {}", input.display());

    let result = parse_file(input)?;
    println!("Encoding:  {}", result.encoding);
    println!(
        "Delimiter: '{}'",
        catalog_buddy::transform::pipeline::format_delimiter(result.delimiter)
    );
    println!("Rows:      {}", result.table.len());
    println!("Columns:");
    for header in result.table.headers() {
        println!("  - {}", header);
    }

    Ok(())
}
