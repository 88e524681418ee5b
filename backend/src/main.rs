//! Housing Mapper CLI - housing affordability analysis of CSV datasets
//!
//! # Main Commands
//!
//! ```bash
//! housing-mapper serve                     # Start HTTP server (port 3000)
//! housing-mapper analyze rents.csv         # Full analysis as JSON
//! ```
//!
//! # Debug Commands
//!
//! ```bash
//! housing-mapper parse rents.csv           # Loader output as JSON
//! housing-mapper infer rents.csv           # Resolved column mapping
//! ```

use clap::{Parser, Subcommand};
use housing_mapper::{
    analyze_file, clean, infer, infer_coordinates, parse_csv_file_auto, AnalysisResponse,
    AppConfig, IncomeGroup, PipelineOptions,
};
use serde_json::json;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "housing-mapper")]
#[command(about = "Housing affordability analysis of CSV datasets", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load a CSV file and output its rows as JSON
    Parse {
        /// Input CSV file
        input: PathBuf,

        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Show the column mapping inferred for a CSV file
    Infer {
        /// Input CSV file
        input: PathBuf,
    },

    /// Full pipeline: load, clean, infer, compute, segment, summarise
    Analyze {
        /// Input CSV file
        input: PathBuf,

        /// Restrict summaries to low-income, median-income, high-income or unknown
        #[arg(long)]
        income_group: Option<IncomeGroup>,

        /// Index above which a row counts as struggling (default: 50)
        #[arg(long)]
        threshold: Option<f64>,

        /// Number of recommendations (default: 5)
        #[arg(long)]
        top_k: Option<usize>,

        /// Use this column as the area
        #[arg(long)]
        area_column: Option<String>,

        /// Use this column as the rent/cost
        #[arg(long)]
        rent_column: Option<String>,

        /// Use this column as the income
        #[arg(long)]
        income_column: Option<String>,

        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Start HTTP server
    Serve {
        /// Port to listen on (default: HOUSING_PORT or 3000)
        #[arg(short, long)]
        port: Option<u16>,

        /// Directory holding the dataset (default: HOUSING_DATA_DIR or ./data)
        #[arg(short, long)]
        data_dir: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() {
    // Load .env file (if present)
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Parse { input, output } => cmd_parse(&input, output.as_deref()),

        Commands::Infer { input } => cmd_infer(&input),

        Commands::Analyze {
            input,
            income_group,
            threshold,
            top_k,
            area_column,
            rent_column,
            income_column,
            output,
        } => {
            let mut options = PipelineOptions {
                income_group,
                ..PipelineOptions::default()
            };
            if let Some(threshold) = threshold {
                options.struggling_threshold = threshold;
            }
            if let Some(top_k) = top_k {
                options.top_k = top_k;
            }
            options.overrides.area = area_column;
            options.overrides.rent = rent_column;
            options.overrides.income = income_column;

            cmd_analyze(&input, &options, output.as_deref())
        }

        Commands::Serve { port, data_dir } => cmd_serve(port, data_dir).await,
    };

    if let Err(e) = result {
        eprintln!("❌ Error: {}", e);
        std::process::exit(1);
    }
}

fn cmd_parse(input: &Path, output: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    eprintln!("📄 Parsing CSV: {}", input.display());

    let result = parse_csv_file_auto(input)?;

    eprintln!("   Encoding: {}", result.encoding);
    eprintln!("   Delimiter: '{}'", format_delimiter(result.delimiter));
    eprintln!("   Columns: {}", result.headers.join(", "));
    eprintln!("✅ Parsed {} rows", result.table.row_count());

    let json = serde_json::to_string_pretty(&result.table.to_records())?;
    write_output(&json, output)?;

    Ok(())
}

fn cmd_infer(input: &Path) -> Result<(), Box<dyn std::error::Error>> {
    eprintln!("🔎 Inferring columns: {}", input.display());

    let result = parse_csv_file_auto(input)?;
    let mut table = clean(&result.table);
    let mapping = infer(&mut table);
    let coordinates = infer_coordinates(&table);

    eprintln!("   Area:   {}", mapping.area);
    eprintln!("   Rent:   {}", mapping.rent.as_deref().unwrap_or("(none)"));
    eprintln!("   Income: {}", mapping.income.as_deref().unwrap_or("(none)"));

    let json = serde_json::to_string_pretty(&json!({
        "mapping": mapping,
        "coordinates": coordinates,
    }))?;
    println!("{}", json);

    Ok(())
}

fn cmd_analyze(
    input: &Path,
    options: &PipelineOptions,
    output: Option<&Path>,
) -> Result<(), Box<dyn std::error::Error>> {
    eprintln!("📄 Processing: {}", input.display());

    let analysis = analyze_file(input, options)?;
    let summaries = &analysis.report.summaries;

    eprintln!("\n📊 Summary");
    eprintln!("   Rows: {}", analysis.csv_info.row_count);
    if let Some(group) = analysis.report.income_group {
        eprintln!("   Income group: {} ({} rows)", group, analysis.report.view.row_count());
    }
    eprintln!("   Areas: {}", summaries.struggling.per_area.len());
    eprintln!(
        "   Struggling (index > {}): {} of {} ({:.1}%)",
        summaries.struggling.threshold,
        summaries.struggling.overall_count,
        summaries.struggling.overall_total,
        summaries.struggling.overall_fraction * 100.0
    );
    if let Some(median) = summaries.index_stats.median {
        eprintln!("   Median index: {:.1}", median);
    }
    for line in &summaries.recommendations {
        eprintln!("   • {}", line);
    }

    let response = AnalysisResponse::from(analysis);
    let json = serde_json::to_string_pretty(&response)?;
    write_output(&json, output)?;

    eprintln!("\n✨ Done!");
    Ok(())
}

async fn cmd_serve(
    port: Option<u16>,
    data_dir: Option<PathBuf>,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::from_env()?
        .with_port(port)
        .with_data_dir(data_dir);
    housing_mapper::server::start_server(config).await
}

fn format_delimiter(d: char) -> String {
    match d {
        '\t' => "\\t".to_string(),
        c => c.to_string(),
    }
}

fn write_output(content: &str, path: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    match path {
        Some(p) => {
            fs::write(p, content)?;
            eprintln!("💾 Output written to: {}", p.display());
        }
        None => {
            println!("{}", content);
        }
    }
    Ok(())
}
