use anyhow::{bail, Result};
use clap::Parser;
use log::info;
use std::path::PathBuf;
use std::time::Instant;

mod config;
mod consolidator;
mod discovery;
mod exporter;
mod organizer;
mod report;

use config::ExtractorConfig;
use exporter::{DATA_SHEET, SUMMARY_SHEET};

#[derive(Parser)]
#[command(name = "iegm_extractor")]
#[command(about = "Organize IEGM answer exports and build the per-municipality report")]
struct Args {
    /// Folder holding the exports and receiving the reports
    #[arg(short, long, default_value = "data")]
    data_dir: PathBuf,

    /// Municipality to extract (matched after trim + upper-case)
    #[arg(short, long, default_value = "BETIM")]
    municipio: String,

    /// Keep only these reference years (repeatable)
    #[arg(long = "ano")]
    anos: Vec<i32>,

    /// Keep only these indicators, e.g. i-Educ (repeatable)
    #[arg(long = "indicador")]
    indicadores: Vec<String>,

    /// Rows shown in the terminal preview
    #[arg(long, default_value = "15")]
    preview_rows: usize,

    /// Worker threads for reading files (defaults to all cores)
    #[arg(long)]
    threads: Option<usize>,

    /// Do not unpack ZIP archives found in csv_brutos/
    #[arg(long)]
    no_zip: bool,
}

fn skip_xlsx_from_env() -> bool {
    std::env::var("IEGM_SKIP_XLSX").is_ok_and(|v| v == "1" || v.eq_ignore_ascii_case("true"))
}

fn run(config: &ExtractorConfig) -> Result<()> {
    let start = Instant::now();

    report::section(&format!("IEGM EXTRACTOR - {}", config.municipality));
    discovery::prepare_directories(config)?;

    if config.extract_zips {
        let extracted = discovery::extract_zip_archives(&config.raw_dir())?;
        if extracted > 0 {
            println!("📦 Extracted {} CSV file(s) from ZIP archives", extracted);
        }
    }

    let files = discovery::discover_csv_files(config)?;
    if files.is_empty() {
        println!("\n❌ ERROR: No CSV file found!");
        println!("   Put the exports in {}/", config.raw_dir().display());
        bail!("No CSV file found in {}", config.data_dir.display());
    }
    println!("📁 Found {} CSV file(s)", files.len());

    // Phase 1
    report::section("PHASE 1: ORGANIZING FILES");
    let organized = organizer::organize_files(config, &files)?;
    if organized.is_empty() {
        println!("\n❌ No file processed!");
        bail!("None of the {} CSV file(s) could be read", files.len());
    }

    let infos: Vec<_> = organized.iter().map(|o| o.info.clone()).collect();
    report::print_organization_summary(config, &infos);
    let manifest = organizer::write_manifest(config, &infos)?;
    info!("Manifest written to {}", manifest.display());

    // Phase 2
    report::section("PHASE 2: FULL DATA EXTRACTION");
    let consolidated = consolidator::consolidate(config, &organized)?;
    let mut report_frame = consolidated.report;

    report::print_preview(&report_frame, config.preview_rows)?;
    report::print_summary(&consolidated.summary)?;

    let excel_path = config.excel_path();
    let excel_written = if config.skip_xlsx {
        println!("\n⏭️  Skipping Excel output");
        None
    } else {
        println!("\n📝 Writing Excel: {}", excel_path.display());
        exporter::write_workbook(
            &excel_path,
            &[
                (DATA_SHEET, &report_frame),
                (SUMMARY_SHEET, &consolidated.summary),
            ],
        )?;
        Some(excel_path.as_path())
    };

    let csv_path = config.csv_path();
    exporter::write_csv(&mut report_frame, &csv_path)?;
    println!("📝 CSV for import: {}", csv_path.display());

    report::print_final_summary(config, &report_frame, excel_written, &csv_path)?;
    report::print_identifier_check(&report_frame)?;

    println!("\n⏱️  Finished in {:.2}s", start.elapsed().as_secs_f64());
    Ok(())
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    rayon::ThreadPoolBuilder::new()
        .num_threads(args.threads.unwrap_or_else(num_cpus::get))
        .build_global()?;

    let mut config = ExtractorConfig::new(&args.data_dir, &args.municipio);
    config.years = args.anos;
    config.indicators = args.indicadores;
    config.preview_rows = args.preview_rows;
    config.extract_zips = !args.no_zip;
    config.skip_xlsx = skip_xlsx_from_env();

    info!("Starting extraction for {}", config.municipality);
    run(&config)
}
