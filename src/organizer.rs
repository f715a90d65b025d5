use crate::config::ExtractorConfig;
use crate::exporter::write_csv;
use anyhow::{Context, Result};
use chrono::Local;
use iegm_core::metadata::{detect_indicator, detect_year, split_groups};
use iegm_core::models::{COL_ANO_REF, COL_INDICADOR};
use iegm_core::{
    canonical_file_name, infer_from_file_name, normalize_indicator, DataLoader, Detected,
    LoadedCsv, OrganizedFile, OrganizedFrame,
};
use indicatif::{ProgressBar, ProgressStyle};
use log::warn;
use polars::prelude::*;
use rayon::prelude::*;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Serialize)]
struct Manifest<'a> {
    generated_at: String,
    municipality: &'a str,
    files: &'a [OrganizedFile],
}

/// Sniff every file on the rayon pool; results stay in input order.
fn sniff_all(files: &[PathBuf]) -> Result<Vec<Result<Option<LoadedCsv>>>> {
    let loader = DataLoader::new();

    let pb = ProgressBar::new(files.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} Reading")?,
    );

    let results = files
        .par_iter()
        .map(|file| {
            let loaded = loader.sniff(file);
            pb.inc(1);
            loaded
        })
        .collect();

    pb.finish_and_clear();
    Ok(results)
}

/// Phase 1: read each export, detect its year and indicator, and rewrite it
/// under `csv_organizados/` with a canonical name. Unreadable files are
/// reported and skipped.
pub fn organize_files(config: &ExtractorConfig, files: &[PathBuf]) -> Result<Vec<OrganizedFrame>> {
    let sniffed = sniff_all(files)?;
    let organized_dir = config.organized_dir();
    let mut organized = Vec::new();

    for (i, (path, result)) in files.iter().zip(sniffed).enumerate() {
        let original_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        println!("\n{}", "─".repeat(50));
        println!("📄 [{}/{}] {}", i + 1, files.len(), original_name);

        let loaded = match result {
            Ok(Some(loaded)) => loaded,
            Ok(None) => {
                println!("   ❌ Could not read the file");
                continue;
            }
            Err(e) => {
                println!("   ❌ Could not read the file: {:#}", e);
                continue;
            }
        };

        println!("   Encoding: {} | Separator: '{}'", loaded.encoding, loaded.separator);
        println!(
            "   Records: {} | Columns: {}",
            loaded.frame.height(),
            loaded.frame.width()
        );
        println!("   Columns: {:?}", loaded.column_names());

        match organize_one(loaded, &organized_dir) {
            Ok(frames) => organized.extend(frames),
            Err(e) => {
                warn!("skipping {}: {:#}", original_name, e);
                println!("   ❌ Failed to organize: {:#}", e);
            }
        }
    }

    Ok(organized)
}

fn organize_one(loaded: LoadedCsv, organized_dir: &Path) -> Result<Vec<OrganizedFrame>> {
    let original_name = loaded.file_name();
    let year = detect_year(&loaded.frame)?;
    let indicator = detect_indicator(&loaded.frame)?;

    match &year {
        Detected::Multiple(_) => println!("   📅 Years found: {}", year),
        _ => println!("   📅 Year: {}", year),
    }
    match &indicator {
        Detected::Multiple(_) => println!("   📊 Indicators found: {}", indicator),
        _ => println!("   📊 Indicator: {}", indicator),
    }

    if year.is_multiple() || indicator.is_multiple() {
        let mut frames = Vec::new();
        for group in split_groups(&loaded.frame)? {
            let normalized = group.indicator.as_deref().map(normalize_indicator);
            let organized_name = canonical_file_name(normalized.as_deref(), group.year);
            let path = organized_dir.join(&organized_name);

            let mut frame = group.frame;
            write_csv(&mut frame, &path)?;
            println!("   ✅ Split: {} ({} records)", organized_name, frame.height());

            frames.push(OrganizedFrame {
                info: OrganizedFile {
                    original_name: original_name.clone(),
                    organized_name,
                    path,
                    year: group.year,
                    indicator: normalized,
                    records: frame.height(),
                },
                frame,
            });
        }
        return Ok(frames);
    }

    let mut frame = loaded.frame;
    let (name_indicator, name_year) = infer_from_file_name(&original_name);

    let indicator = match indicator {
        Detected::Single(raw) => Some(normalize_indicator(&raw)),
        _ => name_indicator.inspect(|ind| {
            println!("   📊 Indicator taken from the file name: {}", ind);
        }),
    };
    let year = match year {
        Detected::Single(y) => Some(y),
        _ => name_year.inspect(|y| {
            println!("   📅 Year taken from the file name: {}", y);
        }),
    };

    fill_missing_column(&mut frame, COL_INDICADOR, indicator.as_deref())?;
    fill_missing_column(&mut frame, COL_ANO_REF, year.map(|y| y.to_string()).as_deref())?;

    let organized_name = match (&indicator, year) {
        (Some(ind), Some(y)) => canonical_file_name(Some(ind), Some(y)),
        _ => original_name.clone(),
    };
    let path = organized_dir.join(&organized_name);
    write_csv(&mut frame, &path)?;
    println!("   ✅ Organized as: {}", organized_name);

    Ok(vec![OrganizedFrame {
        info: OrganizedFile {
            original_name,
            organized_name,
            path,
            year,
            indicator,
            records: frame.height(),
        },
        frame,
    }])
}

/// A value recovered from the file name becomes a constant column when the
/// export lacks it.
fn fill_missing_column(frame: &mut DataFrame, name: &str, value: Option<&str>) -> Result<()> {
    if frame.column(name).is_ok() {
        return Ok(());
    }
    if let Some(value) = value {
        let values = vec![value; frame.height()];
        frame.with_column(Series::new(name.into(), values))?;
    }
    Ok(())
}

pub fn write_manifest(config: &ExtractorConfig, files: &[OrganizedFile]) -> Result<PathBuf> {
    let manifest = Manifest {
        generated_at: Local::now().to_rfc3339(),
        municipality: &config.municipality,
        files,
    };

    let path = config.manifest_path();
    let file = fs::File::create(&path)
        .with_context(|| format!("Failed to create {}", path.display()))?;
    serde_json::to_writer_pretty(file, &manifest)?;
    Ok(path)
}
