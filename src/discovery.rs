use crate::config::ExtractorConfig;
use anyhow::{Context, Result};
use glob::glob;
use log::{debug, warn};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use zip::ZipArchive;

pub fn prepare_directories(config: &ExtractorConfig) -> Result<()> {
    fs::create_dir_all(config.raw_dir())
        .with_context(|| format!("Failed to create {}", config.raw_dir().display()))?;
    fs::create_dir_all(config.organized_dir())
        .with_context(|| format!("Failed to create {}", config.organized_dir().display()))?;
    Ok(())
}

fn glob_files(dir: &Path, extension: &str) -> Result<Vec<PathBuf>> {
    let dir_str = dir
        .to_str()
        .with_context(|| format!("Non UTF-8 path: {}", dir.display()))?;
    let pattern = format!("{}/*.{}", glob::Pattern::escape(dir_str), extension);

    let mut files: Vec<PathBuf> = glob(&pattern)?.filter_map(Result::ok).collect();
    files.sort();
    Ok(files)
}

/// Unpack the `.csv` members of every archive in `raw_dir` next to it.
/// Unreadable archives are logged and skipped. Returns the number of CSVs written.
pub fn extract_zip_archives(raw_dir: &Path) -> Result<usize> {
    let mut extracted = 0;

    for zip_path in glob_files(raw_dir, "zip")? {
        match extract_csv_members(&zip_path, raw_dir) {
            Ok(count) => {
                debug!("{} CSV file(s) from {}", count, zip_path.display());
                extracted += count;
            }
            Err(e) => warn!("Failed to extract {}: {:#}", zip_path.display(), e),
        }
    }

    Ok(extracted)
}

fn extract_csv_members(zip_path: &Path, out_dir: &Path) -> Result<usize> {
    let file = fs::File::open(zip_path)
        .with_context(|| format!("Failed to open ZIP file: {}", zip_path.display()))?;
    let mut archive = ZipArchive::new(file)
        .with_context(|| format!("Failed to read ZIP archive: {}", zip_path.display()))?;

    let mut count = 0;
    for i in 0..archive.len() {
        let mut member = archive.by_index(i)?;
        if member.is_dir() || !member.name().to_lowercase().ends_with(".csv") {
            continue;
        }

        // Flatten nested folders: only the file name is kept.
        let Some(file_name) = Path::new(member.name()).file_name().map(|n| n.to_owned()) else {
            continue;
        };
        let out_path = out_dir.join(file_name);

        let mut out_file = fs::File::create(&out_path)
            .with_context(|| format!("Failed to create {}", out_path.display()))?;
        io::copy(&mut member, &mut out_file)?;
        count += 1;
    }

    Ok(count)
}

/// True for the tool's own outputs, which must never be read back as input.
pub fn is_excluded(file_name: &str, markers: &[String]) -> bool {
    let lower = file_name.to_lowercase();
    markers.iter().any(|marker| lower.contains(marker.as_str()))
}

/// Candidate exports in the data folder and its raw subfolder, deduplicated
/// in discovery order.
pub fn discover_csv_files(config: &ExtractorConfig) -> Result<Vec<PathBuf>> {
    let markers = config.excluded_markers();
    let mut files: Vec<PathBuf> = Vec::new();

    for dir in [config.data_dir.clone(), config.raw_dir()] {
        for path in glob_files(&dir, "csv")? {
            let file_name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();

            if is_excluded(&file_name, &markers) {
                debug!("skipping output file {}", file_name);
                continue;
            }
            if !files.contains(&path) {
                files.push(path);
            }
        }
    }

    Ok(files)
}
