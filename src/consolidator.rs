use crate::config::ExtractorConfig;
use anyhow::{bail, Result};
use iegm_core::frame::{has_column, string_values};
use iegm_core::models::{COL_MUNICIPIO, NEW_COLUMNS};
use iegm_core::normalizer::{
    add_label, align_and_concat, drop_duplicates, filter_indicators, filter_municipality,
    filter_years, normalize, select_columns, summarize,
};
use iegm_core::{LabelSource, OrganizedFrame};
use log::info;
use polars::prelude::*;

/// How many distinct municipalities to list when the target one is absent.
const MUNICIPALITY_HINTS: usize = 15;

/// Result of phase 2: the report rows and their per-year/indicator summary.
pub struct Consolidated {
    pub report: DataFrame,
    pub summary: DataFrame,
}

/// Phase 2: merge the organized frames, narrow them down to one municipality
/// and shape them into the report layout.
pub fn consolidate(config: &ExtractorConfig, organized: &[OrganizedFrame]) -> Result<Consolidated> {
    if organized.is_empty() {
        bail!("No file could be read; nothing to consolidate");
    }

    let frames: Vec<DataFrame> = organized.iter().map(|o| o.frame.clone()).collect();
    let combined = align_and_concat(&frames)?;
    println!("📦 Combined: {} records from {} file(s)", combined.height(), frames.len());

    let (normalized, steps) = normalize(combined)?;
    for step in &steps {
        println!("   ✅ {}", step);
    }

    let mut df = normalized;
    if !config.years.is_empty() {
        df = filter_years(&df, &config.years)?;
        println!("📅 Year filter {:?}: {} records", config.years, df.height());
    }
    if !config.indicators.is_empty() {
        df = filter_indicators(&df, &config.indicators)?;
        println!("📊 Indicator filter {:?}: {} records", config.indicators, df.height());
    }

    let filtered = filter_municipality(&df, &config.municipality)?;
    println!(
        "🏙️  {}",
        municipality_message(&config.municipality, filtered.height(), df.height())
    );

    if filtered.height() == 0 {
        print_available_municipalities(&df)?;
        bail!("No records found for {}", config.municipality);
    }

    let (unique, removed) = drop_duplicates(&filtered)?;
    println!("🧹 {}", duplicate_message(removed));
    info!("{} unique records after deduplication", unique.height());

    let selection = select_columns(&unique)?;
    println!("\n📋 Selected columns:");
    for column in &selection.present {
        let marker = if NEW_COLUMNS.contains(&column.as_str()) { "🆕" } else { "✅" };
        println!("   {} {}", marker, column);
    }
    if !selection.missing.is_empty() {
        println!("   ⚠️  Not present in the data: {}", selection.missing.join(", "));
    }

    let (report, label_source) = add_label(selection.frame)?;
    match label_source {
        LabelSource::IndiceQuestao => println!("🏷️  'rotulo' taken from 'indice_questao'"),
        LabelSource::ChaveQuestao => println!("🏷️  'rotulo' taken from 'chave_questao'"),
        LabelSource::Empty => println!("⚠️  No question identifier found; 'rotulo' left empty"),
    }

    let summary = summarize(&report)?;

    Ok(Consolidated { report, summary })
}

fn municipality_message(municipality: &str, matched: usize, total: usize) -> String {
    format!("Records for {}: {} (of {} total)", municipality, matched, total)
}

fn duplicate_message(removed: usize) -> String {
    if removed == 0 {
        "No duplicates found".to_string()
    } else {
        format!("Removed {} duplicate record(s)", removed)
    }
}

fn print_available_municipalities(df: &DataFrame) -> Result<()> {
    if !has_column(df, COL_MUNICIPIO) {
        return Ok(());
    }

    let mut municipios: Vec<String> = string_values(df.column(COL_MUNICIPIO)?)?
        .into_iter()
        .flatten()
        .collect();
    municipios.sort();
    municipios.dedup();

    println!("❌ Available municipalities (first {}):", MUNICIPALITY_HINTS);
    for municipio in municipios.iter().take(MUNICIPALITY_HINTS) {
        println!("   - {}", municipio);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use iegm_core::frame::column_names;
    use iegm_core::OrganizedFile;
    use std::path::PathBuf;

    fn organized(name: &str, columns: &[(&str, Vec<Option<&str>>)]) -> OrganizedFrame {
        let frame = DataFrame::new(
            columns
                .iter()
                .map(|(n, v)| Series::new((*n).into(), v.clone()))
                .collect(),
        )
        .unwrap();
        OrganizedFrame {
            info: OrganizedFile {
                original_name: name.to_string(),
                organized_name: name.to_string(),
                path: PathBuf::from(name),
                year: None,
                indicator: None,
                records: frame.height(),
            },
            frame,
        }
    }

    fn sample() -> Vec<OrganizedFrame> {
        vec![
            organized(
                "a.csv",
                &[
                    ("municipio", vec![Some(" betim"), Some("CONTAGEM"), Some("BETIM")]),
                    ("indicador", vec![Some("i-Educ"), Some("i-Educ"), Some("i-Educ")]),
                    ("ano_ref", vec![Some("2023"), Some("2023"), Some("2023")]),
                    ("questao", vec![Some("q1"), Some("q1"), Some("q1")]),
                    ("nota", vec![Some("1,5"), Some("2"), Some("1,5")]),
                    ("extra", vec![Some("x"), Some("y"), Some("x")]),
                ],
            ),
            organized(
                "b.csv",
                &[
                    ("municipio", vec![Some("BETIM")]),
                    ("indicador", vec![Some("i-Amb")]),
                    ("ano_ref", vec![Some("2022")]),
                    ("respostas", vec![Some("Sim")]),
                    ("chave_questao", vec![Some("AMB01")]),
                ],
            ),
        ]
    }

    #[test]
    fn test_consolidate() {
        let config = ExtractorConfig::new("data", "Betim");
        let result = consolidate(&config, &sample()).unwrap();

        // " betim" normalizes to a duplicate of the third row.
        assert_eq!(result.report.height(), 2);
        let rotulos = string_values(result.report.column("rotulo").unwrap()).unwrap();
        assert_eq!(rotulos, vec![None, Some("AMB01".to_string())]);
        assert_eq!(
            column_names(&result.report),
            vec![
                "municipio",
                "indicador",
                "questao",
                "resposta",
                "nota",
                "ano_ref",
                "chave_questao",
                "rotulo",
            ]
        );
        assert_eq!(result.summary.height(), 2);
    }

    #[test]
    fn test_consolidate_with_year_filter() {
        let mut config = ExtractorConfig::new("data", "BETIM");
        config.years = vec![2022];
        let result = consolidate(&config, &sample()).unwrap();
        assert_eq!(result.report.height(), 1);
    }

    #[test]
    fn test_unknown_municipality_fails() {
        let config = ExtractorConfig::new("data", "OURO PRETO");
        assert!(consolidate(&config, &sample()).is_err());
    }

    #[test]
    fn test_progress_messages() {
        assert_eq!(
            municipality_message("BETIM", 2, 4),
            "Records for BETIM: 2 (of 4 total)"
        );
        assert_eq!(duplicate_message(0), "No duplicates found");
        assert_eq!(duplicate_message(3), "Removed 3 duplicate record(s)");
    }

    #[test]
    fn test_empty_ledger_fails() {
        let config = ExtractorConfig::new("data", "BETIM");
        assert!(consolidate(&config, &[]).is_err());
    }
}
