use crate::config::ExtractorConfig;
use anyhow::Result;
use comfy_table::{presets::UTF8_FULL, Cell, CellAlignment, ContentArrangement, Table};
use iegm_core::frame::{column_names, distinct_values, float_values, has_column, string_values};
use iegm_core::metadata::parse_year;
use iegm_core::models::{
    CANONICAL_INDICATORS, COL_ANO_REF, COL_INDICADOR, COL_NOTA, IDENTIFIER_COLUMNS,
    PREVIEW_TRUNCATED_COLUMNS,
};
use iegm_core::OrganizedFile;
use polars::prelude::*;
use std::path::Path;

const PREVIEW_TEXT_LIMIT: usize = 35;
const ORIGINAL_NAME_LIMIT: usize = 40;
const IDENTIFIER_EXAMPLES: usize = 5;

fn new_table(header: Vec<String>) -> Table {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(header);
    table
}

/// Cut to `limit` characters and mark the cut with `...`.
pub fn truncate(text: &str, limit: usize) -> String {
    if text.chars().count() > limit {
        let head: String = text.chars().take(limit).collect();
        format!("{}...", head)
    } else {
        text.to_string()
    }
}

fn file_label(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

pub fn section(title: &str) {
    println!("\n{}", "=".repeat(60));
    println!("  {}", title);
    println!("{}", "=".repeat(60));
}

pub fn organization_table(files: &[OrganizedFile]) -> Table {
    let mut table = new_table(
        ["Original", "Organized", "Year", "Indicator", "Records"]
            .iter()
            .map(|h| h.to_string())
            .collect(),
    );

    for file in files {
        table.add_row(vec![
            Cell::new(file.original_name.chars().take(ORIGINAL_NAME_LIMIT).collect::<String>()),
            Cell::new(&file.organized_name),
            Cell::new(file.year.map(|y| y.to_string()).unwrap_or_default()),
            Cell::new(file.indicator.clone().unwrap_or_default()),
            Cell::new(file.records).set_alignment(CellAlignment::Right),
        ]);
    }
    table
}

/// Year × indicator grid: `✅ (n)` where an organized file covers the pair,
/// with n the records of the first such file, `❌` otherwise. `None` when no
/// file has a year or none has an indicator.
pub fn coverage_matrix(files: &[OrganizedFile]) -> Option<Vec<(i32, Vec<String>)>> {
    let mut years: Vec<i32> = files.iter().filter_map(|f| f.year).collect();
    years.sort_unstable();
    years.dedup();

    if years.is_empty() || files.iter().all(|f| f.indicator.is_none()) {
        return None;
    }

    let rows = years
        .into_iter()
        .map(|year| {
            let cells = CANONICAL_INDICATORS
                .iter()
                .map(|ind| {
                    files
                        .iter()
                        .find(|f| f.year == Some(year) && f.indicator.as_deref() == Some(*ind))
                        .map(|f| format!("✅ ({})", f.records))
                        .unwrap_or_else(|| "❌".to_string())
                })
                .collect();
            (year, cells)
        })
        .collect();
    Some(rows)
}

pub fn print_organization_summary(config: &ExtractorConfig, files: &[OrganizedFile]) {
    section("ORGANIZATION SUMMARY");
    println!("\n📁 Organized files in: {}/", config.organized_dir().display());
    println!("{}", organization_table(files));

    if let Some(matrix) = coverage_matrix(files) {
        println!("\n📊 Coverage matrix (year × indicator):");
        let mut header = vec!["Year".to_string()];
        header.extend(CANONICAL_INDICATORS.iter().map(|i| i.to_string()));

        let mut table = new_table(header);
        for (year, cells) in matrix {
            let mut row = vec![Cell::new(year)];
            row.extend(cells.into_iter().map(Cell::new));
            table.add_row(row);
        }
        println!("{}", table);
    }
}

/// Render the first `limit` rows of a frame. Columns named in `shorten` are
/// cut to the preview text limit.
pub fn frame_table(df: &DataFrame, limit: usize, shorten: &[&str]) -> Result<Table> {
    let names = column_names(df);
    let head = df.head(Some(limit));

    let mut columns = Vec::with_capacity(names.len());
    for name in &names {
        let values = string_values(head.column(name)?)?;
        let cut = shorten.contains(&name.as_str());
        columns.push(
            values
                .into_iter()
                .map(|v| match v {
                    Some(text) if cut => truncate(&text, PREVIEW_TEXT_LIMIT),
                    Some(text) => text,
                    None => String::new(),
                })
                .collect::<Vec<String>>(),
        );
    }

    let mut table = new_table(names);
    for row in 0..head.height() {
        table.add_row(columns.iter().map(|c| c[row].as_str()).collect::<Vec<&str>>());
    }
    Ok(table)
}

pub fn print_preview(df: &DataFrame, rows: usize) -> Result<()> {
    println!("\n--- PREVIEW (first {} rows) ---", rows);
    println!("{}", frame_table(df, rows, &PREVIEW_TRUNCATED_COLUMNS)?);
    Ok(())
}

pub fn print_summary(summary: &DataFrame) -> Result<()> {
    println!("\n--- SUMMARY BY YEAR AND INDICATOR ---");
    println!("{}", frame_table(summary, summary.height(), &[])?);
    Ok(())
}

fn sorted_years(df: &DataFrame) -> Result<Vec<i32>> {
    if !has_column(df, COL_ANO_REF) {
        return Ok(Vec::new());
    }
    let mut years: Vec<i32> = distinct_values(df.column(COL_ANO_REF)?)?
        .iter()
        .filter_map(|v| parse_year(v))
        .collect();
    years.sort_unstable();
    years.dedup();
    Ok(years)
}

fn sorted_indicators(df: &DataFrame) -> Result<Vec<String>> {
    if !has_column(df, COL_INDICADOR) {
        return Ok(Vec::new());
    }
    let mut indicators = distinct_values(df.column(COL_INDICADOR)?)?;
    indicators.sort();
    Ok(indicators)
}

pub fn nota_total(df: &DataFrame) -> Result<f64> {
    if !has_column(df, COL_NOTA) {
        return Ok(0.0);
    }
    Ok(float_values(df.column(COL_NOTA)?)?.into_iter().flatten().sum())
}

pub fn print_final_summary(
    config: &ExtractorConfig,
    report: &DataFrame,
    excel_path: Option<&Path>,
    csv_path: &Path,
) -> Result<()> {
    let years: Vec<String> = sorted_years(report)?.iter().map(|y| y.to_string()).collect();

    section("✅ EXTRACTION COMPLETE!");
    println!("  Municipality: {}", config.municipality);
    println!("  Years: {}", years.join(", "));
    println!("  Indicators: {}", sorted_indicators(report)?.join(", "));
    println!("  Total records: {}", report.height());
    println!("  Sum of notas: {:.2}", nota_total(report)?);
    println!();
    println!("  📁 Organized files: {}/", config.organized_dir().display());
    match excel_path {
        Some(path) => println!("  📊 Excel: {}", file_label(path)),
        None => println!("  📊 Excel: skipped"),
    }
    println!("  📄 CSV: {}", file_label(csv_path));
    println!("{}", "=".repeat(60));
    Ok(())
}

/// Filled count, distinct count and a few examples for one identifier column.
#[derive(Debug, PartialEq)]
pub struct IdentifierStats {
    pub filled: usize,
    pub unique: usize,
    pub examples: Vec<String>,
}

pub fn identifier_stats(series: &Series) -> Result<IdentifierStats> {
    let distinct = distinct_values(series)?;
    Ok(IdentifierStats {
        filled: series.len() - series.null_count(),
        unique: distinct.len(),
        examples: distinct.into_iter().take(IDENTIFIER_EXAMPLES).collect(),
    })
}

pub fn print_identifier_check(report: &DataFrame) -> Result<()> {
    println!("\n🔍 New data extracted:");
    for name in IDENTIFIER_COLUMNS {
        if !has_column(report, name) {
            println!("   ❌ {}: not found in the CSV files", name);
            continue;
        }
        let stats = identifier_stats(report.column(name)?)?;
        println!("   ✅ {}: {} filled, {} unique", name, stats.filled, stats.unique);
        println!("      Examples: {:?}", stats.examples);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn info(year: Option<i32>, indicator: Option<&str>, records: usize) -> OrganizedFile {
        OrganizedFile {
            original_name: "x.csv".to_string(),
            organized_name: "x.csv".to_string(),
            path: PathBuf::from("x.csv"),
            year,
            indicator: indicator.map(String::from),
            records,
        }
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 35), "short");
        assert_eq!(truncate("abcdef", 3), "abc...");
        assert_eq!(truncate("ação", 2), "aç...");
    }

    #[test]
    fn test_coverage_matrix() {
        let files = vec![
            info(Some(2023), Some("i-Educ"), 10),
            info(Some(2022), Some("i-Amb"), 4),
            info(Some(2023), Some("i-Educ"), 99),
            info(None, Some("i-Plan"), 1),
        ];

        let matrix = coverage_matrix(&files).unwrap();
        assert_eq!(matrix.len(), 2);
        assert_eq!(matrix[0].0, 2022);
        assert_eq!(matrix[0].1[0], "✅ (4)");
        assert_eq!(matrix[0].1[1], "❌");
        assert_eq!(matrix[1].1[2], "✅ (10)");
    }

    #[test]
    fn test_coverage_matrix_needs_years_and_indicators() {
        assert!(coverage_matrix(&[info(None, Some("i-Amb"), 1)]).is_none());
        assert!(coverage_matrix(&[info(Some(2023), None, 1)]).is_none());
    }

    #[test]
    fn test_frame_table_truncates_selected_columns() {
        let long = "x".repeat(50);
        let df = DataFrame::new(vec![
            Series::new("questao".into(), vec![Some(long.as_str()), None, Some("b")]),
            Series::new("tribunal".into(), vec![Some(long.as_str()), Some("a"), Some("b")]),
        ])
        .unwrap();

        let rendered = frame_table(&df, 2, &["questao"]).unwrap().to_string();
        assert!(rendered.contains(&format!("{}...", "x".repeat(35))));
        assert!(!rendered.contains(&format!("{}...", "x".repeat(50))));
        assert_eq!(frame_table(&df, 2, &[]).unwrap().row_iter().count(), 2);
    }

    #[test]
    fn test_totals() {
        let df = DataFrame::new(vec![
            Series::new("ano_ref".into(), vec![Some("2023"), Some("2022.0"), Some("2023")]),
            Series::new("nota".into(), vec![Some(1.25), None, Some(2.0)]),
        ])
        .unwrap();

        assert_eq!(sorted_years(&df).unwrap(), vec![2022, 2023]);
        assert_eq!(nota_total(&df).unwrap(), 3.25);
        assert!(sorted_indicators(&df).unwrap().is_empty());
    }

    #[test]
    fn test_identifier_stats() {
        let s = Series::new(
            "questao_id".into(),
            vec![Some("1"), Some("2"), None, Some("1"), Some("3"), Some("4"), Some("5"), Some("6")],
        );
        let stats = identifier_stats(&s).unwrap();
        assert_eq!(stats.filled, 7);
        assert_eq!(stats.unique, 6);
        assert_eq!(stats.examples, vec!["1", "2", "3", "4", "5"]);
    }
}
