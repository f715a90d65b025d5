use anyhow::{Context, Result};
use iegm_core::frame::{column_names, float_values, is_numeric, string_values};
use polars::prelude::*;
use rust_xlsxwriter::{Format, Workbook, Worksheet};
use std::fs::File;
use std::path::Path;

pub const DATA_SHEET: &str = "Dados Completos";
pub const SUMMARY_SHEET: &str = "Resumo Indicadores";

const MAX_COLUMN_WIDTH: usize = 80;

/// `;`-separated UTF-8 with a header row; nulls become empty fields.
pub fn write_csv(df: &mut DataFrame, path: &Path) -> Result<()> {
    let mut file = File::create(path)
        .with_context(|| format!("Failed to create {}", path.display()))?;
    CsvWriter::new(&mut file)
        .include_header(true)
        .with_separator(b';')
        .finish(df)
        .with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(())
}

/// Widest rendered cell plus two, header included, capped at 80.
pub fn column_width(name: &str, values: &[Option<String>]) -> usize {
    let longest = values
        .iter()
        .flatten()
        .map(|v| v.chars().count())
        .chain(std::iter::once(name.chars().count()))
        .max()
        .unwrap_or(0);
    (longest + 2).min(MAX_COLUMN_WIDTH)
}

fn write_sheet(worksheet: &mut Worksheet, df: &DataFrame, header: &Format) -> Result<()> {
    for (col_idx, name) in column_names(df).iter().enumerate() {
        let col = u16::try_from(col_idx).context("Too many columns for a worksheet")?;
        let series = df.column(name)?;
        let text = string_values(series)?;

        worksheet.write_string_with_format(0, col, name, header)?;

        if is_numeric(series.dtype()) {
            for (row_idx, value) in float_values(series)?.into_iter().enumerate() {
                if let Some(value) = value {
                    let row = u32::try_from(row_idx + 1).context("Too many rows for a worksheet")?;
                    worksheet.write_number(row, col, value)?;
                }
            }
        } else {
            for (row_idx, value) in text.iter().enumerate() {
                if let Some(value) = value {
                    let row = u32::try_from(row_idx + 1).context("Too many rows for a worksheet")?;
                    worksheet.write_string(row, col, value)?;
                }
            }
        }

        worksheet.set_column_width(col, column_width(name, &text) as f64)?;
    }
    Ok(())
}

/// One worksheet per `(name, frame)`, in order, with a bold header row.
pub fn write_workbook(path: &Path, sheets: &[(&str, &DataFrame)]) -> Result<()> {
    let mut workbook = Workbook::new();
    let header = Format::new().set_bold();

    for (name, df) in sheets {
        let worksheet = workbook.add_worksheet();
        worksheet.set_name(*name)?;
        write_sheet(worksheet, df, &header)?;
    }

    workbook
        .save(path)
        .with_context(|| format!("Failed to save {}", path.display()))?;
    Ok(())
}
