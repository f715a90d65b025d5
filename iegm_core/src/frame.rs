use anyhow::Result;
use polars::prelude::*;

pub fn column_names(df: &DataFrame) -> Vec<String> {
    df.get_columns().iter().map(|s| s.name().to_string()).collect()
}

pub fn has_column(df: &DataFrame, name: &str) -> bool {
    df.column(name).is_ok()
}

/// Render any column as optional strings (floats as `7.5`, nulls as `None`).
pub fn string_values(series: &Series) -> Result<Vec<Option<String>>> {
    let as_text = series.cast(&DataType::String)?;
    Ok(as_text
        .str()?
        .into_iter()
        .map(|v| v.map(str::to_string))
        .collect())
}

/// Distinct non-null values in order of first appearance.
pub fn distinct_values(series: &Series) -> Result<Vec<String>> {
    let mut seen = std::collections::HashSet::new();
    Ok(string_values(series)?
        .into_iter()
        .flatten()
        .filter(|v| seen.insert(v.clone()))
        .collect())
}

pub fn is_numeric(dtype: &DataType) -> bool {
    matches!(
        dtype,
        DataType::Float32
            | DataType::Float64
            | DataType::Int8
            | DataType::Int16
            | DataType::Int32
            | DataType::Int64
            | DataType::UInt8
            | DataType::UInt16
            | DataType::UInt32
            | DataType::UInt64
    )
}

/// Numeric view of a column, for spreadsheet cells and totals.
pub fn float_values(series: &Series) -> Result<Vec<Option<f64>>> {
    let as_float = series.cast(&DataType::Float64)?;
    Ok(as_float.f64()?.into_iter().collect())
}
