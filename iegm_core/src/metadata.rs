use crate::frame::{has_column, string_values};
use crate::models::{Detected, CANONICAL_INDICATORS, COL_ANO_REF, COL_INDICADOR};
use anyhow::Result;
use log::warn;
use once_cell::sync::Lazy;
use polars::prelude::*;
use regex::Regex;
use std::collections::BTreeSet;

static YEAR_IN_NAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?:^|[^0-9])(20\d{2})(?:[^0-9]|$)").expect("valid year regex"));

static INDICATOR_IN_NAME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(?:^|[_\s.])(i-(?:amb|cidade|educ|fiscal|govti|plan|saude))(?:[_\s.-]|$)")
        .expect("valid indicator regex")
});

/// Rows of one (indicator, year) pair after splitting a multi-valued export.
#[derive(Debug, Clone)]
pub struct FrameGroup {
    pub indicator: Option<String>,
    pub year: Option<i32>,
    pub frame: DataFrame,
}

/// Whole numbers written as `3106705`, ` 12 ` or `2023.0`.
pub fn parse_integer(raw: &str) -> Option<i64> {
    let raw = raw.trim();
    if let Ok(value) = raw.parse::<i64>() {
        return Some(value);
    }
    match raw.parse::<f64>() {
        Ok(value) if value.fract() == 0.0 && value.abs() < i64::MAX as f64 => Some(value as i64),
        _ => None,
    }
}

/// `2023`, ` 2023 ` and `2023.0` are all 2023.
pub fn parse_year(raw: &str) -> Option<i32> {
    parse_integer(raw).and_then(|value| i32::try_from(value).ok())
}

pub fn detect_indicator(df: &DataFrame) -> Result<Detected<String>> {
    if !has_column(df, COL_INDICADOR) {
        return Ok(Detected::Missing);
    }

    let values = string_values(df.column(COL_INDICADOR)?)?
        .into_iter()
        .flatten()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .collect();

    Ok(Detected::from_values(values))
}

pub fn detect_year(df: &DataFrame) -> Result<Detected<i32>> {
    if !has_column(df, COL_ANO_REF) {
        return Ok(Detected::Missing);
    }

    let mut years = Vec::new();
    for raw in string_values(df.column(COL_ANO_REF)?)?.into_iter().flatten() {
        match parse_year(&raw) {
            Some(year) => years.push(year),
            None => warn!("ignoring non-numeric ano_ref value '{}'", raw),
        }
    }

    Ok(Detected::from_values(years))
}

/// Map an indicator to its canonical spelling (`I-EDUC` → `i-Educ`).
/// Unknown names come back trimmed but otherwise untouched.
pub fn normalize_indicator(raw: &str) -> String {
    let trimmed = raw.trim();
    CANONICAL_INDICATORS
        .iter()
        .find(|canonical| canonical.eq_ignore_ascii_case(trimmed))
        .map(|canonical| canonical.to_string())
        .unwrap_or_else(|| trimmed.to_string())
}

/// `respostas_iegm_{indicator}_{year}_nota.csv`; absent parts are left out.
pub fn canonical_file_name(indicator: Option<&str>, year: Option<i32>) -> String {
    let mut name = String::from("respostas_iegm");
    if let Some(indicator) = indicator {
        name.push('_');
        name.push_str(&indicator.replace(['/', '\\'], "_"));
    }
    if let Some(year) = year {
        name.push_str(&format!("_{}", year));
    }
    name.push_str("_nota.csv");
    name
}

/// Recover indicator and year from portal file names such as
/// `respostas_iegm_i-Educ_2023_nota.csv` or
/// `respostas_iegm_2023_TCEMG_completo_nota.csv`.
pub fn infer_from_file_name(file_name: &str) -> (Option<String>, Option<i32>) {
    let indicator = INDICATOR_IN_NAME
        .captures(file_name)
        .and_then(|caps| caps.get(1))
        .map(|m| normalize_indicator(m.as_str()));

    let year = YEAR_IN_NAME
        .captures(file_name)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse::<i32>().ok());

    (indicator, year)
}

/// Split by the (canonical indicator, year) pair. Rows with a null key are
/// dropped; when only one of the two columns exists the split uses that one
/// alone.
pub fn split_groups(df: &DataFrame) -> Result<Vec<FrameGroup>> {
    let indicators = if has_column(df, COL_INDICADOR) {
        Some(string_values(df.column(COL_INDICADOR)?)?)
    } else {
        None
    };
    let years = if has_column(df, COL_ANO_REF) {
        Some(string_values(df.column(COL_ANO_REF)?)?)
    } else {
        None
    };

    if indicators.is_none() && years.is_none() {
        return Ok(vec![FrameGroup {
            indicator: None,
            year: None,
            frame: df.clone(),
        }]);
    }

    let mut row_keys: Vec<Option<(Option<String>, Option<i32>)>> = Vec::with_capacity(df.height());
    for row in 0..df.height() {
        let indicator = match &indicators {
            Some(values) => match values[row].as_deref().map(str::trim) {
                Some(v) if !v.is_empty() => Some(normalize_indicator(v)),
                _ => {
                    row_keys.push(None);
                    continue;
                }
            },
            None => None,
        };
        let year = match &years {
            Some(values) => match values[row].as_deref().and_then(parse_year) {
                Some(y) => Some(y),
                None => {
                    row_keys.push(None);
                    continue;
                }
            },
            None => None,
        };
        row_keys.push(Some((indicator, year)));
    }

    let groups: BTreeSet<(Option<String>, Option<i32>)> =
        row_keys.iter().flatten().cloned().collect();

    let mut result = Vec::with_capacity(groups.len());
    for key in groups {
        let mask: BooleanChunked = row_keys.iter().map(|k| k.as_ref() == Some(&key)).collect();
        let (indicator, year) = key;
        result.push(FrameGroup {
            indicator,
            year,
            frame: df.filter(&mask)?,
        });
    }

    Ok(result)
}
