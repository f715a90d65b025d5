use crate::frame::{column_names, has_column, string_values};
use crate::metadata::{normalize_indicator, parse_integer, parse_year};
use crate::models::{
    COL_ANO_REF, COL_CHAVE_QUESTAO, COL_INDICADOR, COL_INDICE_QUESTAO, COL_MUNICIPIO, COL_NOTA,
    COL_QUESTAO, COL_RESPOSTA, COL_RESPOSTAS, COL_ROTULO, OUTPUT_COLUMNS,
};
use anyhow::{Context, Result};
use polars::prelude::*;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NormalizationStep {
    RenamedRespostas,
    ConvertedNota,
    NormalizedMunicipio,
    InferredIntegers(Vec<String>),
}

impl fmt::Display for NormalizationStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NormalizationStep::RenamedRespostas => f.write_str("Renamed 'respostas' → 'resposta'"),
            NormalizationStep::ConvertedNota => f.write_str("Column 'nota' converted to numeric"),
            NormalizationStep::NormalizedMunicipio => f.write_str("Column 'municipio' normalized"),
            NormalizationStep::InferredIntegers(columns) => {
                write!(f, "Integer columns: {}", columns.join(", "))
            }
        }
    }
}

/// Where the `rotulo` column came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LabelSource {
    IndiceQuestao,
    ChaveQuestao,
    Empty,
}

#[derive(Debug, Clone)]
pub struct ColumnSelection {
    pub frame: DataFrame,
    pub present: Vec<String>,
    pub missing: Vec<String>,
}

/// Stack frames whose column sets differ. The result carries the union of
/// columns in first-seen order; a frame lacking a column contributes nulls.
pub fn align_and_concat(frames: &[DataFrame]) -> Result<DataFrame> {
    let mut order: Vec<String> = Vec::new();
    for frame in frames {
        for name in column_names(frame) {
            if !order.contains(&name) {
                order.push(name);
            }
        }
    }

    let mut combined: Option<DataFrame> = None;
    for frame in frames {
        let mut aligned = frame.clone();
        for name in &order {
            if !has_column(&aligned, name) {
                let nulls = Series::full_null(name.as_str().into(), aligned.height(), &DataType::String);
                aligned.with_column(nulls)?;
            }
        }
        let aligned = aligned.select(order.iter().map(String::as_str))?;

        match combined.as_mut() {
            Some(acc) => {
                acc.vstack_mut(&aligned)?;
            }
            None => combined = Some(aligned),
        }
    }

    Ok(combined.unwrap_or_else(DataFrame::empty))
}

fn parse_decimal(raw: &str) -> Option<f64> {
    raw.trim().replace(',', ".").parse::<f64>().ok()
}

/// `Int64` view of a text column whose every non-null value is a whole
/// number (`2023` or `2023.0`); `None` otherwise or when the column is all null.
fn integer_column(series: &Series) -> Result<Option<Series>> {
    if !matches!(series.dtype(), DataType::String) || series.null_count() == series.len() {
        return Ok(None);
    }

    let mut values = Vec::with_capacity(series.len());
    for raw in string_values(series)? {
        match raw {
            None => values.push(None),
            Some(raw) => match parse_integer(&raw) {
                Some(value) => values.push(Some(value)),
                None => return Ok(None),
            },
        }
    }

    Ok(Some(Series::new(series.name().clone(), values)))
}

pub fn normalize(mut df: DataFrame) -> Result<(DataFrame, Vec<NormalizationStep>)> {
    let mut steps = Vec::new();

    if has_column(&df, COL_RESPOSTAS) && !has_column(&df, COL_RESPOSTA) {
        df.rename(COL_RESPOSTAS, COL_RESPOSTA.into())?;
        steps.push(NormalizationStep::RenamedRespostas);
    }

    if has_column(&df, COL_NOTA) {
        let notas: Vec<Option<f64>> = string_values(df.column(COL_NOTA)?)?
            .into_iter()
            .map(|v| v.as_deref().and_then(parse_decimal))
            .collect();
        df.with_column(Series::new(COL_NOTA.into(), notas))?;
        steps.push(NormalizationStep::ConvertedNota);
    }

    if has_column(&df, COL_MUNICIPIO) {
        let municipios: Vec<Option<String>> = string_values(df.column(COL_MUNICIPIO)?)?
            .into_iter()
            .map(|v| v.map(|s| s.trim().to_uppercase()))
            .collect();
        df.with_column(Series::new(COL_MUNICIPIO.into(), municipios))?;
        steps.push(NormalizationStep::NormalizedMunicipio);
    }

    let mut integers = Vec::new();
    for name in column_names(&df) {
        if let Some(series) = integer_column(df.column(&name)?)? {
            df.with_column(series)?;
            integers.push(name);
        }
    }
    if !integers.is_empty() {
        steps.push(NormalizationStep::InferredIntegers(integers));
    }

    Ok((df, steps))
}

/// Rows whose normalized `municipio` equals `municipality` exactly.
pub fn filter_municipality(df: &DataFrame, municipality: &str) -> Result<DataFrame> {
    let municipios = df
        .column(COL_MUNICIPIO)
        .context("No 'municipio' column in the combined data")?;
    let values = string_values(municipios)?;
    let mask: BooleanChunked = values
        .iter()
        .map(|v| v.as_deref() == Some(municipality))
        .collect();
    Ok(df.filter(&mask)?)
}

/// Keep rows whose `ano_ref` is listed; an empty list keeps everything.
pub fn filter_years(df: &DataFrame, years: &[i32]) -> Result<DataFrame> {
    if years.is_empty() {
        return Ok(df.clone());
    }
    let anos = df
        .column(COL_ANO_REF)
        .context("Year filter given but there is no 'ano_ref' column")?;
    let mask: BooleanChunked = string_values(anos)?
        .iter()
        .map(|v| v.as_deref().and_then(parse_year).is_some_and(|y| years.contains(&y)))
        .collect();
    Ok(df.filter(&mask)?)
}

/// Keep rows whose indicator is listed, compared by canonical spelling.
pub fn filter_indicators(df: &DataFrame, indicators: &[String]) -> Result<DataFrame> {
    if indicators.is_empty() {
        return Ok(df.clone());
    }
    let wanted: Vec<String> = indicators.iter().map(|i| normalize_indicator(i)).collect();
    let column = df
        .column(COL_INDICADOR)
        .context("Indicator filter given but there is no 'indicador' column")?;
    let mask: BooleanChunked = string_values(column)?
        .iter()
        .map(|v| v.as_deref().is_some_and(|i| wanted.contains(&normalize_indicator(i))))
        .collect();
    Ok(df.filter(&mask)?)
}

/// Drop exact-duplicate rows, first occurrence wins. Returns the count removed.
pub fn drop_duplicates(df: &DataFrame) -> Result<(DataFrame, usize)> {
    let before = df.height();
    let unique = df.unique_stable(None, UniqueKeepStrategy::First, None)?;
    let removed = before - unique.height();
    Ok((unique, removed))
}

pub fn select_columns(df: &DataFrame) -> Result<ColumnSelection> {
    let (present, missing): (Vec<&str>, Vec<&str>) =
        OUTPUT_COLUMNS.iter().copied().partition(|c| has_column(df, c));

    Ok(ColumnSelection {
        frame: df.select(present.iter().copied())?,
        present: present.into_iter().map(String::from).collect(),
        missing: missing.into_iter().map(String::from).collect(),
    })
}

/// Append `rotulo`, taken from `indice_questao`, else `chave_questao`,
/// else left empty.
pub fn add_label(mut df: DataFrame) -> Result<(DataFrame, LabelSource)> {
    let source = if has_column(&df, COL_INDICE_QUESTAO) {
        LabelSource::IndiceQuestao
    } else if has_column(&df, COL_CHAVE_QUESTAO) {
        LabelSource::ChaveQuestao
    } else {
        LabelSource::Empty
    };

    let labels: Vec<Option<String>> = match source {
        LabelSource::IndiceQuestao | LabelSource::ChaveQuestao => {
            let from = if source == LabelSource::IndiceQuestao {
                COL_INDICE_QUESTAO
            } else {
                COL_CHAVE_QUESTAO
            };
            string_values(df.column(from)?)?
                .into_iter()
                .map(|v| v.map(|s| s.trim().to_string()))
                .collect()
        }
        LabelSource::Empty => vec![Some(String::new()); df.height()],
    };

    df.with_column(Series::new(COL_ROTULO.into(), labels))?;
    Ok((df, source))
}

/// Per (`ano_ref`, `indicador`): question count and mean/max/min `nota`,
/// sorted by key and rounded to two decimals.
pub fn summarize(df: &DataFrame) -> Result<DataFrame> {
    let keys: Vec<Expr> = [COL_ANO_REF, COL_INDICADOR]
        .into_iter()
        .filter(|c| has_column(df, c))
        .map(col)
        .collect();

    let mut aggs = Vec::new();
    if has_column(df, COL_QUESTAO) {
        aggs.push(col(COL_QUESTAO).count().alias("questoes"));
    }
    if has_column(df, COL_NOTA) {
        aggs.push(col(COL_NOTA).mean().alias("nota_media"));
        aggs.push(col(COL_NOTA).max().alias("nota_max"));
        aggs.push(col(COL_NOTA).min().alias("nota_min"));
    }

    // rows without a full key take no part in the summary
    let lazy = keys
        .iter()
        .fold(df.clone().lazy(), |lazy, key| lazy.filter(key.clone().is_not_null()));
    let summary = if keys.is_empty() {
        lazy.select(aggs).collect()?
    } else {
        lazy.group_by(keys.clone())
            .agg(aggs)
            .sort_by_exprs(keys, SortMultipleOptions::default())
            .collect()?
    };

    round_floats(summary, 2)
}

fn round_floats(mut df: DataFrame, decimals: i32) -> Result<DataFrame> {
    let factor = 10f64.powi(decimals);
    let float_columns: Vec<String> = df
        .get_columns()
        .iter()
        .filter(|s| matches!(s.dtype(), DataType::Float64))
        .map(|s| s.name().to_string())
        .collect();

    for name in float_columns {
        let rounded: Vec<Option<f64>> = df
            .column(&name)?
            .f64()?
            .into_iter()
            .map(|v| v.map(|x| (x * factor).round() / factor))
            .collect();
        df.with_column(Series::new(name.as_str().into(), rounded))?;
    }

    Ok(df)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::float_values;

    fn frame(columns: &[(&str, Vec<Option<&str>>)]) -> DataFrame {
        DataFrame::new(
            columns
                .iter()
                .map(|(name, values)| Series::new((*name).into(), values.clone()))
                .collect(),
        )
        .unwrap()
    }

    #[test]
    fn test_align_and_concat_fills_missing_columns() {
        let a = frame(&[("municipio", vec![Some("BETIM")]), ("nota", vec![Some("1")])]);
        let b = frame(&[("nota", vec![Some("2")]), ("questao", vec![Some("q")])]);

        let combined = align_and_concat(&[a, b]).unwrap();
        assert_eq!(column_names(&combined), vec!["municipio", "nota", "questao"]);
        assert_eq!(combined.height(), 2);

        let municipios = string_values(combined.column("municipio").unwrap()).unwrap();
        assert_eq!(municipios, vec![Some("BETIM".to_string()), None]);
    }

    #[test]
    fn test_align_and_concat_empty() {
        assert_eq!(align_and_concat(&[]).unwrap().height(), 0);
    }

    #[test]
    fn test_normalize() {
        let df = frame(&[
            ("municipio", vec![Some(" betim "), Some("Contagem")]),
            ("respostas", vec![Some("Sim"), Some("Não")]),
            ("nota", vec![Some("7,5"), Some("n/a")]),
        ]);

        let (df, steps) = normalize(df).unwrap();
        assert_eq!(steps.len(), 3);
        assert!(has_column(&df, "resposta"));
        assert!(!has_column(&df, "respostas"));

        let notas = float_values(df.column("nota").unwrap()).unwrap();
        assert_eq!(notas, vec![Some(7.5), None]);

        let municipios = string_values(df.column("municipio").unwrap()).unwrap();
        assert_eq!(municipios[0].as_deref(), Some("BETIM"));
    }

    #[test]
    fn test_normalize_infers_integer_columns() {
        let df = frame(&[
            ("ano_ref", vec![Some("2023"), Some("2023.0"), None]),
            ("codigo_ibge", vec![Some("3106705"), Some("3106705"), Some("3106705")]),
            ("indice_questao", vec![Some("1.1"), Some("2"), Some("3")]),
            ("tribunal", vec![None, None, None]),
        ]);

        let (df, steps) = normalize(df).unwrap();
        assert_eq!(
            steps,
            vec![NormalizationStep::InferredIntegers(vec![
                "ano_ref".to_string(),
                "codigo_ibge".to_string(),
            ])]
        );
        assert_eq!(df.column("ano_ref").unwrap().dtype(), &DataType::Int64);
        assert_eq!(df.column("codigo_ibge").unwrap().dtype(), &DataType::Int64);
        assert_eq!(df.column("indice_questao").unwrap().dtype(), &DataType::String);
        assert_eq!(df.column("tribunal").unwrap().dtype(), &DataType::String);

        let anos = float_values(df.column("ano_ref").unwrap()).unwrap();
        assert_eq!(anos, vec![Some(2023.0), Some(2023.0), None]);
    }

    #[test]
    fn test_normalize_keeps_existing_resposta() {
        let df = frame(&[
            ("resposta", vec![Some("Sim")]),
            ("respostas", vec![Some("x")]),
        ]);
        let (df, steps) = normalize(df).unwrap();
        assert!(steps.is_empty());
        assert!(has_column(&df, "respostas"));
    }

    #[test]
    fn test_filter_municipality() {
        let df = frame(&[("municipio", vec![Some("BETIM"), Some("CONTAGEM"), None])]);
        assert_eq!(filter_municipality(&df, "BETIM").unwrap().height(), 1);
        assert_eq!(filter_municipality(&df, "betim").unwrap().height(), 0);

        let no_column = frame(&[("x", vec![Some("1")])]);
        assert!(filter_municipality(&no_column, "BETIM").is_err());
    }

    #[test]
    fn test_filter_years_and_indicators() {
        let df = frame(&[
            ("ano_ref", vec![Some("2022"), Some("2023"), Some("2023")]),
            ("indicador", vec![Some("i-Amb"), Some("I-EDUC"), Some("i-Plan")]),
        ]);

        assert_eq!(filter_years(&df, &[]).unwrap().height(), 3);
        assert_eq!(filter_years(&df, &[2023]).unwrap().height(), 2);
        assert_eq!(
            filter_indicators(&df, &["i-educ".to_string()]).unwrap().height(),
            1
        );
    }

    #[test]
    fn test_drop_duplicates_keeps_first() {
        let df = frame(&[
            ("questao", vec![Some("q1"), Some("q2"), Some("q1"), None, None]),
            ("nota", vec![Some("1"), Some("2"), Some("1"), None, None]),
        ]);

        let (unique, removed) = drop_duplicates(&df).unwrap();
        assert_eq!(removed, 2);
        let questoes = string_values(unique.column("questao").unwrap()).unwrap();
        assert_eq!(
            questoes,
            vec![Some("q1".to_string()), Some("q2".to_string()), None]
        );
    }

    #[test]
    fn test_select_columns() {
        let df = frame(&[
            ("extra", vec![Some("x")]),
            ("nota", vec![Some("1")]),
            ("municipio", vec![Some("BETIM")]),
        ]);

        let selection = select_columns(&df).unwrap();
        assert_eq!(selection.present, vec!["municipio", "nota"]);
        assert_eq!(column_names(&selection.frame), vec!["municipio", "nota"]);
        assert!(selection.missing.contains(&"questao".to_string()));
        assert_eq!(selection.present.len() + selection.missing.len(), OUTPUT_COLUMNS.len());
    }

    #[test]
    fn test_add_label_sources() {
        let df = frame(&[
            ("indice_questao", vec![Some(" 1.2 ")]),
            ("chave_questao", vec![Some("K")]),
        ]);
        let (df, source) = add_label(df).unwrap();
        assert_eq!(source, LabelSource::IndiceQuestao);
        assert_eq!(
            string_values(df.column("rotulo").unwrap()).unwrap(),
            vec![Some("1.2".to_string())]
        );

        let df = frame(&[("chave_questao", vec![Some("K ")])]);
        let (df, source) = add_label(df).unwrap();
        assert_eq!(source, LabelSource::ChaveQuestao);
        assert_eq!(
            string_values(df.column("rotulo").unwrap()).unwrap(),
            vec![Some("K".to_string())]
        );

        let df = frame(&[("questao", vec![Some("q")])]);
        let (df, source) = add_label(df).unwrap();
        assert_eq!(source, LabelSource::Empty);
        assert_eq!(
            string_values(df.column("rotulo").unwrap()).unwrap(),
            vec![Some(String::new())]
        );
    }

    #[test]
    fn test_summarize() {
        let df = frame(&[
            ("ano_ref", vec![Some("2023"), Some("2022"), Some("2023"), Some("2023")]),
            ("indicador", vec![Some("i-Educ"), Some("i-Educ"), Some("i-Educ"), Some("i-Amb")]),
            ("questao", vec![Some("a"), Some("b"), Some("c"), None]),
            ("nota", vec![Some("1"), Some("2,336"), Some("2,5"), Some("5")]),
        ]);
        let (df, _) = normalize(df).unwrap();

        let summary = summarize(&df).unwrap();
        assert_eq!(summary.height(), 3);

        let anos = string_values(summary.column("ano_ref").unwrap()).unwrap();
        let indicadores = string_values(summary.column("indicador").unwrap()).unwrap();
        assert_eq!(anos[0].as_deref(), Some("2022"));
        assert_eq!(indicadores[1].as_deref(), Some("i-Amb"));

        let questoes = float_values(summary.column("questoes").unwrap()).unwrap();
        assert_eq!(questoes, vec![Some(1.0), Some(0.0), Some(2.0)]);

        let media = float_values(summary.column("nota_media").unwrap()).unwrap();
        assert_eq!(media[2], Some(1.75));
        let maxima = float_values(summary.column("nota_max").unwrap()).unwrap();
        assert_eq!(maxima[0], Some(2.34));
    }

    #[test]
    fn test_summarize_skips_rows_without_key() {
        let tagged = frame(&[
            ("ano_ref", vec![Some("2023")]),
            ("indicador", vec![Some("i-Educ")]),
            ("questao", vec![Some("q1")]),
            ("nota", vec![Some("2")]),
        ]);
        let untagged = frame(&[("questao", vec![Some("q2")]), ("nota", vec![Some("5")])]);

        let combined = align_and_concat(&[tagged, untagged]).unwrap();
        let (df, _) = normalize(combined).unwrap();
        let summary = summarize(&df).unwrap();

        assert_eq!(summary.height(), 1);
        let indicadores = string_values(summary.column("indicador").unwrap()).unwrap();
        assert_eq!(indicadores, vec![Some("i-Educ".to_string())]);
        let media = float_values(summary.column("nota_media").unwrap()).unwrap();
        assert_eq!(media, vec![Some(2.0)]);
    }

    #[test]
    fn test_summarize_groups_years_numerically() {
        let df = frame(&[
            ("ano_ref", vec![Some("2023"), Some("2023.0")]),
            ("indicador", vec![Some("i-Amb"), Some("i-Amb")]),
            ("questao", vec![Some("a"), Some("b")]),
        ]);
        let (df, _) = normalize(df).unwrap();

        let summary = summarize(&df).unwrap();
        assert_eq!(summary.height(), 1);
        let questoes = float_values(summary.column("questoes").unwrap()).unwrap();
        assert_eq!(questoes, vec![Some(2.0)]);
    }
}
