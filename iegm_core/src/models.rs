use polars::prelude::DataFrame;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

pub const COL_INDICADOR: &str = "indicador";
pub const COL_ANO_REF: &str = "ano_ref";
pub const COL_MUNICIPIO: &str = "municipio";
pub const COL_NOTA: &str = "nota";
pub const COL_QUESTAO: &str = "questao";
pub const COL_RESPOSTA: &str = "resposta";
pub const COL_RESPOSTAS: &str = "respostas";
pub const COL_INDICE_QUESTAO: &str = "indice_questao";
pub const COL_CHAVE_QUESTAO: &str = "chave_questao";
pub const COL_ROTULO: &str = "rotulo";

/// Canonical spelling of the seven IEGM indicators.
pub const CANONICAL_INDICATORS: [&str; 7] = [
    "i-Amb", "i-Cidade", "i-Educ", "i-Fiscal", "i-GovTI", "i-Plan", "i-Saude",
];

/// Columns kept in the consolidated report, in output order.
pub const OUTPUT_COLUMNS: [&str; 15] = [
    // already consumed by the dashboard
    "municipio",
    "indicador",
    "questao",
    "resposta",
    "nota",
    "ano_ref",
    // question identifiers
    "questao_id",
    "indice_questao",
    "chave_questao",
    // context
    "nome_questionario",
    "codigo_ibge",
    "tribunal",
    // optional
    "questionario_id",
    "data_termino",
    "sequencia_bloco_repeticao",
];

/// Allow-list columns that the dashboard did not consume before.
pub const NEW_COLUMNS: [&str; 9] = [
    "questao_id",
    "indice_questao",
    "chave_questao",
    "nome_questionario",
    "codigo_ibge",
    "tribunal",
    "questionario_id",
    "data_termino",
    "sequencia_bloco_repeticao",
];

/// Text columns shortened in the terminal preview.
pub const PREVIEW_TRUNCATED_COLUMNS: [&str; 4] =
    ["questao", "resposta", "chave_questao", "nome_questionario"];

/// Identifier columns reported in the final "new data" check.
pub const IDENTIFIER_COLUMNS: [&str; 3] = ["questao_id", "indice_questao", "chave_questao"];

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum TextEncoding {
    Utf16,
    Utf8,
    Utf8Sig,
    Latin1,
    Cp1252,
}

impl TextEncoding {
    /// Order in which encodings are attempted.
    pub const CANDIDATES: [TextEncoding; 5] = [
        TextEncoding::Utf16,
        TextEncoding::Utf8,
        TextEncoding::Utf8Sig,
        TextEncoding::Latin1,
        TextEncoding::Cp1252,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            TextEncoding::Utf16 => "utf-16",
            TextEncoding::Utf8 => "utf-8",
            TextEncoding::Utf8Sig => "utf-8-sig",
            TextEncoding::Latin1 => "latin-1",
            TextEncoding::Cp1252 => "cp1252",
        }
    }
}

impl fmt::Display for TextEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Separator {
    Semicolon,
    Comma,
    Tab,
}

impl Separator {
    /// Order in which separators are attempted for each encoding.
    pub const CANDIDATES: [Separator; 3] = [Separator::Semicolon, Separator::Comma, Separator::Tab];

    pub fn byte(&self) -> u8 {
        match self {
            Separator::Semicolon => b';',
            Separator::Comma => b',',
            Separator::Tab => b'\t',
        }
    }
}

impl fmt::Display for Separator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Separator::Semicolon => f.write_str(";"),
            Separator::Comma => f.write_str(","),
            Separator::Tab => f.write_str("\\t"),
        }
    }
}

/// Outcome of looking for a metadata column inside a file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Detected<T> {
    /// Column absent or holding only nulls.
    Missing,
    Single(T),
    /// Sorted, distinct values.
    Multiple(Vec<T>),
}

impl<T: Ord + Clone> Detected<T> {
    pub fn from_values(mut values: Vec<T>) -> Self {
        values.sort();
        values.dedup();
        match values.len() {
            0 => Detected::Missing,
            1 => Detected::Single(values.remove(0)),
            _ => Detected::Multiple(values),
        }
    }

    pub fn is_multiple(&self) -> bool {
        matches!(self, Detected::Multiple(_))
    }
}

impl<T: fmt::Display> fmt::Display for Detected<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Detected::Missing => f.write_str("None"),
            Detected::Single(v) => write!(f, "{}", v),
            Detected::Multiple(values) => {
                let joined: Vec<String> = values.iter().map(|v| v.to_string()).collect();
                write!(f, "[{}]", joined.join(", "))
            }
        }
    }
}

/// A CSV export read under the first encoding/separator pair that made sense.
#[derive(Debug, Clone)]
pub struct LoadedCsv {
    pub path: PathBuf,
    pub encoding: TextEncoding,
    pub separator: Separator,
    /// All columns are strings; names are trimmed and lower-cased.
    pub frame: DataFrame,
}

impl LoadedCsv {
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    pub fn column_names(&self) -> Vec<String> {
        self.frame
            .get_columns()
            .iter()
            .map(|s| s.name().to_string())
            .collect()
    }
}

/// One line of the organization ledger.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OrganizedFile {
    pub original_name: String,
    pub organized_name: String,
    pub path: PathBuf,
    pub year: Option<i32>,
    pub indicator: Option<String>,
    pub records: usize,
}

/// Ledger entry together with the rows that were written for it.
#[derive(Debug, Clone)]
pub struct OrganizedFrame {
    pub info: OrganizedFile,
    pub frame: DataFrame,
}
