use std::path::{Path, PathBuf};

const RAW_SUBDIR: &str = "csv_brutos";
const ORGANIZED_SUBDIR: &str = "csv_organizados";
pub const MANIFEST_FILE: &str = "manifest.json";

/// Resolved settings for one extraction run.
#[derive(Debug, Clone)]
pub struct ExtractorConfig {
    pub data_dir: PathBuf,
    /// Trimmed and upper-cased, like the `municipio` column after normalization.
    pub municipality: String,
    pub years: Vec<i32>,
    pub indicators: Vec<String>,
    pub preview_rows: usize,
    pub extract_zips: bool,
    pub skip_xlsx: bool,
}

impl ExtractorConfig {
    pub fn new(data_dir: impl AsRef<Path>, municipality: &str) -> Self {
        Self {
            data_dir: data_dir.as_ref().to_path_buf(),
            municipality: municipality.trim().to_uppercase(),
            years: Vec::new(),
            indicators: Vec::new(),
            preview_rows: 15,
            extract_zips: true,
            skip_xlsx: false,
        }
    }

    pub fn raw_dir(&self) -> PathBuf {
        self.data_dir.join(RAW_SUBDIR)
    }

    pub fn organized_dir(&self) -> PathBuf {
        self.data_dir.join(ORGANIZED_SUBDIR)
    }

    pub fn manifest_path(&self) -> PathBuf {
        self.organized_dir().join(MANIFEST_FILE)
    }

    /// `Relatorio_Belo_Horizonte_Completo.xlsx`
    pub fn excel_path(&self) -> PathBuf {
        self.data_dir
            .join(format!("Relatorio_{}_Completo.xlsx", self.title_name()))
    }

    /// `respostas_belo_horizonte_completo.csv`
    pub fn csv_path(&self) -> PathBuf {
        self.data_dir
            .join(format!("respostas_{}_completo.csv", self.slug()))
    }

    /// Lower-case file name fragments that mark the tool's own outputs.
    pub fn excluded_markers(&self) -> Vec<String> {
        vec![
            "cleaned".to_string(),
            "relatorio".to_string(),
            format!("respostas_{}", self.slug()),
        ]
    }

    fn slug(&self) -> String {
        self.municipality
            .to_lowercase()
            .split_whitespace()
            .collect::<Vec<_>>()
            .join("_")
    }

    fn title_name(&self) -> String {
        self.municipality
            .split_whitespace()
            .map(|word| {
                let lower = word.to_lowercase();
                let mut chars = lower.chars();
                match chars.next() {
                    Some(first) => first.to_uppercase().chain(chars).collect(),
                    None => String::new(),
                }
            })
            .collect::<Vec<String>>()
            .join("_")
    }
}
