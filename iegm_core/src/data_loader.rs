use crate::models::{LoadedCsv, Separator, TextEncoding};
use anyhow::{Context, Result};
use csv::ReaderBuilder;
use encoding_rs::{Encoding, UTF_16BE, UTF_16LE, WINDOWS_1252};
use log::debug;
use polars::prelude::*;
use std::borrow::Cow;
use std::collections::HashSet;
use std::fs;
use std::path::Path;

const UTF8_BOM: &[u8] = &[0xEF, 0xBB, 0xBF];

/// Header plus rows of a delimited text, before it becomes a `DataFrame`.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<Option<String>>>,
}

impl ParsedTable {
    pub fn width(&self) -> usize {
        self.headers.len()
    }

    pub fn into_frame(self) -> Result<DataFrame> {
        let columns: Vec<Series> = self
            .headers
            .iter()
            .enumerate()
            .map(|(idx, name)| {
                let values: Vec<Option<&str>> =
                    self.rows.iter().map(|row| row[idx].as_deref()).collect();
                Series::new(name.as_str().into(), values)
            })
            .collect();

        Ok(DataFrame::new(columns)?)
    }
}

/// Strict decode: `None` when the bytes are not valid for `encoding`.
pub fn decode(bytes: &[u8], encoding: TextEncoding) -> Option<String> {
    match encoding {
        TextEncoding::Utf16 => {
            let (utf16, body) = match Encoding::for_bom(bytes) {
                Some((enc, bom_len)) if enc == UTF_16LE || enc == UTF_16BE => (enc, &bytes[bom_len..]),
                Some(_) => return None,
                None => (UTF_16LE, bytes),
            };
            utf16
                .decode_without_bom_handling_and_without_replacement(body)
                .map(Cow::into_owned)
        }
        TextEncoding::Utf8 => std::str::from_utf8(bytes).ok().map(str::to_owned),
        TextEncoding::Utf8Sig => {
            let body = bytes.strip_prefix(UTF8_BOM).unwrap_or(bytes);
            std::str::from_utf8(body).ok().map(str::to_owned)
        }
        // ISO-8859-1 maps every byte to the code point of the same value.
        TextEncoding::Latin1 => Some(bytes.iter().map(|&b| b as char).collect()),
        TextEncoding::Cp1252 => WINDOWS_1252
            .decode_without_bom_handling_and_without_replacement(bytes)
            .map(Cow::into_owned),
    }
}

/// Parse delimited text. A record wider than the header is an error; shorter
/// records are padded with nulls and empty fields become nulls.
pub fn parse(text: &str, separator: Separator, limit: Option<usize>) -> Result<ParsedTable> {
    let mut reader = ReaderBuilder::new()
        .delimiter(separator.byte())
        .has_headers(true)
        .flexible(true)
        .from_reader(text.as_bytes());

    let headers = clean_headers(reader.headers()?.iter());
    let width = headers.len();

    let mut rows = Vec::new();
    for (index, record) in reader.records().enumerate() {
        if limit.is_some_and(|n| index >= n) {
            break;
        }

        let record = record.with_context(|| format!("Failed to parse record {}", index + 1))?;
        if record.len() > width {
            anyhow::bail!(
                "Record {} has {} fields, header has {}",
                index + 1,
                record.len(),
                width
            );
        }

        let mut row: Vec<Option<String>> = record
            .iter()
            .map(|value| if value.is_empty() { None } else { Some(value.to_string()) })
            .collect();
        row.resize(width, None);
        rows.push(row);
    }

    Ok(ParsedTable { headers, rows })
}

/// Trim (a stray BOM included) and lower-case header names. Blank names
/// become `unnamed: N`; repeated names get `.1`, `.2`, ... suffixes.
pub fn clean_headers<'a>(raw: impl Iterator<Item = &'a str>) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut headers = Vec::new();

    for (idx, name) in raw.enumerate() {
        let name = name
            .trim_matches(|c: char| c.is_whitespace() || c == '\u{feff}')
            .to_lowercase();
        let base = if name.is_empty() { format!("unnamed: {}", idx) } else { name };

        let mut candidate = base.clone();
        let mut suffix = 1;
        while !seen.insert(candidate.clone()) {
            candidate = format!("{}.{}", base, suffix);
            suffix += 1;
        }
        headers.push(candidate);
    }

    headers
}

pub struct DataLoader {
    sample_rows: usize,
}

impl Default for DataLoader {
    fn default() -> Self {
        Self { sample_rows: 5 }
    }
}

impl DataLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read `path` under the first encoding × separator pair whose header has
    /// more than one column. `Ok(None)` means no pair worked.
    pub fn sniff(&self, path: &Path) -> Result<Option<LoadedCsv>> {
        let bytes = fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;

        Ok(self
            .sniff_bytes(&bytes)
            .map(|(encoding, separator, frame)| LoadedCsv {
                path: path.to_path_buf(),
                encoding,
                separator,
                frame,
            }))
    }

    pub fn sniff_bytes(&self, bytes: &[u8]) -> Option<(TextEncoding, Separator, DataFrame)> {
        for encoding in TextEncoding::CANDIDATES {
            let Some(text) = decode(bytes, encoding) else {
                debug!("not valid {}", encoding);
                continue;
            };

            for separator in Separator::CANDIDATES {
                match parse(&text, separator, Some(self.sample_rows)) {
                    Ok(sample) if sample.width() > 1 => {}
                    Ok(_) => continue,
                    Err(e) => {
                        debug!("{} / '{}': {}", encoding, separator, e);
                        continue;
                    }
                }

                match parse(&text, separator, None).and_then(ParsedTable::into_frame) {
                    Ok(frame) => return Some((encoding, separator, frame)),
                    Err(e) => debug!("full read under {} / '{}' failed: {}", encoding, separator, e),
                }
            }
        }

        None
    }
}
