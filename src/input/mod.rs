//! Delimited input reader.
//!
//! This module reads the raw alert export: it decodes the configured
//! single-byte or UTF-8 encoding, detects the field delimiter and parses
//! the records into a [`Table`].

use crate::config::{Encoding, InputConfig};
use crate::models::{ProcessError, Table};
use anyhow::{Context, Result};
use csv::ReaderBuilder;
use std::path::Path;
use tracing::{debug, warn};

/// Delimiters considered during detection, in preference order.
const CANDIDATE_DELIMITERS: [char; 4] = [',', ';', '\t', '|'];

/// Number of non-empty lines sampled for delimiter detection.
const SNIFF_LINES: usize = 10;

/// Read and parse a delimited file.
pub fn read_table(path: &Path, config: &InputConfig) -> Result<Table> {
    let bytes =
        std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;

    let text = decode(&bytes, config.encoding);
    let delimiter = config.delimiter.unwrap_or_else(|| sniff_delimiter(&text));
    debug!("Using delimiter {:?} for {}", delimiter, path.display());

    parse_table(&text, delimiter)
        .with_context(|| format!("Failed to parse {}", path.display()))
}

/// Decode raw bytes with the given encoding.
pub fn decode(bytes: &[u8], encoding: Encoding) -> String {
    match encoding {
        Encoding::Latin1 => bytes.iter().map(|&b| b as char).collect(),
        Encoding::Utf8 => {
            let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
            String::from_utf8_lossy(bytes).into_owned()
        }
    }
}

/// Guess the field delimiter from the first lines of the text.
///
/// A delimiter that occurs the same non-zero number of times on every
/// sampled line wins; among those the highest count is preferred. Failing
/// that, the most frequent candidate on the header line is used.
pub fn sniff_delimiter(text: &str) -> char {
    let sample: Vec<&str> = text
        .lines()
        .filter(|l| !l.trim().is_empty())
        .take(SNIFF_LINES)
        .collect();

    let Some(header) = sample.first() else {
        return ',';
    };

    let mut consistent: Option<(char, usize)> = None;
    for &candidate in &CANDIDATE_DELIMITERS {
        let counts: Vec<usize> = sample
            .iter()
            .map(|line| count_unquoted(line, candidate))
            .collect();
        let first = counts[0];
        if first > 0 && counts.iter().all(|&c| c == first) {
            match consistent {
                Some((_, best)) if best >= first => {}
                _ => consistent = Some((candidate, first)),
            }
        }
    }

    if let Some((delimiter, _)) = consistent {
        return delimiter;
    }

    CANDIDATE_DELIMITERS
        .iter()
        .map(|&c| (c, count_unquoted(header, c)))
        .filter(|&(_, n)| n > 0)
        .fold(None, |best: Option<(char, usize)>, (c, n)| match best {
            Some((_, b)) if b >= n => best,
            _ => Some((c, n)),
        })
        .map(|(c, _)| c)
        .unwrap_or(',')
}

/// Count occurrences of `needle` outside double-quoted sections.
fn count_unquoted(line: &str, needle: char) -> usize {
    let mut in_quotes = false;
    let mut count = 0;
    for ch in line.chars() {
        if ch == '"' {
            in_quotes = !in_quotes;
        } else if ch == needle && !in_quotes {
            count += 1;
        }
    }
    count
}

/// Parse decoded text into a table using `delimiter`.
pub fn parse_table(text: &str, delimiter: char) -> Result<Table> {
    if !delimiter.is_ascii() {
        return Err(ProcessError::UnreadableInput(format!("unsupported delimiter {delimiter:?}")).into());
    }
    if text.trim().is_empty() {
        return Err(ProcessError::NoData.into());
    }

    let mut reader = ReaderBuilder::new()
        .delimiter(delimiter as u8)
        .has_headers(true)
        .flexible(true)
        .from_reader(text.as_bytes());

    let headers: Vec<String> = reader
        .headers()
        .context("Failed to read header row")?
        .iter()
        .map(String::from)
        .collect();

    if headers.is_empty() || headers.iter().all(|h| h.trim().is_empty()) {
        return Err(ProcessError::UnreadableInput("missing header row".to_string()).into());
    }

    let mut rows = Vec::new();
    let mut reshaped = 0usize;
    for (i, record) in reader.records().enumerate() {
        let record = record.with_context(|| format!("Malformed record at data row {}", i + 1))?;
        if record.len() != headers.len() {
            reshaped += 1;
        }
        rows.push(record.iter().map(String::from).collect());
    }

    if reshaped > 0 {
        warn!(
            "{} rows did not match the {} header columns and were padded or truncated",
            reshaped,
            headers.len()
        );
    }

    Ok(Table::new(headers, rows))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    #[test]
    fn test_sniff_semicolon() {
        let text = "PREFIXO;TIPO;MOTORISTA\nCC13;FADIGA;ANA\nCL19;CELULAR;BRUNO\n";
        assert_eq!(sniff_delimiter(text), ';');
    }

    #[test]
    fn test_sniff_ignores_quoted_commas() {
        let text = "PREFIXO;DESCRICAO\nCC13;\"freada, forte\"\nCL19;\"a, b, c\"\n";
        assert_eq!(sniff_delimiter(text), ';');
    }

    #[test]
    fn test_sniff_tab_and_default() {
        assert_eq!(sniff_delimiter("A\tB\n1\t2\n"), '\t');
        assert_eq!(sniff_delimiter("SINGLE\nVALUE\n"), ',');
        assert_eq!(sniff_delimiter(""), ',');
    }

    #[test]
    fn test_decode_latin1() {
        // "ROTULO" with Ó encoded as 0xD3
        let bytes = b"R\xD3TULO";
        assert_eq!(decode(bytes, Encoding::Latin1), "RÓTULO");
    }

    #[test]
    fn test_decode_utf8_strips_bom() {
        let bytes = "\u{FEFF}PREFIXO".as_bytes();
        assert_eq!(decode(bytes, Encoding::Utf8), "PREFIXO");
    }

    #[test]
    fn test_parse_pads_short_rows() {
        let table = parse_table("A,B,C\n1,2\n4,5,6\n", ',').unwrap();
        assert_eq!(table.headers, vec!["A", "B", "C"]);
        assert_eq!(table.rows[0], vec!["1", "2", ""]);
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn test_parse_rejects_non_ascii_delimiter() {
        assert!(parse_table("A§B\n", '§').is_err());
    }

    #[test]
    fn test_read_table_latin1_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("alertas.csv");
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(b"PREFIXO;CERCA ELETR\xD4NICA;TIPO\nCC13;Sim;FADIGA\n")
            .unwrap();

        let table = read_table(&path, &InputConfig::default()).unwrap();
        assert_eq!(table.headers[1], "CERCA ELETRÔNICA");
        assert_eq!(table.rows[0][2], "FADIGA");
    }

    #[test]
    fn test_parse_empty_input() {
        let err = parse_table("  \n", ',').unwrap_err();
        assert!(matches!(err.downcast_ref::<ProcessError>(), Some(ProcessError::NoData)));
    }

    #[test]
    fn test_read_table_missing_file() {
        let dir = TempDir::new().unwrap();
        let result = read_table(&dir.path().join("nope.csv"), &InputConfig::default());
        assert!(result.is_err());
    }
}
