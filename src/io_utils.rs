//! I/O utilities for byte decoding, delimiter detection, and CSV plumbing.
//!
//! The core operations never touch the filesystem; everything that reads or
//! writes files flows through this module:
//!
//! - **Encoding**: input decoding via `encoding_rs`, defaulting to UTF-8 and
//!   stripping a byte-order mark.
//! - **Delimiter detection**: counts candidate delimiters on the first line.
//! - **Reader/writer construction**: `open_csv_reader`, `open_csv_writer`.
//! - **stdin/stdout**: the `-` path convention routes through standard streams.

use std::{
    fs::{self, File},
    io::{self, BufWriter, Read, Write},
    path::{Path, PathBuf},
};

use anyhow::{Context, Result, anyhow};
use csv::QuoteStyle;
use encoding_rs::{Encoding, UTF_8};

use crate::error::ParseError;

pub const DEFAULT_CSV_DELIMITER: u8 = b',';

/// Candidates in tie-breaking order.
pub const DELIMITER_CANDIDATES: [u8; 4] = [b',', b';', b'\t', b'|'];

pub fn is_dash(path: &Path) -> bool {
    path == Path::new("-")
}

pub fn resolve_encoding(label: Option<&str>) -> Result<&'static Encoding> {
    if let Some(value) = label {
        Encoding::for_label(value.trim().as_bytes())
            .ok_or_else(|| anyhow!("Unknown encoding '{value}'"))
    } else {
        Ok(UTF_8)
    }
}

pub fn read_input(path: &Path) -> Result<Vec<u8>> {
    if is_dash(path) {
        let mut buffer = Vec::new();
        io::stdin()
            .lock()
            .read_to_end(&mut buffer)
            .context("Reading stdin")?;
        Ok(buffer)
    } else {
        fs::read(path).with_context(|| format!("Opening input file {path:?}"))
    }
}

/// Display name for an input path: the file name, or `stdin` for `-`.
pub fn display_name(path: &Path) -> String {
    if is_dash(path) {
        return "stdin".to_string();
    }
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

pub fn decode_bytes(bytes: &[u8], encoding: &'static Encoding) -> Result<String, ParseError> {
    let (text, had_errors) = encoding.decode_with_bom_removal(bytes);
    if had_errors {
        Err(ParseError::Decode {
            encoding: encoding.name(),
        })
    } else {
        Ok(text.into_owned())
    }
}

/// Picks the candidate delimiter occurring most often on the first line.
/// Occurrences inside double quotes are ignored; ties resolve in
/// [`DELIMITER_CANDIDATES`] order, and a line without any candidate falls
/// back to comma.
pub fn detect_delimiter(text: &str) -> u8 {
    let first_line = text.lines().next().unwrap_or("");
    let mut counts = [0usize; DELIMITER_CANDIDATES.len()];
    let mut in_quotes = false;
    for byte in first_line.bytes() {
        if byte == b'"' {
            in_quotes = !in_quotes;
            continue;
        }
        if in_quotes {
            continue;
        }
        if let Some(slot) = DELIMITER_CANDIDATES.iter().position(|c| *c == byte) {
            counts[slot] += 1;
        }
    }
    let mut best = 0usize;
    for (slot, count) in counts.iter().enumerate() {
        if *count > counts[best] {
            best = slot;
        }
    }
    if counts[best] == 0 {
        DEFAULT_CSV_DELIMITER
    } else {
        DELIMITER_CANDIDATES[best]
    }
}

pub fn open_csv_reader<R>(reader: R, delimiter: u8, has_headers: bool) -> csv::Reader<R>
where
    R: Read,
{
    let mut builder = csv::ReaderBuilder::new();
    builder
        .has_headers(has_headers)
        .delimiter(delimiter)
        .double_quote(true)
        .flexible(true);
    builder.from_reader(reader)
}

pub fn open_csv_writer<W>(writer: W, delimiter: u8) -> csv::Writer<W>
where
    W: Write,
{
    let mut builder = csv::WriterBuilder::new();
    builder
        .delimiter(delimiter)
        .quote_style(QuoteStyle::Necessary)
        .double_quote(true);
    builder.from_writer(writer)
}

/// Output sink for a command: a file, or stdout when omitted or `-`.
pub fn open_output(path: Option<&Path>) -> Result<Box<dyn Write>> {
    match path {
        Some(p) if !is_dash(p) => Ok(Box::new(BufWriter::new(
            File::create(p).with_context(|| format!("Creating output file {p:?}"))?,
        ))),
        _ => Ok(Box::new(io::stdout())),
    }
}

/// Appends `.csv` to output paths that carry no extension.
pub fn resolve_output_path(path: &Path) -> PathBuf {
    if is_dash(path) || path.extension().is_some() {
        path.to_path_buf()
    } else {
        path.with_extension("csv")
    }
}
