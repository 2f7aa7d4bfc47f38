//! Parser for the registry extract: a zip holding one pipe-delimited,
//! headerless text file in a legacy single-byte encoding.

use std::borrow::Cow;
use std::fmt;
use std::io::{Cursor, Read};
use std::sync::Arc;

use encoding_rs::{Encoding, UTF_8};
use rnc_core::{normalize_taxpayer_id, RawRecord};
use thiserror::Error;
use tracing::{debug, info};

pub const CRATE_NAME: &str = "rnc-extract";

pub const DELIMITER: char = '|';
pub const DATA_FILE_EXTENSION: &str = ".txt";

/// Positional layout of the upstream file. Positions 4..=7 carry nothing the
/// registry keeps.
pub mod columns {
    pub const TAXPAYER_ID: usize = 0;
    pub const NAME: usize = 1;
    pub const TRADE_NAME: usize = 2;
    pub const ECONOMIC_ACTIVITY: usize = 3;
    pub const CONSTITUTED_ON: usize = 8;
    pub const STATUS: usize = 9;
    pub const PAYMENT_REGIME: usize = 10;
    pub const KNOWN_WIDTH: usize = 11;
}

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("invalid archive: {0}")]
    InvalidArchive(#[source] zip::result::ZipError),
    #[error("no data file among archive members {members:?}")]
    NoDataFile { members: Vec<String> },
    #[error("reading archive member {name}: {source}")]
    ReadMember {
        name: String,
        #[source]
        source: std::io::Error,
    },
    #[error("missing required column `{column}` (detected width {width})")]
    MissingRequiredColumn { column: &'static str, width: usize },
    #[error("unknown text encoding label {0:?}")]
    UnknownEncoding(String),
}

/// How member bytes become text. Injected so a UTF-8 extract needs only
/// configuration.
pub trait TextDecoder: Send + Sync + fmt::Debug {
    fn label(&self) -> &str;

    fn decode<'a>(&self, bytes: &'a [u8]) -> Cow<'a, str>;
}

#[derive(Debug, Clone, Copy)]
enum Charset {
    /// ISO-8859-1 proper: every byte maps to the code point of the same value.
    Latin1,
    Whatwg(&'static Encoding),
}

#[derive(Debug, Clone, Copy)]
pub struct EncodingDecoder {
    charset: Charset,
}

impl EncodingDecoder {
    /// Byte-for-byte ISO-8859-1, including the C1 range 0x80..=0x9F that the
    /// WHATWG `latin1` label would remap to windows-1252.
    pub fn latin1() -> Self {
        Self {
            charset: Charset::Latin1,
        }
    }

    pub fn utf8() -> Self {
        Self {
            charset: Charset::Whatwg(UTF_8),
        }
    }

    pub fn for_label(label: &str) -> Result<Self, ParseError> {
        let trimmed = label.trim();
        if is_latin1_label(trimmed) {
            return Ok(Self::latin1());
        }
        Encoding::for_label(trimmed.as_bytes())
            .map(|encoding| Self {
                charset: Charset::Whatwg(encoding),
            })
            .ok_or_else(|| ParseError::UnknownEncoding(label.to_string()))
    }
}

fn is_latin1_label(label: &str) -> bool {
    const LABELS: [&str; 7] = [
        "latin1",
        "latin-1",
        "l1",
        "iso-8859-1",
        "iso8859-1",
        "iso_8859-1",
        "iso88591",
    ];
    LABELS.iter().any(|known| known.eq_ignore_ascii_case(label))
}

impl TextDecoder for EncodingDecoder {
    fn label(&self) -> &str {
        match self.charset {
            Charset::Latin1 => "ISO-8859-1",
            Charset::Whatwg(encoding) => encoding.name(),
        }
    }

    fn decode<'a>(&self, bytes: &'a [u8]) -> Cow<'a, str> {
        match self.charset {
            Charset::Latin1 => encoding_rs::mem::decode_latin1(bytes),
            Charset::Whatwg(encoding) => {
                let (text, _had_errors) = encoding.decode_with_bom_removal(bytes);
                text
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct ExtractParser {
    decoder: Arc<dyn TextDecoder>,
}

impl Default for ExtractParser {
    fn default() -> Self {
        Self::new(Arc::new(EncodingDecoder::latin1()))
    }
}

impl ExtractParser {
    pub fn new(decoder: Arc<dyn TextDecoder>) -> Self {
        Self { decoder }
    }

    pub fn decoder_label(&self) -> &str {
        self.decoder.label()
    }

    pub fn parse(&self, archive_bytes: &[u8]) -> Result<ParsedExtract, ParseError> {
        let mut archive =
            zip::ZipArchive::new(Cursor::new(archive_bytes)).map_err(ParseError::InvalidArchive)?;

        let mut members = Vec::with_capacity(archive.len());
        for index in 0..archive.len() {
            let entry = archive.by_index(index).map_err(ParseError::InvalidArchive)?;
            members.push(entry.name().to_string());
        }
        info!(?members, "archive members");

        let Some(data_index) = members
            .iter()
            .position(|name| name.to_ascii_lowercase().ends_with(DATA_FILE_EXTENSION))
        else {
            return Err(ParseError::NoDataFile { members });
        };
        let member_name = members[data_index].clone();

        let mut raw = Vec::new();
        archive
            .by_index(data_index)
            .map_err(ParseError::InvalidArchive)?
            .read_to_end(&mut raw)
            .map_err(|source| ParseError::ReadMember {
                name: member_name.clone(),
                source,
            })?;

        let text = self.decoder.decode(&raw).into_owned();
        drop(raw);

        for line in text.lines().take(5) {
            debug!(line = line.trim(), "extract preview");
        }

        let width = detected_width(&text);
        if width <= columns::TAXPAYER_ID {
            return Err(ParseError::MissingRequiredColumn {
                column: "taxpayer_id",
                width,
            });
        }
        if width <= columns::NAME {
            return Err(ParseError::MissingRequiredColumn {
                column: "name",
                width,
            });
        }

        info!(
            member = %member_name,
            width,
            encoding = self.decoder.label(),
            "data file decoded"
        );
        Ok(ParsedExtract {
            member_name,
            members,
            width,
            text,
        })
    }
}

fn is_data_line(line: &str) -> bool {
    !line.trim().is_empty()
}

fn detected_width(text: &str) -> usize {
    text.lines()
        .filter(|line| is_data_line(line))
        .map(|line| line.split(DELIMITER).count())
        .max()
        .unwrap_or(0)
}

/// Decoded data file. Records are produced lazily; call [`records`] again to
/// start over from the first line.
///
/// [`records`]: ParsedExtract::records
#[derive(Debug, Clone)]
pub struct ParsedExtract {
    pub member_name: String,
    pub members: Vec<String>,
    pub width: usize,
    text: String,
}

impl ParsedExtract {
    pub fn records(&self) -> Records<'_> {
        Records {
            lines: self.text.lines().enumerate(),
        }
    }

    pub fn record_count(&self) -> usize {
        self.text.lines().filter(|line| is_data_line(line)).count()
    }

    /// Synthetic names for every column the file carries, known or not.
    pub fn column_names(&self) -> Vec<String> {
        (0..self.width).map(column_name).collect()
    }
}

/// Lazy, finite pass over the data lines of a [`ParsedExtract`].
#[derive(Debug, Clone)]
pub struct Records<'a> {
    lines: std::iter::Enumerate<std::str::Lines<'a>>,
}

impl Iterator for Records<'_> {
    type Item = RawRecord;

    fn next(&mut self) -> Option<RawRecord> {
        for (idx, line) in self.lines.by_ref() {
            if is_data_line(line) {
                return Some(map_line(idx + 1, line));
            }
        }
        None
    }
}

fn column_name(position: usize) -> String {
    match position {
        columns::TAXPAYER_ID => "taxpayer_id".to_string(),
        columns::NAME => "name".to_string(),
        columns::TRADE_NAME => "trade_name".to_string(),
        columns::ECONOMIC_ACTIVITY => "economic_activity".to_string(),
        columns::CONSTITUTED_ON => "constituted_on".to_string(),
        columns::STATUS => "status".to_string(),
        columns::PAYMENT_REGIME => "payment_regime".to_string(),
        other => format!("col{}", other + 1),
    }
}

fn map_line(line_no: usize, line: &str) -> RawRecord {
    let cells: Vec<&str> = line.split(DELIMITER).collect();
    let cell = |position: usize| -> String {
        cells
            .get(position)
            .map(|value| value.trim().to_string())
            .unwrap_or_default()
    };

    let extra_columns = cells
        .iter()
        .enumerate()
        .skip(columns::KNOWN_WIDTH)
        .map(|(position, value)| (column_name(position), value.trim().to_string()))
        .collect();

    RawRecord {
        line_no,
        taxpayer_id: normalize_taxpayer_id(cells.get(columns::TAXPAYER_ID).copied().unwrap_or("")),
        name: cell(columns::NAME),
        trade_name: cell(columns::TRADE_NAME),
        economic_activity: cell(columns::ECONOMIC_ACTIVITY),
        constituted_on: cell(columns::CONSTITUTED_ON),
        status: cell(columns::STATUS),
        payment_regime: cell(columns::PAYMENT_REGIME),
        extra_columns,
    }
}
