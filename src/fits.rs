//! Minimal primary-header reader for FITS files.
//!
//! Only the primary HDU header is read: classification needs a handful of
//! keywords and never touches pixel data. Headers are sequences of 80-byte
//! ASCII cards packed into 2880-byte blocks and terminated by an `END` card.
//! ESO keywords use the `HIERARCH` convention
//! (`HIERARCH ESO DPR TYPE = 'BIAS'`); lookups accept the keyword with or
//! without the `HIERARCH ` prefix.
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const BLOCK_LEN: usize = 2880;
pub const CARD_LEN: usize = 80;
/// Upper bound on header size; real ESPRESSO headers are well under 100 blocks.
const MAX_HEADER_BLOCKS: usize = 4096;

#[derive(Debug, Error)]
pub enum FitsError {
    #[error("read {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("{0} is not a FITS file (first card is not SIMPLE)")]
    NotFits(PathBuf),
    #[error("{0}: primary header has no END card")]
    Unterminated(PathBuf),
    #[error("{path}: missing header keyword {keyword}")]
    MissingKeyword { path: PathBuf, keyword: String },
    #[error("{path}: header keyword {keyword} is not {expected} ({value:?})")]
    WrongType {
        path: PathBuf,
        keyword: String,
        expected: &'static str,
        value: HeaderValue,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum HeaderValue {
    Str(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    Undefined,
}

/// Keyword/value pairs of one primary header.
#[derive(Debug, Clone)]
pub struct FitsHeader {
    path: PathBuf,
    cards: BTreeMap<String, HeaderValue>,
}

impl FitsHeader {
    /// Read the primary header of the file at `path`.
    pub fn read(path: &Path) -> Result<Self, FitsError> {
        let io_err = |source| FitsError::Io {
            path: path.to_path_buf(),
            source,
        };
        let mut reader = BufReader::new(File::open(path).map_err(io_err)?);
        let mut header = Self {
            path: path.to_path_buf(),
            cards: BTreeMap::new(),
        };
        let mut block = vec![0u8; BLOCK_LEN];
        for block_index in 0..MAX_HEADER_BLOCKS {
            match reader.read_exact(&mut block) {
                Ok(()) => {}
                Err(err) if err.kind() == io::ErrorKind::UnexpectedEof => {
                    return Err(if block_index == 0 {
                        FitsError::NotFits(path.to_path_buf())
                    } else {
                        FitsError::Unterminated(path.to_path_buf())
                    });
                }
                Err(err) => return Err(io_err(err)),
            }
            if block_index == 0 && !block.starts_with(b"SIMPLE  =") {
                return Err(FitsError::NotFits(path.to_path_buf()));
            }
            if header.ingest_block(&block) {
                return Ok(header);
            }
        }
        Err(FitsError::Unterminated(path.to_path_buf()))
    }

    /// Parse cards from one block; returns true once `END` is seen.
    fn ingest_block(&mut self, block: &[u8]) -> bool {
        for card in block.chunks(CARD_LEN) {
            let Ok(card) = std::str::from_utf8(card) else {
                continue;
            };
            if card.trim_end() == "END" {
                return true;
            }
            if let Some((keyword, value)) = parse_card(card) {
                // First occurrence wins, matching how readers resolve duplicate cards.
                self.cards.entry(keyword).or_insert(value);
            }
        }
        false
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn get(&self, keyword: &str) -> Option<&HeaderValue> {
        self.cards.get(normalize_keyword(keyword))
    }

    pub fn string(&self, keyword: &str) -> Result<&str, FitsError> {
        match self.require(keyword)? {
            HeaderValue::Str(value) => Ok(value),
            other => Err(self.wrong_type(keyword, "a string", other)),
        }
    }

    pub fn float(&self, keyword: &str) -> Result<f64, FitsError> {
        match self.require(keyword)? {
            HeaderValue::Float(value) => Ok(*value),
            HeaderValue::Int(value) => Ok(*value as f64),
            other => Err(self.wrong_type(keyword, "a number", other)),
        }
    }

    pub fn integer(&self, keyword: &str) -> Result<i64, FitsError> {
        match self.require(keyword)? {
            HeaderValue::Int(value) => Ok(*value),
            HeaderValue::Float(value) if value.fract() == 0.0 => Ok(*value as i64),
            other => Err(self.wrong_type(keyword, "an integer", other)),
        }
    }

    fn require(&self, keyword: &str) -> Result<&HeaderValue, FitsError> {
        self.get(keyword).ok_or_else(|| FitsError::MissingKeyword {
            path: self.path.clone(),
            keyword: keyword.to_string(),
        })
    }

    fn wrong_type(&self, keyword: &str, expected: &'static str, value: &HeaderValue) -> FitsError {
        FitsError::WrongType {
            path: self.path.clone(),
            keyword: keyword.to_string(),
            expected,
            value: value.clone(),
        }
    }
}

fn normalize_keyword(keyword: &str) -> &str {
    keyword.strip_prefix("HIERARCH ").unwrap_or(keyword).trim()
}

fn parse_card(card: &str) -> Option<(String, HeaderValue)> {
    if let Some(rest) = card.strip_prefix("HIERARCH ") {
        let (keyword, value) = rest.split_once('=')?;
        return Some((keyword.trim().to_string(), parse_value(value)?));
    }
    let keyword = card.get(..8)?.trim_end();
    if keyword.is_empty() || card.get(8..10) != Some("= ") {
        return None;
    }
    Some((keyword.to_string(), parse_value(card.get(10..)?)?))
}

fn parse_value(raw: &str) -> Option<HeaderValue> {
    let raw = raw.trim_start();
    if let Some(rest) = raw.strip_prefix('\'') {
        let mut value = String::new();
        let mut chars = rest.chars().peekable();
        while let Some(ch) = chars.next() {
            if ch == '\'' {
                if chars.peek() == Some(&'\'') {
                    chars.next();
                    value.push('\'');
                    continue;
                }
                return Some(HeaderValue::Str(value.trim_end().to_string()));
            }
            value.push(ch);
        }
        return None;
    }
    let token = raw.split('/').next().unwrap_or_default().trim();
    match token {
        "" => Some(HeaderValue::Undefined),
        "T" => Some(HeaderValue::Bool(true)),
        "F" => Some(HeaderValue::Bool(false)),
        _ => token
            .parse::<i64>()
            .map(HeaderValue::Int)
            .or_else(|_| token.replace('D', "E").parse::<f64>().map(HeaderValue::Float))
            .ok(),
    }
}
