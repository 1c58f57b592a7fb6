use std::collections::HashMap;
use std::fs;
use std::path::Path;

use crate::error::RecognitionError;

/// Invert a `token -> id` map into an id-indexed table.
fn invert(map: HashMap<String, u32>) -> Vec<String> {
    let len = map.values().map(|&id| id as usize + 1).max().unwrap_or(0);
    let mut tokens = vec![String::new(); len];
    for (token, id) in map {
        tokens[id as usize] = token;
    }
    tokens
}

fn read_json_vocab(path: &Path) -> Result<Vec<String>, RecognitionError> {
    let data = fs::read_to_string(path)
        .map_err(|e| RecognitionError::Decode(format!("{}: {e}", path.display())))?;
    let map: HashMap<String, u32> = serde_json::from_str(&data)
        .map_err(|e| RecognitionError::Decode(format!("{}: {e}", path.display())))?;
    Ok(invert(map))
}

fn position(tokens: &[String], token: &str, fallback: usize) -> usize {
    tokens.iter().position(|t| t == token).unwrap_or(fallback)
}

/// Character-level vocabulary of the `char` head.
#[derive(Debug, Clone)]
pub struct CharVocab {
    tokens: Vec<String>,
    eos: usize,
}

impl CharVocab {
    pub fn from_tokens(tokens: Vec<String>) -> Self {
        let eos = position(&tokens, "[s]", 1);
        Self { tokens, eos }
    }

    pub fn from_file(path: &Path) -> Result<Self, RecognitionError> {
        Ok(Self::from_tokens(read_json_vocab(path)?))
    }

    pub fn eos(&self) -> usize {
        self.eos
    }

    pub fn decode(&self, ids: &[usize]) -> String {
        ids.iter()
            .filter_map(|&id| self.tokens.get(id))
            .filter(|t| !matches!(t.as_str(), "[GO]" | "[s]" | "[PAD]"))
            .flat_map(|t| t.chars())
            .filter(|c| *c != ' ')
            .collect()
    }
}

/// GPT-2 byte-level BPE vocabulary of the `bpe` head.
#[derive(Debug, Clone)]
pub struct BpeVocab {
    tokens: Vec<String>,
    byte_of: HashMap<char, u8>,
    eos: usize,
}

impl BpeVocab {
    pub fn from_tokens(tokens: Vec<String>) -> Self {
        let eos = position(&tokens, "#", 2);
        let byte_of = byte_decoder();
        Self {
            tokens,
            byte_of,
            eos,
        }
    }

    pub fn from_file(path: &Path) -> Result<Self, RecognitionError> {
        Ok(Self::from_tokens(read_json_vocab(path)?))
    }

    pub fn eos(&self) -> usize {
        self.eos
    }

    pub fn decode(&self, ids: &[usize]) -> String {
        let bytes: Vec<u8> = ids
            .iter()
            .filter_map(|&id| self.tokens.get(id))
            .flat_map(|t| t.chars())
            .filter_map(|c| self.byte_of.get(&c).copied())
            .collect();
        String::from_utf8_lossy(&bytes).into_owned()
    }
}

/// GPT-2's reversible byte <-> printable char table, inverted for decoding.
fn byte_decoder() -> HashMap<char, u8> {
    let printable = |b: u8| (b'!'..=b'~').contains(&b) || (0xA1..=0xAC).contains(&b) || b >= 0xAE;
    let mut table = HashMap::with_capacity(256);
    let mut shifted = 0u32;
    for b in 0..=255u8 {
        let c = if printable(b) {
            b as u32
        } else {
            shifted += 1;
            255 + shifted
        };
        if let Some(c) = char::from_u32(c) {
            table.insert(c, b);
        }
    }
    table
}

/// BERT WordPiece vocabulary of the `wp` head, one token per line.
#[derive(Debug, Clone)]
pub struct WordPieceVocab {
    tokens: Vec<String>,
    eos: usize,
}

impl WordPieceVocab {
    pub fn from_tokens(tokens: Vec<String>) -> Self {
        let eos = position(&tokens, "[SEP]", 102);
        Self { tokens, eos }
    }

    pub fn from_file(path: &Path) -> Result<Self, RecognitionError> {
        let data = fs::read_to_string(path)
            .map_err(|e| RecognitionError::Decode(format!("{}: {e}", path.display())))?;
        Ok(Self::from_tokens(data.lines().map(str::to_string).collect()))
    }

    pub fn eos(&self) -> usize {
        self.eos
    }

    pub fn decode(&self, ids: &[usize]) -> String {
        ids.iter()
            .filter_map(|&id| self.tokens.get(id))
            .filter(|t| !matches!(t.as_str(), "[CLS]" | "[SEP]" | "[PAD]" | "[MASK]"))
            .map(|t| t.strip_prefix("##").unwrap_or(t))
            .flat_map(str::chars)
            .filter(|c| *c != ' ')
            .collect()
    }
}
