//! Symbol dump loading.
//!
//! Reads `nm`-style listings where each line starts with a hex address and
//! ends with the symbol name. Any columns in between (type letters, sizes)
//! are skipped.

use camino::Utf8Path;
use std::collections::HashMap;
use std::fs;

use crate::error::{HarnessError, Result};

const WHITESPACE: &[char] = &[' ', '\r', '\n', '\t'];

/// Name to address mapping built once at startup.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SymbolTable {
    symbols: HashMap<String, u64>,
}

impl SymbolTable {
    /// Load a symbol dump from disk. The file must be readable; nothing is
    /// returned if it isn't.
    pub fn load(path: &Utf8Path) -> Result<Self> {
        let bytes = fs::read(path).map_err(|source| HarnessError::SymbolFile {
            path: path.to_owned(),
            source,
        })?;
        let table = Self::parse(&String::from_utf8_lossy(&bytes));
        log::debug!("loaded {} symbols from {}", table.len(), path);
        Ok(table)
    }

    /// Parse symbol dump text. Later definitions of a name replace earlier
    /// ones.
    pub fn parse(text: &str) -> Self {
        let mut symbols = HashMap::new();
        for line in text.lines() {
            if let Some((name, addr)) = parse_line(line) {
                symbols.insert(name.to_string(), addr);
            }
        }
        Self { symbols }
    }

    pub fn get(&self, name: &str) -> Option<u64> {
        self.symbols.get(name).copied()
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    /// Both signature bounds, only when the dump defines both of them.
    pub fn signature_bounds(&self) -> Option<(u64, u64)> {
        Some((self.get("begin_signature")?, self.get("end_signature")?))
    }
}

fn parse_line(line: &str) -> Option<(&str, u64)> {
    let line = line.trim_matches(WHITESPACE);
    if line.is_empty() {
        return None;
    }

    let addr = match line.find(WHITESPACE) {
        Some(pos) => &line[..pos],
        None => line,
    };
    let name = match line.rfind(WHITESPACE) {
        Some(pos) => &line[pos + 1..],
        None => line,
    };

    Some((name, parse_hex_lenient(addr)))
}

/// Base-16 parse that never fails, in the manner of C's `strtol(s, NULL, 16)`:
/// leading whitespace, an optional sign and an optional `0x` prefix are
/// accepted, parsing stops at the first non-hex character, and a token with
/// no digits yields zero. Values that overflow saturate.
pub fn parse_hex_lenient(token: &str) -> u64 {
    let mut s = token.trim_start_matches(WHITESPACE);

    let negative = match s.as_bytes().first() {
        Some(b'-') => {
            s = &s[1..];
            true
        }
        Some(b'+') => {
            s = &s[1..];
            false
        }
        _ => false,
    };

    if let Some(rest) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        if rest.starts_with(|c: char| c.is_ascii_hexdigit()) {
            s = rest;
        }
    }

    let mut value: u64 = 0;
    for digit in s.chars().map_while(|c| c.to_digit(16)) {
        value = match value.checked_mul(16).and_then(|v| v.checked_add(digit as u64)) {
            Some(v) => v,
            None => return u64::MAX,
        };
    }

    if negative {
        value.wrapping_neg()
    } else {
        value
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_plain_listing() {
        let table = SymbolTable::parse("00001000 begin_signature\n00002000 end_signature\n");
        assert_eq!(table.get("begin_signature"), Some(0x1000));
        assert_eq!(table.get("end_signature"), Some(0x2000));
        assert_eq!(table.signature_bounds(), Some((0x1000, 0x2000)));
    }

    #[test]
    fn test_parse_skips_middle_columns() {
        let table = SymbolTable::parse("80000040 T  _start\r\n80001000 D tohost   \n");
        assert_eq!(table.get("_start"), Some(0x8000_0040));
        assert_eq!(table.get("tohost"), Some(0x8000_1000));
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn test_duplicate_names_last_wins() {
        let table = SymbolTable::parse("10 foo\n20 bar\n30 foo\n");
        assert_eq!(table.get("foo"), Some(0x30));
        assert_eq!(table.get("bar"), Some(0x20));
    }

    #[test]
    fn test_malformed_address_is_zero() {
        let table = SymbolTable::parse("zzzz broken\n12xyz partial\n");
        assert_eq!(table.get("broken"), Some(0));
        assert_eq!(table.get("partial"), Some(0x12));
    }

    #[test]
    fn test_blank_lines_are_skipped() {
        let table = SymbolTable::parse("\n   \n10 a\n\n");
        assert_eq!(table.len(), 1);
        assert_eq!(table.get(""), None);
    }

    #[test]
    fn test_partial_signature() {
        let table = SymbolTable::parse("1000 begin_signature\n");
        assert_eq!(table.signature_bounds(), None);
    }

    #[test]
    fn test_hex_lenient() {
        assert_eq!(parse_hex_lenient("D0580000"), 0xD058_0000);
        assert_eq!(parse_hex_lenient("0x500"), 0x500);
        assert_eq!(parse_hex_lenient("  ff"), 0xff);
        assert_eq!(parse_hex_lenient(""), 0);
        assert_eq!(parse_hex_lenient("0x"), 0);
        assert_eq!(parse_hex_lenient("g1"), 0);
        assert_eq!(parse_hex_lenient("-1"), u64::MAX);
        assert_eq!(parse_hex_lenient("fffffffffffffffff"), u64::MAX);
    }

    #[test]
    fn test_load_missing_file_fails() {
        let err = SymbolTable::load(Utf8Path::new("/nonexistent/symbols.txt")).unwrap_err();
        assert!(matches!(err, HarnessError::SymbolFile { .. }));
    }
}
