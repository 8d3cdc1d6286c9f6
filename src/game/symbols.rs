//! Link-time symbol addresses for the game image.

use std::collections::HashMap;
use std::ops::Range;

use itertools::Itertools;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::elf::{Elf, SHN_UNDEF};

#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum ImageError {
    #[error("unknown symbol '{0}'")]
    UnknownSymbol(String),

    #[error("symbol range '{start}'..'{end}' is inverted ({start_address:#x} > {end_address:#x})")]
    InvertedRange {
        start: String,
        end: String,
        start_address: u32,
        end_address: u32,
    },

    #[error("access of {len:#x} bytes at {address:#x} is outside the {region} ({size:#x} bytes)")]
    OutOfBounds {
        region: &'static str,
        address: u32,
        len: usize,
        size: usize,
    },

    #[error("invalid value '{value}' for symbol '{name}'")]
    BadValue { name: String, value: String },
}

/// Assignments of the form `name = value;`, as found in linker scripts.
static ASSIGNMENT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\S+)\s*=\s*(\S+);").expect("assignment pattern is valid"));

#[derive(Debug, Default, Clone)]
pub struct SymbolTable {
    addresses: HashMap<String, u32>,
}

impl SymbolTable {
    /// Parses the symbol assignments in a linker script. Lines starting with `#` or `/*` are
    /// skipped.
    pub fn parse(text: &str) -> Result<SymbolTable, ImageError> {
        let mut table = SymbolTable::default();

        for line in text.lines().map(str::trim) {
            if line.is_empty() || line.starts_with('#') || line.starts_with("/*") {
                continue;
            }

            let Some(captures) = ASSIGNMENT.captures(line) else {
                log::warn!("ignoring line without a symbol assignment: '{line}'");
                continue;
            };

            let name = &captures[1];
            let value = parse_number(&captures[2]).ok_or_else(|| ImageError::BadValue {
                name: name.to_string(),
                value: captures[2].to_string(),
            })?;

            table.insert(name, value);
        }

        Ok(table)
    }

    /// Collects every defined symbol in `elf`. If a name is defined more than once, the first
    /// definition wins.
    pub fn from_elf(elf: &Elf) -> SymbolTable {
        let mut table = SymbolTable::default();

        for symbol in elf.symbols() {
            if symbol.name.is_empty() || symbol.shndx == SHN_UNDEF {
                continue;
            }

            table
                .addresses
                .entry(symbol.name.clone())
                .or_insert(symbol.value);
        }

        table
    }

    pub fn insert(&mut self, name: impl Into<String>, address: u32) {
        self.addresses.insert(name.into(), address);
    }

    pub fn get(&self, name: &str) -> Result<u32, ImageError> {
        self.addresses
            .get(name)
            .copied()
            .ok_or_else(|| ImageError::UnknownSymbol(name.to_string()))
    }

    /// Returns the address range between two marker symbols.
    pub fn range(&self, start: &str, end: &str) -> Result<Range<u32>, ImageError> {
        let (start_address, end_address) = (self.get(start)?, self.get(end)?);

        if start_address > end_address {
            return Err(ImageError::InvertedRange {
                start: start.to_string(),
                end: end.to_string(),
                start_address,
                end_address,
            });
        }

        Ok(start_address..end_address)
    }

    pub fn len(&self) -> usize {
        self.addresses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.addresses.is_empty()
    }

    /// Renders the table as a linker script, sorted by address.
    pub fn to_linker_script(&self) -> String {
        self.addresses
            .iter()
            .sorted_by_key(|(name, address)| (**address, (*name).clone()))
            .map(|(name, address)| format!("{name} = 0x{address:X};\n"))
            .collect()
    }
}

fn parse_number(text: &str) -> Option<u32> {
    match text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        Some(hex) => u32::from_str_radix(hex, 16).ok(),
        None => text.parse().ok(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_linker_script() {
        let table = SymbolTable::parse(
            "# exported\n\
             __fstAddress = 0xA4970;\n\
             __file1Address=0xA4AA0;\n\
             \n\
             gCount = 12;\n",
        )
        .unwrap();

        assert_eq!(table.len(), 3);
        assert_eq!(table.get("__fstAddress"), Ok(0xA4970));
        assert_eq!(table.get("__file1Address"), Ok(0xA4AA0));
        assert_eq!(table.get("gCount"), Ok(12));
    }

    #[test]
    fn test_parse_bad_value() {
        let err = SymbolTable::parse("broken = 0xZZ;").unwrap_err();
        assert!(matches!(err, ImageError::BadValue { .. }));
    }

    #[test]
    fn test_range() {
        let table = SymbolTable::parse("a = 0x10;\nb = 0x40;").unwrap();

        assert_eq!(table.range("a", "b"), Ok(0x10..0x40));
        assert!(matches!(
            table.range("b", "a"),
            Err(ImageError::InvertedRange { .. })
        ));
        assert_eq!(
            table.range("a", "c"),
            Err(ImageError::UnknownSymbol("c".to_string()))
        );
    }

    #[test]
    fn test_linker_script_output_parses_back() {
        let mut table = SymbolTable::default();
        table.insert("gFST", 0x800A0000);
        table.insert("game_tick", 0x80014A4C);

        let script = table.to_linker_script();
        assert_eq!(script, "game_tick = 0x80014A4C;\ngFST = 0x800A0000;\n");
        assert_eq!(SymbolTable::parse(&script).unwrap().get("gFST"), Ok(0x800A0000));
    }
}
