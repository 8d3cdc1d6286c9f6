//! Extends the DLL import table so that DLLs can link against functions in new code.
//!
//! DLLs import core functions by index into `DLLSIMPORTTAB`. Each exported symbol gets a new
//! entry holding its address, and a linker script assigns the symbol a placeholder value that
//! encodes the entry's index for the DLL toolchain.

use crate::elf::Elf;

/// Placeholder values start here, offset by the entry's index.
const IMPORT_BASE: u32 = 0x8000_0000;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ExportError {
    #[error("unknown symbol to export: '{0}'")]
    Unknown(String),

    #[error("export symbol '{0}' is ambiguous")]
    Ambiguous(String),

    #[error("export symbol '{0}' is undefined")]
    Undefined(String),
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Exports {
    /// The new `DLLSIMPORTTAB` contents.
    pub table: Vec<u8>,
    pub linker_script: String,
}

/// Names listed in a symbols file. Blank lines and `#` comments are skipped.
pub fn parse_symbol_list(text: &str) -> Vec<&str> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .collect()
}

/// Appends an entry for each of `names` to the import table `base`, taking addresses from
/// `elf`.
pub fn make(base: &[u8], elf: &Elf, names: &[&str]) -> Result<Exports, ExportError> {
    let mut exports = Exports {
        table: base.to_vec(),
        linker_script: String::new(),
    };

    let first_index = IMPORT_BASE + (base.len() / 4) as u32 + 1;

    for (index, name) in (first_index..).zip(names) {
        let mut matches = elf.symbols_by_name(name);

        let symbol = matches
            .next()
            .ok_or_else(|| ExportError::Unknown(name.to_string()))?;

        if matches.next().is_some() {
            return Err(ExportError::Ambiguous(name.to_string()));
        }

        if !symbol.is_defined() {
            return Err(ExportError::Undefined(name.to_string()));
        }

        exports.table.extend_from_slice(&symbol.value.to_be_bytes());

        exports
            .linker_script
            .push_str(&format!("{name} = 0x{index:X};\n"));

        log::debug!("exported {name} ({:#010x}) as {index:#x}", symbol.value);
    }

    Ok(exports)
}
