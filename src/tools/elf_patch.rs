//! Applies the `.patch:<symbol>:<offset>` sections of a relocatable object.
//!
//! The contents of a patch section overwrite the section that defines `<symbol>`, starting
//! `<offset>` bytes past the symbol. Relocations and symbols belonging to the patch move along
//! with it, and the patch sections are removed from the object.

use std::collections::HashMap;

use byteorder::{BigEndian, ByteOrder, LittleEndian};
use eyre::Result;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::elf::{
    Elf, Section, Symbol, EHDR_SIZE, SHDR_SIZE, SHN_ABS, SHN_LORESERVE, SHN_UNDEF, SHT_NOBITS,
    SHT_NULL, SHT_REL, SHT_RELA, STB_LOCAL, STT_SECTION, SYM_SIZE,
};

static PATCH_SECTION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\.patch:(\w+):(\w+)").expect("patch section pattern is valid")
});

/// Sections a patch may be applied to.
const PATCH_TARGETS: [&str; 3] = [".text", ".rodata", ".data"];

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum PatchError {
    #[error("the object has no symbol table")]
    NoSymbolTable,

    #[error("patch section '{section}' references unknown symbol '{symbol}'")]
    UnknownSymbol { section: String, symbol: String },

    #[error("patch section '{section}' references symbol '{symbol}', which is not defined in any section")]
    Undefined { section: String, symbol: String },

    #[error("patch section '{section}' references absolute symbol '{symbol}'; use a symbol defined in a section instead")]
    Absolute { section: String, symbol: String },

    #[error("patch section '{section}' references symbol '{symbol}' with invalid section index {index:#x}")]
    InvalidSectionIndex {
        section: String,
        symbol: String,
        index: u16,
    },

    #[error("patch section '{section}' references symbol '{symbol}' in '{target}', which can't be patched")]
    InvalidTarget {
        section: String,
        symbol: String,
        target: String,
    },

    #[error("patch section '{section}' has an invalid offset '{offset}'")]
    InvalidOffset { section: String, offset: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Relocation {
    offset: u32,
    symbol: u32,
    kind: u8,
    /// Only present in `SHT_RELA` entries.
    addend: Option<u32>,
}

#[derive(Debug)]
enum Contents {
    Raw(Vec<u8>),
    Relocations(Vec<Relocation>),
    /// The symbol table. Its entries are kept on the object.
    Symbols,
}

#[derive(Debug)]
struct EditedSection {
    /// Index of the section in the input, or past the end for sections that were added.
    original_index: usize,
    header: Section,
    contents: Contents,
}

/// Writes integers in the object's byte order.
struct Writer {
    out: Vec<u8>,
    big_endian: bool,
}

impl Writer {
    fn new(big_endian: bool) -> Writer {
        Writer {
            out: Vec::new(),
            big_endian,
        }
    }

    fn u16(&mut self, value: u16) {
        let mut bytes = [0; 2];

        if self.big_endian {
            BigEndian::write_u16(&mut bytes, value);
        } else {
            LittleEndian::write_u16(&mut bytes, value);
        }

        self.out.extend_from_slice(&bytes);
    }

    fn u32(&mut self, value: u32) {
        let mut bytes = [0; 4];

        if self.big_endian {
            BigEndian::write_u32(&mut bytes, value);
        } else {
            LittleEndian::write_u32(&mut bytes, value);
        }

        self.out.extend_from_slice(&bytes);
    }

    fn put_u16(&mut self, at: usize, value: u16) {
        let dst = &mut self.out[at..at + 2];

        if self.big_endian {
            BigEndian::write_u16(dst, value);
        } else {
            LittleEndian::write_u16(dst, value);
        }
    }

    fn put_u32(&mut self, at: usize, value: u32) {
        let dst = &mut self.out[at..at + 4];

        if self.big_endian {
            BigEndian::write_u32(dst, value);
        } else {
            LittleEndian::write_u32(dst, value);
        }
    }

    fn align(&mut self, alignment: usize) {
        while self.out.len() % alignment != 0 {
            self.out.push(0);
        }
    }
}

fn read_u32(bytes: &[u8], big_endian: bool) -> u32 {
    if big_endian {
        BigEndian::read_u32(bytes)
    } else {
        LittleEndian::read_u32(bytes)
    }
}

fn read_relocations(data: &[u8], kind: u32, big_endian: bool) -> Vec<Relocation> {
    let entry_size = if kind == SHT_RELA { 12 } else { 8 };

    data.chunks_exact(entry_size)
        .map(|entry| {
            let info = read_u32(&entry[4..], big_endian);

            Relocation {
                offset: read_u32(entry, big_endian),
                symbol: info >> 8,
                kind: info as u8,
                addend: (kind == SHT_RELA).then(|| read_u32(&entry[8..], big_endian)),
            }
        })
        .collect()
}

/// Parses an offset written in decimal or with a `0x`, `0o` or `0b` prefix.
fn parse_offset(text: &str) -> Option<u32> {
    let text = text.to_ascii_lowercase().replace('_', "");

    let (digits, radix) = match text.get(..2) {
        Some("0x") => (&text[2..], 16),
        Some("0o") => (&text[2..], 8),
        Some("0b") => (&text[2..], 2),
        _ => (text.as_str(), 10),
    };

    u32::from_str_radix(digits, radix).ok()
}

struct Object {
    big_endian: bool,
    header: Vec<u8>,
    names_index: usize,
    sections: Vec<EditedSection>,
    symtab: usize,
    /// Each symbol with its index in the input.
    symbols: Vec<(usize, Symbol)>,
}

impl Object {
    fn read(file: &[u8], elf: &Elf) -> Result<Object> {
        let symtab = elf.symtab_index().ok_or(PatchError::NoSymbolTable)?;

        let sections = elf
            .sections
            .iter()
            .enumerate()
            .map(|(index, section)| {
                let data = section.data(file)?;

                let contents = match section.kind {
                    SHT_REL | SHT_RELA => Contents::Relocations(read_relocations(
                        data,
                        section.kind,
                        elf.big_endian,
                    )),
                    _ if index == symtab => Contents::Symbols,
                    _ => Contents::Raw(data.to_vec()),
                };

                Ok(EditedSection {
                    original_index: index,
                    header: section.clone(),
                    contents,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Object {
            big_endian: elf.big_endian,
            header: file[..EHDR_SIZE].to_vec(),
            names_index: elf.names_index,
            sections,
            symtab,
            symbols: elf.symbols().iter().cloned().enumerate().collect(),
        })
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.sections
            .iter()
            .position(|section| section.header.name == name)
    }

    /// Returns the first defined symbol called `name`, or any symbol with that name if none are
    /// defined.
    fn find_symbol(&self, name: &str) -> Option<Symbol> {
        let named = || {
            self.symbols
                .iter()
                .map(|(_, symbol)| symbol)
                .filter(move |symbol| symbol.name == name)
        };

        named()
            .find(|symbol| symbol.is_defined())
            .or_else(|| named().next())
            .cloned()
    }

    /// Adds an empty relocation section called `name` for the section at `target`, with its
    /// header copied from `template`.
    fn add_relocation_section(&mut self, template: usize, name: &str, target: usize) -> usize {
        let names = self
            .sections
            .get_mut(self.names_index)
            .map(|section| &mut section.contents);

        let name_offset = match names {
            Some(Contents::Raw(names)) => {
                let offset = names.len() as u32;
                names.extend_from_slice(name.as_bytes());
                names.push(0);
                offset
            }

            _ => 0,
        };

        let mut header = self.sections[template].header.clone();
        header.name = name.to_string();
        header.name_offset = name_offset;
        header.info = target as u32;

        self.sections.push(EditedSection {
            original_index: self.sections.len(),
            header,
            contents: Contents::Relocations(Vec::new()),
        });

        self.sections.len() - 1
    }

    /// Applies every patch section, then removes them. Returns the number of patches applied.
    fn apply_patches(&mut self) -> Result<usize, PatchError> {
        let mut removed = Vec::new();
        let mut applied = 0;

        for index in 0..self.sections.len() {
            let section_name = self.sections[index].header.name.clone();

            let Some(captures) = PATCH_SECTION.captures(&section_name) else {
                continue;
            };

            let symbol_name = &captures[1];

            let symbol = self
                .find_symbol(symbol_name)
                .ok_or_else(|| PatchError::UnknownSymbol {
                    section: section_name.clone(),
                    symbol: symbol_name.to_string(),
                })?;

            let target = match symbol.shndx {
                SHN_UNDEF => {
                    return Err(PatchError::Undefined {
                        section: section_name.clone(),
                        symbol: symbol.name,
                    })
                }

                SHN_ABS => {
                    return Err(PatchError::Absolute {
                        section: section_name.clone(),
                        symbol: symbol.name,
                    })
                }

                shndx if usize::from(shndx) >= self.sections.len() => {
                    return Err(PatchError::InvalidSectionIndex {
                        section: section_name.clone(),
                        symbol: symbol.name,
                        index: shndx,
                    })
                }

                shndx => usize::from(shndx),
            };

            let target_name = self.sections[target].header.name.clone();

            if !PATCH_TARGETS.contains(&target_name.as_str()) {
                return Err(PatchError::InvalidTarget {
                    section: section_name.clone(),
                    symbol: symbol.name,
                    target: target_name,
                });
            }

            let offset = parse_offset(&captures[2])
                .and_then(|offset| offset.checked_add(symbol.value))
                .ok_or_else(|| PatchError::InvalidOffset {
                    section: section_name.clone(),
                    offset: captures[2].to_string(),
                })?;

            let patch = match &self.sections[index].contents {
                Contents::Raw(data) => data.clone(),
                _ => Vec::new(),
            };

            if let Contents::Raw(data) = &mut self.sections[target].contents {
                let start = offset as usize;
                let end = start + patch.len();

                if data.len() < end {
                    data.resize(end, 0);
                }

                data[start..end].copy_from_slice(&patch);
            }

            let patched = u64::from(offset)..u64::from(offset) + patch.len() as u64;

            if let Some(patch_relocations) = self.position(&format!(".rel{section_name}")) {
                removed.push(self.sections[patch_relocations].original_index);

                let moved = match &mut self.sections[patch_relocations].contents {
                    Contents::Relocations(relocations) => std::mem::take(relocations),
                    _ => Vec::new(),
                };

                let target_relocations_name = format!(".rel{target_name}");

                let target_relocations = match self.position(&target_relocations_name) {
                    Some(position) => position,
                    None => self.add_relocation_section(
                        patch_relocations,
                        &target_relocations_name,
                        target,
                    ),
                };

                if let Contents::Relocations(relocations) =
                    &mut self.sections[target_relocations].contents
                {
                    relocations.retain(|relocation| {
                        !patched.contains(&u64::from(relocation.offset))
                    });

                    relocations.extend(moved.into_iter().map(|relocation| Relocation {
                        offset: relocation.offset.wrapping_add(offset),
                        ..relocation
                    }));
                }
            }

            for (_, symbol) in &mut self.symbols {
                if usize::from(symbol.shndx) == index && symbol.kind() != STT_SECTION {
                    symbol.value = symbol.value.wrapping_add(offset);
                    symbol.shndx = target as u16;
                }
            }

            log::debug!(
                "patched {:#x} bytes of {target_name} at {offset:#x} from '{section_name}'",
                patch.len()
            );

            removed.push(index);
            applied += 1;
        }

        self.sections
            .retain(|section| !removed.contains(&section.original_index));

        self.symbols.retain(|(_, symbol)| {
            symbol.kind() != STT_SECTION
                || !(removed.contains(&usize::from(symbol.shndx))
                    || PATCH_SECTION.is_match(&symbol.name))
        });

        Ok(applied)
    }

    /// Renumbers sections and symbols after patch sections have been removed.
    fn remap(&mut self) {
        // Local symbols have to come first.
        self.symbols
            .sort_by_key(|(_, symbol)| symbol.binding() != STB_LOCAL);

        let last_local = self
            .symbols
            .iter()
            .rposition(|(_, symbol)| symbol.binding() == STB_LOCAL)
            .unwrap_or(0);

        let section_map: HashMap<usize, usize> = self
            .sections
            .iter()
            .enumerate()
            .map(|(index, section)| (section.original_index, index))
            .collect();

        let symbol_map: HashMap<usize, u32> = self
            .symbols
            .iter()
            .enumerate()
            .map(|(index, (original, _))| (*original, index as u32))
            .collect();

        let section_index =
            |original: u32| section_map.get(&(original as usize)).map_or(0, |&index| index);

        for section in &mut self.sections {
            if section.original_index == self.symtab {
                section.header.info = last_local as u32 + 1;
            }

            if section.header.kind == SHT_NULL {
                continue;
            }

            section.header.link = section_index(section.header.link) as u32;

            if let Contents::Relocations(relocations) = &mut section.contents {
                section.header.info = section_index(section.header.info) as u32;

                for relocation in relocations {
                    relocation.symbol = symbol_map
                        .get(&(relocation.symbol as usize))
                        .copied()
                        .unwrap_or(0);
                }
            }
        }

        for (_, symbol) in &mut self.symbols {
            if symbol.shndx != SHN_UNDEF && symbol.shndx < SHN_LORESERVE {
                symbol.shndx = section_map
                    .get(&usize::from(symbol.shndx))
                    .map_or(SHN_UNDEF, |&index| index as u16);
            }
        }

        self.names_index = section_index(self.names_index as u32);
    }

    fn encode(&self, section: &EditedSection) -> Vec<u8> {
        let mut writer = Writer::new(self.big_endian);

        match &section.contents {
            Contents::Raw(data) => writer.out.extend_from_slice(data),

            Contents::Relocations(relocations) => {
                for relocation in relocations {
                    writer.u32(relocation.offset);
                    writer.u32((relocation.symbol & 0xff_ffff) << 8 | u32::from(relocation.kind));

                    if let Some(addend) = relocation.addend {
                        writer.u32(addend);
                    }
                }
            }

            Contents::Symbols => {
                for (_, symbol) in &self.symbols {
                    writer.u32(symbol.name_offset);
                    writer.u32(symbol.value);
                    writer.u32(symbol.size);
                    writer.out.push(symbol.info);
                    writer.out.push(symbol.other);
                    writer.u16(symbol.shndx);
                }
            }
        }

        writer.out
    }

    /// Lays the sections out in their original file order, followed by the section headers.
    fn write(mut self) -> Vec<u8> {
        let mut writer = Writer::new(self.big_endian);
        writer.out.extend_from_slice(&self.header);

        let mut order: Vec<usize> = (0..self.sections.len()).collect();
        order.sort_by_key(|&position| self.sections[position].header.offset);

        for position in order {
            let bytes = self.encode(&self.sections[position]);
            let section = &mut self.sections[position];

            if section.header.kind == SHT_NULL {
                continue;
            }

            if matches!(section.contents, Contents::Symbols) {
                section.header.entry_size = SYM_SIZE as u32;
            }

            section.header.offset = writer.out.len() as u32;

            if section.header.kind != SHT_NOBITS {
                section.header.size = bytes.len() as u32;
                writer.out.extend_from_slice(&bytes);
                writer.align(4);
            }
        }

        let section_offset = writer.out.len();

        for section in &self.sections {
            let header = &section.header;

            writer.u32(header.name_offset);
            writer.u32(header.kind);
            writer.u32(header.flags);
            writer.u32(header.address);
            writer.u32(header.offset);
            writer.u32(header.size);
            writer.u32(header.link);
            writer.u32(header.info);
            writer.u32(header.align);
            writer.u32(header.entry_size);
        }

        writer.put_u32(0x20, section_offset as u32);
        writer.put_u16(0x2e, SHDR_SIZE as u16);
        writer.put_u16(0x30, self.sections.len() as u16);
        writer.put_u16(0x32, self.names_index as u16);

        writer.out
    }
}

/// Applies every patch section in the object `file` and returns the rewritten object.
pub fn patch(file: &[u8]) -> Result<Vec<u8>> {
    let elf = Elf::parse(file)?;
    let mut object = Object::read(file, &elf)?;

    let applied = object.apply_patches()?;
    object.remap();

    log::info!("applied {applied} patch sections");
    Ok(object.write())
}
