//! A small reader for 32-bit ELF objects: section headers and the symbol table.

use std::ffi::CStr;

use byteorder::{BigEndian, ByteOrder, LittleEndian};
use eyre::{bail, format_err, Context, Result};

pub const SHN_UNDEF: u16 = 0;
pub const SHN_LORESERVE: u16 = 0xff00;
pub const SHN_ABS: u16 = 0xfff1;

pub const SHT_NULL: u32 = 0;
pub const SHT_SYMTAB: u32 = 2;
pub const SHT_RELA: u32 = 4;
pub const SHT_NOBITS: u32 = 8;
pub const SHT_REL: u32 = 9;

pub const STB_LOCAL: u8 = 0;
pub const STT_SECTION: u8 = 3;

const ELF_MAGIC: &[u8; 4] = b"\x7fELF";
const ELFCLASS32: u8 = 1;
const ELFDATA2LSB: u8 = 1;
const ELFDATA2MSB: u8 = 2;

pub const EHDR_SIZE: usize = 0x34;
pub const SHDR_SIZE: usize = 0x28;
pub const SYM_SIZE: usize = 0x10;

/// Reads integers from the object in its own byte order.
#[derive(Clone, Copy)]
struct Reader<'a> {
    data: &'a [u8],
    big_endian: bool,
}

impl<'a> Reader<'a> {
    fn bytes(&self, offset: usize, len: usize) -> Result<&'a [u8]> {
        offset
            .checked_add(len)
            .and_then(|end| self.data.get(offset..end))
            .ok_or_else(|| {
                format_err!(
                    "read of {len:#x} bytes at {offset:#x} is past the end of the file ({:#x} bytes)",
                    self.data.len()
                )
            })
    }

    fn u16(&self, offset: usize) -> Result<u16> {
        let bytes = self.bytes(offset, 2)?;

        Ok(if self.big_endian {
            BigEndian::read_u16(bytes)
        } else {
            LittleEndian::read_u16(bytes)
        })
    }

    fn u32(&self, offset: usize) -> Result<u32> {
        let bytes = self.bytes(offset, 4)?;

        Ok(if self.big_endian {
            BigEndian::read_u32(bytes)
        } else {
            LittleEndian::read_u32(bytes)
        })
    }

    /// Reads a NUL-terminated string starting at `offset`.
    fn c_str(&self, offset: usize) -> Result<String> {
        let tail = self
            .data
            .get(offset..)
            .ok_or_else(|| format_err!("string offset {offset:#x} is past the end of the file"))?;

        let string = CStr::from_bytes_until_nul(tail)
            .wrap_err_with(|| format!("unterminated string at {offset:#x}"))?;

        Ok(string.to_string_lossy().into_owned())
    }
}

#[derive(Debug, Clone)]
pub struct Section {
    pub name: String,
    pub name_offset: u32,
    pub kind: u32,
    pub flags: u32,
    pub address: u32,
    pub offset: u32,
    pub size: u32,
    pub link: u32,
    pub info: u32,
    pub align: u32,
    pub entry_size: u32,
}

impl Section {
    /// Returns the bytes of this section in `file`. `SHT_NOBITS` sections have none.
    pub fn data<'a>(&self, file: &'a [u8]) -> Result<&'a [u8]> {
        if self.kind == SHT_NOBITS {
            return Ok(&[]);
        }

        let start = self.offset as usize;

        start
            .checked_add(self.size as usize)
            .and_then(|end| file.get(start..end))
            .ok_or_else(|| format_err!("section '{}' runs past the end of the file", self.name))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Symbol {
    pub name: String,
    pub name_offset: u32,
    pub value: u32,
    pub size: u32,
    pub info: u8,
    pub other: u8,
    pub shndx: u16,
}

impl Symbol {
    pub fn binding(&self) -> u8 {
        self.info >> 4
    }

    pub fn kind(&self) -> u8 {
        self.info & 0xf
    }

    pub fn is_defined(&self) -> bool {
        self.shndx != SHN_UNDEF
    }
}

#[derive(Debug)]
pub struct Elf {
    pub big_endian: bool,
    pub sections: Vec<Section>,
    /// Index of the section holding section names (`e_shstrndx`).
    pub names_index: usize,
    symtab_index: Option<usize>,
    symbols: Vec<Symbol>,
}

impl Elf {
    pub fn parse(data: &[u8]) -> Result<Elf> {
        if data.len() < EHDR_SIZE || &data[..4] != ELF_MAGIC {
            bail!("not an ELF file");
        }

        if data[4] != ELFCLASS32 {
            bail!("only 32-bit ELF files are supported (class {})", data[4]);
        }

        let big_endian = match data[5] {
            ELFDATA2MSB => true,
            ELFDATA2LSB => false,
            other => bail!("unknown ELF data encoding {other}"),
        };

        let reader = Reader { data, big_endian };

        let section_offset = reader.u32(0x20)? as usize;
        let section_entry_size = reader.u16(0x2e)? as usize;
        let section_count = reader.u16(0x30)? as usize;
        let names_index = reader.u16(0x32)? as usize;

        if section_count != 0 && section_entry_size < SHDR_SIZE {
            bail!("section header entries are too small ({section_entry_size:#x} bytes)");
        }

        let headers = (0..section_count)
            .map(|index| read_section(reader, section_offset + index * section_entry_size))
            .collect::<Result<Vec<_>>>()
            .wrap_err("failed to read section headers")?;

        let names_offset = headers
            .get(names_index)
            .map(|section| section.offset as usize);

        let sections = headers
            .into_iter()
            .map(|mut section| {
                if let Some(names_offset) = names_offset {
                    section.name = reader.c_str(names_offset + section.name_offset as usize)?;
                }

                Ok(section)
            })
            .collect::<Result<Vec<_>>>()?;

        let symtab_index = sections
            .iter()
            .position(|section| section.kind == SHT_SYMTAB);

        let symbols = match symtab_index {
            Some(index) => read_symbols(reader, &sections[index], &sections)?,
            None => Vec::new(),
        };

        Ok(Elf {
            big_endian,
            sections,
            names_index,
            symtab_index,
            symbols,
        })
    }

    /// Index of the first `SHT_SYMTAB` section, which `symbols()` is read from.
    pub fn symtab_index(&self) -> Option<usize> {
        self.symtab_index
    }

    pub fn symbols(&self) -> &[Symbol] {
        &self.symbols
    }

    /// Returns every symbol named `name`.
    pub fn symbols_by_name<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Symbol> + 'a {
        self.symbols.iter().filter(move |symbol| symbol.name == name)
    }
}

/// Reads the section header at `offset`. The name is filled in once the name table is known.
fn read_section(reader: Reader, offset: usize) -> Result<Section> {
    Ok(Section {
        name: String::new(),
        name_offset: reader.u32(offset)?,
        kind: reader.u32(offset + 0x04)?,
        flags: reader.u32(offset + 0x08)?,
        address: reader.u32(offset + 0x0c)?,
        offset: reader.u32(offset + 0x10)?,
        size: reader.u32(offset + 0x14)?,
        link: reader.u32(offset + 0x18)?,
        info: reader.u32(offset + 0x1c)?,
        align: reader.u32(offset + 0x20)?,
        entry_size: reader.u32(offset + 0x24)?,
    })
}

fn read_symbols(reader: Reader, symtab: &Section, sections: &[Section]) -> Result<Vec<Symbol>> {
    let strtab = sections
        .get(symtab.link as usize)
        .ok_or_else(|| format_err!("symbol table links to missing section {}", symtab.link))?;

    let entry_size = match symtab.entry_size as usize {
        0 => SYM_SIZE,
        size if size < SYM_SIZE => bail!("symbol entries are too small ({size:#x} bytes)"),
        size => size,
    };

    let count = symtab.size as usize / entry_size;

    (0..count)
        .map(|index| {
            let offset = symtab.offset as usize + index * entry_size;
            let name_offset = reader.u32(offset)?;

            Ok(Symbol {
                name: reader.c_str(strtab.offset as usize + name_offset as usize)?,
                name_offset,
                value: reader.u32(offset + 0x04)?,
                size: reader.u32(offset + 0x08)?,
                info: reader.bytes(offset + 0x0c, 1)?[0],
                other: reader.bytes(offset + 0x0d, 1)?[0],
                shndx: reader.u16(offset + 0x0e)?,
            })
        })
        .collect::<Result<Vec<_>>>()
        .wrap_err("failed to read symbol table")
}


#[cfg(test)]
mod tests {
    use super::test_support::build_elf;
    use super::*;

    #[test]
    fn test_parse_symbols() {
        let data = build_elf(&[("game_tick", 0x80014A4C, 1), ("bcopy", 0, SHN_UNDEF)]);
        let elf = Elf::parse(&data).unwrap();

        assert!(elf.big_endian);
        assert_eq!(elf.sections.len(), 4);
        assert_eq!(elf.sections[2].name, ".symtab");
        assert_eq!(elf.sections[2].kind, SHT_SYMTAB);
        assert_eq!(elf.sections[1].name, ".strtab");

        // Null symbol plus our two.
        assert_eq!(elf.symbols().len(), 3);

        let tick: Vec<_> = elf.symbols_by_name("game_tick").collect();
        assert_eq!(tick.len(), 1);
        assert_eq!(tick[0].value, 0x80014A4C);
        assert_eq!(tick[0].binding(), 1);
        assert_eq!(tick[0].kind(), 2);
        assert!(tick[0].is_defined());

        let bcopy: Vec<_> = elf.symbols_by_name("bcopy").collect();
        assert!(!bcopy[0].is_defined());
    }

    #[test]
    fn test_rejects_non_elf() {
        assert!(Elf::parse(b"not an elf file at all, definitely not one").is_err());
    }

    #[test]
    fn test_rejects_truncated_headers() {
        let mut data = build_elf(&[("x", 1, 1)]);
        data.truncate(data.len() - 8);

        assert!(Elf::parse(&data).is_err());
    }
}
