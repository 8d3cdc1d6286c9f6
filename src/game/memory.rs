//! The cartridge image and main memory.

use std::ops::Range;

use super::symbols::ImageError;

/// Physical base of RDRAM as seen through KSEG0.
pub const RAM_BASE: u32 = 0x8000_0000;

/// Size of RDRAM with the Expansion Pak installed.
pub const RAM_SIZE: usize = 0x80_0000;

/// The cartridge ROM. Addresses are byte offsets from the start of the image.
#[derive(Debug, Default, Clone)]
pub struct Rom {
    bytes: Vec<u8>,
}

impl Rom {
    pub fn new(bytes: Vec<u8>) -> Rom {
        Rom { bytes }
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Copies `dst.len()` bytes starting at `rom_address` into `dst`. Blocks until the whole
    /// range has been copied.
    pub fn read(&self, rom_address: u32, dst: &mut [u8]) -> Result<(), ImageError> {
        let start = rom_address as usize;

        let src = start
            .checked_add(dst.len())
            .and_then(|end| self.bytes.get(start..end))
            .ok_or(ImageError::OutOfBounds {
                region: "ROM",
                address: rom_address,
                len: dst.len(),
                size: self.bytes.len(),
            })?;

        dst.copy_from_slice(src);
        Ok(())
    }
}

/// Main memory, addressed through KSEG0.
#[derive(Debug, Clone)]
pub struct Ram {
    bytes: Vec<u8>,
}

impl Default for Ram {
    fn default() -> Self {
        Ram::new(RAM_SIZE)
    }
}

impl Ram {
    pub fn new(size: usize) -> Ram {
        Ram {
            bytes: vec![0; size],
        }
    }

    fn region(&self, range: &Range<u32>) -> Result<Range<usize>, ImageError> {
        let len = range.end.saturating_sub(range.start) as usize;

        let out_of_bounds = ImageError::OutOfBounds {
            region: "RAM",
            address: range.start,
            len,
            size: self.bytes.len(),
        };

        let start = range
            .start
            .checked_sub(RAM_BASE)
            .ok_or_else(|| out_of_bounds.clone())? as usize;

        let end = start + len;

        if end > self.bytes.len() {
            return Err(out_of_bounds);
        }

        Ok(start..end)
    }

    pub fn slice(&self, range: Range<u32>) -> Result<&[u8], ImageError> {
        let region = self.region(&range)?;
        Ok(&self.bytes[region])
    }

    pub fn slice_mut(&mut self, range: Range<u32>) -> Result<&mut [u8], ImageError> {
        let region = self.region(&range)?;
        Ok(&mut self.bytes[region])
    }

    /// Zeroes every byte in `range`.
    pub fn bzero(&mut self, range: Range<u32>) -> Result<(), ImageError> {
        self.slice_mut(range)?.fill(0);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rom_read() {
        let rom = Rom::new((0..=255).collect());
        let mut dst = [0u8; 4];

        rom.read(0x10, &mut dst).unwrap();
        assert_eq!(dst, [0x10, 0x11, 0x12, 0x13]);
    }

    #[test]
    fn test_rom_read_past_end() {
        let rom = Rom::new(vec![0; 16]);
        let mut dst = [0xAAu8; 4];

        assert!(matches!(
            rom.read(14, &mut dst),
            Err(ImageError::OutOfBounds { region: "ROM", .. })
        ));

        // Nothing is copied on failure.
        assert_eq!(dst, [0xAA; 4]);
    }

    #[test]
    fn test_ram_bzero() {
        let mut ram = Ram::new(0x100);
        ram.slice_mut(RAM_BASE..RAM_BASE + 0x100).unwrap().fill(0xFF);

        ram.bzero(RAM_BASE + 0x10..RAM_BASE + 0x20).unwrap();

        let bytes = ram.slice(RAM_BASE..RAM_BASE + 0x100).unwrap();
        assert!(bytes[..0x10].iter().all(|b| *b == 0xFF));
        assert!(bytes[0x10..0x20].iter().all(|b| *b == 0));
        assert!(bytes[0x20..].iter().all(|b| *b == 0xFF));
    }

    #[test]
    fn test_ram_out_of_range() {
        let mut ram = Ram::new(0x100);

        assert!(ram.bzero(RAM_BASE + 0xF0..RAM_BASE + 0x110).is_err());
        assert!(ram.bzero(0x1000..0x1010).is_err());
    }
}
