//! Packs extracted asset files into the filesystem image that gets linked into the ROM.

use std::{
    fs::File,
    io::{self, Seek, SeekFrom, Write},
    path::Path,
};

use byteorder::{BigEndian, WriteBytesExt};
use eyre::{Context, Result};
use strum::{EnumCount, IntoEnumIterator};

use crate::fs::{table_size, FsFile};

/// The extracted `ENVFXACT.bin` is missing its last four bytes, which are all zero.
const ENVFXACT_PADDING: usize = 4;

/// Writes every file of the game's file list that exists under `assets` to `out`, preceded by
/// the filesystem table. Files that aren't there are packed as empty. Returns the number of files
/// found.
pub fn repack(assets: &Path, mut out: impl Write + Seek) -> Result<usize> {
    let start = out.stream_position()?;
    out.write_all(&vec![0; table_size(FsFile::COUNT)])?;

    let mut offsets = Vec::with_capacity(FsFile::COUNT + 1);
    let mut offset = 0u32;
    let mut found = 0;

    for file in FsFile::iter() {
        offsets.push(offset);

        let path = assets.join(file.file_name());

        let mut input = match File::open(&path) {
            Ok(input) => input,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                log::debug!("{} not found, packing it empty", path.display());
                continue;
            }
            Err(err) => {
                return Err(err).wrap_err_with(|| format!("failed to open {}", path.display()))
            }
        };

        let copied = io::copy(&mut input, &mut out)
            .wrap_err_with(|| format!("failed to pack {}", path.display()))?;

        offset += u32::try_from(copied).wrap_err("filesystem is larger than 4GB")?;
        found += 1;
    }

    offsets.push(offset + ENVFXACT_PADDING as u32);
    out.write_all(&[0; ENVFXACT_PADDING])?;

    let end = out.stream_position()?;

    out.seek(SeekFrom::Start(start))?;
    out.write_u32::<BigEndian>(FsFile::COUNT as u32)?;

    for offset in offsets {
        out.write_u32::<BigEndian>(offset)?;
    }

    out.seek(SeekFrom::Start(end))?;

    log::info!(
        "packed {found} of {} files ({:#x} bytes)",
        FsFile::COUNT,
        end - start
    );

    Ok(found)
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use tempfile::tempdir;

    use super::*;
    use crate::fs::{Fst, FST_SIZE};

    #[test]
    fn test_repack() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("AUDIO_tab.bin"), b"tab!").unwrap();
        std::fs::write(dir.path().join("SFX.bin"), b"sound").unwrap();
        std::fs::write(dir.path().join("ENVFXACT.bin"), b"fx").unwrap();
        std::fs::write(dir.path().join("unrelated.bin"), b"ignored").unwrap();

        let mut out = Cursor::new(Vec::new());
        assert_eq!(repack(dir.path(), &mut out).unwrap(), 3);

        let image = out.into_inner();
        assert_eq!(image.len(), FST_SIZE + 4 + 5 + 2 + 4);

        let fst = Fst::parse(&image).unwrap();
        assert_eq!(fst.file_count(), FsFile::COUNT);
        assert_eq!(fst.range(FsFile::AudioTab), Some(0..4));
        assert_eq!(fst.file_size(FsFile::Audio), Some(0));
        assert_eq!(fst.range(FsFile::Sfx), Some(4..9));
        assert_eq!(fst.range(FsFile::EnvFxAct), Some(9..15));
        assert_eq!(fst.data_size(), 15);

        let data = &image[FST_SIZE..];
        assert_eq!(&data[..11], b"tab!soundfx");
        assert_eq!(&data[11..], [0; 4]);
    }

    #[test]
    fn test_repack_empty_directory() {
        let dir = tempdir().unwrap();
        let mut out = Cursor::new(Vec::new());

        assert_eq!(repack(dir.path(), &mut out).unwrap(), 0);

        let image = out.into_inner();
        assert_eq!(image.len(), FST_SIZE + 4);
        assert_eq!(Fst::parse(&image).unwrap().data_size(), 4);
    }
}
