//! The game's filesystem: a fixed list of asset files packed back to back, indexed by the
//! filesystem table (FST).
//!
//! The FST is a big-endian `u32` file count followed by `count + 1` offsets. Offset `n` is where
//! file `n` starts, relative to the end of the table, and the last offset is the end of the data.

use std::ops::Range;

use byteorder::{BigEndian, ByteOrder};
use eyre::{ensure, Result};
use strum::{EnumCount, EnumIter, IntoEnumIterator, IntoStaticStr};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, EnumCount, EnumIter, IntoStaticStr)]
pub enum FsFile {
    #[strum(serialize = "AUDIO_tab.bin")]
    AudioTab,
    #[strum(serialize = "AUDIO.bin")]
    Audio,
    #[strum(serialize = "SFX_tab.bin")]
    SfxTab,
    #[strum(serialize = "SFX.bin")]
    Sfx,
    #[strum(serialize = "AMBIENT_tab.bin")]
    AmbientTab,
    #[strum(serialize = "AMBIENT.bin")]
    Ambient,
    #[strum(serialize = "MUSIC_tab.bin")]
    MusicTab,
    #[strum(serialize = "MUSIC.bin")]
    Music,
    #[strum(serialize = "MPEG_tab.bin")]
    MpegTab,
    #[strum(serialize = "MPEG.bin")]
    Mpeg,
    #[strum(serialize = "MUSICACTIONS.bin")]
    MusicActions,
    #[strum(serialize = "CAMACTIONS.bin")]
    CamActions,
    #[strum(serialize = "LACTIONS.bin")]
    LActions,
    #[strum(serialize = "ANIMCURVES.bin")]
    AnimCurves,
    #[strum(serialize = "ANIMCURVES_tab.bin")]
    AnimCurvesTab,
    #[strum(serialize = "OBJSEQ2CURVE_tab.bin")]
    ObjSeq2CurveTab,
    #[strum(serialize = "FONTS.bin")]
    Fonts,
    #[strum(serialize = "CACHEFON.bin")]
    CacheFon,
    #[strum(serialize = "CACHEFON2.bin")]
    CacheFon2,
    #[strum(serialize = "GAMETEXT.bin")]
    GameText,
    #[strum(serialize = "GAMETEXT_tab.bin")]
    GameTextTab,
    #[strum(serialize = "GLOBALMAP.bin")]
    GlobalMap,
    #[strum(serialize = "TABLES.bin")]
    Tables,
    #[strum(serialize = "TABLES_tab.bin")]
    TablesTab,
    #[strum(serialize = "SCREENS.bin")]
    Screens,
    #[strum(serialize = "SCREENS_tab.bin")]
    ScreensTab,
    #[strum(serialize = "VOXMAP.bin")]
    VoxMap,
    #[strum(serialize = "VOXMAP_tab.bin")]
    VoxMapTab,
    #[strum(serialize = "TEXPRE_tab.bin")]
    TexPreTab,
    #[strum(serialize = "TEXPRE.bin")]
    TexPre,
    #[strum(serialize = "WARPTAB.bin")]
    WarpTab,
    #[strum(serialize = "MAPS.bin")]
    Maps,
    #[strum(serialize = "MAPS_tab.bin")]
    MapsTab,
    #[strum(serialize = "MAPINFO.bin")]
    MapInfo,
    #[strum(serialize = "MAPSETUP.bin")]
    MapSetup,
    #[strum(serialize = "MAPSETUP_tab.bin")]
    MapSetupTab,
    #[strum(serialize = "TEX1.bin")]
    Tex1,
    #[strum(serialize = "TEX1_tab.bin")]
    Tex1Tab,
    #[strum(serialize = "TEXTABLE.bin")]
    TexTable,
    #[strum(serialize = "TEX0.bin")]
    Tex0,
    #[strum(serialize = "TEX0_tab.bin")]
    Tex0Tab,
    #[strum(serialize = "BLOCKS.bin")]
    Blocks,
    #[strum(serialize = "BLOCKS_tab.bin")]
    BlocksTab,
    #[strum(serialize = "TRKBLK.bin")]
    TrkBlk,
    #[strum(serialize = "HITS.bin")]
    Hits,
    #[strum(serialize = "HITS_tab.bin")]
    HitsTab,
    #[strum(serialize = "MODELS_tab.bin")]
    ModelsTab,
    #[strum(serialize = "MODELS.bin")]
    Models,
    #[strum(serialize = "MODELIND.bin")]
    ModelInd,
    #[strum(serialize = "MODANIM_tab.bin")]
    ModAnimTab,
    #[strum(serialize = "MODANIM.bin")]
    ModAnim,
    #[strum(serialize = "ANIM_tab.bin")]
    AnimTab,
    #[strum(serialize = "ANIM.bin")]
    Anim,
    #[strum(serialize = "AMAP_tab.bin")]
    AmapTab,
    #[strum(serialize = "AMAP.bin")]
    Amap,
    #[strum(serialize = "BITTABLE.bin")]
    BitTable,
    #[strum(serialize = "WEAPONDATA.bin")]
    WeaponData,
    #[strum(serialize = "VOXOBJ_tab.bin")]
    VoxObjTab,
    #[strum(serialize = "VOXOBJ.bin")]
    VoxObj,
    #[strum(serialize = "MODLINES.bin")]
    ModLines,
    #[strum(serialize = "MODLINES_tab.bin")]
    ModLinesTab,
    #[strum(serialize = "SAVEGAME.bin")]
    SaveGame,
    #[strum(serialize = "SAVEGAME_tab.bin")]
    SaveGameTab,
    #[strum(serialize = "OBJSEQ.bin")]
    ObjSeq,
    #[strum(serialize = "OBJSEQ_tab.bin")]
    ObjSeqTab,
    #[strum(serialize = "OBJECTS_tab.bin")]
    ObjectsTab,
    #[strum(serialize = "OBJECTS.bin")]
    Objects,
    #[strum(serialize = "OBJINDEX.bin")]
    ObjIndex,
    #[strum(serialize = "OBJEVENT.bin")]
    ObjEvent,
    #[strum(serialize = "OBJHITS.bin")]
    ObjHits,
    #[strum(serialize = "DLLS.bin")]
    Dlls,
    #[strum(serialize = "DLLS_tab.bin")]
    DllsTab,
    #[strum(serialize = "DLLSIMPORTTAB.bin")]
    DllsImportTab,
    #[strum(serialize = "ENVFXACT.bin")]
    EnvFxAct,
}

impl FsFile {
    /// Position of the file in the table.
    pub fn index(self) -> usize {
        self as usize
    }

    pub fn file_name(self) -> &'static str {
        self.into()
    }

    pub fn from_index(index: usize) -> Option<FsFile> {
        FsFile::iter().nth(index)
    }
}

/// Size in bytes of a table describing `count` files, padded to 16 bytes.
pub fn table_size(count: usize) -> usize {
    ((count + 2) * 4 + 15) & !15
}

/// Size of the table for the game's file list. The linker places the first file this far after
/// `__fstAddress`.
pub const FST_SIZE: usize = 0x130;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fst {
    offsets: Vec<u32>,
}

impl Fst {
    pub fn parse(bytes: &[u8]) -> Result<Fst> {
        ensure!(bytes.len() >= 4, "FST is too short to hold a file count");

        let count = BigEndian::read_u32(bytes) as usize;
        let needed = (count + 2) * 4;

        ensure!(
            bytes.len() >= needed,
            "FST lists {count} files, which needs {needed:#x} bytes, but only {:#x} were loaded",
            bytes.len()
        );

        let offsets: Vec<u32> = bytes[4..needed]
            .chunks_exact(4)
            .map(BigEndian::read_u32)
            .collect();

        ensure!(
            offsets.windows(2).all(|pair| pair[0] <= pair[1]),
            "FST offsets are not in ascending order"
        );

        Ok(Fst { offsets })
    }

    pub fn file_count(&self) -> usize {
        self.offsets.len() - 1
    }

    /// Returns the range of `file`'s data, relative to the end of the table.
    pub fn range(&self, file: FsFile) -> Option<Range<u32>> {
        let index = file.index();

        Some(*self.offsets.get(index)?..*self.offsets.get(index + 1)?)
    }

    pub fn file_size(&self, file: FsFile) -> Option<u32> {
        self.range(file).map(|range| range.end - range.start)
    }

    /// Total size of the file data.
    pub fn data_size(&self) -> u32 {
        self.offsets.last().copied().unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_map() {
        assert_eq!(FsFile::COUNT, 0x4A);
        assert_eq!(FsFile::from_index(0), Some(FsFile::AudioTab));
        assert_eq!(FsFile::from_index(0x46).map(FsFile::file_name), Some("DLLS.bin"));
        assert_eq!(FsFile::DllsImportTab.index(), 0x48);
        assert_eq!(FsFile::EnvFxAct.file_name(), "ENVFXACT.bin");
        assert_eq!(FsFile::from_index(0x4A), None);
    }

    #[test]
    fn test_table_size() {
        assert_eq!(table_size(FsFile::COUNT), FST_SIZE);
        assert_eq!(table_size(0), 0x10);
        assert_eq!(table_size(2), 0x10);
        assert_eq!(table_size(3), 0x20);
    }

    #[test]
    fn test_parse() {
        let mut bytes = vec![0u8; 0x10];
        BigEndian::write_u32(&mut bytes[0..], 2);
        BigEndian::write_u32(&mut bytes[4..], 0);
        BigEndian::write_u32(&mut bytes[8..], 0x20);
        BigEndian::write_u32(&mut bytes[12..], 0x24);

        let fst = Fst::parse(&bytes).unwrap();

        assert_eq!(fst.file_count(), 2);
        assert_eq!(fst.range(FsFile::AudioTab), Some(0..0x20));
        assert_eq!(fst.file_size(FsFile::Audio), Some(4));
        assert_eq!(fst.range(FsFile::SfxTab), None);
        assert_eq!(fst.data_size(), 0x24);
    }

    #[test]
    fn test_parse_rejects_bad_tables() {
        assert!(Fst::parse(&[0, 0]).is_err());

        // Claims more files than were loaded.
        assert!(Fst::parse(&[0, 0, 0, 9, 0, 0, 0, 0]).is_err());

        let mut descending = vec![0u8; 0x10];
        BigEndian::write_u32(&mut descending[0..], 2);
        BigEndian::write_u32(&mut descending[4..], 8);
        BigEndian::write_u32(&mut descending[8..], 4);
        BigEndian::write_u32(&mut descending[12..], 12);
        assert!(Fst::parse(&descending).is_err());
    }
}
