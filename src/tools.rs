//! Build steps that prepare the ROM contents the patches rely on.

pub mod dll_imports;
pub mod elf_patch;
pub mod fs_pack;
