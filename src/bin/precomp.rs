use std::{
    fs::{self, File},
    io::BufWriter,
    path::{Path, PathBuf},
};

use clap::{Parser, Subcommand};
use eyre::{Context, Result};
use precomp::{
    custom,
    elf::Elf,
    fs::FsFile,
    game::{memory::Rom, symbols::SymbolTable, Game},
    logging,
    settings::{Options, OPTIONS_FILE_NAME},
    tools::{dll_imports, elf_patch, fs_pack},
};
use strum::IntoEnumIterator;

#[derive(Parser)]
#[command(name = "precomp")]
#[command(about = "Build tools and patch host for the recompiled game")]
struct Args {
    /// Options file.
    #[arg(long, default_value = OPTIONS_FILE_NAME)]
    options: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Pack a directory of extracted assets into a filesystem image.
    FsPack {
        /// The directory of assets to repack.
        assets: PathBuf,

        /// The filesystem image to write.
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Add exported symbols to the DLL import table.
    DllImports {
        /// The original DLLSIMPORTTAB file.
        dllsimporttab: PathBuf,

        /// The base ELF file.
        #[arg(short, long)]
        elf: PathBuf,

        /// File listing the symbols to export to DLLs.
        #[arg(short, long)]
        symbols: PathBuf,

        /// The new DLLSIMPORTTAB file to write.
        #[arg(short, long)]
        output: PathBuf,

        /// The linker script assigning the new symbols to write.
        #[arg(short = 'l', long)]
        linker_script: PathBuf,
    },

    /// Apply the `.patch:<symbol>:<offset>` sections of an object file.
    PatchElf {
        /// The object containing patch sections.
        elf: PathBuf,

        /// The patched object to write.
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Boot a ROM with the patches installed and list its filesystem.
    Fst {
        #[arg(long)]
        rom: PathBuf,

        /// Linker script or ELF file with the game's symbol addresses.
        #[arg(long)]
        symbols: PathBuf,
    },

    /// Write the defined symbols of an ELF file as a linker script.
    Symbols {
        elf: PathBuf,

        #[arg(short, long)]
        output: PathBuf,
    },
}

fn main() -> Result<()> {
    let args = Args::parse();
    let options = Options::load(&args.options);

    logging::init(&options)?;
    log::info!("precomp {}", env!("CARGO_PKG_VERSION"));

    let result = match args.command {
        Command::FsPack { assets, output } => pack(&assets, &output),

        Command::DllImports {
            dllsimporttab,
            elf,
            symbols,
            output,
            linker_script,
        } => export(&dllsimporttab, &elf, &symbols, &output, &linker_script),

        Command::PatchElf { elf, output } => patch_elf(&elf, &output),

        Command::Fst { rom, symbols } => list_files(&rom, &symbols, options),

        Command::Symbols { elf, output } => load_symbols(&elf)
            .and_then(|symbols| Ok(fs::write(&output, symbols.to_linker_script())?)),
    };

    if let Err(err) = &result {
        log::error!("{err:?}");
    }

    result
}

fn pack(assets: &Path, output: &Path) -> Result<()> {
    let file = File::create(output)
        .wrap_err_with(|| format!("failed to create {}", output.display()))?;

    fs_pack::repack(assets, BufWriter::new(file))?;
    Ok(())
}

fn export(
    base: &Path,
    elf: &Path,
    symbols: &Path,
    output: &Path,
    linker_script: &Path,
) -> Result<()> {
    let base = fs::read(base).wrap_err_with(|| format!("failed to read {}", base.display()))?;
    let elf = Elf::parse(&fs::read(elf)?)
        .wrap_err_with(|| format!("failed to parse {}", elf.display()))?;
    let names = fs::read_to_string(symbols)?;

    let exports = dll_imports::make(&base, &elf, &dll_imports::parse_symbol_list(&names))?;

    fs::write(output, &exports.table)?;
    fs::write(linker_script, &exports.linker_script)?;

    Ok(())
}

fn patch_elf(input: &Path, output: &Path) -> Result<()> {
    let bytes = fs::read(input).wrap_err_with(|| format!("failed to read {}", input.display()))?;
    let patched =
        elf_patch::patch(&bytes).wrap_err_with(|| format!("failed to patch {}", input.display()))?;

    fs::write(output, patched).wrap_err_with(|| format!("failed to write {}", output.display()))
}

/// Reads symbols from either an ELF file or a linker script.
fn load_symbols(path: &Path) -> Result<SymbolTable> {
    let bytes = fs::read(path).wrap_err_with(|| format!("failed to read {}", path.display()))?;

    if bytes.starts_with(b"\x7fELF") {
        return Ok(SymbolTable::from_elf(&Elf::parse(&bytes)?));
    }

    Ok(SymbolTable::parse(&String::from_utf8_lossy(&bytes))?)
}

fn list_files(rom: &Path, symbols: &Path, options: Options) -> Result<()> {
    let rom = Rom::new(fs::read(rom).wrap_err_with(|| format!("failed to read {}", rom.display()))?);
    let symbols = load_symbols(symbols)?;

    let mut game = Game::new(rom, symbols, options);
    custom::install(&game)?;
    game.boot()?;

    let fst = game.filesystem()?;

    for file in FsFile::iter().take(fst.file_count()) {
        let size = fst.file_size(file).unwrap_or(0);
        println!("{:02X} {:<22} {size:#x}", file.index(), file.file_name());
    }

    println!("{:#x} bytes in {} files", fst.data_size(), fst.file_count());
    Ok(())
}
