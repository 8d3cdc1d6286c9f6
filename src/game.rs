//! The game state the patches operate on, and the patch sites they are installed into.

pub mod controller;
pub mod fade;
pub mod gfx;
pub mod heap;
pub mod memory;
pub mod print;
pub mod symbols;

use eyre::{eyre, Context, Result};

use crate::{
    call_hook,
    fs::{FsFile, Fst},
    hook::{Hook, Target},
    printf::{self, Arg, Formatter},
    settings::Options,
};

use self::{
    controller::Controller,
    fade::{Fader, ScreenFade},
    gfx::{DisplayList, TextureProxies},
    heap::{Heap, FST_TAG},
    memory::{Ram, Rom},
    print::DebugPrint,
    symbols::{ImageError, SymbolTable},
};

/// Space available to `malloc`.
pub const HEAP_SIZE: usize = 0x20_0000;

/// The splash screen finishes once its timer reaches this many ticks.
pub const SPLASH_DURATION: f32 = 720.0;

pub type InitFn = fn(&mut Game) -> Result<()>;
pub type GameFn = fn(&mut Game);
pub type DiPrintfFn = fn(&mut Game, &str, &[Arg]) -> i32;
pub type VsprintfFn = fn(&Formatter, &mut [u8], &str, &[Arg]) -> i32;

/// State of the splash screen DLL (DLL 60).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SplashState {
    pub active: bool,

    /// `data_4`: input is ignored while this is 1.
    pub locked: u8,

    /// `bss_0`: ticks since the splash started.
    pub timer: f32,

    /// `bss_6`
    pub phase: i8,
}

impl Default for SplashState {
    fn default() -> Self {
        SplashState {
            active: true,
            locked: 0,
            timer: 0.0,
            phase: 0,
        }
    }
}

impl SplashState {
    /// Advances the timer by one frame.
    fn advance(&mut self, delay: f32) {
        self.timer += delay;

        if self.timer >= SPLASH_DURATION {
            log::info!("splash finished in phase {}", self.phase);
            self.active = false;
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

/// Every function the patches can replace. Each site reaches the game's stock routine until a
/// replacement is installed.
pub struct Hooks {
    pub init: Hook<InitFn>,
    pub di_printf_init: Hook<GameFn>,
    pub di_printf: Hook<DiPrintfFn>,
    pub vsprintf: Hook<VsprintfFn>,
    pub game_tick: Hook<GameFn>,
    pub splash_skip_update: Hook<GameFn>,
}

impl Default for Hooks {
    fn default() -> Self {
        Hooks {
            init: Hook::new(Target::Symbol("custom_seg_load"), stock::init as InitFn),
            di_printf_init: Hook::new(
                Target::Symbol("diPrintfInit"),
                stock::di_printf_init as GameFn,
            ),
            di_printf: Hook::new(Target::Symbol("diPrintf"), stock::di_printf as DiPrintfFn),
            vsprintf: Hook::new(Target::Symbol("vsprintf"), stock::vsprintf as VsprintfFn),
            game_tick: Hook::new(Target::Symbol("game_tick"), stock::game_tick as GameFn),
            splash_skip_update: Hook::new(
                Target::Symbol("dll_60_update"),
                stock::splash_skip_update as GameFn,
            ),
        }
    }
}

pub struct Game {
    pub options: Options,
    pub rom: Rom,
    pub symbols: SymbolTable,
    pub ram: Ram,
    pub heap: Heap,

    /// `gFST`, exactly as it was read from ROM.
    pub fst: Option<Vec<u8>>,

    pub debug_print: DebugPrint,
    pub formatter: Formatter,
    pub gfx: DisplayList,
    pub textures: TextureProxies,
    pub controller: Controller,
    pub framebuffer: Resolution,
    pub splash: SplashState,

    /// `delayFloat`: ticks per frame.
    pub delay: f32,

    /// `gDLL_28_ScreenFade`
    pub screen_fade: Box<dyn ScreenFade>,

    pub hooks: Hooks,
}

impl Game {
    pub fn new(rom: Rom, symbols: SymbolTable, options: Options) -> Game {
        Game::with_screen_fade(rom, symbols, options, Box::<Fader>::default())
    }

    pub fn with_screen_fade(
        rom: Rom,
        symbols: SymbolTable,
        options: Options,
        screen_fade: Box<dyn ScreenFade>,
    ) -> Game {
        Game {
            options,
            rom,
            symbols,
            ram: Ram::default(),
            heap: Heap::new(HEAP_SIZE),
            fst: None,
            debug_print: DebugPrint::default(),
            formatter: Formatter::default(),
            gfx: DisplayList::default(),
            textures: TextureProxies::default(),
            controller: Controller::default(),
            framebuffer: Resolution {
                width: 320,
                height: 240,
            },
            splash: SplashState::default(),
            delay: 1.0,
            screen_fade,
            hooks: Hooks::default(),
        }
    }

    /// Runs the startup routines that the patches replace.
    pub fn boot(&mut self) -> Result<()> {
        log::info!("booting with {} symbols", self.symbols.len());

        let init = call_hook!(self, init);
        init.wrap_err("game init failed")?;

        call_hook!(self, di_printf_init);

        Ok(())
    }

    /// Runs one frame with `buttons` held on controller port 0.
    pub fn frame(&mut self, buttons: u16) {
        self.gfx.clear();
        self.controller.update(0, buttons);
        self.screen_fade.update();

        if self.splash.active {
            call_hook!(self, splash_skip_update);
            self.splash.advance(self.delay);
        }

        call_hook!(self, game_tick);
    }

    /// Reads the filesystem table from ROM into a fresh heap allocation and keeps it as `gFST`.
    /// The table occupies the ROM between `__fstAddress` and `__file1Address`.
    pub fn load_filesystem(&mut self) -> Result<()> {
        let range = self.symbols.range("__fstAddress", "__file1Address")?;
        let size = (range.end - range.start) as usize;

        let mut fst = self.heap.malloc(size, FST_TAG, None)?;
        self.rom.read(range.start, &mut fst)?;

        log::info!(
            "loaded {size:#x} byte filesystem table from ROM {:#x}",
            range.start
        );

        self.fst = Some(fst);
        Ok(())
    }

    /// Parses the loaded filesystem table.
    pub fn filesystem(&self) -> Result<Fst> {
        let bytes = self
            .fst
            .as_deref()
            .ok_or_else(|| eyre!("the filesystem table has not been loaded"))?;

        Fst::parse(bytes)
    }

    /// Reads the contents of `file` from ROM.
    pub fn read_file(&self, file: FsFile) -> Result<Vec<u8>> {
        let range = self
            .filesystem()?
            .range(file)
            .ok_or_else(|| eyre!("{} is not in the filesystem table", file.file_name()))?;

        let len = (range.end - range.start) as usize;
        let address = self
            .symbols
            .get("__file1Address")?
            .checked_add(range.start)
            .ok_or(ImageError::OutOfBounds {
                region: "ROM",
                address: range.start,
                len,
                size: self.rom.len(),
            })
            .wrap_err_with(|| format!("{} starts past the end of ROM", file.file_name()))?;

        let mut data = vec![0; len];
        self.rom
            .read(address, &mut data)
            .wrap_err_with(|| format!("failed to read {}", file.file_name()))?;

        Ok(data)
    }
}

/// The routines the game ships with.
mod stock {
    use super::*;

    pub fn init(game: &mut Game) -> Result<()> {
        game.load_filesystem()
    }

    pub fn di_printf_init(game: &mut Game) {
        game.debug_print.scale_x |= game.framebuffer.width > 320;
        game.debug_print.scale_y |= game.framebuffer.height > 240;

        game.debug_print.origin_x = 0;
        game.debug_print.origin_y = 0;

        for (id, texture) in game.debug_print.textures.iter_mut().enumerate() {
            *texture = Some(game.textures.queue_load_texture_proxy(id as u16));
        }

        game.debug_print.cursor = 0;
    }

    /// Release builds of the game compile `diPrintf` out.
    pub fn di_printf(_game: &mut Game, _fmt: &str, _args: &[Arg]) -> i32 {
        0
    }

    pub fn vsprintf(formatter: &Formatter, dst: &mut [u8], fmt: &str, args: &[Arg]) -> i32 {
        printf::sprintf(dst, |prout| formatter.printf_without_floats(prout, fmt, args))
    }

    pub fn game_tick(game: &mut Game) {
        print::di_printf_all(&mut game.debug_print, &mut game.gfx);
    }

    pub fn splash_skip_update(_game: &mut Game) {}
}


#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;
    use crate::game::heap::HeapError;

    #[test]
    fn test_stock_boot_loads_filesystem() {
        let mut game = game_with_files(&[b"tab".as_slice(), b"audio data".as_slice()]);
        game.boot().unwrap();

        let fst = game.filesystem().unwrap();
        assert_eq!(fst.file_count(), 2);

        assert_eq!(game.read_file(FsFile::AudioTab).unwrap(), b"tab");
        assert_eq!(game.read_file(FsFile::Audio).unwrap(), b"audio data");
        assert!(game.read_file(FsFile::SfxTab).is_err());

        assert_eq!(game.heap.blocks()[0].tag, FST_TAG);
    }

    #[test]
    fn test_read_file_before_boot() {
        let game = game_with_files(&[b"tab".as_slice()]);
        assert!(game.read_file(FsFile::AudioTab).is_err());
    }

    #[test]
    fn test_read_file_offset_overflow() {
        let mut game = game_with_files(&[b"tab".as_slice()]);
        game.fst = Some(vec![
            0x00, 0x00, 0x00, 0x01, //
            0xFF, 0xFF, 0xFF, 0xF0, //
            0xFF, 0xFF, 0xFF, 0xFF,
        ]);

        let err = game.read_file(FsFile::AudioTab).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ImageError>(),
            Some(ImageError::OutOfBounds {
                address: 0xFFFF_FFF0,
                len: 0xF,
                ..
            })
        ));
    }

    #[test]
    fn test_boot_propagates_allocation_failure() {
        let mut game = game_with_files(&[b"tab".as_slice()]);
        game.heap = Heap::new(4);

        let err = game.boot().unwrap_err();
        assert!(matches!(
            err.downcast_ref::<HeapError>(),
            Some(HeapError::OutOfMemory { tag: FST_TAG, .. })
        ));
        assert!(game.fst.is_none());
    }

    #[test]
    fn test_stock_di_printf_init_scales_high_resolution() {
        let mut game = game_with_files(&[]);
        game.framebuffer = Resolution {
            width: 640,
            height: 240,
        };

        game.boot().unwrap();

        assert!(game.debug_print.scale_x);
        assert!(!game.debug_print.scale_y);
        assert_eq!(game.textures.queued(), [0, 1, 2]);
    }

    #[test]
    fn test_stock_sites_print_nothing() {
        let mut game = game_with_files(&[]);
        game.boot().unwrap();

        assert_eq!(call_hook!(&mut game, di_printf, "%d", &[Arg::Int(5)]), 0);
        assert_eq!(game.debug_print.cursor, 0);

        let mut buffer = [0xFF; 16];
        let vsprintf = game.hooks.vsprintf.get();
        let written = vsprintf(&game.formatter, &mut buffer, "x=%.1f!", &[Arg::Float(1.5)]);

        assert_eq!(written, 3);
        assert_eq!(&buffer[..4], b"x=!\0");
    }

    #[test]
    fn test_splash_times_out() {
        let mut game = game_with_files(&[]);
        game.boot().unwrap();
        game.delay = 2.0;

        for _ in 0..359 {
            game.frame(0);
        }
        assert!(game.splash.active);

        game.frame(0);
        assert!(!game.splash.active);
        assert_eq!(game.splash.timer, SPLASH_DURATION);
    }
}
