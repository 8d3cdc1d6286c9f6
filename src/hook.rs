//! Types and macros for replacing game functions at their entry points.
//!
//! A patch site is described by a [`Target`], which is resolved against the game's symbol table
//! when a replacement is installed. Until then the site keeps calling the game's stock routine.

use parking_lot::Mutex;

use crate::game::symbols::{ImageError, SymbolTable};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Target {
    /// A function entry point named in the symbol table.
    Symbol(&'static str),

    /// A raw RAM address.
    Address(u32),
}

impl Target {
    /// Resolves the entry point of the target in `symbols`.
    pub fn resolve(&self, symbols: &SymbolTable) -> Result<u32, ImageError> {
        match self {
            Target::Symbol(name) => symbols.get(name),
            Target::Address(address) => Ok(*address),
        }
    }

    fn name(&self) -> String {
        match self {
            Target::Symbol(name) => name.to_string(),
            Target::Address(address) => format!("{address:#010x}"),
        }
    }
}

struct Installed<FnType> {
    address: u32,
    replacement: FnType,
}

pub struct Hook<FnType> {
    target: Target,
    original: FnType,
    installed: Mutex<Option<Installed<FnType>>>,
}

impl<FnType: Copy> Hook<FnType> {
    /// Creates a new hook for the function at `target`, whose stock implementation is
    /// `original`. This does not install anything.
    pub fn new(target: Target, original: FnType) -> Hook<FnType> {
        Hook {
            target,
            original,
            installed: Mutex::new(None),
        }
    }

    /// Replaces the target function's implementation with `replacement`. Returns the entry point
    /// that was patched. The original implementation stays available through `original()`.
    pub fn install(
        &self,
        symbols: &SymbolTable,
        replacement: FnType,
    ) -> Result<u32, ImageError> {
        let address = self.target.resolve(symbols)?;

        let mut installed = self.installed.lock();

        if installed.is_some() {
            log::warn!("replacing existing patch at {}", self.target.name());
        }

        *installed = Some(Installed {
            address,
            replacement,
        });

        log::info!("patched {} at {:#010x}", self.target.name(), address);
        Ok(address)
    }

    /// Removes an installed replacement, restoring the stock implementation.
    pub fn uninstall(&self) {
        if self.installed.lock().take().is_some() {
            log::info!("restored {}", self.target.name());
        }
    }

    /// Returns the entry point the replacement was linked at, if one is installed.
    pub fn address(&self) -> Option<u32> {
        self.installed.lock().as_ref().map(|installed| installed.address)
    }

    pub fn is_installed(&self) -> bool {
        self.installed.lock().is_some()
    }

    /// Returns whichever implementation the call site currently reaches.
    pub fn get(&self) -> FnType {
        self.installed
            .lock()
            .as_ref()
            .map_or(self.original, |installed| installed.replacement)
    }

    /// Returns the stock implementation of the hooked function.
    pub fn original(&self) -> FnType {
        self.original
    }
}

/// Calls through the patch site `$site` of `game.hooks`, reaching the replacement if one is
/// installed.
#[macro_export]
macro_rules! call_hook {
    ($game:expr, $site:ident) => {{
        let function = $game.hooks.$site.get();
        function($game)
    }};
    ($game:expr, $site:ident, $($args:expr),+) => {{
        let function = $game.hooks.$site.get();
        function($game, $($args),+)
    }};
}

/// Calls the stock implementation behind the patch site `$site`, bypassing any replacement.
#[macro_export]
macro_rules! call_original {
    ($game:expr, $site:ident) => {{
        let function = $game.hooks.$site.original();
        function($game)
    }};
    ($game:expr, $site:ident, $($args:expr),+) => {{
        let function = $game.hooks.$site.original();
        function($game, $($args),+)
    }};
}
