//! Patches for the recompiled game, and the tools that prepare its ROM.
//!
//! The game is modelled by [`game::Game`]. Functions the patches replace are reached through the
//! patch sites in [`game::Hooks`], and [`custom::install`] points every site at its replacement.

pub mod custom;
pub mod elf;
pub mod fs;
pub mod game;
pub mod hook;
pub mod logging;
pub mod printf;
pub mod settings;
pub mod tools;

/// Prints to the debug overlay through the `diPrintf` patch site.
///
/// ```ignore
/// di_printf!(game, "x %d y %d", x, y);
/// ```
#[macro_export]
macro_rules! di_printf {
    ($game:expr, $fmt:expr $(, $arg:expr)* $(,)?) => {{
        let args: &[$crate::printf::Arg] = &[$($crate::printf::Arg::from($arg)),*];
        $crate::call_hook!($game, di_printf, $fmt, args)
    }};
}
