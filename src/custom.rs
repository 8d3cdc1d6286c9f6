//! Replacements for game functions. Each module installs its patches into the matching sites in
//! `Game::hooks`.

pub mod diprint;
pub mod game_tick;
pub mod init;
pub mod splash_skip;
pub mod vsprintf;

use eyre::{Context, Result};

use crate::game::Game;

/// Installs every patch. Fails if any patch site is missing from the game's symbols.
pub fn install(game: &Game) -> Result<()> {
    init::hook(game).wrap_err("failed to patch init")?;
    diprint::hook(game).wrap_err("failed to patch diPrintf")?;
    vsprintf::hook(game).wrap_err("failed to patch vsprintf")?;
    game_tick::hook(game).wrap_err("failed to patch game_tick")?;
    splash_skip::hook(game).wrap_err("failed to patch the splash screen")?;

    log::info!("all patches installed");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::test_support::game_with_files;

    #[test]
    fn test_install_patches_every_site() {
        let game = game_with_files(&[]);
        install(&game).unwrap();

        let hooks = &game.hooks;
        assert!(hooks.init.is_installed());
        assert!(hooks.di_printf_init.is_installed());
        assert!(hooks.di_printf.is_installed());
        assert!(hooks.vsprintf.is_installed());
        assert!(hooks.game_tick.is_installed());
        assert!(hooks.splash_skip_update.is_installed());

        assert_eq!(
            hooks.game_tick.address(),
            game.symbols.get("game_tick").ok()
        );
    }

    #[test]
    fn test_install_fails_without_site() {
        let mut game = game_with_files(&[]);
        game.symbols = crate::game::symbols::SymbolTable::default();

        assert!(install(&game).is_err());
    }
}
