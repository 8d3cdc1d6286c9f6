use eyre::Result;

use crate::{
    di_printf,
    game::{print::di_printf_all, Game},
};

/// Prints the debug instrumentation for this frame, then does the flush that the patch
/// overwrote.
pub fn custom_game_tick(game: &mut Game) {
    if game.options.debug {
        di_printf!(game, "hello precomp!");

        if game.options.heap_stats {
            let stats = game.heap.stats().to_string();
            di_printf!(game, "heap: %s", &stats);
        }
    }

    di_printf_all(&mut game.debug_print, &mut game.gfx);
}

pub fn hook(game: &Game) -> Result<()> {
    game.hooks.game_tick.install(&game.symbols, custom_game_tick)?;
    Ok(())
}
