//! Restores the debug print routines that release builds of the game stub out.

use eyre::Result;

use crate::{
    game::{print::BUFFER_LIMIT, Game},
    printf::Arg,
};

/// Resets the overlay and empties the print buffer. Unlike the stock routine, this leaves the
/// glyph scale alone on high resolution framebuffers, where doubling makes the text far too big.
pub fn custom_di_printf_init(game: &mut Game) {
    let print = &mut game.debug_print;

    print.origin_x = 0;
    print.origin_y = 0;

    for (id, texture) in print.textures.iter_mut().enumerate() {
        *texture = Some(game.textures.queue_load_texture_proxy(id as u16));
    }

    print.cursor = 0;
}

/// Formats a string onto the end of the print buffer. Returns -1 if the buffer is full, or 0
/// otherwise.
pub fn custom_di_printf(game: &mut Game, fmt: &str, args: &[Arg]) -> i32 {
    let cursor = game.debug_print.cursor;

    if cursor > BUFFER_LIMIT {
        log::trace!("print buffer full, dropping {fmt:?}");
        return -1;
    }

    let vsprintf = game.hooks.vsprintf.get();

    game.formatter.set_spacing_codes(true);
    let written = vsprintf(
        &game.formatter,
        &mut game.debug_print.buffer[cursor..],
        fmt,
        args,
    );
    game.formatter.set_spacing_codes(false);

    if written > 0 {
        game.debug_print.cursor += written as usize + 1;
    }

    0
}

pub fn hook(game: &Game) -> Result<()> {
    game.hooks
        .di_printf_init
        .install(&game.symbols, custom_di_printf_init)?;

    game.hooks.di_printf.install(&game.symbols, custom_di_printf)?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::{print::BUFFER_SIZE, test_support::game_with_files, Resolution};

    fn game() -> Game {
        let mut game = game_with_files(&[]);
        game.boot().unwrap();
        game
    }

    #[test]
    fn test_print_advances_past_terminator() {
        let mut game = game();

        assert_eq!(custom_di_printf(&mut game, "hp %d", &[Arg::Int(12)]), 0);
        assert_eq!(game.debug_print.cursor, 6);
        assert_eq!(&game.debug_print.buffer[..6], b"hp 12\0");

        assert_eq!(custom_di_printf(&mut game, "%s", &["ok".into()]), 0);
        assert_eq!(game.debug_print.cursor, 9);

        let pending: Vec<_> = game.debug_print.pending().collect();
        assert_eq!(pending, [&b"hp 12"[..], &b"ok"[..]]);
    }

    #[test]
    fn test_empty_print_keeps_cursor() {
        let mut game = game();

        assert_eq!(custom_di_printf(&mut game, "", &[]), 0);
        assert_eq!(game.debug_print.cursor, 0);
    }

    #[test]
    fn test_padding_uses_spacing_codes() {
        let mut game = game();

        custom_di_printf(&mut game, "%3d", &[Arg::Int(1)]);

        assert_eq!(&game.debug_print.buffer[..4], [0x81, 2, b'1', 0]);
        assert!(!game.formatter.spacing_codes());
    }

    #[test]
    fn test_prints_dropped_past_limit() {
        let mut game = game();
        game.debug_print.cursor = BUFFER_LIMIT + 1;

        let before = game.debug_print.buffer.clone();

        assert_eq!(custom_di_printf(&mut game, "dropped", &[]), -1);
        assert_eq!(game.debug_print.cursor, BUFFER_LIMIT + 1);
        assert_eq!(game.debug_print.buffer, before);

        custom_di_printf_init(&mut game);
        assert_eq!(game.debug_print.cursor, 0);
        assert_eq!(custom_di_printf(&mut game, "kept", &[]), 0);
        assert_eq!(game.debug_print.cursor, 5);
    }

    #[test]
    fn test_print_at_limit_is_accepted() {
        let mut game = game();
        game.debug_print.cursor = BUFFER_LIMIT;

        assert_eq!(custom_di_printf(&mut game, "%s", &["last".into()]), 0);
        assert_eq!(game.debug_print.cursor, BUFFER_LIMIT + 5);
    }

    #[test]
    fn test_fills_buffer_then_drops() {
        let mut game = game();
        let line = "0123456789abcdef";

        let mut accepted = 0;
        while custom_di_printf(&mut game, line, &[]) == 0 {
            accepted += 1;
        }

        // Each print takes 17 bytes; the first one to start past the limit is refused.
        assert_eq!(accepted, BUFFER_LIMIT / 17 + 1);
        assert!(game.debug_print.cursor > BUFFER_LIMIT);
        assert!(game.debug_print.cursor <= BUFFER_SIZE);
    }

    #[test]
    fn test_init_keeps_scale() {
        let mut game = game_with_files(&[]);
        game.framebuffer = Resolution {
            width: 640,
            height: 480,
        };

        hook(&game).unwrap();
        game.boot().unwrap();

        assert!(!game.debug_print.scale_x);
        assert!(!game.debug_print.scale_y);
        assert_eq!(game.debug_print.origin_x, 0);
        assert!(game.debug_print.textures.iter().all(Option::is_some));
        assert_eq!(game.textures.queued(), [0, 1, 2]);
    }
}
