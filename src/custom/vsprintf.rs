//! Points `vsprintf` at the formatting engine with float support, so `%f` and friends print
//! something.

use eyre::Result;

use crate::{
    game::Game,
    printf::{self, Arg, Formatter},
};

pub fn custom_vsprintf(formatter: &Formatter, dst: &mut [u8], fmt: &str, args: &[Arg]) -> i32 {
    printf::sprintf(dst, |prout| formatter.printf(prout, fmt, args))
}

pub fn hook(game: &Game) -> Result<()> {
    game.hooks.vsprintf.install(&game.symbols, custom_vsprintf)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::test_support::game_with_files;

    #[test]
    fn test_floats_are_printed() {
        let mut dst = [0xFF; 32];
        let ret = custom_vsprintf(
            &Formatter::default(),
            &mut dst,
            "%.2f/%g",
            &[Arg::Float(3.14159), Arg::Float(0.5)],
        );

        assert_eq!(ret, 8);
        assert_eq!(&dst[..9], b"3.14/0.5\0");
    }

    #[test]
    fn test_failure_leaves_buffer_unterminated() {
        let mut dst = [0xFF; 4];
        let ret = custom_vsprintf(&Formatter::default(), &mut dst, "%d", &[]);

        assert_eq!(ret, -1);
        assert_eq!(dst, [0xFF; 4]);
    }

    #[test]
    fn test_di_printf_goes_through_redirect() {
        let mut game = game_with_files(&[]);
        crate::custom::diprint::hook(&game).unwrap();
        game.boot().unwrap();

        // The stock engine prints nothing for a float, so nothing is buffered.
        crate::di_printf!(&mut game, "%.1f", 2.3f64);
        assert_eq!(game.debug_print.cursor, 0);

        hook(&game).unwrap();

        crate::di_printf!(&mut game, "%.1f", 2.3f64);
        assert_eq!(game.debug_print.pending().next(), Some(&b"2.3"[..]));
    }
}
