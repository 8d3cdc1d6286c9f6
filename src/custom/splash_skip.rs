//! Lets the A button skip the splash screen.

use eyre::Result;

use crate::{
    di_printf,
    game::{
        controller::A_BUTTON,
        fade::FadeColor,
        Game, SPLASH_DURATION,
    },
};

/// Timer value up to which the background hasn't been faded in yet.
const BACKGROUND_SHOWN_AT: f32 = 240.0;

const FADE_DURATION: u16 = 30;

pub fn splash_skip_update(game: &mut Game) {
    if game.options.debug {
        let splash = game.splash;

        di_printf!(
            game,
            "splash locked %d timer %.2f phase %d",
            splash.locked,
            splash.timer,
            splash.phase
        );
    }

    if game.splash.locked == 1 {
        return;
    }

    if game.controller.button_presses(0) & A_BUTTON == 0 {
        return;
    }

    if game.splash.timer <= BACKGROUND_SHOWN_AT {
        game.screen_fade
            .fade_reversed(FADE_DURATION, FadeColor::Black);
    }

    // Leave one frame for the background to render before the next menu takes over.
    game.splash.timer = SPLASH_DURATION - game.delay - 0.01;
    game.splash.phase = 2;

    log::info!("splash skipped");
}

pub fn hook(game: &Game) -> Result<()> {
    game.hooks
        .splash_skip_update
        .install(&game.symbols, splash_skip_update)?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use std::{cell::RefCell, rc::Rc};

    use super::*;
    use crate::{
        game::{fade::ScreenFade, test_support::rom_with_files, SplashState},
        settings::Options,
    };

    #[derive(Default)]
    struct RecordingFade {
        calls: Rc<RefCell<Vec<(u16, FadeColor)>>>,
    }

    impl ScreenFade for RecordingFade {
        fn fade_reversed(&mut self, duration: u16, color: FadeColor) {
            self.calls.borrow_mut().push((duration, color));
        }
    }

    fn game(debug: bool) -> (Game, Rc<RefCell<Vec<(u16, FadeColor)>>>) {
        let (rom, symbols) = rom_with_files(&[]);
        let fade = RecordingFade::default();
        let calls = fade.calls.clone();

        let options = Options {
            debug,
            ..Options::default()
        };

        let game = Game::with_screen_fade(rom, symbols, options, Box::new(fade));
        (game, calls)
    }

    fn press_a(game: &mut Game) {
        game.controller.update(0, 0);
        game.controller.update(0, A_BUTTON);
    }

    #[test]
    fn test_locked_splash_ignores_input() {
        for timer in [0.0, 240.0, 500.0] {
            let (mut game, calls) = game(false);
            game.splash = SplashState {
                locked: 1,
                timer,
                ..SplashState::default()
            };

            let before = game.splash;
            press_a(&mut game);
            splash_skip_update(&mut game);

            assert_eq!(game.splash, before);
            assert!(calls.borrow().is_empty());
        }
    }

    #[test]
    fn test_skip_before_background_fades_in() {
        let (mut game, calls) = game(false);
        game.splash.timer = 240.0;
        game.delay = 2.0;

        press_a(&mut game);
        splash_skip_update(&mut game);

        assert_eq!(*calls.borrow(), [(30, FadeColor::Black)]);
        assert_eq!(game.splash.timer, 720.0 - 2.0 - 0.01);
        assert_eq!(game.splash.phase, 2);
    }

    #[test]
    fn test_skip_after_background_does_not_fade() {
        let (mut game, calls) = game(false);
        game.splash.timer = 300.0;

        press_a(&mut game);
        splash_skip_update(&mut game);

        assert!(calls.borrow().is_empty());
        assert_eq!(game.splash.timer, 720.0 - 1.0 - 0.01);
        assert_eq!(game.splash.phase, 2);
    }

    #[test]
    fn test_held_button_is_not_a_press() {
        let (mut game, calls) = game(false);

        game.controller.update(0, A_BUTTON);
        game.controller.update(0, A_BUTTON);
        splash_skip_update(&mut game);

        assert!(calls.borrow().is_empty());
        assert_eq!(game.splash, SplashState::default());
    }

    #[test]
    fn test_debug_variant_traces_state() {
        let (mut game, calls) = game(true);
        crate::custom::install(&game).unwrap();
        game.boot().unwrap();

        game.splash.timer = 12.5;
        press_a(&mut game);
        splash_skip_update(&mut game);

        assert_eq!(
            game.debug_print.pending().next(),
            Some(&b"splash locked 0 timer 12.50 phase 0"[..])
        );
        assert_eq!(calls.borrow().len(), 1);
        assert_eq!(game.splash.phase, 2);
    }

    #[test]
    fn test_skip_ends_splash_next_frame() {
        let (mut game, _) = game(false);
        crate::custom::install(&game).unwrap();
        game.boot().unwrap();

        game.frame(0);
        game.frame(A_BUTTON);

        // The skip leaves the timer just short of the end, so the frame it happens on still
        // renders the splash.
        assert!(game.splash.active);

        game.frame(A_BUTTON);
        assert!(!game.splash.active);
    }
}
