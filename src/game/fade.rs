//! The screen fade object (DLL 28).

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FadeColor {
    Black,
    White,
}

/// Whatever screen fade implementation the game currently has loaded.
pub trait ScreenFade {
    /// Starts fading the screen back in from `color` over `duration` frames.
    fn fade_reversed(&mut self, duration: u16, color: FadeColor);

    /// Advances the fade by one frame.
    fn update(&mut self) {}
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct ActiveFade {
    color: FadeColor,
    duration: u16,
    elapsed: u16,
}

/// The game's stock screen fade.
#[derive(Debug, Default)]
pub struct Fader {
    active: Option<ActiveFade>,
}

#[cfg(test)]
impl Fader {
    pub fn is_fading(&self) -> bool {
        self.active.is_some()
    }

    /// Opacity of the fade colour, from 1.0 (fully covered) to 0.0.
    pub fn opacity(&self) -> f32 {
        match self.active {
            Some(fade) if fade.duration > 0 => {
                1.0 - f32::from(fade.elapsed) / f32::from(fade.duration)
            }
            _ => 0.0,
        }
    }

    pub fn color(&self) -> Option<FadeColor> {
        self.active.map(|fade| fade.color)
    }
}

impl ScreenFade for Fader {
    fn fade_reversed(&mut self, duration: u16, color: FadeColor) {
        log::debug!("fading in from {color:?} over {duration} frames");

        self.active = Some(ActiveFade {
            color,
            duration,
            elapsed: 0,
        });
    }

    fn update(&mut self) {
        if let Some(fade) = self.active.as_mut() {
            fade.elapsed += 1;

            if fade.elapsed >= fade.duration {
                self.active = None;
            }
        }
    }
}
