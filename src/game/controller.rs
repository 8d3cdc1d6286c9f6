//! Controller button state.

pub const A_BUTTON: u16 = 0x8000;
pub const START_BUTTON: u16 = 0x1000;

pub const MAX_PORTS: usize = 4;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
struct PortState {
    held: u16,
    pressed: u16,
}

#[derive(Debug, Default, Clone)]
pub struct Controller {
    ports: [PortState; MAX_PORTS],
}

impl Controller {
    /// Latches the buttons held on `port` this frame. Buttons that were not held on the previous
    /// frame count as presses.
    pub fn update(&mut self, port: usize, held: u16) {
        if let Some(state) = self.ports.get_mut(port) {
            state.pressed = held & !state.held;
            state.held = held;
        }
    }

    /// Buttons newly pressed on `port` this frame.
    pub fn button_presses(&self, port: usize) -> u16 {
        self.ports.get(port).map_or(0, |state| state.pressed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_press_is_edge_triggered() {
        let mut controller = Controller::default();

        controller.update(0, A_BUTTON);
        assert_eq!(controller.button_presses(0), A_BUTTON);

        controller.update(0, A_BUTTON | START_BUTTON);
        assert_eq!(controller.button_presses(0), START_BUTTON);

        controller.update(0, 0);
        assert_eq!(controller.button_presses(0), 0);

        controller.update(0, A_BUTTON);
        assert_eq!(controller.button_presses(0), A_BUTTON);
    }

    #[test]
    fn test_unknown_port() {
        let mut controller = Controller::default();
        controller.update(7, A_BUTTON);

        assert_eq!(controller.button_presses(7), 0);
    }
}
