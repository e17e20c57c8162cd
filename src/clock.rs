// src/clock.rs
//! Frame scheduling.
//!
//! A [`FrameClock`] hands out one [`FrameHandle`] per "call me before the next
//! repaint" request. Whoever owns the clock must cancel the handle it holds before
//! letting go, otherwise a redraw can still reach a torn-down animator.
use std::cell::Cell;
use std::rc::Rc;
use std::sync::Arc;

use winit::window::Window;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FrameHandle(u64);

impl FrameHandle {
    /// For clock implementations; ids only need to be unique per clock.
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn id(&self) -> u64 {
        self.0
    }
}

pub trait FrameClock {
    fn request_frame(&mut self) -> FrameHandle;

    fn cancel_frame(&mut self, handle: FrameHandle);
}

/// Clock backed by `Window::request_redraw` (`requestAnimationFrame` on the web).
///
/// Winit cannot withdraw a redraw request, so the armed handle lives in a cell
/// shared with a [`FrameTrigger`]. Cancelling disarms it; the redraw still arrives
/// but the trigger reports that nothing fired.
pub struct RedrawClock {
    window: Arc<Window>,
    next_id: u64,
    armed: Rc<Cell<Option<FrameHandle>>>,
}

/// Host side of a [`RedrawClock`]: asked on every redraw which frame, if any, fired.
#[derive(Clone)]
pub struct FrameTrigger {
    armed: Rc<Cell<Option<FrameHandle>>>,
}

impl RedrawClock {
    pub fn new(window: Arc<Window>) -> (Self, FrameTrigger) {
        let armed = Rc::new(Cell::new(None));
        let clock = Self { window, next_id: 0, armed: armed.clone() };
        (clock, FrameTrigger { armed })
    }
}

impl FrameClock for RedrawClock {
    fn request_frame(&mut self) -> FrameHandle {
        self.next_id += 1;
        let handle = FrameHandle(self.next_id);
        self.armed.set(Some(handle));
        self.window.request_redraw();
        handle
    }

    fn cancel_frame(&mut self, handle: FrameHandle) {
        if self.armed.get() == Some(handle) {
            self.armed.set(None);
        }
    }
}

impl FrameTrigger {
    /// Takes the armed handle. Returns `None` for redraws nobody asked for.
    pub fn take(&self) -> Option<FrameHandle> {
        self.armed.take()
    }

    #[cfg(test)]
    pub(crate) fn is_armed(&self) -> bool {
        self.armed.get().is_some()
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;

    /// Clock driven by hand; remembers what was requested and cancelled.
    #[derive(Debug, Default)]
    pub struct ManualClock {
        next_id: u64,
        pub requested: Vec<FrameHandle>,
        pub cancelled: Vec<FrameHandle>,
    }

    impl ManualClock {
        /// The most recent request, which a real clock would fire next.
        pub fn last_requested(&self) -> Option<FrameHandle> {
            self.requested.last().copied()
        }
    }

    impl FrameClock for ManualClock {
        fn request_frame(&mut self) -> FrameHandle {
            self.next_id += 1;
            let handle = FrameHandle(self.next_id);
            self.requested.push(handle);
            handle
        }

        fn cancel_frame(&mut self, handle: FrameHandle) {
            self.cancelled.push(handle);
        }
    }

    // Lets a test keep inspecting the clock after handing it to an animator.
    impl FrameClock for Rc<std::cell::RefCell<ManualClock>> {
        fn request_frame(&mut self) -> FrameHandle {
            self.borrow_mut().request_frame()
        }

        fn cancel_frame(&mut self, handle: FrameHandle) {
            self.borrow_mut().cancel_frame(handle)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::ManualClock;
    use super::*;

    #[test]
    fn test_manual_clock_hands_out_distinct_handles() {
        let mut clock = ManualClock::default();
        let first = clock.request_frame();
        let second = clock.request_frame();
        assert_ne!(first, second);
        assert_eq!(clock.last_requested(), Some(second));

        clock.cancel_frame(second);
        assert_eq!(clock.cancelled, vec![second]);
    }

    #[test]
    fn test_trigger_take_disarms() {
        let armed = Rc::new(Cell::new(Some(FrameHandle(3))));
        let trigger = FrameTrigger { armed };
        assert!(trigger.is_armed());
        assert_eq!(trigger.take(), Some(FrameHandle(3)));
        assert_eq!(trigger.take(), None);
    }
}
