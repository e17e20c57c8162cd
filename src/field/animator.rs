use crate::clock::{FrameClock, FrameHandle};
use crate::resize::ResizeSubscription;
use crate::surface::DrawSurface;

use super::ParticleField;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Lifecycle {
    Running,
    TornDown,
}

/// Drives a [`ParticleField`] from a frame clock, one tick and one render per frame.
///
/// Exactly one frame is pending while running. Tearing down cancels it and drops
/// the resize subscription; dropping the animator tears it down as well.
pub struct FieldAnimator<C: FrameClock> {
    field: ParticleField,
    clock: C,
    pending: Option<FrameHandle>,
    resize: Option<ResizeSubscription>,
    lifecycle: Lifecycle,
    frames: u64,
}

impl<C: FrameClock> FieldAnimator<C> {
    pub fn new(field: ParticleField, mut clock: C, resize: ResizeSubscription) -> Self {
        let pending = Some(clock.request_frame());
        log::info!("Node field running with {} nodes", field.nodes().len());
        Self {
            field,
            clock,
            pending,
            resize: Some(resize),
            lifecycle: Lifecycle::Running,
            frames: 0,
        }
    }

    /// Runs the frame for `handle`: applies the newest resize, ticks, renders and
    /// asks for the next frame. Handles that are stale, cancelled or arrive after
    /// teardown are ignored and `false` is returned.
    pub fn fire(&mut self, handle: FrameHandle, surface: &mut impl DrawSurface) -> bool {
        if self.lifecycle == Lifecycle::TornDown {
            log::trace!("Frame {} arrived after teardown, ignoring", handle.id());
            return false;
        }
        if self.pending != Some(handle) {
            log::trace!("Frame {} is not the pending frame, ignoring", handle.id());
            return false;
        }
        self.pending = None;

        if let Some(bounds) = self.resize.as_ref().and_then(ResizeSubscription::latest) {
            self.field.resize(bounds);
        }

        self.field.tick();
        self.field.render(surface);
        self.frames += 1;

        self.pending = Some(self.clock.request_frame());
        true
    }

    /// Cancels the pending frame and releases the node population. Safe to repeat.
    pub fn teardown(&mut self) {
        if self.lifecycle == Lifecycle::TornDown {
            return;
        }
        if let Some(handle) = self.pending.take() {
            self.clock.cancel_frame(handle);
        }
        if let Some(subscription) = self.resize.take() {
            subscription.unsubscribe();
        }
        self.field.clear();
        self.lifecycle = Lifecycle::TornDown;
        log::info!("Node field torn down after {} frames", self.frames);
    }

    pub fn is_running(&self) -> bool {
        self.lifecycle == Lifecycle::Running
    }

    pub fn pending_frame(&self) -> Option<FrameHandle> {
        self.pending
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }

    pub fn field(&self) -> &ParticleField {
        &self.field
    }

    pub fn field_mut(&mut self) -> &mut ParticleField {
        &mut self.field
    }
}

impl<C: FrameClock> Drop for FieldAnimator<C> {
    fn drop(&mut self) {
        self.teardown();
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use glam::Vec2;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    use super::*;
    use crate::clock::test_support::ManualClock;
    use crate::field::FieldConfig;
    use crate::resize::ResizeHub;
    use crate::surface::Bounds;
    use crate::surface::test_support::RecordingSurface;

    type SharedClock = Rc<RefCell<ManualClock>>;

    fn animator(hub: &mut ResizeHub) -> (FieldAnimator<SharedClock>, SharedClock) {
        let config = FieldConfig { node_count: 12, ..Default::default() };
        let field = ParticleField::initialize(config, Bounds::new(200.0, 200.0), &mut StdRng::seed_from_u64(42));
        let clock = SharedClock::default();
        (FieldAnimator::new(field, clock.clone(), hub.subscribe()), clock)
    }

    #[test]
    fn test_new_arms_first_frame() {
        let mut hub = ResizeHub::new();
        let (animator, clock) = animator(&mut hub);
        assert!(animator.is_running());
        assert_eq!(animator.pending_frame(), clock.borrow().last_requested());
        assert_eq!(clock.borrow().requested.len(), 1);
    }

    #[test]
    fn test_fire_ticks_renders_and_rearms() {
        let mut hub = ResizeHub::new();
        let (mut animator, clock) = animator(&mut hub);
        let before = animator.field().nodes().to_vec();
        let handle = clock.borrow().last_requested().unwrap();

        let mut surface = RecordingSurface::new(200.0, 200.0);
        assert!(animator.fire(handle, &mut surface));

        assert_eq!(animator.frames(), 1);
        assert_eq!(surface.circles.len(), 12);
        assert_ne!(animator.field().nodes(), before.as_slice());
        let next = clock.borrow().last_requested();
        assert_ne!(next, Some(handle));
        assert_eq!(animator.pending_frame(), next);
    }

    #[test]
    fn test_stale_handle_is_ignored() {
        let mut hub = ResizeHub::new();
        let (mut animator, clock) = animator(&mut hub);
        let first = clock.borrow().last_requested().unwrap();
        let mut surface = RecordingSurface::new(200.0, 200.0);
        assert!(animator.fire(first, &mut surface));

        let mut replay = RecordingSurface::new(200.0, 200.0);
        assert!(!animator.fire(first, &mut replay));
        assert!(replay.circles.is_empty());
        assert_eq!(animator.frames(), 1);
    }

    #[test]
    fn test_resize_applies_before_tick() {
        let mut hub = ResizeHub::new();
        let (mut animator, clock) = animator(&mut hub);
        animator.field_mut().nodes_mut()[0].position = Vec2::new(99.0, 50.0);
        animator.field_mut().nodes_mut()[0].velocity = Vec2::new(5.0, 0.0);

        hub.publish(Bounds::new(300.0, 300.0));
        hub.publish(Bounds::new(100.0, 100.0));

        let handle = clock.borrow().last_requested().unwrap();
        animator.fire(handle, &mut RecordingSurface::new(100.0, 100.0));

        assert_eq!(animator.field().bounds(), Bounds::new(100.0, 100.0));
        let node = animator.field().nodes()[0];
        assert_eq!(node.position.x, 104.0);
        assert_eq!(node.velocity.x, -5.0);
    }

    #[test]
    fn test_teardown_cancels_pending_frame() {
        let mut hub = ResizeHub::new();
        let (mut animator, clock) = animator(&mut hub);
        let pending = animator.pending_frame().unwrap();

        animator.teardown();
        assert!(!animator.is_running());
        assert_eq!(animator.pending_frame(), None);
        assert_eq!(clock.borrow().cancelled, vec![pending]);
        assert!(animator.field().nodes().is_empty());

        // The clock fires anyway: nothing ticks or draws.
        let mut surface = RecordingSurface::new(200.0, 200.0);
        assert!(!animator.fire(pending, &mut surface));
        assert!(surface.fades.is_empty());
        assert_eq!(animator.frames(), 0);
        assert_eq!(clock.borrow().requested.len(), 1);

        animator.teardown();
        assert_eq!(clock.borrow().cancelled.len(), 1);
    }

    #[test]
    fn test_teardown_unsubscribes_from_resizes() {
        let mut hub = ResizeHub::new();
        let (mut animator, _clock) = animator(&mut hub);
        animator.teardown();

        hub.publish(Bounds::new(10.0, 10.0));
        assert_eq!(hub.subscriber_count(), 0);
    }

    #[test]
    fn test_drop_cancels_pending_frame() {
        let mut hub = ResizeHub::new();
        let (animator, clock) = animator(&mut hub);
        let pending = animator.pending_frame().unwrap();
        drop(animator);
        assert_eq!(clock.borrow().cancelled, vec![pending]);
    }
}
