//! Frame synchronization between the host's animation ticks and capture.
//!
//! A capture must only read pixels after the state changes it depends on have
//! been presented. [`FrameSynchronizer::wait_for_frames`] suspends the caller
//! until the requested number of ticks have each rendered a frame.

use crate::render::RenderSurface;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

/// Source of animation ticks (the host's `requestAnimationFrame`).
pub trait AnimationScheduler {
    /// Resolve on the next animation tick.
    fn next_frame(&self) -> Pin<Box<dyn Future<Output = ()> + '_>>;
}

/// Scheduler for headless use: every tick is one cooperative yield.
#[derive(Debug, Default, Clone, Copy)]
pub struct ImmediateScheduler;

impl AnimationScheduler for ImmediateScheduler {
    fn next_frame(&self) -> Pin<Box<dyn Future<Output = ()> + '_>> {
        Box::pin(YieldOnce { yielded: false })
    }
}

/// Returns `Pending` once, then `Ready`.
struct YieldOnce {
    yielded: bool,
}

impl Future for YieldOnce {
    type Output = ();

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
        if self.yielded {
            Poll::Ready(())
        } else {
            self.yielded = true;
            cx.waker().wake_by_ref();
            Poll::Pending
        }
    }
}

/// Counts presented frames and drives rendering on each tick.
pub struct FrameSynchronizer {
    scheduler: Box<dyn AnimationScheduler>,
    frames_presented: u64,
}

impl FrameSynchronizer {
    pub fn new(scheduler: Box<dyn AnimationScheduler>) -> Self {
        Self {
            scheduler,
            frames_presented: 0,
        }
    }

    /// Render on each of the next `count` ticks (at least one), resolving
    /// after the last.
    pub async fn wait_for_frames(&mut self, surface: &mut RenderSurface, count: u32) {
        let mut remaining = count.max(1);
        while remaining > 0 {
            self.scheduler.next_frame().await;
            surface.render();
            self.frames_presented += 1;
            remaining -= 1;
        }
        tracing::trace!("Presented {} frames in total", self.frames_presented);
    }

    pub fn frames_presented(&self) -> u64 {
        self.frames_presented
    }
}

impl Default for FrameSynchronizer {
    fn default() -> Self {
        Self::new(Box::new(ImmediateScheduler))
    }
}

impl std::fmt::Debug for FrameSynchronizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameSynchronizer")
            .field("frames_presented", &self.frames_presented)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::SurfaceOptions;
    use std::cell::Cell;
    use std::rc::Rc;

    /// Counts ticks handed out.
    struct CountingScheduler(Rc<Cell<u32>>);

    impl AnimationScheduler for CountingScheduler {
        fn next_frame(&self) -> Pin<Box<dyn Future<Output = ()> + '_>> {
            self.0.set(self.0.get() + 1);
            Box::pin(std::future::ready(()))
        }
    }

    #[test]
    fn test_waits_requested_frames() {
        let ticks = Rc::new(Cell::new(0));
        let mut sync = FrameSynchronizer::new(Box::new(CountingScheduler(ticks.clone())));
        let mut surface = RenderSurface::new(4, 4, 1.0, SurfaceOptions::default());

        pollster::block_on(sync.wait_for_frames(&mut surface, 3));
        assert_eq!(ticks.get(), 3);
        assert_eq!(sync.frames_presented(), 3);
        assert_eq!(surface.frames_rendered(), 3);
    }

    #[test]
    fn test_zero_waits_one_frame() {
        let mut sync = FrameSynchronizer::default();
        let mut surface = RenderSurface::new(4, 4, 1.0, SurfaceOptions::default());
        pollster::block_on(sync.wait_for_frames(&mut surface, 0));
        assert_eq!(sync.frames_presented(), 1);
    }

    #[test]
    fn test_immediate_scheduler_suspends() {
        let mut sync = FrameSynchronizer::default();
        let mut surface = RenderSurface::new(4, 4, 1.0, SurfaceOptions::default());
        let mut wait = Box::pin(sync.wait_for_frames(&mut surface, 2));

        struct Noop;
        impl std::task::Wake for Noop {
            fn wake(self: std::sync::Arc<Self>) {}
        }
        let waker = std::task::Waker::from(std::sync::Arc::new(Noop));
        let mut cx = Context::from_waker(&waker);
        assert!(wait.as_mut().poll(&mut cx).is_pending());
        assert!(wait.as_mut().poll(&mut cx).is_pending());
        assert!(wait.as_mut().poll(&mut cx).is_ready());
    }
}
