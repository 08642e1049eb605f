use std::collections::BTreeMap;

use crate::constants::MAX_FRAME_DELTA;

pub type CallbackId = u64;

type FrameCallback = Box<dyn FnMut(f32)>;

/// Fans one clamped delta out to every registered callback per frame. The
/// host supplies timestamps, so nothing here reads a clock.
pub struct FrameLoop {
    callbacks: BTreeMap<CallbackId, FrameCallback>,
    next_id: CallbackId,
    running: bool,
    last_time: f64,
}

impl Default for FrameLoop {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameLoop {
    pub fn new() -> Self {
        Self {
            callbacks: BTreeMap::new(),
            next_id: 1,
            running: false,
            last_time: 0.0,
        }
    }

    /// Starting re-bases the clock, so time spent stopped never arrives as a
    /// delta.
    pub fn start(&mut self, now_seconds: f64) {
        if self.running {
            return;
        }
        self.running = true;
        self.last_time = now_seconds;
    }

    pub fn stop(&mut self) {
        self.running = false;
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn add<F>(&mut self, callback: F) -> CallbackId
    where
        F: FnMut(f32) + 'static,
    {
        let id = self.next_id;
        self.next_id += 1;
        self.callbacks.insert(id, Box::new(callback));
        id
    }

    pub fn remove(&mut self, id: CallbackId) -> bool {
        self.callbacks.remove(&id).is_some()
    }

    pub fn len(&self) -> usize {
        self.callbacks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.callbacks.is_empty()
    }

    /// Dispatches one frame and returns the delta handed out, or `None` while
    /// stopped.
    pub fn frame(&mut self, now_seconds: f64) -> Option<f32> {
        if !self.running {
            return None;
        }
        let delta = clamp_delta((now_seconds - self.last_time) as f32);
        self.last_time = now_seconds;
        for callback in self.callbacks.values_mut() {
            callback(delta);
        }
        Some(delta)
    }
}

pub fn clamp_delta(delta: f32) -> f32 {
    delta.clamp(0.0, MAX_FRAME_DELTA)
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use super::FrameLoop;

    #[test]
    fn long_frames_are_clamped() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let mut frames = FrameLoop::new();
        let sink = Rc::clone(&seen);
        frames.add(move |delta| sink.borrow_mut().push(delta));

        frames.start(10.0);
        frames.frame(10.016);
        frames.frame(12.0);
        assert_eq!(seen.borrow().len(), 2);
        assert!((seen.borrow()[0] - 0.016).abs() < 1e-4);
        assert_eq!(seen.borrow()[1], 0.1);
    }

    #[test]
    fn stopped_loop_dispatches_nothing_and_restart_rebases() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let mut frames = FrameLoop::new();
        let sink = Rc::clone(&seen);
        frames.add(move |delta| sink.borrow_mut().push(delta));

        assert_eq!(frames.frame(1.0), None);
        frames.start(1.0);
        frames.stop();
        assert_eq!(frames.frame(5.0), None);
        frames.start(100.0);
        assert!((frames.frame(100.05).unwrap_or_default() - 0.05).abs() < 1e-4);
        assert_eq!(seen.borrow().len(), 1);
    }

    #[test]
    fn removed_callbacks_stop_receiving() {
        let count = Rc::new(RefCell::new(0));
        let mut frames = FrameLoop::new();
        let sink = Rc::clone(&count);
        let id = frames.add(move |_| *sink.borrow_mut() += 1);
        frames.start(0.0);
        frames.frame(0.01);
        assert!(frames.remove(id));
        frames.frame(0.02);
        assert_eq!(*count.borrow(), 1);
        assert!(frames.is_empty());
    }
}
