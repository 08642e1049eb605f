use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};

use glam::Vec2;

use crate::types::Action;

pub const SWIPE_THRESHOLD_PX: f32 = 30.0;

pub type SubscriptionId = u64;

type ActionCallback = Box<dyn FnMut(Action)>;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MouseButton {
    Left,
    Middle,
    Right,
}

pub fn default_bindings() -> HashMap<String, Action> {
    [
        ("KeyA", Action::Left),
        ("KeyD", Action::Right),
        ("KeyQ", Action::RollLeft),
        ("KeyE", Action::RollRight),
        ("Space", Action::Boost),
        ("Escape", Action::Pause),
    ]
    .into_iter()
    .map(|(code, action)| (code.to_string(), action))
    .collect()
}

/// Turns raw key, pointer and touch events into discrete actions and a
/// pollable look delta.
///
/// Actions go to every subscriber and are also queued for whoever drains
/// them once per tick.
pub struct InputManager {
    bindings: HashMap<String, Action>,
    pressed: HashSet<String>,
    subscribers: BTreeMap<SubscriptionId, (Action, ActionCallback)>,
    next_subscription: SubscriptionId,
    queue: VecDeque<Action>,
    left_down: bool,
    last_pointer: Vec2,
    mouse_delta: Vec2,
    touch_start: Option<Vec2>,
}

impl Default for InputManager {
    fn default() -> Self {
        Self::new()
    }
}

impl InputManager {
    pub fn new() -> Self {
        Self::with_bindings(default_bindings())
    }

    pub fn with_bindings(bindings: HashMap<String, Action>) -> Self {
        Self {
            bindings,
            pressed: HashSet::new(),
            subscribers: BTreeMap::new(),
            next_subscription: 1,
            queue: VecDeque::new(),
            left_down: false,
            last_pointer: Vec2::ZERO,
            mouse_delta: Vec2::ZERO,
            touch_start: None,
        }
    }

    pub fn on<F>(&mut self, action: Action, callback: F) -> SubscriptionId
    where
        F: FnMut(Action) + 'static,
    {
        let id = self.next_subscription;
        self.next_subscription += 1;
        self.subscribers.insert(id, (action, Box::new(callback)));
        id
    }

    pub fn off(&mut self, id: SubscriptionId) -> bool {
        self.subscribers.remove(&id).is_some()
    }

    pub fn key_down(&mut self, code: &str) {
        self.pressed.insert(code.to_string());
        if let Some(action) = self.bindings.get(code).copied() {
            self.trigger(action);
        }
    }

    pub fn key_up(&mut self, code: &str) {
        self.pressed.remove(code);
    }

    pub fn is_action_pressed(&self, action: Action) -> bool {
        self.bindings
            .iter()
            .any(|(code, bound)| *bound == action && self.pressed.contains(code))
    }

    pub fn mouse_down(&mut self, button: MouseButton, x: f32, y: f32) {
        if button != MouseButton::Left {
            return;
        }
        self.left_down = true;
        self.last_pointer = Vec2::new(x, y);
        self.mouse_delta = Vec2::ZERO;
    }

    pub fn mouse_up(&mut self, button: MouseButton) {
        if button != MouseButton::Left {
            return;
        }
        self.left_down = false;
        self.mouse_delta = Vec2::ZERO;
    }

    /// Movement only counts while the left button is held.
    pub fn mouse_move(&mut self, x: f32, y: f32) {
        if !self.left_down {
            return;
        }
        let pointer = Vec2::new(x, y);
        self.mouse_delta += pointer - self.last_pointer;
        self.last_pointer = pointer;
    }

    pub fn is_left_mouse_down(&self) -> bool {
        self.left_down
    }

    /// Movement since the previous call.
    pub fn take_mouse_delta(&mut self) -> Vec2 {
        std::mem::take(&mut self.mouse_delta)
    }

    pub fn touch_start(&mut self, x: f32, y: f32) {
        self.touch_start = Some(Vec2::new(x, y));
    }

    pub fn touch_end(&mut self, x: f32, y: f32, viewport_width: f32) {
        if let Some(start) = self.touch_start.take() {
            self.handle_swipe(start, Vec2::new(x, y), viewport_width);
        }
    }

    /// Horizontal swipes turn. Vertical swipes roll, mirrored between the
    /// two halves of the screen. Screen y grows downwards.
    pub fn handle_swipe(&mut self, start: Vec2, end: Vec2, viewport_width: f32) -> Option<Action> {
        let action = swipe_action(start, end, viewport_width)?;
        self.trigger(action);
        Some(action)
    }

    /// Raises an action as if its key had been pressed.
    pub fn trigger(&mut self, action: Action) {
        self.queue.push_back(action);
        for (bound, callback) in self.subscribers.values_mut() {
            if *bound == action {
                callback(action);
            }
        }
    }

    pub fn drain_actions(&mut self) -> Vec<Action> {
        self.queue.drain(..).collect()
    }

    pub fn clear(&mut self) {
        self.subscribers.clear();
        self.pressed.clear();
        self.queue.clear();
        self.left_down = false;
        self.mouse_delta = Vec2::ZERO;
        self.touch_start = None;
    }
}

pub fn swipe_action(start: Vec2, end: Vec2, viewport_width: f32) -> Option<Action> {
    let d = end - start;
    if d.x.abs().max(d.y.abs()) < SWIPE_THRESHOLD_PX {
        return None;
    }
    if d.x.abs() > d.y.abs() {
        return Some(if d.x > 0.0 { Action::Right } else { Action::Left });
    }
    let left_half = start.x < viewport_width / 2.0;
    let up = d.y < 0.0;
    Some(match (left_half, up) {
        (true, true) | (false, false) => Action::RollRight,
        (true, false) | (false, true) => Action::RollLeft,
    })
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use glam::Vec2;

    use super::{swipe_action, InputManager, MouseButton};
    use crate::types::Action;

    #[test]
    fn bound_keys_raise_actions_and_track_pressed_state() {
        let mut input = InputManager::new();
        input.key_down("KeyA");
        input.key_down("KeyZ");
        assert!(input.is_action_pressed(Action::Left));
        assert!(!input.is_action_pressed(Action::Right));
        input.key_up("KeyA");
        assert!(!input.is_action_pressed(Action::Left));
        assert_eq!(input.drain_actions(), vec![Action::Left]);
        assert!(input.drain_actions().is_empty());
    }

    #[test]
    fn subscribers_fire_until_unsubscribed() {
        let hits = Rc::new(RefCell::new(Vec::new()));
        let mut input = InputManager::new();
        let sink = Rc::clone(&hits);
        let id = input.on(Action::Boost, move |action| sink.borrow_mut().push(action));

        input.key_down("Space");
        input.key_down("KeyD");
        assert!(input.off(id));
        input.key_down("Space");
        assert!(!input.off(id));

        assert_eq!(*hits.borrow(), vec![Action::Boost]);
    }

    #[test]
    fn mouse_delta_accumulates_only_while_left_held() {
        let mut input = InputManager::new();
        input.mouse_move(50.0, 50.0);
        assert_eq!(input.take_mouse_delta(), Vec2::ZERO);

        input.mouse_down(MouseButton::Right, 0.0, 0.0);
        input.mouse_move(10.0, 10.0);
        assert_eq!(input.take_mouse_delta(), Vec2::ZERO);

        input.mouse_down(MouseButton::Left, 100.0, 100.0);
        input.mouse_move(110.0, 95.0);
        input.mouse_move(115.0, 95.0);
        assert_eq!(input.take_mouse_delta(), Vec2::new(15.0, -5.0));
        assert_eq!(input.take_mouse_delta(), Vec2::ZERO);

        input.mouse_up(MouseButton::Left);
        input.mouse_move(200.0, 200.0);
        assert_eq!(input.take_mouse_delta(), Vec2::ZERO);
    }

    #[test]
    fn swipe_mapping() {
        let w = 800.0;
        let a = |sx: f32, sy: f32, ex: f32, ey: f32| swipe_action(Vec2::new(sx, sy), Vec2::new(ex, ey), w);
        assert_eq!(a(100.0, 100.0, 110.0, 110.0), None);
        assert_eq!(a(100.0, 100.0, 200.0, 120.0), Some(Action::Right));
        assert_eq!(a(300.0, 100.0, 200.0, 120.0), Some(Action::Left));
        assert_eq!(a(100.0, 300.0, 110.0, 200.0), Some(Action::RollRight));
        assert_eq!(a(100.0, 200.0, 110.0, 300.0), Some(Action::RollLeft));
        assert_eq!(a(600.0, 300.0, 610.0, 200.0), Some(Action::RollLeft));
        assert_eq!(a(600.0, 200.0, 610.0, 300.0), Some(Action::RollRight));
    }

    #[test]
    fn touch_end_without_start_is_ignored() {
        let mut input = InputManager::new();
        input.touch_end(0.0, 500.0, 800.0);
        assert!(input.drain_actions().is_empty());

        input.touch_start(400.0, 400.0);
        input.touch_end(300.0, 400.0, 800.0);
        assert_eq!(input.drain_actions(), vec![Action::Left]);
    }
}
