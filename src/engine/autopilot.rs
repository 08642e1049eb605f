use super::*;
use super::utils::{action_towards, local_axes};

impl GameEngine {
    fn is_safe_cell(&self, cell: IVec3) -> bool {
        !self.world.is_out_of_bounds(cell) && !self.snake.segments().contains(&cell)
    }

    /// Input a simple bot would give this frame: follow the first guide while
    /// it is safe, otherwise take the first safe cell ahead, left or right.
    /// `None` means keep going straight.
    pub fn autopilot_action(&self) -> Option<Action> {
        if self.state != SessionState::Playing {
            return None;
        }
        let head = self.snake.head();
        let orientation = self.snake.body().orientation();

        let guided = self
            .guides
            .first()
            .and_then(GuidePath::next_cell)
            .filter(|cell| self.is_safe_cell(*cell));
        if let Some(cell) = guided {
            return action_towards(orientation, cell - head);
        }

        let (forward, left, right, _) = local_axes(orientation);
        [forward, left, right]
            .into_iter()
            .find(|dir| self.is_safe_cell(head + *dir))
            .and_then(|dir| action_towards(orientation, dir))
    }
}

#[cfg(test)]
mod tests {
    use crate::entity::GridEntity;
    use crate::engine::{GameEngine, GameEngineOptions};
    use crate::types::Action;

    #[test]
    fn turns_away_from_the_wall() {
        let options = GameEngineOptions {
            food_count: 0,
            ..GameEngineOptions::default()
        };
        let mut engine = GameEngine::new(options, 3, 0);
        assert_eq!(engine.autopilot_action(), None);

        let mut steps = 0;
        while steps < 45 {
            if engine.tick(1.0 / 60.0).stepped {
                steps += 1;
            }
        }
        assert_eq!(engine.snake().head().z, 50);
        assert_eq!(engine.autopilot_action(), Some(Action::Left));
    }

    #[test]
    fn autopilot_survives_longer_than_a_straight_run() {
        for seed in 0..5 {
            let mut engine = GameEngine::new(GameEngineOptions::default(), seed, seed as usize);
            let mut steps = 0u32;
            for _ in 0..5_000 {
                if let Some(action) = engine.autopilot_action() {
                    engine.handle_action(action);
                }
                let outcome = engine.tick(1.0 / 30.0);
                if outcome.stepped {
                    steps += 1;
                }
                if outcome.game_over.is_some() || steps > 120 {
                    break;
                }
            }
            assert!(steps > 46, "seed {seed}: {steps}");
        }
    }
}
