use super::*;

impl GameEngine {
    pub(super) fn try_player_pickup(&mut self, outcome: &mut TickOutcome) {
        let head = self.snake.head();
        let Some(index) = self.world.check_food_collision(head) else {
            return;
        };
        let Some(category) = self.world.food(index).map(|food| food.category) else {
            return;
        };
        self.apply_food(category);
        let occupied = self.occupied_cells();
        self.world.respawn_food(occupied, Some(index));

        let orientation = self.snake.body().orientation();
        self.emit_pickup(head, orientation, category);
        self.sound.play_pick();
        outcome.events.push(GameEvent::FoodEaten { index, category });
    }

    /// Phantoms eat from the same food field as the player.
    pub(super) fn try_phantom_pickup(&mut self, phantom: usize, outcome: &mut TickOutcome) {
        let Some(ghost) = self.phantoms.get(phantom) else {
            return;
        };
        let head = ghost.head();
        let orientation = ghost.body().orientation();
        let Some(index) = self.world.check_food_collision(head) else {
            return;
        };
        let Some(category) = self.world.food(index).map(|food| food.category) else {
            return;
        };
        if let Some(ghost) = self.phantoms.get_mut(phantom) {
            ghost.grow();
            ghost.apply_food_effect(get_food_speed_delta(category));
            ghost.add_score(get_food_score(category));
        }
        let occupied = self.occupied_cells();
        self.world.respawn_food(occupied, Some(index));
        self.emit_pickup(head, orientation, category);
        outcome.events.push(GameEvent::PhantomAte { phantom, category });
    }
}
