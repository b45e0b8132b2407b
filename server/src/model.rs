use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::tile_grid::TileKind;

/// Static for the process lifetime.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Npc {
    pub id: String,
    pub name: String,
    pub role: String,
    pub x: f32,
    pub y: f32,
    pub zone_id: String,
}

/// Mutable per-tick state for one mob. Only `alive`/`hp`/position/counters
/// change after construction.
#[derive(Debug, Clone)]
pub struct Mob {
    pub id: String,
    pub name: String,
    pub x: f32,
    pub y: f32,
    pub hp: i32,
    pub max_hp: i32,
    pub damage: i32,
    pub patrol_radius: f32,
    pub zone_id: String,
    pub alive: bool,
    pub spawn_x: f32,
    pub spawn_y: f32,
    pub attack_cooldown: u32,
    pub respawn_counter: u32,
    pub wander_dx: f32,
    pub wander_dy: f32,
    pub wander_ticks_remain: u32,
}

impl Mob {
    pub fn distance_to(&self, x: f32, y: f32) -> f32 {
        ((self.x - x).powi(2) + (self.y - y).powi(2)).sqrt()
    }

    pub fn within_patrol(&self, x: f32, y: f32) -> bool {
        ((x - self.spawn_x).powi(2) + (y - self.spawn_y).powi(2)).sqrt() <= self.patrol_radius
    }
}

/// A connected character's live state in the world.
#[derive(Debug, Clone)]
pub struct Player {
    pub id: Uuid,
    pub account_id: Uuid,
    pub name: String,
    pub class: String,
    pub x: f32,
    pub y: f32,
    pub hp: i32,
    pub max_hp: i32,
    pub level: u32,
    pub experience: u64,
    pub gold: u64,
    pub zone_id: String,
}

impl Player {
    pub fn distance_to(&self, x: f32, y: f32) -> f32 {
        ((self.x - x).powi(2) + (self.y - y).powi(2)).sqrt()
    }

    /// `experience >= level * 100` repeatedly: subtract, bump level, grow
    /// max_hp by 20, heal to full. Equivalent whether experience arrives in
    /// one grant or split across many.
    pub fn apply_level_up_loop(&mut self) {
        while self.experience >= self.level as u64 * 100 {
            self.experience -= self.level as u64 * 100;
            self.level += 1;
            self.max_hp += 20;
            self.hp = self.max_hp;
        }
    }

    pub fn to_state(&self) -> PlayerState {
        PlayerState {
            id: self.id,
            name: self.name.clone(),
            x: self.x,
            y: self.y,
            hp: self.hp,
            max_hp: self.max_hp,
            class: self.class.clone(),
            level: self.level,
            experience: self.experience,
            gold: self.gold,
            zone_id: self.zone_id.clone(),
        }
    }
}

impl Mob {
    pub fn to_state(&self) -> MobState {
        MobState {
            id: self.id.clone(),
            name: self.name.clone(),
            x: self.x,
            y: self.y,
            hp: self.hp,
            max_hp: self.max_hp,
            damage: self.damage,
            patrol_radius: self.patrol_radius,
            zone_id: self.zone_id.clone(),
            alive: self.alive,
        }
    }
}

/// Wire snapshot of a player, sent in `welcome`, `player_joined`, and
/// `player_update` frames.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerState {
    pub id: Uuid,
    pub name: String,
    pub x: f32,
    pub y: f32,
    pub hp: i32,
    pub max_hp: i32,
    pub class: String,
    pub level: u32,
    pub experience: u64,
    pub gold: u64,
    pub zone_id: String,
}

/// Wire snapshot of a mob, sent in `welcome` and `mob_update` frames.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MobState {
    pub id: String,
    pub name: String,
    pub x: f32,
    pub y: f32,
    pub hp: i32,
    pub max_hp: i32,
    pub damage: i32,
    pub patrol_radius: f32,
    pub zone_id: String,
    pub alive: bool,
}

/// Wire snapshot of the tile grid, sent as part of `welcome.world.map`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TileMap {
    pub width: usize,
    pub height: usize,
    pub spawn: SpawnPoint,
    pub tiles: Vec<TileKind>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SpawnPoint {
    pub x: f32,
    pub y: f32,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_player() -> Player {
        Player {
            id: Uuid::new_v4(),
            account_id: Uuid::new_v4(),
            name: "Hero".into(),
            class: "warrior".into(),
            x: 1.5,
            y: 1.5,
            hp: 100,
            max_hp: 100,
            level: 1,
            experience: 0,
            gold: 0,
            zone_id: "starter-zone".into(),
        }
    }

    #[test]
    fn level_up_law_matches_single_large_grant_and_split_grants() {
        let mut single = base_player();
        for _ in 0..100 {
            single.experience += 25;
        }
        single.apply_level_up_loop();

        let mut split = base_player();
        for _ in 0..100 {
            split.experience += 25;
            split.apply_level_up_loop();
        }

        assert_eq!(single.level, split.level);
        assert_eq!(single.max_hp, split.max_hp);
        assert_eq!(single.experience, split.experience);
    }

    #[test]
    fn level_up_loop_handles_multiple_levels_from_one_grant() {
        let mut player = base_player();
        player.level = 1;
        player.experience = 250; // one level at 100, still short of level-2's 200
        player.apply_level_up_loop();
        assert_eq!(player.level, 2);
        assert_eq!(player.experience, 50);
        assert_eq!(player.max_hp, 120);
    }
}
