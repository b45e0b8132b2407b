use std::collections::HashMap;

use rand::rngs::StdRng;
use rand::SeedableRng;
use uuid::Uuid;

use crate::model::{Mob, Npc, Player};
use crate::session::{Session, SessionId};
use crate::tile_grid::TileGrid;

/// All zone state, mutated only through command handlers or the tick loop
/// while holding the world's write lock.
pub struct World {
    pub tick: u64,
    pub zone_id: String,
    pub grid: TileGrid,
    pub npcs: Vec<Npc>,
    pub mobs: HashMap<String, Mob>,
    pub players: HashMap<Uuid, Player>,
    pub sessions: HashMap<SessionId, Session>,
    pub rng: StdRng,
}

impl World {
    pub fn new(
        zone_id: String,
        grid: TileGrid,
        npcs: Vec<Npc>,
        mobs: HashMap<String, Mob>,
    ) -> Self {
        Self {
            tick: 0,
            zone_id,
            grid,
            npcs,
            mobs,
            players: HashMap::new(),
            sessions: HashMap::new(),
            rng: StdRng::seed_from_u64(0xC0FFEE),
        }
    }

    pub fn players_in_zone(&self) -> impl Iterator<Item = &Player> {
        self.players.values().filter(|p| p.zone_id == self.zone_id)
    }

    pub fn closest_live_player_within(
        &self,
        x: f32,
        y: f32,
        zone_id: &str,
        range: f32,
    ) -> Option<&Player> {
        self.players
            .values()
            .filter(|p| p.zone_id == zone_id && p.hp > 0)
            .map(|p| (p, p.distance_to(x, y)))
            .filter(|(_, dist)| *dist <= range)
            .min_by(|(_, a), (_, b)| a.partial_cmp(b).unwrap())
            .map(|(p, _)| p)
    }
}
