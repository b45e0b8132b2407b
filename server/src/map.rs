//! Parses a static map description into a tile grid, NPC list, and mob
//! spawn table. On any load failure the world falls back to a built-in
//! 50x50 bordered map so the service remains usable.

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::consts::{DEFAULT_MOB_DAMAGE, DEFAULT_MOB_HP, DEFAULT_MOB_PATROL_RADIUS};
use crate::error::MapLoadError;
use crate::model::{Mob, Npc, SpawnPoint, TileMap};
use crate::tile_grid::{TileGrid, TileKind};

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MapDescription {
    pub width: usize,
    pub height: usize,
    pub spawn: SpawnDesc,
    pub rows: Vec<String>,
    #[serde(default)]
    pub npcs: Vec<NpcDesc>,
    #[serde(default)]
    pub mobs: Vec<MobDesc>,
}

#[derive(Debug, Clone, Copy, Deserialize, Serialize)]
pub struct SpawnDesc {
    pub x: f32,
    pub y: f32,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct NpcDesc {
    pub id: String,
    pub name: String,
    pub role: String,
    pub x: f32,
    pub y: f32,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MobDesc {
    pub id: String,
    pub name: String,
    pub x: f32,
    pub y: f32,
    #[serde(default)]
    pub hp: i32,
    #[serde(default)]
    pub damage: i32,
    #[serde(default)]
    pub patrol_radius: f32,
}

/// Output of a successful map load: the tile grid, the NPC list with zone
/// id filled in, and the mob spawn table keyed by mob id.
pub struct LoadedMap {
    pub grid: TileGrid,
    pub npcs: Vec<Npc>,
    pub mobs: HashMap<String, Mob>,
}

/// Parses `desc` into a [`LoadedMap`], filling in `zone_id` on every NPC and
/// mob. Fails with [`MapLoadError`] on dimension mismatch, row width
/// mismatch, or an unknown tile character.
pub fn build_map(desc: &MapDescription, zone_id: &str) -> Result<LoadedMap, MapLoadError> {
    if desc.rows.len() != desc.height {
        return Err(MapLoadError::DimensionMismatch {
            declared_w: desc.width,
            declared_h: desc.height,
            actual: desc.rows.len(),
        });
    }

    let mut tiles = Vec::with_capacity(desc.width * desc.height);
    for (row_idx, row) in desc.rows.iter().enumerate() {
        let chars: Vec<char> = row.chars().collect();
        if chars.len() != desc.width {
            return Err(MapLoadError::RowWidthMismatch {
                row: row_idx,
                expected: desc.width,
                actual: chars.len(),
            });
        }
        for ch in chars {
            let kind = TileKind::from_char(ch).ok_or(MapLoadError::UnknownTile {
                row: row_idx,
                ch,
            })?;
            tiles.push(kind);
        }
    }

    let grid = TileGrid::new(desc.width, desc.height, tiles, (desc.spawn.x, desc.spawn.y));

    let npcs = desc
        .npcs
        .iter()
        .map(|n| Npc {
            id: n.id.clone(),
            name: n.name.clone(),
            role: n.role.clone(),
            x: n.x,
            y: n.y,
            zone_id: zone_id.to_string(),
        })
        .collect();

    let mobs = desc
        .mobs
        .iter()
        .map(|m| {
            let hp = if m.hp > 0 { m.hp } else { DEFAULT_MOB_HP };
            let damage = if m.damage > 0 {
                m.damage
            } else {
                DEFAULT_MOB_DAMAGE
            };
            let patrol_radius = if m.patrol_radius > 0.0 {
                m.patrol_radius
            } else {
                DEFAULT_MOB_PATROL_RADIUS
            };
            (
                m.id.clone(),
                Mob {
                    id: m.id.clone(),
                    name: m.name.clone(),
                    x: m.x,
                    y: m.y,
                    hp,
                    max_hp: hp,
                    damage,
                    patrol_radius,
                    zone_id: zone_id.to_string(),
                    alive: true,
                    spawn_x: m.x,
                    spawn_y: m.y,
                    attack_cooldown: 0,
                    respawn_counter: 0,
                    wander_dx: 0.0,
                    wander_dy: 0.0,
                    wander_ticks_remain: 0,
                },
            )
        })
        .collect();

    Ok(LoadedMap { grid, npcs, mobs })
}

/// The wire-format snapshot of `grid`, sent as part of `welcome.world.map`.
pub fn to_wire_tile_map(grid: &TileGrid) -> TileMap {
    TileMap {
        width: grid.width(),
        height: grid.height(),
        spawn: SpawnPoint {
            x: grid.spawn.0,
            y: grid.spawn.1,
        },
        tiles: grid.tiles().to_vec(),
    }
}

/// Reads and parses the map file at `path`. IO and parse failures are
/// distinct [`MapLoadError`] variants so the caller can log the precise
/// cause before falling back.
pub fn load_map_file(path: &Path) -> Result<MapDescription, MapLoadError> {
    let text = std::fs::read_to_string(path).map_err(|e| MapLoadError::Io {
        path: path.display().to_string(),
        source: e,
    })?;
    serde_json::from_str(&text).map_err(|e| MapLoadError::Parse {
        path: path.display().to_string(),
        source: e,
    })
}

/// The deterministic 50x50 map walled at the border, with a single merchant
/// NPC at (5,5) and a single slime mob at (14,12), used whenever loading the
/// configured map fails for any reason.
pub fn fallback_map(zone_id: &str) -> LoadedMap {
    const SIZE: usize = 50;
    let mut rows = Vec::with_capacity(SIZE);
    for y in 0..SIZE {
        let mut row = String::with_capacity(SIZE);
        for x in 0..SIZE {
            if x == 0 || y == 0 || x == SIZE - 1 || y == SIZE - 1 {
                row.push('#');
            } else {
                row.push('.');
            }
        }
        rows.push(row);
    }

    let desc = MapDescription {
        width: SIZE,
        height: SIZE,
        spawn: SpawnDesc { x: 2.5, y: 2.5 },
        rows,
        npcs: vec![NpcDesc {
            id: "merchant-1".to_string(),
            name: "Merchant".to_string(),
            role: "merchant".to_string(),
            x: 5.0,
            y: 5.0,
        }],
        mobs: vec![MobDesc {
            id: "slime-1".to_string(),
            name: "Slime".to_string(),
            x: 14.0,
            y: 12.0,
            hp: 0,
            damage: 0,
            patrol_radius: 0.0,
        }],
    };

    build_map(&desc, zone_id).expect("fallback map is statically valid")
}

/// Loads the map at `path`, falling back to the deterministic built-in map
/// on any failure. The failure, if any, is returned alongside the result so
/// the caller can log it.
pub fn load_or_fallback(path: &Path, zone_id: &str) -> (LoadedMap, Option<MapLoadError>) {
    match load_map_file(path).and_then(|desc| build_map(&desc, zone_id)) {
        Ok(loaded) => (loaded, None),
        Err(e) => (fallback_map(zone_id), Some(e)),
    }
}
