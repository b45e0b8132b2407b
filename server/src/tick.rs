//! The tick loop is the sole driver of time: mob AI, respawn timers, and
//! the composition of one `mob_update` frame per tick. `run_tick` is the
//! pure step function; the `net` module drives it on an interval and owns
//! the broadcast after the write lock is released.

use std::f32::consts::TAU;

use rand::Rng;
use uuid::Uuid;

use crate::consts::{
    MOB_AGGRO_RANGE, MOB_ATTACK_COOLDOWN_TICKS, MOB_ATTACK_RANGE, MOB_MOVE_SPEED,
    MOB_WANDER_BASE_TICKS, MOB_WANDER_MAX_EXTRA_TICKS, MOB_WANDER_SPEED_FACTOR,
    PLAYER_COLLISION_RADIUS,
};
use crate::protocol::ServerMessage;
use crate::world::World;

/// Events produced by one tick, already in emission order, plus the
/// trailing `mob_update` frame composed last.
pub struct TickOutcome {
    pub events: Vec<ServerMessage>,
    pub mob_update: ServerMessage,
}

pub fn run_tick(world: &mut World) -> TickOutcome {
    world.tick += 1;
    let zone_id = world.zone_id.clone();
    let mut events = Vec::new();

    let mob_ids: Vec<String> = world.mobs.keys().cloned().collect();
    for mob_id in mob_ids {
        step_mob(world, &mob_id, &zone_id, &mut events);
    }

    let mob_update = ServerMessage::MobUpdate {
        mobs: world.mobs.values().map(|m| m.to_state()).collect(),
    };

    TickOutcome { events, mob_update }
}

fn step_mob(world: &mut World, mob_id: &str, zone_id: &str, events: &mut Vec<ServerMessage>) {
    if !world.mobs[mob_id].alive {
        step_dead_mob(world, mob_id, events);
        return;
    }

    let (mx, my) = (world.mobs[mob_id].x, world.mobs[mob_id].y);
    let target = world
        .closest_live_player_within(mx, my, zone_id, MOB_AGGRO_RANGE)
        .map(|p| (p.id, p.x, p.y, p.distance_to(mx, my)));

    match target {
        Some((char_id, _tx, _ty, dist)) if dist <= MOB_ATTACK_RANGE => {
            if world.mobs[mob_id].attack_cooldown == 0 {
                mob_attack(world, mob_id, char_id, events);
                world.mobs.get_mut(mob_id).unwrap().attack_cooldown = MOB_ATTACK_COOLDOWN_TICKS;
            } else {
                world.mobs.get_mut(mob_id).unwrap().attack_cooldown -= 1;
            }
        }
        Some((_char_id, tx, ty, _dist)) => {
            if world.mobs[mob_id].attack_cooldown > 0 {
                world.mobs.get_mut(mob_id).unwrap().attack_cooldown -= 1;
            }
            step_toward(world, mob_id, tx, ty);
        }
        None => wander(world, mob_id),
    }
}

fn step_dead_mob(world: &mut World, mob_id: &str, events: &mut Vec<ServerMessage>) {
    let respawn_counter = world.mobs[mob_id].respawn_counter;
    if respawn_counter == 0 {
        return;
    }
    let new_counter = respawn_counter - 1;
    let mob = world.mobs.get_mut(mob_id).unwrap();
    mob.respawn_counter = new_counter;
    if new_counter == 0 {
        mob.alive = true;
        mob.hp = mob.max_hp;
        mob.x = mob.spawn_x;
        mob.y = mob.spawn_y;
        let name = mob.name.clone();
        events.push(ServerMessage::Broadcast {
            message: format!("{name} has respawned"),
        });
    }
}

/// Mob melee hit: emits `combat`, applies damage, and if it kills the
/// player, restores them at the map spawn with no death penalty.
fn mob_attack(world: &mut World, mob_id: &str, char_id: Uuid, events: &mut Vec<ServerMessage>) {
    let damage = world.mobs[mob_id].damage;
    events.push(ServerMessage::Combat {
        attacker: mob_id.to_string(),
        target: char_id.to_string(),
        damage,
    });

    let spawn = world.grid.spawn;
    let Some(player) = world.players.get_mut(&char_id) else {
        return;
    };
    player.hp -= damage;
    if player.hp <= 0 {
        player.hp = player.max_hp;
        player.x = spawn.0;
        player.y = spawn.1;
        events.push(ServerMessage::PlayerDied { player_id: char_id });
        events.push(ServerMessage::PlayerMoved {
            player_id: char_id,
            x: player.x,
            y: player.y,
        });
    }
}

/// Steps straight toward `(tx, ty)` at `mob_move_speed`, committing only if
/// the result stays within the patrol radius and on a walkable tile.
fn step_toward(world: &mut World, mob_id: &str, tx: f32, ty: f32) {
    let mob = &world.mobs[mob_id];
    let (dx, dy) = (tx - mob.x, ty - mob.y);
    let dist = dx.hypot(dy);
    if dist < 1e-6 {
        return;
    }
    let (nx, ny) = (
        mob.x + dx / dist * MOB_MOVE_SPEED,
        mob.y + dy / dist * MOB_MOVE_SPEED,
    );
    let within = mob.within_patrol(nx, ny);
    let walkable = world.grid.walkable_radius(nx, ny, PLAYER_COLLISION_RADIUS);
    if within && walkable {
        let mob = world.mobs.get_mut(mob_id).unwrap();
        mob.x = nx;
        mob.y = ny;
    }
}

/// No aggro target: either roll a new wander heading/duration (no movement
/// this tick), or step along the current heading, cancelling (forcing a
/// reroll next tick) if the step would leave the patrol radius or land on
/// a non-walkable tile.
fn wander(world: &mut World, mob_id: &str) {
    if world.mobs[mob_id].wander_ticks_remain == 0 {
        let heading: f32 = world.rng.gen_range(0.0..TAU);
        let extra: u32 = world.rng.gen_range(0..=MOB_WANDER_MAX_EXTRA_TICKS);
        let mob = world.mobs.get_mut(mob_id).unwrap();
        mob.wander_dx = MOB_WANDER_SPEED_FACTOR * MOB_MOVE_SPEED * heading.cos();
        mob.wander_dy = MOB_WANDER_SPEED_FACTOR * MOB_MOVE_SPEED * heading.sin();
        mob.wander_ticks_remain = MOB_WANDER_BASE_TICKS + extra;
        return;
    }

    let mob = &world.mobs[mob_id];
    let (nx, ny) = (mob.x + mob.wander_dx, mob.y + mob.wander_dy);
    let within = mob.within_patrol(nx, ny);
    let walkable = world.grid.walkable_radius(nx, ny, PLAYER_COLLISION_RADIUS);

    let mob = world.mobs.get_mut(mob_id).unwrap();
    mob.wander_ticks_remain -= 1;
    if within && walkable {
        mob.x = nx;
        mob.y = ny;
    } else {
        mob.wander_ticks_remain = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::map::fallback_map;
    use crate::model::Player;

    fn fresh_world() -> World {
        let loaded = fallback_map("starter-zone");
        World::new(
            "starter-zone".to_string(),
            loaded.grid,
            loaded.npcs,
            loaded.mobs,
        )
    }

    #[test]
    fn dead_mob_respawns_exactly_at_tick_plus_fifty() {
        let mut world = fresh_world();
        let mob_id = world.mobs.keys().next().unwrap().clone();
        {
            let mob = world.mobs.get_mut(&mob_id).unwrap();
            mob.alive = false;
            mob.hp = 0;
            mob.respawn_counter = 50;
        }

        for _ in 0..49 {
            run_tick(&mut world);
            assert!(!world.mobs[&mob_id].alive);
        }
        run_tick(&mut world);

        let mob = &world.mobs[&mob_id];
        assert!(mob.alive);
        assert_eq!(mob.hp, mob.max_hp);
        assert_eq!((mob.x, mob.y), (mob.spawn_x, mob.spawn_y));
    }

    #[test]
    fn mob_chases_and_eventually_attacks_an_adjacent_player() {
        let mut world = fresh_world();
        let mob_id = world.mobs.keys().next().unwrap().clone();
        let (mob_x, mob_y) = {
            let mob = &world.mobs[&mob_id];
            (mob.x, mob.y)
        };

        let character_id = Uuid::new_v4();
        world.players.insert(
            character_id,
            Player {
                id: character_id,
                account_id: Uuid::new_v4(),
                name: "Hero".to_string(),
                class: "warrior".to_string(),
                x: mob_x + 3.0,
                y: mob_y,
                hp: 100,
                max_hp: 100,
                level: 1,
                experience: 0,
                gold: 0,
                zone_id: "starter-zone".to_string(),
            },
        );

        let mut saw_combat = false;
        for _ in 0..40 {
            let outcome = run_tick(&mut world);
            if outcome
                .events
                .iter()
                .any(|e| matches!(e, ServerMessage::Combat { .. }))
            {
                saw_combat = true;
                break;
            }
        }
        assert!(saw_combat, "mob never reached attack range and attacked");
    }

    #[test]
    fn mob_wander_never_leaves_patrol_radius() {
        let mut world = fresh_world();
        let mob_id = world.mobs.keys().next().unwrap().clone();

        for _ in 0..200 {
            run_tick(&mut world);
            let mob = &world.mobs[&mob_id];
            assert!(mob.within_patrol(mob.x, mob.y));
            assert!(world.grid.walkable_radius(mob.x, mob.y, PLAYER_COLLISION_RADIUS));
        }
    }
}
