//! `join`, `move`, and `attack`: the three commands a session may issue.
//! Each holds the world write lock for the whole mutation, produces events
//! while still holding it, then the caller releases the lock before
//! broadcasting. No command performs network or collaborator I/O itself.

use uuid::Uuid;

use crate::collaborators::CharacterRecord;
use crate::consts::{
    BASE_PLAYER_DAMAGE, FALLBACK_SPAWN, MOB_RESPAWN_TICKS, PLAYER_ATTACK_RANGE,
    PLAYER_COLLISION_RADIUS, PLAYER_MOVE_SPEED, STARTING_PLAYER_HP, XP_PER_KILL,
};
use crate::error::CommandError;
use crate::model::Player;
use crate::protocol::{ServerMessage, WorldSnapshot};
use crate::session::SessionId;
use crate::world::World;

/// Frames produced by a command, not yet sent. Zone broadcasts carry an
/// optional skip-character-id; direct frames are addressed to one session.
#[derive(Default)]
pub struct CommandOutcome {
    pub zone_broadcasts: Vec<(Option<Uuid>, ServerMessage)>,
    pub direct: Vec<(SessionId, ServerMessage)>,
}

impl CommandOutcome {
    fn zone(mut self, skip: Option<Uuid>, message: ServerMessage) -> Self {
        self.zone_broadcasts.push((skip, message));
        self
    }

    fn to(mut self, session_id: SessionId, message: ServerMessage) -> Self {
        self.direct.push((session_id, message));
        self
    }

    fn error(session_id: SessionId, err: CommandError) -> Self {
        Self::default().to(
            session_id,
            ServerMessage::Error {
                message: err.message(),
            },
        )
    }
}

fn world_snapshot(world: &World) -> WorldSnapshot {
    WorldSnapshot {
        zone_id: world.zone_id.clone(),
        map: crate::map::to_wire_tile_map(&world.grid),
        players: world.players_in_zone().map(Player::to_state).collect(),
        mobs: world.mobs.values().map(|m| m.to_state()).collect(),
        npcs: world.npcs.clone(),
    }
}

/// Assigns `session.character_id`, constructs a player runtime, and emits
/// `welcome` to the joiner plus `player_joined`/`broadcast` to the rest of
/// the zone. A second `join` on the same session replaces the prior player
/// runtime; no other player runtime is altered.
pub fn join(world: &mut World, session_id: SessionId, character: CharacterRecord) -> CommandOutcome {
    let Some(session) = world.sessions.get(&session_id) else {
        return CommandOutcome::default();
    };
    let zone_id = world.zone_id.clone();

    // (0,0) is treated specifically as "no saved position", not a sign
    // test, so a legitimate persisted spot at a map edge isn't discarded.
    let has_saved_position = character.pos_x != 0.0 || character.pos_y != 0.0;
    let (x, y) = if has_saved_position && world.grid.walkable_radius(character.pos_x, character.pos_y, PLAYER_COLLISION_RADIUS) {
        (character.pos_x, character.pos_y)
    } else if world
        .grid
        .walkable_radius(world.grid.spawn.0, world.grid.spawn.1, PLAYER_COLLISION_RADIUS)
    {
        world.grid.spawn
    } else {
        FALLBACK_SPAWN
    };

    let player = Player {
        id: character.id,
        account_id: character.account_id,
        name: character.name.clone(),
        class: character.class.clone(),
        x,
        y,
        hp: STARTING_PLAYER_HP,
        max_hp: STARTING_PLAYER_HP,
        level: 1,
        experience: 0,
        gold: 0,
        zone_id: zone_id.clone(),
    };

    // A second join on the same session replaces the prior player runtime;
    // the stale entry must not linger as a ghost in `world.players`.
    if let Some(prior_character_id) = world.sessions[&session_id].character_id {
        world.players.remove(&prior_character_id);
    }

    world.players.insert(character.id, player.clone());
    let session = world.sessions.get_mut(&session_id).unwrap();
    session.character_id = Some(character.id);

    let snapshot = world_snapshot(world);
    CommandOutcome::default()
        .to(
            session_id,
            ServerMessage::Welcome {
                self_id: character.id,
                character: player.to_state(),
                zone_id,
                world: snapshot,
            },
        )
        .zone(
            Some(character.id),
            ServerMessage::PlayerJoined {
                player: player.to_state(),
            },
        )
        .zone(
            Some(character.id),
            ServerMessage::Broadcast {
                message: format!("{} joined the world", player.name),
            },
        )
}

/// Moves the session's player by the intent vector `(dx, dy)` using an
/// X-then-Y slide so a player can glide along a wall instead of stopping
/// dead at the first blocked axis. A near-zero vector is a no-op.
pub fn move_player(world: &mut World, session_id: SessionId, dx: f32, dy: f32) -> CommandOutcome {
    let Some(character_id) = world.sessions.get(&session_id).and_then(|s| s.character_id) else {
        return CommandOutcome::default();
    };

    if dx.abs() < 1e-6 && dy.abs() < 1e-6 {
        return CommandOutcome::default();
    }

    let magnitude = dx.hypot(dy);
    let (ndx, ndy) = if magnitude > 1.0 {
        (dx / magnitude, dy / magnitude)
    } else {
        (dx, dy)
    };
    let step_x = ndx * PLAYER_MOVE_SPEED;
    let step_y = ndy * PLAYER_MOVE_SPEED;

    let Some(player) = world.players.get(&character_id) else {
        return CommandOutcome::default();
    };
    let mut x = player.x;
    let mut y = player.y;
    let zone_id = player.zone_id.clone();

    let try_x = x + step_x;
    if world.grid.walkable_radius(try_x, y, PLAYER_COLLISION_RADIUS) {
        x = try_x;
    }
    let try_y = y + step_y;
    if world.grid.walkable_radius(x, try_y, PLAYER_COLLISION_RADIUS) {
        y = try_y;
    }

    let player = world.players.get_mut(&character_id).unwrap();
    player.x = x;
    player.y = y;

    CommandOutcome::default().zone(
        None,
        ServerMessage::PlayerMoved {
            player_id: character_id,
            x,
            y,
        },
    )
}

/// Damages a live mob within range. Out-of-range attacks produce an
/// `error` frame and change nothing. A killing blow grants experience,
/// runs the level-up loop, and emits `mob_died`/`broadcast`/`player_update`.
pub fn attack(world: &mut World, session_id: SessionId, target_id: &str) -> CommandOutcome {
    let Some(character_id) = world.sessions.get(&session_id).and_then(|s| s.character_id) else {
        return CommandOutcome::error(session_id, CommandError::NoCharacter);
    };
    let Some(player) = world.players.get(&character_id) else {
        return CommandOutcome::error(session_id, CommandError::NoCharacter);
    };
    let (px, py, level) = (player.x, player.y, player.level);

    let Some(mob) = world.mobs.get(target_id) else {
        return CommandOutcome::error(session_id, CommandError::TargetNotFound);
    };
    if !mob.alive {
        return CommandOutcome::error(session_id, CommandError::TargetNotFound);
    }

    let distance = mob.distance_to(px, py);
    if distance > PLAYER_ATTACK_RANGE {
        return CommandOutcome::error(session_id, CommandError::TargetOutOfRange);
    }

    let damage = BASE_PLAYER_DAMAGE + (level as i32 - 1) * 3;
    let mob = world.mobs.get_mut(target_id).unwrap();
    mob.hp -= damage;

    let mut outcome = CommandOutcome::default().zone(
        None,
        ServerMessage::Combat {
            attacker: character_id.to_string(),
            target: target_id.to_string(),
            damage,
        },
    );

    if mob.hp <= 0 && mob.alive {
        mob.alive = false;
        mob.hp = 0;
        mob.respawn_counter = MOB_RESPAWN_TICKS;
        let mob_name = mob.name.clone();
        let mob_id = mob.id.clone();

        let player = world.players.get_mut(&character_id).unwrap();
        player.experience += XP_PER_KILL;
        player.apply_level_up_loop();
        let player_state = player.to_state();

        outcome = outcome
            .zone(None, ServerMessage::MobDied { mob_id })
            .zone(
                None,
                ServerMessage::Broadcast {
                    message: format!("{} was slain", mob_name),
                },
            )
            .to(session_id, ServerMessage::PlayerUpdate { player: player_state });
    }

    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::map::fallback_map;
    use crate::session::{new_outbound_queue, register};

    fn fresh_world() -> World {
        let loaded = fallback_map("starter-zone");
        World::new("starter-zone".to_string(), loaded.grid, loaded.npcs, loaded.mobs)
    }

    fn join_session(world: &mut World) -> (SessionId, Uuid) {
        let (tx, _rx) = new_outbound_queue();
        let account_id = Uuid::new_v4();
        let session_id = register(world, account_id, tx);
        let character_id = Uuid::new_v4();
        let character = CharacterRecord {
            id: character_id,
            account_id,
            name: "Hero".to_string(),
            class: "warrior".to_string(),
            pos_x: 0.0,
            pos_y: 0.0,
        };
        join(world, session_id, character);
        (session_id, character_id)
    }

    #[test]
    fn join_uses_map_spawn_when_no_saved_position() {
        let mut world = fresh_world();
        let (_session_id, character_id) = join_session(&mut world);
        let player = &world.players[&character_id];
        assert_eq!((player.x, player.y), world.grid.spawn);
        assert_eq!(player.hp, STARTING_PLAYER_HP);
        assert_eq!(player.level, 1);
    }

    #[test]
    fn second_join_replaces_player_and_leaves_others_untouched() {
        let mut world = fresh_world();
        let (session_id, first_character_id) = join_session(&mut world);
        let (_other_session, other_character_id) = join_session(&mut world);

        let new_character_id = Uuid::new_v4();
        let account_id = world.sessions[&session_id].account_id;
        join(
            &mut world,
            session_id,
            CharacterRecord {
                id: new_character_id,
                account_id,
                name: "Hero2".to_string(),
                class: "mage".to_string(),
                pos_x: 0.0,
                pos_y: 0.0,
            },
        );

        assert_eq!(world.sessions[&session_id].character_id, Some(new_character_id));
        assert!(!world.players.contains_key(&first_character_id));
        assert!(world.players.contains_key(&new_character_id));
        assert!(world.players.contains_key(&other_character_id));
    }

    #[test]
    fn move_is_a_no_op_below_epsilon() {
        let mut world = fresh_world();
        let (session_id, character_id) = join_session(&mut world);
        let before = (world.players[&character_id].x, world.players[&character_id].y);
        let outcome = move_player(&mut world, session_id, 1e-7, -1e-7);
        assert!(outcome.zone_broadcasts.is_empty());
        assert_eq!((world.players[&character_id].x, world.players[&character_id].y), before);
    }

    #[test]
    fn move_slides_along_a_blocking_axis() {
        let mut world = fresh_world();
        let (session_id, character_id) = join_session(&mut world);
        {
            let player = world.players.get_mut(&character_id).unwrap();
            player.x = 1.5;
            player.y = 5.0;
        }

        for _ in 0..10 {
            move_player(&mut world, session_id, -1.0, -1.0);
        }

        let player = &world.players[&character_id];
        assert!((player.x - 1.5).abs() < 1e-4, "x should be blocked by the border wall: {}", player.x);
        assert!(player.y < 5.0, "y should have decreased while sliding: {}", player.y);
    }

    #[test]
    fn attack_out_of_range_yields_error_and_no_damage() {
        let mut world = fresh_world();
        let (session_id, character_id) = join_session(&mut world);
        {
            let player = world.players.get_mut(&character_id).unwrap();
            player.x = 1.5;
            player.y = 1.5;
        }
        let mob_id = world.mobs.keys().next().unwrap().clone();
        {
            let mob = world.mobs.get_mut(&mob_id).unwrap();
            mob.x = 40.0;
            mob.y = 40.0;
        }
        let hp_before = world.mobs[&mob_id].hp;

        let outcome = attack(&mut world, session_id, &mob_id);
        assert_eq!(outcome.direct.len(), 1);
        matches!(&outcome.direct[0].1, ServerMessage::Error { message } if message == "target out of range");
        assert_eq!(world.mobs[&mob_id].hp, hp_before);
    }

    #[test]
    fn three_hits_kill_a_60_hp_mob_and_grant_xp() {
        let mut world = fresh_world();
        let (session_id, character_id) = join_session(&mut world);
        let mob_id = world.mobs.keys().next().unwrap().clone();
        {
            let player = world.players.get_mut(&character_id).unwrap();
            let mob = world.mobs.get(&mob_id).unwrap();
            player.x = mob.x;
            player.y = mob.y;
        }

        attack(&mut world, session_id, &mob_id);
        attack(&mut world, session_id, &mob_id);
        let outcome = attack(&mut world, session_id, &mob_id);

        let mob = &world.mobs[&mob_id];
        assert!(!mob.alive);
        assert_eq!(mob.hp, 0);
        assert_eq!(mob.respawn_counter, MOB_RESPAWN_TICKS);

        let player = &world.players[&character_id];
        assert_eq!(player.experience, 25);
        assert_eq!(player.level, 1);

        let has_mob_died = outcome
            .zone_broadcasts
            .iter()
            .any(|(_, m)| matches!(m, ServerMessage::MobDied { .. }));
        assert!(has_mob_died);
        let has_player_update = outcome
            .direct
            .iter()
            .any(|(_, m)| matches!(m, ServerMessage::PlayerUpdate { .. }));
        assert!(has_player_update);
    }
}
