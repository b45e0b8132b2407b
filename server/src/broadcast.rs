//! Serializes an event once and enqueues it to every zone-matching
//! session's outbound queue, without ever blocking on a slow or dead
//! client.

use uuid::Uuid;

use crate::protocol::ServerMessage;
use crate::session::SessionId;
use crate::world::World;

/// Serializes `message` once, then enqueues it to every session whose
/// `character_id` is set, whose player runtime is in `zone_id`, and whose
/// character id differs from `skip` when given.
pub fn broadcast_to_zone(world: &World, zone_id: &str, skip: Option<Uuid>, message: &ServerMessage) {
    let frame = message.to_frame();
    for session in world.sessions.values() {
        let Some(character_id) = session.character_id else {
            continue;
        };
        if Some(character_id) == skip {
            continue;
        }
        let Some(player) = world.players.get(&character_id) else {
            continue;
        };
        if player.zone_id != zone_id {
            continue;
        }
        session.try_send(frame.clone());
    }
}

/// Enqueues `message` to exactly one session, identified by session id
/// (used for `welcome` and `error` frames addressed to the caller).
pub fn send_to_session(world: &World, session_id: SessionId, message: &ServerMessage) {
    if let Some(session) = world.sessions.get(&session_id) {
        session.try_send(message.to_frame());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::map::fallback_map;
    use crate::model::Player;
    use crate::session::{new_outbound_queue, register};

    fn fresh_world() -> World {
        let loaded = fallback_map("starter-zone");
        World::new("starter-zone".to_string(), loaded.grid, loaded.npcs, loaded.mobs)
    }

    fn join_player(world: &mut World, session_id: SessionId, character_id: Uuid) {
        world.sessions.get_mut(&session_id).unwrap().character_id = Some(character_id);
        world.players.insert(
            character_id,
            Player {
                id: character_id,
                account_id: Uuid::new_v4(),
                name: "Tester".to_string(),
                class: "warrior".to_string(),
                x: 2.5,
                y: 2.5,
                hp: 100,
                max_hp: 100,
                level: 1,
                experience: 0,
                gold: 0,
                zone_id: "starter-zone".to_string(),
            },
        );
    }

    #[test]
    fn broadcast_skips_excluded_character_and_sessions_without_a_character() {
        let mut world = fresh_world();

        let (tx1, mut rx1) = new_outbound_queue();
        let s1 = register(&mut world, Uuid::new_v4(), tx1);
        let c1 = Uuid::new_v4();
        join_player(&mut world, s1, c1);

        let (tx2, mut rx2) = new_outbound_queue();
        let s2 = register(&mut world, Uuid::new_v4(), tx2);
        let c2 = Uuid::new_v4();
        join_player(&mut world, s2, c2);

        let (tx3, mut rx3) = new_outbound_queue();
        let _s3 = register(&mut world, Uuid::new_v4(), tx3); // no character yet

        broadcast_to_zone(
            &world,
            "starter-zone",
            Some(c1),
            &ServerMessage::Broadcast {
                message: "hi".to_string(),
            },
        );

        assert!(rx1.try_recv().is_err());
        assert!(rx2.try_recv().is_ok());
        assert!(rx3.try_recv().is_err());
    }

    #[test]
    fn full_queue_silently_drops_without_affecting_others() {
        let mut world = fresh_world();
        let (tx1, mut rx1) = new_outbound_queue();
        let s1 = register(&mut world, Uuid::new_v4(), tx1);
        let c1 = Uuid::new_v4();
        join_player(&mut world, s1, c1);

        let (tx2, mut rx2) = new_outbound_queue();
        let s2 = register(&mut world, Uuid::new_v4(), tx2);
        let c2 = Uuid::new_v4();
        join_player(&mut world, s2, c2);

        // Fill session 1's queue to capacity without draining it.
        for _ in 0..200 {
            broadcast_to_zone(
                &world,
                "starter-zone",
                None,
                &ServerMessage::Broadcast {
                    message: "spam".to_string(),
                },
            );
        }

        let mut count1 = 0;
        while rx1.try_recv().is_ok() {
            count1 += 1;
        }
        let mut count2 = 0;
        while rx2.try_recv().is_ok() {
            count2 += 1;
        }

        assert!(count1 <= crate::consts::OUTBOUND_QUEUE_CAPACITY);
        assert_eq!(count2, count1);
    }
}
