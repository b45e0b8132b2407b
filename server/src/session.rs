//! Session registry: tracks live connections, each with an outbound
//! message queue and an associated account/character.

use tokio::sync::mpsc;
use uuid::Uuid;

use crate::consts::OUTBOUND_QUEUE_CAPACITY;
use crate::protocol::ServerMessage;
use crate::world::World;

/// Identifies a connection for the lifetime of the process; distinct from
/// the character id, which only exists after a successful `join`.
pub type SessionId = Uuid;

/// A session's outbound queue is a bounded channel; `try_send` gives us the
/// discard-newest-on-overflow policy for free (`Err(Full)` just means the
/// frame is dropped for this recipient).
pub type OutboundSender = mpsc::Sender<String>;
pub type OutboundReceiver = mpsc::Receiver<String>;

/// Registered but not necessarily visible to the world: a session with no
/// `character_id` cannot move or attack and is never included in
/// broadcasts.
#[derive(Debug, Clone)]
pub struct Session {
    pub id: SessionId,
    pub account_id: Uuid,
    pub character_id: Option<Uuid>,
    pub outbound_tx: OutboundSender,
}

impl Session {
    /// Best-effort enqueue; silently drops the frame if the queue is full.
    /// Resource pressure for one recipient must never affect another.
    pub fn try_send(&self, frame: String) {
        if self.outbound_tx.try_send(frame).is_err() {
            log::debug!("outbound queue full for session {}, dropping frame", self.id);
        }
    }
}

pub fn new_outbound_queue() -> (OutboundSender, OutboundReceiver) {
    mpsc::channel(OUTBOUND_QUEUE_CAPACITY)
}

/// Creates and records a session with an empty outbound queue.
pub fn register(world: &mut World, account_id: Uuid, outbound_tx: OutboundSender) -> SessionId {
    let id = Uuid::new_v4();
    world.sessions.insert(
        id,
        Session {
            id,
            account_id,
            character_id: None,
            outbound_tx,
        },
    );
    id
}

/// What the caller must do after `unregister` returns: broadcast the given
/// events to the zone, and best-effort persist the departing character's
/// last known position (if any) via the external updater.
pub struct UnregisterOutcome {
    pub events: Vec<ServerMessage>,
    pub persist: Option<PersistOnLeave>,
}

pub struct PersistOnLeave {
    pub account_id: Uuid,
    pub character_id: Uuid,
    pub x: f32,
    pub y: f32,
    pub zone_id: String,
}

/// Removes the session, removes any associated player runtime, and
/// prepares the `player_left`/`broadcast` notices plus a best-effort
/// persistence request. Does not itself touch the network or the
/// persistence collaborator — both happen after the write lock is
/// released.
pub fn unregister(world: &mut World, session_id: SessionId) -> UnregisterOutcome {
    let Some(session) = world.sessions.remove(&session_id) else {
        return UnregisterOutcome {
            events: Vec::new(),
            persist: None,
        };
    };

    let Some(character_id) = session.character_id else {
        return UnregisterOutcome {
            events: Vec::new(),
            persist: None,
        };
    };

    let Some(player) = world.players.remove(&character_id) else {
        return UnregisterOutcome {
            events: Vec::new(),
            persist: None,
        };
    };

    let events = vec![
        ServerMessage::PlayerLeft {
            player_id: character_id,
        },
        ServerMessage::Broadcast {
            message: format!("{} left the world", player.name),
        },
    ];

    UnregisterOutcome {
        events,
        persist: Some(PersistOnLeave {
            account_id: session.account_id,
            character_id,
            x: player.x,
            y: player.y,
            zone_id: player.zone_id,
        }),
    }
}
