//! Wire frames exchanged over the session's WebSocket connection. Each
//! frame is JSON with a string `type` discriminator.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::model::{MobState, Npc, PlayerState, TileMap};

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    Join { character_id: String },
    Move { dx: f32, dy: f32 },
    Attack { target_id: String },
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type")]
pub enum ServerMessage {
    #[serde(rename = "welcome")]
    Welcome {
        #[serde(rename = "selfId")]
        self_id: Uuid,
        character: PlayerState,
        zone_id: String,
        world: WorldSnapshot,
    },
    #[serde(rename = "player_joined")]
    PlayerJoined { player: PlayerState },
    #[serde(rename = "player_left")]
    PlayerLeft { player_id: Uuid },
    #[serde(rename = "player_moved")]
    PlayerMoved { player_id: Uuid, x: f32, y: f32 },
    #[serde(rename = "mob_update")]
    MobUpdate { mobs: Vec<MobState> },
    #[serde(rename = "combat")]
    Combat {
        attacker: String,
        target: String,
        damage: i32,
    },
    #[serde(rename = "mob_died")]
    MobDied { mob_id: String },
    #[serde(rename = "player_died")]
    PlayerDied { player_id: Uuid },
    #[serde(rename = "player_update")]
    PlayerUpdate { player: PlayerState },
    #[serde(rename = "broadcast")]
    Broadcast { message: String },
    #[serde(rename = "error")]
    Error { message: String },
}

#[derive(Debug, Clone, Serialize)]
pub struct WorldSnapshot {
    pub zone_id: String,
    pub map: TileMap,
    pub players: Vec<PlayerState>,
    pub mobs: Vec<MobState>,
    pub npcs: Vec<Npc>,
}

impl ServerMessage {
    /// Serialize once; callers fan the resulting frame out to many
    /// sessions without re-serializing.
    pub fn to_frame(&self) -> String {
        serde_json::to_string(self).expect("ServerMessage always serializes")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_message_decodes_join() {
        let msg: ClientMessage =
            serde_json::from_str(r#"{"type":"join","character_id":"abc"}"#).unwrap();
        matches!(msg, ClientMessage::Join { character_id } if character_id == "abc");
    }

    #[test]
    fn server_message_error_frame_uses_type_field() {
        let frame = ServerMessage::Error {
            message: "target out of range".to_string(),
        }
        .to_frame();
        assert_eq!(
            frame,
            r#"{"type":"error","message":"target out of range"}"#
        );
    }

    #[test]
    fn combat_frame_preserves_attacker_target_keys() {
        let frame = ServerMessage::Combat {
            attacker: "char-1".to_string(),
            target: "mob-1".to_string(),
            damage: 20,
        }
        .to_frame();
        assert!(frame.contains("\"attacker\":\"char-1\""));
        assert!(frame.contains("\"target\":\"mob-1\""));
    }
}
