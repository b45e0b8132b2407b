//! The ambient HTTP/WebSocket entry point: a single `axum` route upgrades
//! an authenticated connection to a session, then spawns its reader and
//! writer pumps. The tick loop driver also lives here since it shares the
//! same `AppState` and broadcast plumbing as the command dispatch path.
//!
//! Reader/writer pumps are generic over [`FrameSource`]/[`FrameSink`]
//! rather than tied to `axum::extract::ws::WebSocket` directly, so their
//! logic can be exercised in tests against plain in-memory channels
//! without opening a real socket.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::watch;
use uuid::Uuid;

use crate::broadcast;
use crate::collaborators::{Authenticator, CharacterRepository, EventPublisher};
use crate::commands::{self, CommandOutcome};
use crate::config::Config;
use crate::consts::{PERSIST_DEADLINE_SECS, PING_PERIOD_SECS, READ_DEADLINE_SECS, WRITE_DEADLINE_SECS};
use crate::error::CommandError;
use crate::protocol::{ClientMessage, ServerMessage};
use crate::session::{self, OutboundReceiver, SessionId};
use crate::tick;
use crate::world::World;

/// Everything a connection handler or the tick loop needs: the
/// single-writer world plus the collaborator trait objects the core
/// depends on. The core never references a concrete collaborator type.
pub struct AppState {
    pub world: parking_lot::RwLock<World>,
    pub config: Config,
    pub authenticator: Arc<dyn Authenticator>,
    pub characters: Arc<dyn CharacterRepository>,
    pub events: Arc<dyn EventPublisher>,
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/ws", get(ws_upgrade))
        .route("/health", get(|| async { "ok" }))
        .with_state(state)
}

#[derive(Debug, Deserialize)]
struct WsQuery {
    token: String,
}

async fn ws_upgrade(
    State(state): State<Arc<AppState>>,
    Query(query): Query<WsQuery>,
    ws: WebSocketUpgrade,
) -> Response {
    match state.authenticator.authenticate(&query.token).await {
        Ok(account_id) => {
            let cap = crate::consts::SESSION_READ_CAP_BYTES;
            ws.max_message_size(cap)
                .on_upgrade(move |socket| handle_socket(state, account_id, socket))
        }
        Err(e) => {
            log::warn!("websocket upgrade rejected: {e}");
            StatusCode::UNAUTHORIZED.into_response()
        }
    }
}

async fn handle_socket(state: Arc<AppState>, account_id: Uuid, socket: WebSocket) {
    let (ws_tx, ws_rx) = socket.split();
    let (outbound_tx, outbound_rx) = session::new_outbound_queue();

    let session_id = {
        let mut world = state.world.write();
        session::register(&mut world, account_id, outbound_tx)
    };
    log::info!("session {session_id} registered for account {account_id}");

    let writer = tokio::spawn(writer_pump(WsFrameSink(ws_tx), outbound_rx));
    reader_pump(state.clone(), session_id, account_id, WsFrameSource(ws_rx)).await;

    do_unregister(&state, session_id).await;
    let _ = writer.await;
    log::info!("session {session_id} closed");
}

/// A decoded inbound frame, independent of the transport it arrived over.
enum IncomingFrame {
    Text(String),
    Pong,
    Close,
}

/// Read half of a session's transport.
#[async_trait]
trait FrameSource: Send {
    async fn recv(&mut self) -> Option<IncomingFrame>;
}

/// Write half of a session's transport.
#[async_trait]
trait FrameSink: Send {
    async fn send_text(&mut self, text: String) -> bool;
    async fn send_ping(&mut self) -> bool;
    async fn send_close(&mut self) -> bool;
}

struct WsFrameSource(SplitStream<WebSocket>);

#[async_trait]
impl FrameSource for WsFrameSource {
    async fn recv(&mut self) -> Option<IncomingFrame> {
        loop {
            return match self.0.next().await {
                Some(Ok(Message::Text(text))) => Some(IncomingFrame::Text(text)),
                Some(Ok(Message::Pong(_))) => Some(IncomingFrame::Pong),
                Some(Ok(Message::Close(_))) => Some(IncomingFrame::Close),
                Some(Ok(_)) => continue,
                Some(Err(_)) | None => None,
            };
        }
    }
}

struct WsFrameSink(SplitSink<WebSocket, Message>);

#[async_trait]
impl FrameSink for WsFrameSink {
    async fn send_text(&mut self, text: String) -> bool {
        self.0.send(Message::Text(text)).await.is_ok()
    }

    async fn send_ping(&mut self) -> bool {
        self.0.send(Message::Ping(Vec::new())).await.is_ok()
    }

    async fn send_close(&mut self) -> bool {
        self.0.send(Message::Close(None)).await.is_ok()
    }
}

/// Drains the outbound queue to the sink, enforcing a write deadline per
/// frame and sending a keep-alive ping after 20 seconds of idleness. When
/// the outbound queue closes (unregister or shutdown dropped the sender)
/// a close frame is sent before the pump exits; any write failure ends the
/// pump immediately without one.
async fn writer_pump<S: FrameSink>(mut sink: S, mut outbound_rx: OutboundReceiver) {
    loop {
        tokio::select! {
            frame = outbound_rx.recv() => {
                let Some(frame) = frame else {
                    let _ = tokio::time::timeout(Duration::from_secs(WRITE_DEADLINE_SECS), sink.send_close()).await;
                    break;
                };
                match tokio::time::timeout(Duration::from_secs(WRITE_DEADLINE_SECS), sink.send_text(frame)).await {
                    Ok(true) => {}
                    _ => break,
                }
            }
            _ = tokio::time::sleep(Duration::from_secs(PING_PERIOD_SECS)) => {
                match tokio::time::timeout(Duration::from_secs(WRITE_DEADLINE_SECS), sink.send_ping()).await {
                    Ok(true) => {}
                    _ => break,
                }
            }
        }
    }
}

/// Reads frames with a 60-second read deadline (re-armed on every
/// iteration, which includes every pong) and dispatches them to the
/// matching command handler. Any timeout, close, or transport error ends
/// the pump.
async fn reader_pump<S: FrameSource>(
    state: Arc<AppState>,
    session_id: SessionId,
    account_id: Uuid,
    mut source: S,
) {
    loop {
        let next = tokio::time::timeout(Duration::from_secs(READ_DEADLINE_SECS), source.recv()).await;
        let frame = match next {
            Ok(Some(frame)) => frame,
            _ => break,
        };
        match frame {
            IncomingFrame::Close => break,
            IncomingFrame::Pong => continue,
            IncomingFrame::Text(text) => dispatch(&state, session_id, account_id, &text).await,
        }
    }
}

async fn dispatch(state: &Arc<AppState>, session_id: SessionId, account_id: Uuid, text: &str) {
    let Ok(message) = serde_json::from_str::<ClientMessage>(text) else {
        send_error(state, session_id, CommandError::UnknownMessageType.message());
        return;
    };
    match message {
        ClientMessage::Join { character_id } => {
            handle_join(state, session_id, account_id, &character_id).await
        }
        ClientMessage::Move { dx, dy } => handle_move(state, session_id, dx, dy),
        ClientMessage::Attack { target_id } => handle_attack(state, session_id, &target_id),
    }
}

async fn handle_join(state: &Arc<AppState>, session_id: SessionId, account_id: Uuid, raw_character_id: &str) {
    let Ok(character_id) = Uuid::parse_str(raw_character_id) else {
        send_error(state, session_id, CommandError::InvalidCharacterId.message());
        return;
    };

    match state.characters.get_for_account(account_id, character_id).await {
        Ok(character) => {
            let outcome = {
                let mut world = state.world.write();
                commands::join(&mut world, session_id, character)
            };
            dispatch_outcome(state, outcome);
            publish_fire_and_forget(state, "player.joined", character_id.to_string());
        }
        Err(_) => send_error(state, session_id, CommandError::CharacterNotFound.message()),
    }
}

fn handle_move(state: &Arc<AppState>, session_id: SessionId, dx: f32, dy: f32) {
    let outcome = {
        let mut world = state.world.write();
        commands::move_player(&mut world, session_id, dx, dy)
    };
    let moved = !outcome.zone_broadcasts.is_empty();
    dispatch_outcome(state, outcome);
    if !moved {
        return;
    }

    let persist_request = {
        let world = state.world.read();
        world.sessions.get(&session_id).and_then(|session| {
            let character_id = session.character_id?;
            let player = world.players.get(&character_id)?;
            Some((
                session.account_id,
                character_id,
                player.x,
                player.y,
                player.zone_id.clone(),
            ))
        })
    };
    let Some((account_id, character_id, x, y, zone_id)) = persist_request else {
        return;
    };

    let characters = state.characters.clone();
    tokio::spawn(async move {
        let update = characters.update_position(account_id, character_id, x, y, &zone_id);
        if tokio::time::timeout(Duration::from_secs(PERSIST_DEADLINE_SECS), update)
            .await
            .is_err()
        {
            log::warn!("position persistence timed out for character {character_id}");
        }
    });
}

fn handle_attack(state: &Arc<AppState>, session_id: SessionId, target_id: &str) {
    if target_id.trim().is_empty() {
        send_error(state, session_id, CommandError::TargetIdRequired.message());
        return;
    }

    let outcome = {
        let mut world = state.world.write();
        commands::attack(&mut world, session_id, target_id)
    };
    let mob_died = outcome
        .zone_broadcasts
        .iter()
        .any(|(_, m)| matches!(m, ServerMessage::MobDied { .. }));
    dispatch_outcome(state, outcome);
    if mob_died {
        publish_fire_and_forget(state, "mob.died", target_id.to_string());
    }
}

fn dispatch_outcome(state: &Arc<AppState>, outcome: CommandOutcome) {
    let world = state.world.read();
    let zone_id = world.zone_id.clone();
    for (skip, message) in outcome.zone_broadcasts {
        broadcast::broadcast_to_zone(&world, &zone_id, skip, &message);
    }
    for (session_id, message) in outcome.direct {
        broadcast::send_to_session(&world, session_id, &message);
    }
}

fn send_error(state: &Arc<AppState>, session_id: SessionId, message: impl Into<String>) {
    let world = state.world.read();
    broadcast::send_to_session(
        &world,
        session_id,
        &ServerMessage::Error {
            message: message.into(),
        },
    );
}

fn publish_fire_and_forget(state: &Arc<AppState>, subject: &'static str, payload: String) {
    let events = state.events.clone();
    tokio::spawn(async move {
        if let Err(e) = events.publish(subject, payload.as_bytes()).await {
            log::warn!("event publish failed: subject={subject} err={e}");
        }
    });
}

async fn do_unregister(state: &Arc<AppState>, session_id: SessionId) {
    let outcome = {
        let mut world = state.world.write();
        session::unregister(&mut world, session_id)
    };

    {
        let world = state.world.read();
        let zone_id = world.zone_id.clone();
        for event in &outcome.events {
            broadcast::broadcast_to_zone(&world, &zone_id, None, event);
        }
    }

    if let Some(persist) = outcome.persist {
        let update = state.characters.update_position(
            persist.account_id,
            persist.character_id,
            persist.x,
            persist.y,
            &persist.zone_id,
        );
        if tokio::time::timeout(Duration::from_secs(PERSIST_DEADLINE_SECS), update)
            .await
            .is_err()
        {
            log::warn!(
                "position persistence on disconnect timed out for character {}",
                persist.character_id
            );
        }
    }
}

/// The sole driver of time: ticks at `config.tick_interval()`, broadcasts
/// the tick's events and `mob_update` in order, and exits when `quit_rx`'s
/// sender is dropped, dropping all sessions on the way out.
pub async fn run_tick_loop(state: Arc<AppState>, mut quit_rx: watch::Receiver<()>) {
    let mut interval = tokio::time::interval(state.config.tick_interval());
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = interval.tick() => {
                let outcome = {
                    let mut world = state.world.write();
                    tick::run_tick(&mut world)
                };

                {
                    let world = state.world.read();
                    let zone_id = world.zone_id.clone();
                    for event in &outcome.events {
                        broadcast::broadcast_to_zone(&world, &zone_id, None, event);
                    }
                    broadcast::broadcast_to_zone(&world, &zone_id, None, &outcome.mob_update);
                }

                for event in &outcome.events {
                    if let ServerMessage::PlayerDied { player_id } = event {
                        publish_fire_and_forget(&state, "player.died", player_id.to_string());
                    }
                }
            }
            _ = quit_rx.changed() => break,
        }
    }

    log::info!("tick loop shutting down, dropping all sessions");
    state.world.write().sessions.clear();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborators::{HttpAuthenticator, InMemoryCharacterRepository, LoggingEventPublisher};
    use crate::map::fallback_map;
    use tokio::sync::mpsc;

    fn test_state() -> Arc<AppState> {
        let loaded = fallback_map("starter-zone");
        let world = World::new("starter-zone".to_string(), loaded.grid, loaded.npcs, loaded.mobs);
        Arc::new(AppState {
            world: parking_lot::RwLock::new(world),
            authenticator: Arc::new(HttpAuthenticator::new("http://localhost:4000".to_string())),
            characters: Arc::new(InMemoryCharacterRepository::new()),
            events: Arc::new(LoggingEventPublisher),
            config: Config {
                tick_rate: 10,
                zone_id: "starter-zone".to_string(),
                map_file: "map.json".to_string(),
                bind_addr: "0.0.0.0:0".parse().unwrap(),
                auth_server_url: "http://localhost:4000".to_string(),
            },
        })
    }

    struct ChannelSink {
        tx: mpsc::UnboundedSender<String>,
        closed: Arc<std::sync::atomic::AtomicBool>,
    }

    #[async_trait]
    impl FrameSink for ChannelSink {
        async fn send_text(&mut self, text: String) -> bool {
            self.tx.send(text).is_ok()
        }
        async fn send_ping(&mut self) -> bool {
            true
        }
        async fn send_close(&mut self) -> bool {
            self.closed.store(true, std::sync::atomic::Ordering::SeqCst);
            true
        }
    }

    struct ChannelSource {
        rx: mpsc::UnboundedReceiver<IncomingFrame>,
    }

    #[async_trait]
    impl FrameSource for ChannelSource {
        async fn recv(&mut self) -> Option<IncomingFrame> {
            self.rx.recv().await
        }
    }

    #[tokio::test]
    async fn writer_pump_forwards_queued_frames_in_order_then_sends_close_and_exits() {
        let (outbound_tx, outbound_rx) = session::new_outbound_queue();
        let (sink_tx, mut sink_rx) = mpsc::unbounded_channel();
        let closed = Arc::new(std::sync::atomic::AtomicBool::new(false));
        let sink = ChannelSink {
            tx: sink_tx,
            closed: closed.clone(),
        };

        outbound_tx.send("frame-1".to_string()).await.unwrap();
        outbound_tx.send("frame-2".to_string()).await.unwrap();
        drop(outbound_tx);

        writer_pump(sink, outbound_rx).await;

        assert_eq!(sink_rx.recv().await, Some("frame-1".to_string()));
        assert_eq!(sink_rx.recv().await, Some("frame-2".to_string()));
        assert!(closed.load(std::sync::atomic::Ordering::SeqCst), "writer pump should send a close frame when the outbound queue closes");
        assert_eq!(sink_rx.recv().await, None);
    }

    #[tokio::test]
    async fn reader_pump_stops_cleanly_on_a_close_frame() {
        let state = test_state();
        let (tx, rx) = mpsc::unbounded_channel();
        tx.send(IncomingFrame::Close).unwrap();
        let source = ChannelSource { rx };

        let session_id = {
            let mut world = state.world.write();
            let (outbound_tx, _outbound_rx) = session::new_outbound_queue();
            session::register(&mut world, Uuid::new_v4(), outbound_tx)
        };

        reader_pump(state.clone(), session_id, Uuid::new_v4(), source).await;
    }

    #[tokio::test]
    async fn unknown_message_type_yields_an_error_frame_without_touching_world_state() {
        let state = test_state();
        let (outbound_tx, mut outbound_rx) = session::new_outbound_queue();
        let session_id = {
            let mut world = state.world.write();
            session::register(&mut world, Uuid::new_v4(), outbound_tx)
        };

        dispatch(&state, session_id, Uuid::new_v4(), r#"{"type":"dance"}"#).await;

        let frame = outbound_rx.try_recv().unwrap();
        assert!(frame.contains("unknown message type"));
    }

    #[tokio::test]
    async fn attack_with_blank_target_id_yields_error_without_locking_twice() {
        let state = test_state();
        let (outbound_tx, mut outbound_rx) = session::new_outbound_queue();
        let session_id = {
            let mut world = state.world.write();
            session::register(&mut world, Uuid::new_v4(), outbound_tx)
        };

        handle_attack(&state, session_id, "   ");

        let frame = outbound_rx.try_recv().unwrap();
        assert!(frame.contains("target_id is required"));
    }
}
