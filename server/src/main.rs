//! Binary entry point: loads configuration and the map, wires in the
//! default collaborator implementations, and serves the `/ws` and
//! `/health` routes alongside the tick loop.

use std::path::Path;
use std::sync::Arc;

use tokio::sync::watch;
use uuid::Uuid;

use world_server::collaborators::{
    CharacterRecord, HttpAuthenticator, InMemoryCharacterRepository, LoggingEventPublisher,
};
use world_server::config::Config;
use world_server::map;
use world_server::net::{self, AppState};
use world_server::world::World;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = Config::from_env()?;
    log::info!("starting world-server: zone={} tick_rate={}", config.zone_id, config.tick_rate);

    let (loaded, load_err) = map::load_or_fallback(Path::new(&config.map_file), &config.zone_id);
    if let Some(err) = &load_err {
        log::warn!("map load failed ({err}), falling back to the built-in map");
    }

    let world = World::new(config.zone_id.clone(), loaded.grid, loaded.npcs, loaded.mobs);

    let characters = Arc::new(InMemoryCharacterRepository::new());
    seed_demo_character(&characters);

    let state = Arc::new(AppState {
        world: parking_lot::RwLock::new(world),
        authenticator: Arc::new(HttpAuthenticator::new(config.auth_server_url.clone())),
        characters,
        events: Arc::new(LoggingEventPublisher),
        config: config.clone(),
    });

    let (quit_tx, quit_rx) = watch::channel(());
    let tick_task = tokio::spawn(net::run_tick_loop(state.clone(), quit_rx));

    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    log::info!("listening on {}", config.bind_addr);

    axum::serve(listener, net::router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    drop(quit_tx);
    tick_task.await?;
    Ok(())
}

/// Seeds one demo character so the service can be exercised without a
/// real account/character database; durable storage is out of scope.
fn seed_demo_character(characters: &Arc<InMemoryCharacterRepository>) {
    let account_id = Uuid::new_v4();
    let character_id = Uuid::new_v4();
    characters.seed(CharacterRecord {
        id: character_id,
        account_id,
        name: "Hero".to_string(),
        class: "warrior".to_string(),
        pos_x: 0.0,
        pos_y: 0.0,
    });
    log::info!("seeded demo character: account={account_id} character={character_id}");
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    log::info!("shutdown signal received, draining sessions");
}
