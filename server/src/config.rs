//! Environment-variable configuration, loaded the same way the sibling
//! auth service loads its own `BIND_ADDR` / `TOKEN_TTL_MINUTES` knobs.
//!
//! ```env
//! TICK_RATE=10
//! ZONE_ID=starter-zone
//! MAP_FILE=map.json
//! BIND_ADDR=0.0.0.0:7777
//! AUTH_SERVER_URL=http://localhost:4000
//! ```

use std::env;
use std::net::SocketAddr;

#[derive(Debug, Clone)]
pub struct Config {
    pub tick_rate: u32,
    pub zone_id: String,
    pub map_file: String,
    pub bind_addr: SocketAddr,
    pub auth_server_url: String,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let tick_rate: u32 = env::var("TICK_RATE")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(10);

        let zone_id = env::var("ZONE_ID").unwrap_or_else(|_| "starter-zone".to_string());

        let map_file = env::var("MAP_FILE").unwrap_or_else(|_| "map.json".to_string());

        let bind_addr: SocketAddr = env::var("BIND_ADDR")
            .unwrap_or_else(|_| "0.0.0.0:7777".to_string())
            .parse()?;

        let auth_server_url =
            env::var("AUTH_SERVER_URL").unwrap_or_else(|_| "http://localhost:4000".to_string());

        Ok(Self {
            tick_rate,
            zone_id,
            map_file,
            bind_addr,
            auth_server_url,
        })
    }

    pub fn tick_interval(&self) -> std::time::Duration {
        std::time::Duration::from_secs_f64(1.0 / self.tick_rate as f64)
    }
}
