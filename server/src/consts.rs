//! Tuning knobs fixed by the simulation rules. Everything that an operator
//! might reasonably want to change instead lives in [`crate::config::Config`].

pub const PLAYER_MOVE_SPEED: f32 = 0.35;
pub const PLAYER_COLLISION_RADIUS: f32 = 0.2;
pub const PLAYER_ATTACK_RANGE: f32 = 1.3;
pub const BASE_PLAYER_DAMAGE: i32 = 20;
pub const XP_PER_KILL: u64 = 25;

pub const MOB_AGGRO_RANGE: f32 = 6.0;
pub const MOB_ATTACK_RANGE: f32 = 1.1;
pub const MOB_MOVE_SPEED: f32 = 0.18;
pub const MOB_ATTACK_COOLDOWN_TICKS: u32 = 7;
pub const MOB_RESPAWN_TICKS: u32 = 50;
pub const MOB_WANDER_BASE_TICKS: u32 = 5;
pub const MOB_WANDER_MAX_EXTRA_TICKS: u32 = 20;
pub const MOB_WANDER_SPEED_FACTOR: f32 = 0.7;

pub const DEFAULT_MOB_HP: i32 = 60;
pub const DEFAULT_MOB_DAMAGE: i32 = 8;
pub const DEFAULT_MOB_PATROL_RADIUS: f32 = 5.0;

pub const STARTING_PLAYER_HP: i32 = 100;
pub const FALLBACK_SPAWN: (f32, f32) = (1.5, 1.5);

pub const OUTBOUND_QUEUE_CAPACITY: usize = 128;
pub const SESSION_READ_CAP_BYTES: usize = 2048;
pub const READ_DEADLINE_SECS: u64 = 60;
pub const PING_PERIOD_SECS: u64 = 20;
pub const WRITE_DEADLINE_SECS: u64 = 10;
pub const PERSIST_DEADLINE_SECS: u64 = 2;
