pub mod events;
pub mod model;
pub mod state_machine;

/// 참가자 1인당 지급 코인 범위
pub const MIN_COINS_PER_USER: i64 = 50;
pub const MAX_COINS_PER_USER: i64 = 1000;
