use std::time::Duration;

/// Upper bound on start times accepted by a single multi-slot request.
pub const MAX_SLOTS_PER_REQUEST: usize = 48;

pub const MAX_PLAYER_NAME_LEN: usize = 128;
pub const MAX_REQUESTER_LEN: usize = 256;

pub const MAX_CONFIG_KEY_LEN: usize = 64;
pub const MAX_CONFIG_VALUE_LEN: usize = 256;

/// Longest a caller waits for a resource lock before getting a contention error.
pub const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(5);

/// Journal appends between compactions.
pub const DEFAULT_COMPACT_THRESHOLD: u64 = 1000;

/// Player name recorded when the caller does not supply one.
pub const GUEST_PLAYER_NAME: &str = "Guest";
