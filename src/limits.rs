//! Hard caps. Requests beyond these are malformed or abusive, never legitimate.

/// Max listings held by one engine.
pub const MAX_LISTINGS: usize = 100_000;

/// Max bookings recorded against a single listing (cancelled ones included).
pub const MAX_BOOKINGS_PER_LISTING: usize = 10_000;

/// Longest admissible stay, in nights.
pub const MAX_STAY_NIGHTS: i64 = 730;

/// Stay dates must fall within this year window.
pub const MIN_STAY_YEAR: i32 = 1970;
pub const MAX_STAY_YEAR: i32 = 9999;

pub const MAX_NAME_LEN: usize = 256;
pub const MAX_LOCATION_LEN: usize = 512;
