use chrono::Datelike;

use crate::model::*;

use super::EngineError;

/// Which recorded bookings block a new admission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OverlapPolicy {
    /// Every recorded booking blocks its dates, cancelled ones included.
    /// This matches the historical behavior: cancellation never frees the
    /// calendar.
    #[default]
    AllBookings,
    /// Only active bookings block; cancellation releases the dates.
    ActiveOnly,
}

impl OverlapPolicy {
    /// The single choke point for the admission filter. Changing what counts
    /// as "blocking" is a change here and nowhere else.
    pub fn blocks(self, status: BookingStatus) -> bool {
        match self {
            OverlapPolicy::AllBookings => true,
            OverlapPolicy::ActiveOnly => status == BookingStatus::Active,
        }
    }
}

/// Defensive check on a requested stay. Callers are supposed to hand the
/// engine a validated range already; anything caught here is a caller bug.
pub(crate) fn validate_range(range: &StayRange) -> Result<(), EngineError> {
    use crate::limits::*;
    if range.start >= range.end {
        return Err(EngineError::LimitExceeded("stay range inverted or empty"));
    }
    if range.start.year() < MIN_STAY_YEAR || range.end.year() > MAX_STAY_YEAR {
        return Err(EngineError::LimitExceeded("stay date out of range"));
    }
    if range.nights() > MAX_STAY_NIGHTS {
        return Err(EngineError::LimitExceeded("stay too long"));
    }
    Ok(())
}

/// The overlap rule: reject if any blocking booking satisfies
/// `existing.start < new.end && existing.end > new.start` (half-open
/// intersection). Touching endpoints do not conflict.
pub(crate) fn check_no_overlap(
    ls: &ListingState,
    range: &StayRange,
    policy: OverlapPolicy,
) -> Result<(), EngineError> {
    for booking in ls.overlapping(range) {
        if policy.blocks(booking.status) {
            return Err(EngineError::Conflict(booking.id));
        }
    }
    Ok(())
}
