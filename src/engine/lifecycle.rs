use ulid::Ulid;

use crate::model::*;
use crate::observability;

use super::{Engine, EngineError};

impl Engine {
    /// One-way transition: Active → Cancelled.
    ///
    /// Authorization is checked before the idempotence guard, so an actor
    /// with no rights is told Forbidden even when the booking is already
    /// cancelled. Redundant cancellation of one's own booking is an explicit
    /// AlreadyCancelled rejection, not a silent success.
    pub async fn cancel_booking(&self, id: Ulid, actor: &Actor) -> Result<Ulid, EngineError> {
        let (listing_id, mut guard) = self.resolve_booking_write(&id).await?;
        let booking = guard.booking(&id).ok_or(EngineError::NotFound(id))?;

        if booking.guest != actor.account && !actor.staff {
            return Err(EngineError::Forbidden(id));
        }
        if booking.status == BookingStatus::Cancelled {
            return Err(EngineError::AlreadyCancelled(id));
        }

        let event = Event::BookingCancelled { id, listing_id };
        self.persist_and_apply(listing_id, &mut guard, &event).await?;
        metrics::counter!(observability::BOOKINGS_CANCELLED_TOTAL).increment(1);
        Ok(listing_id)
    }
}
