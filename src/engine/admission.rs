use std::sync::Arc;

use rust_decimal::Decimal;
use tokio::sync::RwLock;
use ulid::Ulid;

use crate::limits::*;
use crate::model::*;
use crate::observability;

use super::conflict::{check_no_overlap, validate_range};
use super::{Engine, EngineError};

/// Total price for a stay: whole nights times the nightly rate, exact
/// decimal arithmetic. Never client-supplied.
pub fn stay_total(range: &StayRange, nightly_rate: Decimal) -> Decimal {
    Decimal::from(range.nights()) * nightly_rate
}

impl Engine {
    pub async fn create_listing(
        &self,
        id: Ulid,
        owner: AccountId,
        name: Option<String>,
        location: String,
        nightly_rate: Decimal,
    ) -> Result<(), EngineError> {
        if self.state.len() >= MAX_LISTINGS {
            return Err(EngineError::LimitExceeded("too many listings"));
        }
        if let Some(ref n) = name
            && n.len() > MAX_NAME_LEN {
                return Err(EngineError::LimitExceeded("listing name too long"));
            }
        if location.len() > MAX_LOCATION_LEN {
            return Err(EngineError::LimitExceeded("location too long"));
        }
        if nightly_rate.is_sign_negative() {
            return Err(EngineError::LimitExceeded("nightly rate negative"));
        }
        if self.state.contains_key(&id) {
            return Err(EngineError::AlreadyExists(id));
        }

        let event = Event::ListingCreated {
            id,
            owner,
            name: name.clone(),
            location: location.clone(),
            nightly_rate,
        };
        self.wal_append(&event).await?;
        let ls = ListingState::new(id, owner, name, location, nightly_rate);
        self.state.insert(id, Arc::new(RwLock::new(ls)));
        self.notify.send(id, &event);
        Ok(())
    }

    pub async fn update_listing(
        &self,
        id: Ulid,
        name: Option<String>,
        location: String,
        nightly_rate: Decimal,
    ) -> Result<(), EngineError> {
        if let Some(ref n) = name
            && n.len() > MAX_NAME_LEN {
                return Err(EngineError::LimitExceeded("listing name too long"));
            }
        if location.len() > MAX_LOCATION_LEN {
            return Err(EngineError::LimitExceeded("location too long"));
        }
        if nightly_rate.is_sign_negative() {
            return Err(EngineError::LimitExceeded("nightly rate negative"));
        }
        let ls = self
            .get_listing(&id)
            .ok_or(EngineError::NotFound(id))?;
        let mut guard = ls.write().await;

        // Already-admitted bookings keep the price they were admitted at.
        let event = Event::ListingUpdated { id, name, location, nightly_rate };
        self.persist_and_apply(id, &mut guard, &event).await
    }

    pub async fn delete_listing(&self, id: Ulid) -> Result<(), EngineError> {
        let ls = self
            .get_listing(&id)
            .ok_or(EngineError::NotFound(id))?;
        let guard = ls.read().await;
        if guard.has_active_bookings() {
            return Err(EngineError::ActiveBookings(id));
        }
        let booking_ids: Vec<Ulid> = guard.bookings.iter().map(|b| b.id).collect();
        drop(guard);

        let event = Event::ListingDeleted { id };
        self.wal_append(&event).await?;
        self.state.remove(&id);
        // The listing's (cancelled) bookings go with it, reverse index included.
        for bid in &booking_ids {
            self.booking_to_listing.remove(bid);
        }
        self.notify.send(id, &event);
        self.notify.remove(&id);
        Ok(())
    }

    /// Admission: decide whether the requested stay may be booked, computing
    /// the total price if so. All-or-nothing — on rejection nothing is
    /// persisted and nothing is applied.
    ///
    /// Runs under the listing's write lock, so the overlap check and the
    /// booking insert are atomic with respect to concurrent admissions for
    /// the same listing.
    pub async fn create_booking(
        &self,
        id: Ulid,
        listing_id: Ulid,
        guest: AccountId,
        range: StayRange,
    ) -> Result<BookingInfo, EngineError> {
        validate_range(&range)?;
        let ls = self
            .get_listing(&listing_id)
            .ok_or(EngineError::NotFound(listing_id))?;
        let mut guard = ls.write().await;
        if guard.bookings.len() >= MAX_BOOKINGS_PER_LISTING {
            return Err(EngineError::LimitExceeded("too many bookings on listing"));
        }

        if let Err(e) = check_no_overlap(&guard, &range, self.overlap_policy) {
            metrics::counter!(observability::BOOKINGS_REJECTED_TOTAL).increment(1);
            return Err(e);
        }

        let total_price = stay_total(&range, guard.nightly_rate);
        let event = Event::BookingAdmitted {
            id,
            listing_id,
            guest,
            range,
            total_price,
        };
        self.persist_and_apply(listing_id, &mut guard, &event).await?;
        metrics::counter!(observability::BOOKINGS_ADMITTED_TOTAL).increment(1);

        Ok(BookingInfo {
            id,
            listing_id,
            guest,
            range,
            total_price,
            status: BookingStatus::Active,
        })
    }
}
