use ulid::Ulid;

use crate::model::*;

use super::{Engine, EngineError, SharedListingState};

fn listing_info(ls: &ListingState) -> ListingInfo {
    ListingInfo {
        id: ls.id,
        owner: ls.owner,
        name: ls.name.clone(),
        location: ls.location.clone(),
        nightly_rate: ls.nightly_rate,
    }
}

fn booking_info(listing_id: Ulid, b: &BookingRecord) -> BookingInfo {
    BookingInfo {
        id: b.id,
        listing_id,
        guest: b.guest,
        range: b.range,
        total_price: b.total_price,
        status: b.status,
    }
}

fn matches(ls: &ListingState, filter: &ListingFilter, location_needle: Option<&str>) -> bool {
    if let Some(needle) = location_needle
        && !ls.location.to_lowercase().contains(needle) {
            return false;
        }
    if let Some(min) = filter.min_rate
        && ls.nightly_rate < min {
            return false;
        }
    if let Some(max) = filter.max_rate
        && ls.nightly_rate > max {
            return false;
        }
    true
}

impl Engine {
    /// Listings matching the filter: location substring (case-insensitive)
    /// and nightly-rate bounds. Ordering is unspecified.
    pub async fn list_listings(&self, filter: &ListingFilter) -> Vec<ListingInfo> {
        let needle = filter.location.as_ref().map(|l| l.to_lowercase());
        // Snapshot the Arcs first: never hold a DashMap shard lock across an await.
        // Listings mid-admission hold their write lock across the WAL append,
        // so the read must wait rather than assume the lock is free.
        let listings: Vec<SharedListingState> =
            self.state.iter().map(|e| e.value().clone()).collect();

        let mut result = Vec::new();
        for ls in listings {
            let guard = ls.read().await;
            if matches(&guard, filter, needle.as_deref()) {
                result.push(listing_info(&guard));
            }
        }
        result
    }

    pub async fn get_listing_info(&self, id: Ulid) -> Option<ListingInfo> {
        let ls = self.get_listing(&id)?;
        let guard = ls.read().await;
        Some(listing_info(&guard))
    }

    /// All bookings recorded against a listing, cancelled ones included.
    pub async fn bookings_for_listing(
        &self,
        listing_id: Ulid,
    ) -> Result<Vec<BookingInfo>, EngineError> {
        let ls = match self.get_listing(&listing_id) {
            Some(ls) => ls,
            None => return Ok(vec![]),
        };
        let guard = ls.read().await;
        Ok(guard
            .bookings
            .iter()
            .map(|b| booking_info(listing_id, b))
            .collect())
    }

    pub async fn get_booking(&self, id: Ulid) -> Result<BookingInfo, EngineError> {
        let listing_id = self
            .get_listing_for_booking(&id)
            .ok_or(EngineError::NotFound(id))?;
        let ls = self
            .get_listing(&listing_id)
            .ok_or(EngineError::NotFound(listing_id))?;
        let guard = ls.read().await;
        let booking = guard.booking(&id).ok_or(EngineError::NotFound(id))?;
        Ok(booking_info(listing_id, booking))
    }

    /// Staff see every booking; a guest sees only their own.
    pub async fn bookings_visible_to(&self, actor: &Actor) -> Vec<BookingInfo> {
        // Snapshot the Arcs first: never hold a DashMap shard lock across an await.
        let listings: Vec<SharedListingState> =
            self.state.iter().map(|e| e.value().clone()).collect();

        let mut result = Vec::new();
        for ls in listings {
            let guard = ls.read().await;
            for b in &guard.bookings {
                if actor.staff || b.guest == actor.account {
                    result.push(booking_info(guard.id, b));
                }
            }
        }
        result
    }
}
