use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use ulid::Ulid;

/// Account reference supplied by the embedding identity layer.
pub type AccountId = Ulid;

/// Who is making a request. Never ambient — always passed in explicitly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Actor {
    pub account: AccountId,
    /// Staff may act on any booking.
    pub staff: bool,
}

impl Actor {
    pub fn guest(account: AccountId) -> Self {
        Self { account, staff: false }
    }

    pub fn staff(account: AccountId) -> Self {
        Self { account, staff: true }
    }
}

/// Half-open range of calendar dates `[start, end)`. A checkout day is free
/// for the next guest's checkin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StayRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl StayRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        debug_assert!(start < end, "StayRange start must be before end");
        Self { start, end }
    }

    /// Whole nights covered by the stay. At least 1 for any valid range.
    pub fn nights(&self) -> i64 {
        (self.end - self.start).num_days()
    }

    pub fn overlaps(&self, other: &StayRange) -> bool {
        self.start < other.end && other.start < self.end
    }

    pub fn contains_day(&self, day: NaiveDate) -> bool {
        self.start <= day && day < self.end
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BookingStatus {
    Active,
    Cancelled,
}

/// One booking as recorded against a listing. `total_price` is fixed at
/// admission time; later rate changes on the listing never touch it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookingRecord {
    pub id: Ulid,
    pub guest: AccountId,
    pub range: StayRange,
    pub total_price: Decimal,
    pub status: BookingStatus,
}

#[derive(Debug, Clone)]
pub struct ListingState {
    pub id: Ulid,
    pub owner: AccountId,
    pub name: Option<String>,
    pub location: String,
    pub nightly_rate: Decimal,
    /// All bookings ever admitted (cancelled ones included), sorted by `range.start`.
    pub bookings: Vec<BookingRecord>,
}

impl ListingState {
    pub fn new(
        id: Ulid,
        owner: AccountId,
        name: Option<String>,
        location: String,
        nightly_rate: Decimal,
    ) -> Self {
        Self {
            id,
            owner,
            name,
            location,
            nightly_rate,
            bookings: Vec::new(),
        }
    }

    /// Insert a booking maintaining sort order by stay start.
    pub fn insert_booking(&mut self, booking: BookingRecord) {
        let pos = self
            .bookings
            .binary_search_by_key(&booking.range.start, |b| b.range.start)
            .unwrap_or_else(|e| e);
        self.bookings.insert(pos, booking);
    }

    pub fn booking(&self, id: &Ulid) -> Option<&BookingRecord> {
        self.bookings.iter().find(|b| b.id == *id)
    }

    pub fn booking_mut(&mut self, id: &Ulid) -> Option<&mut BookingRecord> {
        self.bookings.iter_mut().find(|b| b.id == *id)
    }

    /// Return only bookings whose stay overlaps the query range.
    /// Uses binary search to skip bookings starting at or after `query.end`.
    pub fn overlapping(&self, query: &StayRange) -> impl Iterator<Item = &BookingRecord> {
        // Everything at index >= right_bound starts at or after query.end → can't overlap.
        let right_bound = self
            .bookings
            .partition_point(|b| b.range.start < query.end);
        self.bookings[..right_bound]
            .iter()
            .filter(move |b| b.range.end > query.start)
    }

    pub fn has_active_bookings(&self) -> bool {
        self.bookings
            .iter()
            .any(|b| b.status == BookingStatus::Active)
    }
}

/// The event types — flat, no nesting. This is the WAL record format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Event {
    ListingCreated {
        id: Ulid,
        owner: AccountId,
        name: Option<String>,
        location: String,
        nightly_rate: Decimal,
    },
    ListingUpdated {
        id: Ulid,
        name: Option<String>,
        location: String,
        nightly_rate: Decimal,
    },
    ListingDeleted {
        id: Ulid,
    },
    BookingAdmitted {
        id: Ulid,
        listing_id: Ulid,
        guest: AccountId,
        range: StayRange,
        total_price: Decimal,
    },
    BookingCancelled {
        id: Ulid,
        listing_id: Ulid,
    },
}

// ── Query result types ───────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingInfo {
    pub id: Ulid,
    pub owner: AccountId,
    pub name: Option<String>,
    pub location: String,
    pub nightly_rate: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookingInfo {
    pub id: Ulid,
    pub listing_id: Ulid,
    pub guest: AccountId,
    pub range: StayRange,
    pub total_price: Decimal,
    pub status: BookingStatus,
}

/// Filter for listing queries: location substring (case-insensitive) plus
/// nightly-rate bounds. An empty filter matches everything.
#[derive(Debug, Clone, Default)]
pub struct ListingFilter {
    pub location: Option<String>,
    pub min_rate: Option<Decimal>,
    pub max_rate: Option<Decimal>,
}
