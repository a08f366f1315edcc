mod admission;
mod conflict;
mod error;
mod lifecycle;
mod queries;

pub use admission::stay_total;
pub use conflict::OverlapPolicy;
pub use error::EngineError;

use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{mpsc, oneshot, RwLock};
use ulid::Ulid;

use crate::model::*;
use crate::notify::NotifyHub;
use crate::wal::Wal;

pub type SharedListingState = Arc<RwLock<ListingState>>;

// ── Group-commit WAL channel ─────────────────────────────

pub(super) enum WalCommand {
    Append {
        event: Event,
        response: oneshot::Sender<io::Result<()>>,
    },
    Compact {
        events: Vec<Event>,
        response: oneshot::Sender<io::Result<()>>,
    },
    AppendsSinceCompact {
        response: oneshot::Sender<u64>,
    },
}

/// Background task that owns the WAL and batches appends for group commit.
/// 1. Block until the first Append arrives.
/// 2. Buffer it (no fsync).
/// 3. Drain all immediately available Appends (the batch window).
/// 4. Single flush_sync for the whole batch.
/// 5. Respond Ok to all senders.
async fn wal_writer_loop(mut wal: Wal, mut rx: mpsc::Receiver<WalCommand>) {
    while let Some(cmd) = rx.recv().await {
        match cmd {
            WalCommand::Append { event, response } => {
                let mut batch = vec![(event, response)];

                // Drain all immediately available appends
                loop {
                    match rx.try_recv() {
                        Ok(WalCommand::Append { event, response }) => {
                            batch.push((event, response));
                        }
                        Ok(other) => {
                            // Flush current batch first, then handle the non-append command
                            metrics::histogram!(crate::observability::WAL_FLUSH_BATCH_SIZE)
                                .record(batch.len() as f64);
                            let flush_start = std::time::Instant::now();
                            let result = flush_batch(&mut wal, &mut batch);
                            metrics::histogram!(crate::observability::WAL_FLUSH_DURATION_SECONDS)
                                .record(flush_start.elapsed().as_secs_f64());
                            respond_batch(&mut batch, &result);
                            handle_non_append(&mut wal, other);
                            break;
                        }
                        Err(_) => break, // channel empty — flush batch
                    }
                }

                if !batch.is_empty() {
                    metrics::histogram!(crate::observability::WAL_FLUSH_BATCH_SIZE)
                        .record(batch.len() as f64);
                    let flush_start = std::time::Instant::now();
                    let result = flush_batch(&mut wal, &mut batch);
                    metrics::histogram!(crate::observability::WAL_FLUSH_DURATION_SECONDS)
                        .record(flush_start.elapsed().as_secs_f64());
                    respond_batch(&mut batch, &result);
                }
            }
            other => handle_non_append(&mut wal, other),
        }
    }
}

fn flush_batch(wal: &mut Wal, batch: &mut [(Event, oneshot::Sender<io::Result<()>>)]) -> io::Result<()> {
    let mut append_err: Option<io::Error> = None;
    for (event, _) in batch.iter() {
        if let Err(e) = wal.append_buffered(event) {
            append_err = Some(e);
            break;
        }
    }
    // Always flush — even on append error — so partially buffered bytes
    // don't leak into the next batch (callers were told this batch failed).
    let flush_err = wal.flush_sync().err();
    if let Some(e) = append_err {
        return Err(e);
    }
    if let Some(e) = flush_err {
        return Err(e);
    }
    Ok(())
}

fn respond_batch(batch: &mut Vec<(Event, oneshot::Sender<io::Result<()>>)>, result: &io::Result<()>) {
    for (_, tx) in batch.drain(..) {
        let r = match result {
            Ok(()) => Ok(()),
            Err(e) => Err(io::Error::new(e.kind(), e.to_string())),
        };
        let _ = tx.send(r);
    }
}

fn handle_non_append(wal: &mut Wal, cmd: WalCommand) {
    match cmd {
        WalCommand::Compact { events, response } => {
            let result = Wal::write_compact_file(wal.path(), &events)
                .and_then(|()| wal.swap_compact_file());
            let _ = response.send(result);
        }
        WalCommand::AppendsSinceCompact { response } => {
            let _ = response.send(wal.appends_since_compact());
        }
        WalCommand::Append { .. } => unreachable!(),
    }
}

/// Booking engine: listings keyed by id, each guarded by its own RwLock.
/// Admission and cancellation for a listing run under that listing's write
/// lock, so the overlap check and the booking insert are a single critical
/// section per listing.
pub struct Engine {
    pub state: DashMap<Ulid, SharedListingState>,
    pub(super) wal_tx: mpsc::Sender<WalCommand>,
    pub notify: Arc<NotifyHub>,
    /// Reverse lookup: booking id → listing id
    pub(super) booking_to_listing: DashMap<Ulid, Ulid>,
    /// Which bookings block admission. Fixed at construction.
    pub(super) overlap_policy: OverlapPolicy,
}

/// Apply an event directly to a ListingState (no locking — caller holds the lock).
fn apply_to_listing(ls: &mut ListingState, event: &Event, booking_map: &DashMap<Ulid, Ulid>) {
    match event {
        Event::BookingAdmitted {
            id,
            listing_id,
            guest,
            range,
            total_price,
        } => {
            ls.insert_booking(BookingRecord {
                id: *id,
                guest: *guest,
                range: *range,
                total_price: *total_price,
                status: BookingStatus::Active,
            });
            booking_map.insert(*id, *listing_id);
        }
        Event::BookingCancelled { id, .. } => {
            // The record stays: a cancelled booking may still block its dates
            // depending on the overlap policy, and history is queryable.
            if let Some(booking) = ls.booking_mut(id) {
                booking.status = BookingStatus::Cancelled;
            }
        }
        Event::ListingUpdated {
            name,
            location,
            nightly_rate,
            ..
        } => {
            ls.name = name.clone();
            ls.location = location.clone();
            ls.nightly_rate = *nightly_rate;
        }
        // ListingCreated/Deleted are handled at the DashMap level, not here
        Event::ListingCreated { .. } | Event::ListingDeleted { .. } => {}
    }
}

impl Engine {
    pub fn new(wal_path: PathBuf, notify: Arc<NotifyHub>) -> std::io::Result<Self> {
        Self::with_policy(wal_path, notify, OverlapPolicy::default())
    }

    pub fn with_policy(
        wal_path: PathBuf,
        notify: Arc<NotifyHub>,
        overlap_policy: OverlapPolicy,
    ) -> std::io::Result<Self> {
        let events = Wal::replay(&wal_path)?;
        let wal = Wal::open(&wal_path)?;
        let (wal_tx, wal_rx) = mpsc::channel(4096);
        tokio::spawn(wal_writer_loop(wal, wal_rx));

        let engine = Self {
            state: DashMap::new(),
            wal_tx,
            notify,
            booking_to_listing: DashMap::new(),
            overlap_policy,
        };

        // Replay events — we're the sole owner of these Arcs, so try_write
        // always succeeds instantly (no contention). Never use blocking_write
        // here because this may run inside an async context.
        for event in &events {
            match event {
                Event::ListingCreated { id, owner, name, location, nightly_rate } => {
                    let ls = ListingState::new(*id, *owner, name.clone(), location.clone(), *nightly_rate);
                    engine.state.insert(*id, Arc::new(RwLock::new(ls)));
                }
                Event::ListingDeleted { id } => {
                    if let Some((_, ls)) = engine.state.remove(id) {
                        let guard = ls.try_read().expect("replay: uncontended read");
                        for b in &guard.bookings {
                            engine.booking_to_listing.remove(&b.id);
                        }
                    }
                }
                other => {
                    if let Some(listing_id) = event_listing_id(other)
                        && let Some(entry) = engine.state.get(&listing_id) {
                            let ls_arc = entry.clone();
                            let mut guard = ls_arc.try_write().expect("replay: uncontended write");
                            apply_to_listing(&mut guard, other, &engine.booking_to_listing);
                        }
                }
            }
        }
        tracing::info!("replayed {} events from {}", events.len(), wal_path.display());

        Ok(engine)
    }

    /// Write event to WAL via the background group-commit writer.
    async fn wal_append(&self, event: &Event) -> Result<(), EngineError> {
        let (tx, rx) = oneshot::channel();
        self.wal_tx
            .send(WalCommand::Append {
                event: event.clone(),
                response: tx,
            })
            .await
            .map_err(|_| EngineError::WalError("WAL writer shut down".into()))?;
        rx.await
            .map_err(|_| EngineError::WalError("WAL writer dropped response".into()))?
            .map_err(|e| EngineError::WalError(e.to_string()))
    }

    pub fn get_listing(&self, id: &Ulid) -> Option<SharedListingState> {
        self.state.get(id).map(|e| e.value().clone())
    }

    pub fn get_listing_for_booking(&self, booking_id: &Ulid) -> Option<Ulid> {
        self.booking_to_listing.get(booking_id).map(|e| *e.value())
    }

    /// WAL-append + apply + notify in one call. Eliminates the repeated 3-line pattern.
    pub(super) async fn persist_and_apply(
        &self,
        listing_id: Ulid,
        ls: &mut ListingState,
        event: &Event,
    ) -> Result<(), EngineError> {
        self.wal_append(event).await?;
        apply_to_listing(ls, event, &self.booking_to_listing);
        self.notify.send(listing_id, event);
        Ok(())
    }

    /// Lookup booking → listing, get listing, acquire write lock.
    pub(super) async fn resolve_booking_write(
        &self,
        booking_id: &Ulid,
    ) -> Result<(Ulid, tokio::sync::OwnedRwLockWriteGuard<ListingState>), EngineError> {
        let listing_id = self
            .get_listing_for_booking(booking_id)
            .ok_or(EngineError::NotFound(*booking_id))?;
        let ls = self
            .get_listing(&listing_id)
            .ok_or(EngineError::NotFound(listing_id))?;
        let guard = ls.write_owned().await;
        Ok((listing_id, guard))
    }

    /// Compact the WAL by rewriting it with only the events needed to recreate the current state.
    pub async fn compact_wal(&self) -> Result<(), EngineError> {
        let mut events = Vec::new();

        let listings: Vec<SharedListingState> =
            self.state.iter().map(|e| e.value().clone()).collect();
        for ls in listings {
            // Admissions hold the write lock across their WAL append; wait
            // for them instead of assuming the lock is free.
            let guard = ls.read().await;
            events.push(Event::ListingCreated {
                id: guard.id,
                owner: guard.owner,
                name: guard.name.clone(),
                location: guard.location.clone(),
                nightly_rate: guard.nightly_rate,
            });
            for booking in &guard.bookings {
                events.push(Event::BookingAdmitted {
                    id: booking.id,
                    listing_id: guard.id,
                    guest: booking.guest,
                    range: booking.range,
                    total_price: booking.total_price,
                });
                if booking.status == BookingStatus::Cancelled {
                    events.push(Event::BookingCancelled {
                        id: booking.id,
                        listing_id: guard.id,
                    });
                }
            }
        }

        tracing::debug!("compacting WAL to {} events", events.len());
        let (tx, rx) = oneshot::channel();
        self.wal_tx
            .send(WalCommand::Compact { events, response: tx })
            .await
            .map_err(|_| EngineError::WalError("WAL writer shut down".into()))?;
        rx.await
            .map_err(|_| EngineError::WalError("WAL writer dropped response".into()))?
            .map_err(|e| EngineError::WalError(e.to_string()))
    }

    pub async fn wal_appends_since_compact(&self) -> u64 {
        let (tx, rx) = oneshot::channel();
        if self
            .wal_tx
            .send(WalCommand::AppendsSinceCompact { response: tx })
            .await
            .is_err()
        {
            return 0;
        }
        rx.await.unwrap_or(0)
    }
}

/// Extract the listing_id from an event (for non-Create/Delete events).
fn event_listing_id(event: &Event) -> Option<Ulid> {
    match event {
        Event::BookingAdmitted { listing_id, .. }
        | Event::BookingCancelled { listing_id, .. } => Some(*listing_id),
        Event::ListingUpdated { id, .. } => Some(*id),
        Event::ListingCreated { .. } | Event::ListingDeleted { .. } => None,
    }
}
