use ulid::Ulid;

#[derive(Debug)]
pub enum EngineError {
    NotFound(Ulid),
    AlreadyExists(Ulid),
    /// Requested stay overlaps the named existing booking.
    Conflict(Ulid),
    /// Actor is neither the booking's guest nor staff.
    Forbidden(Ulid),
    /// Redundant cancellation — the booking is already cancelled.
    AlreadyCancelled(Ulid),
    /// Listing still has active bookings and cannot be deleted.
    ActiveBookings(Ulid),
    LimitExceeded(&'static str),
    WalError(String),
}

impl std::fmt::Display for EngineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineError::NotFound(id) => write!(f, "not found: {id}"),
            EngineError::AlreadyExists(id) => write!(f, "already exists: {id}"),
            EngineError::Conflict(id) => write!(f, "dates conflict with booking: {id}"),
            EngineError::Forbidden(id) => {
                write!(f, "not allowed to cancel booking: {id}")
            }
            EngineError::AlreadyCancelled(id) => {
                write!(f, "booking already cancelled: {id}")
            }
            EngineError::ActiveBookings(id) => {
                write!(f, "cannot delete listing {id}: active bookings exist")
            }
            EngineError::LimitExceeded(msg) => write!(f, "limit exceeded: {msg}"),
            EngineError::WalError(e) => write!(f, "WAL error: {e}"),
        }
    }
}

impl std::error::Error for EngineError {}
