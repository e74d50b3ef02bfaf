//! # Memory Error Types
//!
//! Errors the arena can report through its fallible entry points.

use thiserror::Error;

/// Errors that can occur while reserving or carving the arena.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ArenaError {
    /// The reservation would be crossed by this allocation.
    #[error("arena exhausted: requested {requested} bytes, {remaining} bytes left in the reservation")]
    Exhausted {
        /// Bytes requested, including alignment padding.
        requested: usize,
        /// Bytes still available in the reservation.
        remaining: usize,
    },

    /// Alignment was zero or not a power of two.
    #[error("invalid alignment: {0} is not a power of two")]
    InvalidAlignment(usize),

    /// Reservation or granule size was zero.
    #[error("invalid reservation: reserve {reserve} bytes with granule {granule} bytes")]
    InvalidReservation {
        /// Requested reservation size.
        reserve: usize,
        /// Requested commit granule.
        granule: usize,
    },
}

/// Result type for arena operations.
pub type ArenaResult<T> = Result<T, ArenaError>;
