//! Request Lifecycle State Machine
//!
//! Defines the valid status transitions of a request. Every writer goes
//! through [`check_transition`], so an out-of-order update can never revert
//! a terminal status.

use crate::{DispatchError, RequestStatus};

/// Progress at which a flight counts as arrived
pub const PROGRESS_COMPLETE: u8 = 100;

/// Check if a transition from one status to another is allowed
pub fn is_valid_transition(from: RequestStatus, to: RequestStatus) -> bool {
    use RequestStatus::*;

    matches!(
        (from, to),
        (Pending, Dispatched)
            | (Pending, Cancelled)
            | (Dispatched, InTransit)
            | (Dispatched, Cancelled)
            | (InTransit, Delivered)
            | (InTransit, Cancelled)
            | (Delivered, Completed)
    )
}

/// Same as [`is_valid_transition`], as a `Result`
pub fn check_transition(from: RequestStatus, to: RequestStatus) -> Result<(), DispatchError> {
    if is_valid_transition(from, to) {
        Ok(())
    } else {
        Err(DispatchError::InvalidTransition { from, to })
    }
}

/// Status a flight should be in once its progress reaches `progress`.
///
/// Returns `None` when `current` is not an in-flight status.
pub fn status_for_progress(current: RequestStatus, progress: u8) -> Option<RequestStatus> {
    use RequestStatus::*;

    match current {
        // A flight always passes through in_transit, even on a 100% step
        Dispatched if progress > 0 => Some(InTransit),
        Dispatched => Some(Dispatched),
        InTransit if progress >= PROGRESS_COMPLETE => Some(Delivered),
        InTransit => Some(InTransit),
        _ => None,
    }
}
