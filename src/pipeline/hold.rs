//! Reentrant pause for outbound dispatch.

use std::sync::{
    Arc,
    atomic::{AtomicIsize, Ordering},
};

/// Cloneable handle on the controller's signed hold counter.
///
/// Every [`hold`](Self::hold) must be paired with a
/// [`release`](Self::release). Dispatch is suspended while the net count is
/// positive; the controller's byte budget still forces frames out when
/// exceeded. Releasing does not dispatch by itself: the next
/// [`Controller::next_frame`](crate::pipeline::Controller::next_frame) or
/// [`Controller::flush`](crate::pipeline::Controller::flush) does.
///
/// ```
/// use flowframe::pipeline::HoldHandle;
///
/// let hold = HoldHandle::default();
/// hold.hold();
/// hold.hold();
/// hold.release();
/// assert!(hold.is_held());
/// hold.release();
/// assert!(!hold.is_held());
/// ```
#[derive(Clone, Debug, Default)]
pub struct HoldHandle(Arc<AtomicIsize>);

impl HoldHandle {
    /// Increment the counter and return the new value.
    pub fn hold(&self) -> isize { self.0.fetch_add(1, Ordering::AcqRel) + 1 }

    /// Decrement the counter and return the new value.
    pub fn release(&self) -> isize { self.0.fetch_sub(1, Ordering::AcqRel) - 1 }

    /// Current net count.
    #[must_use]
    pub fn count(&self) -> isize { self.0.load(Ordering::Acquire) }

    /// Whether dispatch is suspended.
    #[must_use]
    pub fn is_held(&self) -> bool { self.count() > 0 }
}
