//! Admission control for outbound work.
//!
//! - [`Gate`]: counting semaphore with a FIFO wait-list. Permits are RAII
//!   guards, so a slot is released on every exit path including panics
//!   and cancelled futures.
//! - [`RateLimiter`]: immediate-reject budget over a one-second window and
//!   a monotonic billing-period counter.

pub mod gate;
pub mod rate;

pub use gate::{Gate, GatePermit};
pub use rate::{RateLimitError, RateLimiter, Window};
