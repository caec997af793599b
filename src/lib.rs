// smol-loop: minimal no_std cooperative scheduler for single-main-loop firmware.
// clock:     monotonic millisecond Clock trait + ISR-fed TickClock
// action:    scheduled work units (timeout, interval, deferred)
// scheduler: pending-action queue and the per-iteration pump pass

#![no_std]

extern crate alloc;

mod action;
pub mod clock;
pub mod scheduler;

pub use clock::{Clock, Millis, TickClock};
pub use scheduler::Scheduler;
