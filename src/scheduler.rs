// Pending-action queue and the per-iteration pump pass.
//
// One Scheduler per firmware image, const-constructed and parked in a
// static next to its clock. The main loop calls pump() once per
// iteration; ISRs and callbacks may register new work at any time.
// Every queue touch is a short critical section, never held while a
// user callback runs.
//
// Pump re-entrancy: a pass first swaps the entire shared queue into a
// local working list. Work registered while the pass runs (by a
// callback, an ISR, or a nested pump()) lands in the now-empty shared
// queue and is not evaluated until the next pass. A nested pump()
// from inside a callback therefore only ever sees that new work,
// never the outer pass's claimed actions.

use alloc::boxed::Box;
use alloc::collections::VecDeque;
use core::cell::RefCell;
use core::mem;

use critical_section::Mutex;
use log::trace;

use crate::action::{Action, Outcome};
use crate::clock::{Clock, Millis};

pub struct Scheduler<'a> {
    clock: &'a dyn Clock,
    pending: Mutex<RefCell<VecDeque<Action>>>,
}

impl<'a> Scheduler<'a> {
    /// Create an empty scheduler reading time from `clock`.
    ///
    /// Const so the single instance can live in a `static`:
    ///
    /// ```
    /// use smol_loop::{Scheduler, TickClock};
    ///
    /// static CLOCK: TickClock = TickClock::new();
    /// static SCHED: Scheduler = Scheduler::new(&CLOCK);
    /// ```
    pub const fn new(clock: &'a dyn Clock) -> Self {
        Self {
            clock,
            pending: Mutex::new(RefCell::new(VecDeque::new())),
        }
    }

    /// Run `cb` once, no earlier than `delay_ms` from now.
    ///
    /// The deadline is fixed at registration time. How much later the
    /// callback actually runs depends on how often the host pumps:
    /// the delay is a lower bound, not a precision guarantee.
    pub fn after<F>(&self, delay_ms: Millis, cb: F)
    where
        F: FnMut() + Send + 'static,
    {
        let deadline = self.clock.now_ms().wrapping_add(delay_ms);
        self.push(Action::Timeout {
            deadline,
            cb: Box::new(cb),
        });
    }

    /// Run `cb` every `period_ms`, forever.
    ///
    /// The firing grid is anchored to the registration instant: each
    /// fire advances the deadline by exactly one period, so pump-call
    /// jitter does not accumulate as drift. If pumping stalls for
    /// several periods, the backlog drains at one fire per pass.
    ///
    /// There is no way to stop a registered interval.
    pub fn every<F>(&self, period_ms: Millis, cb: F)
    where
        F: FnMut() + Send + 'static,
    {
        let deadline = self.clock.now_ms().wrapping_add(period_ms);
        self.push(Action::Interval {
            period: period_ms,
            deadline,
            cb: Box::new(cb),
        });
    }

    /// Run `cb` once on the next pump pass.
    ///
    /// Never the current pass, even when called from inside a pumped
    /// callback. This is the cooperative way to yield back to the
    /// main loop before running continuation work.
    pub fn defer<F>(&self, cb: F)
    where
        F: FnMut() + Send + 'static,
    {
        self.push(Action::Deferred { cb: Box::new(cb) });
    }

    /// Evaluate one pass over the actions pending when the call began.
    ///
    /// Call from the main loop, once per iteration. Each claimed
    /// action is evaluated exactly once; finished actions are dropped,
    /// the rest are retried next pass. Callback panics are not caught
    /// here; they unwind (or abort) per the host's panic convention.
    pub fn pump(&self) {
        // Claim everything pending as of this instant. The shared
        // queue is left empty, so same-pass registrations wait for the
        // next pass and a nested pump sees only them.
        let mut work =
            critical_section::with(|cs| mem::take(&mut *self.pending.borrow_ref_mut(cs)));

        work.retain_mut(|action| {
            let now = self.clock.now_ms();
            match action.run(now) {
                Outcome::Done => {
                    trace!("sched: retired {}", action);
                    false
                }
                Outcome::Pending => true,
            }
        });

        // Survivors go back in front of anything registered during the
        // pass, keeping the order they were claimed in.
        critical_section::with(|cs| {
            let mut pending = self.pending.borrow_ref_mut(cs);
            while let Some(action) = work.pop_back() {
                pending.push_front(action);
            }
        });
    }

    /// Number of queued actions (registered intervals never leave).
    pub fn pending(&self) -> usize {
        critical_section::with(|cs| self.pending.borrow_ref(cs).len())
    }

    pub fn is_empty(&self) -> bool {
        self.pending() == 0
    }

    fn push(&self, action: Action) {
        trace!("sched: queued {}", action);
        critical_section::with(|cs| self.pending.borrow_ref_mut(cs).push_back(action));
    }
}

#[cfg(test)]
mod tests {
    use alloc::sync::Arc;
    use core::sync::atomic::{AtomicU32, Ordering};

    use super::*;
    use crate::clock::TickClock;

    #[test]
    fn registration_appends_without_running() {
        let clock = TickClock::new();
        let sched = Scheduler::new(&clock);
        let fired = Arc::new(AtomicU32::new(0));

        let f = fired.clone();
        sched.after(0, move || {
            f.fetch_add(1, Ordering::Relaxed);
        });
        let f = fired.clone();
        sched.every(10, move || {
            f.fetch_add(1, Ordering::Relaxed);
        });
        let f = fired.clone();
        sched.defer(move || {
            f.fetch_add(1, Ordering::Relaxed);
        });

        assert_eq!(sched.pending(), 3);
        assert_eq!(fired.load(Ordering::Relaxed), 0);
    }

    #[test]
    fn pump_drops_finished_and_keeps_unfinished() {
        let clock = TickClock::new();
        let sched = Scheduler::new(&clock);

        sched.defer(|| {});
        sched.after(1000, || {});
        assert_eq!(sched.pending(), 2);

        // deferred retires, the not-yet-due timeout survives
        sched.pump();
        assert_eq!(sched.pending(), 1);

        clock.advance(1000);
        sched.pump();
        assert!(sched.is_empty());
    }

    #[test]
    fn pump_on_empty_queue_is_a_noop() {
        let clock = TickClock::new();
        let sched = Scheduler::new(&clock);

        sched.pump();
        assert!(sched.is_empty());
    }
}
