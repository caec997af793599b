// Units of deferred work held by the scheduler queue.
// NOTE: Each action is evaluated at most once per pump pass: it checks
// the clock, maybe invokes its callback, and reports its outcome.

use alloc::boxed::Box;
use core::fmt;

use crate::clock::Millis;

// Send so a scheduler parked in a static stays Sync
pub(crate) type Callback = Box<dyn FnMut() + Send>;

/// Verdict from one evaluation of an action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Outcome {
    /// Finished, drop the action.
    Done,
    /// Not yet, retry next pass.
    Pending,
}

pub(crate) enum Action {
    // one-shot: fires once the deadline passes, then done
    Timeout { deadline: Millis, cb: Callback },
    // repeating: fires at most once per pass, never done
    Interval {
        period: Millis,
        deadline: Millis,
        cb: Callback,
    },
    // fires on the first pass that evaluates it
    Deferred { cb: Callback },
}

impl Action {
    pub(crate) fn run(&mut self, now: Millis) -> Outcome {
        match self {
            Action::Timeout { deadline, cb } => {
                if now >= *deadline {
                    cb();
                    Outcome::Done
                } else {
                    Outcome::Pending
                }
            }
            Action::Interval {
                period,
                deadline,
                cb,
            } => {
                if now >= *deadline {
                    // Advance by one period, not to now + period: a late
                    // pump drains its backlog one fire per pass, and the
                    // firing grid stays anchored to the registration
                    // instant instead of drifting with pump jitter.
                    *deadline = deadline.wrapping_add(*period);
                    cb();
                }
                Outcome::Pending
            }
            Action::Deferred { cb } => {
                cb();
                Outcome::Done
            }
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::Timeout { deadline, .. } => write!(f, "Timeout(deadline={}ms)", deadline),
            Action::Interval {
                period, deadline, ..
            } => write!(f, "Interval(period={}ms, next={}ms)", period, deadline),
            Action::Deferred { .. } => write!(f, "Deferred"),
        }
    }
}
