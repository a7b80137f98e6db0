//! Readiness prober — bounded foreground wait for a reconciler's preconditions.
//!
//! A `Probe` is a single side-effect-free check. `ReadinessProber` polls a
//! set of probes under a `RetryPolicy` and reports `Ready` or `TimedOut`.
//! Timing out is not an error; it is the signal to hand off to the
//! background watcher.

pub mod preflight;
pub mod probes;

use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

use tracing::debug;

use crate::convergence::retry::RetryPolicy;

pub use preflight::{CatalogPreflight, Preflight};


/// Outcome of one probe: ready or not, and why.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadinessState {
    pub ready: bool,
    pub reason: String,
}

impl ReadinessState {
    pub fn ready(reason: impl Into<String>) -> Self {
        ReadinessState {
            ready: true,
            reason: reason.into(),
        }
    }

    pub fn not_ready(reason: impl Into<String>) -> Self {
        ReadinessState {
            ready: false,
            reason: reason.into(),
        }
    }
}


/// A single readiness check. Must not mutate anything; it may be called
/// any number of times.
pub trait Probe {
    fn name(&self) -> &str;

    fn probe(&self) -> ReadinessState;
}


/// Evaluate probes in order; the first one not ready decides the reason.
pub fn probe_all(probes: &[Box<dyn Probe>]) -> ReadinessState {
    for p in probes {
        let state = p.probe();
        if !state.ready {
            return ReadinessState::not_ready(format!("{}: {}", p.name(), state.reason));
        }
    }
    let names: Vec<&str> = probes.iter().map(|p| p.name()).collect();
    ReadinessState::ready(if names.is_empty() {
        "no preconditions".to_string()
    } else {
        names.join(", ")
    })
}


// ---------------------------------------------------------------------------
// Sleeping
// ---------------------------------------------------------------------------

/// Source of delays, swappable so tests never actually sleep.
pub trait Sleeper {
    fn sleep(&self, duration: Duration);
}

pub struct ThreadSleeper;

impl Sleeper for ThreadSleeper {
    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

impl<S: Sleeper + ?Sized> Sleeper for Rc<S> {
    fn sleep(&self, duration: Duration) {
        (**self).sleep(duration);
    }
}

/// Records requested delays and returns immediately.
#[derive(Default)]
pub struct RecordingSleeper {
    slept: RefCell<Vec<Duration>>,
}

impl RecordingSleeper {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn slept(&self) -> Vec<Duration> {
        self.slept.borrow().clone()
    }
}

impl Sleeper for RecordingSleeper {
    fn sleep(&self, duration: Duration) {
        self.slept.borrow_mut().push(duration);
    }
}


// ---------------------------------------------------------------------------
// ReadinessProber
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WaitOutcome {
    Ready { attempts: u32 },
    TimedOut { attempts: u32, last: ReadinessState },
}

pub struct ReadinessProber<'a> {
    probes: &'a [Box<dyn Probe>],
    sleeper: &'a dyn Sleeper,
}

impl<'a> ReadinessProber<'a> {
    pub fn new(probes: &'a [Box<dyn Probe>], sleeper: &'a dyn Sleeper) -> Self {
        ReadinessProber { probes, sleeper }
    }

    pub fn probe(&self) -> ReadinessState {
        probe_all(self.probes)
    }

    /// Probe up to `policy.max_attempts` times, sleeping `policy.delay(k)`
    /// after the k-th (0-based) failed attempt. No sleep follows the last.
    pub fn wait_until_ready(&self, policy: &RetryPolicy) -> WaitOutcome {
        let mut last = ReadinessState::not_ready("no attempts allowed");
        let mut attempts = 0;
        while policy.should_retry(attempts) {
            last = self.probe();
            attempts += 1;
            if last.ready {
                return WaitOutcome::Ready { attempts };
            }
            debug!(attempt = attempts, reason = %last.reason, "not ready yet");
            if policy.should_retry(attempts) {
                self.sleeper.sleep(policy.delay(attempts - 1));
            }
        }
        WaitOutcome::TimedOut { attempts, last }
    }
}


#[cfg(test)]
mod tests {
    use super::probes::ScriptedProbe;
    use super::*;
    use crate::types::config::BackoffStrategy;

    fn boxed(p: ScriptedProbe) -> Vec<Box<dyn Probe>> {
        vec![Box::new(p)]
    }

    #[test]
    fn ready_on_first_attempt_never_sleeps() {
        let probes = boxed(ScriptedProbe::always("net", true));
        let sleeper = RecordingSleeper::new();
        let policy = RetryPolicy::new(30, BackoffStrategy::Exponential, 2_000, 60_000);
        let out = ReadinessProber::new(&probes, &sleeper).wait_until_ready(&policy);
        assert_eq!(out, WaitOutcome::Ready { attempts: 1 });
        assert!(sleeper.slept().is_empty());
    }

    #[test]
    fn ready_after_some_attempts() {
        let probe = ScriptedProbe::new("session", vec![false, false, true]);
        let calls = probe.calls();
        let probes = boxed(probe);
        let sleeper = RecordingSleeper::new();
        let policy = RetryPolicy::new(12, BackoffStrategy::Fixed, 10_000, 10_000);
        let out = ReadinessProber::new(&probes, &sleeper).wait_until_ready(&policy);
        assert_eq!(out, WaitOutcome::Ready { attempts: 3 });
        assert_eq!(calls.get(), 3);
        assert_eq!(sleeper.slept(), vec![Duration::from_secs(10); 2]);
    }

    #[test]
    fn timeout_after_exactly_max_attempts_with_capped_doubling() {
        let probe = ScriptedProbe::always("net", false);
        let calls = probe.calls();
        let probes = boxed(probe);
        let sleeper = RecordingSleeper::new();
        let policy = RetryPolicy::new(8, BackoffStrategy::Exponential, 1_000, 10_000);
        let out = ReadinessProber::new(&probes, &sleeper).wait_until_ready(&policy);
        match out {
            WaitOutcome::TimedOut { attempts, last } => {
                assert_eq!(attempts, 8);
                assert!(!last.ready);
                assert!(last.reason.starts_with("net:"));
            }
            other => panic!("expected timeout, got {:?}", other),
        }
        assert_eq!(calls.get(), 8);
        let ms: Vec<u128> = sleeper.slept().iter().map(|d| d.as_millis()).collect();
        // Delay between attempt k and k+1 is min(base * 2^(k-1), cap).
        assert_eq!(ms, vec![1_000, 2_000, 4_000, 8_000, 10_000, 10_000, 10_000]);
    }

    #[test]
    fn zero_attempts_times_out_without_probing() {
        let probe = ScriptedProbe::always("net", true);
        let calls = probe.calls();
        let probes = boxed(probe);
        let sleeper = RecordingSleeper::new();
        let policy = RetryPolicy::new(0, BackoffStrategy::Fixed, 1, 1);
        let out = ReadinessProber::new(&probes, &sleeper).wait_until_ready(&policy);
        assert!(matches!(out, WaitOutcome::TimedOut { attempts: 0, .. }));
        assert_eq!(calls.get(), 0);
    }

    #[test]
    fn probe_all_reports_first_failure() {
        let probes: Vec<Box<dyn Probe>> = vec![
            Box::new(ScriptedProbe::always("session", true)),
            Box::new(ScriptedProbe::always("settings", false)),
            Box::new(ScriptedProbe::always("net", false)),
        ];
        let state = probe_all(&probes);
        assert!(!state.ready);
        assert!(state.reason.starts_with("settings:"));
        assert!(probe_all(&[]).ready);
    }
}
