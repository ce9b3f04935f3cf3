//! Eventual-consistency poller.
//!
//! The directory is replicated; a write may not be visible to the next read
//! if that read lands on another replica, and a single read can flip back.
//! [`poll_until`] therefore requires the target state to be observed several
//! times in a row before it reports success.

use crate::config::PollConfig;
use crate::context::OperationContext;
use std::fmt;
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

/// What a probe saw.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Observation {
    Absent,
    Present,
}

impl fmt::Display for Observation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Absent => "absent",
            Self::Present => "present",
        })
    }
}

/// State of one poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollState {
    /// Target not yet observed often enough.
    Pending { streak: u32 },
    /// Target observed `consecutive_target` times in a row.
    Done,
}

/// Terminal failure of a poll.
#[derive(Debug)]
pub enum PollError<E> {
    /// The probe failed; the error is returned untouched.
    Probe(E),
    /// The deadline passed before the target state settled.
    Timeout { waited: Duration, attempts: u32 },
}

/// Hysteresis state machine: counts consecutive target observations.
#[derive(Debug, Clone)]
pub struct ConsistencyPoll {
    target: Observation,
    consecutive_target: u32,
    state: PollState,
    attempts: u32,
}

impl ConsistencyPoll {
    /// Creates a poll waiting for `target` to be seen
    /// `consecutive_target` times in a row (at least once).
    #[must_use]
    pub fn new(target: Observation, consecutive_target: u32) -> Self {
        Self {
            target,
            consecutive_target: consecutive_target.max(1),
            state: PollState::Pending { streak: 0 },
            attempts: 0,
        }
    }

    /// Records an observation and returns the new state.
    pub fn observe(&mut self, observation: Observation) -> PollState {
        self.attempts += 1;
        self.state = match self.state {
            PollState::Done => PollState::Done,
            PollState::Pending { streak } if observation == self.target => {
                if streak + 1 >= self.consecutive_target {
                    PollState::Done
                } else {
                    PollState::Pending { streak: streak + 1 }
                }
            }
            PollState::Pending { .. } => PollState::Pending { streak: 0 },
        };
        self.state
    }

    /// Number of observations recorded.
    #[must_use]
    pub fn attempts(&self) -> u32 {
        self.attempts
    }
}

/// Calls `probe` until it reports `target` `config.consecutive_target` times
/// in a row, waiting at least `config.interval()` between calls.
///
/// Returns [`PollError::Probe`] as soon as the probe fails and
/// [`PollError::Timeout`] once the context's deadline passes; a probe call in
/// flight at the deadline is abandoned.
pub async fn poll_until<F, Fut, E>(
    ctx: &OperationContext,
    config: &PollConfig,
    target: Observation,
    mut probe: F,
) -> Result<(), PollError<E>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Observation, E>>,
{
    let started = Instant::now();
    let interval = config.interval();
    let mut poll = ConsistencyPoll::new(target, config.consecutive_target);

    let timeout = |poll: &ConsistencyPoll| PollError::Timeout {
        waited: started.elapsed(),
        attempts: poll.attempts(),
    };

    loop {
        if ctx.is_expired() {
            return Err(timeout(&poll));
        }

        let observation = match ctx.run(probe()).await {
            Some(Ok(observation)) => observation,
            Some(Err(e)) => return Err(PollError::Probe(e)),
            None => return Err(timeout(&poll)),
        };

        match poll.observe(observation) {
            PollState::Done => {
                debug!(
                    "Observed {} {} times after {} attempts",
                    target,
                    config.consecutive_target,
                    poll.attempts()
                );
                return Ok(());
            }
            PollState::Pending { streak } => {
                debug!(
                    "Waiting for {}: observed {} (streak {}/{})",
                    target, observation, streak, config.consecutive_target
                );
            }
        }

        let wake = (Instant::now() + interval).min(ctx.deadline());
        tokio::time::sleep_until(wake).await;
    }
}
