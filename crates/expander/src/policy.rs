//! Stall and retry policy for a single installation phase.
//!
//! The sequencer feeds every classified poll result through
//! [`StallPolicy::decide`]. The policy owns no I/O; it only reads and updates
//! the [`PhaseProgress`] of the current phase.

use crate::phase::PollStatus;

/// Default number of consecutive non-completed polls before a phase stalls.
pub const DEFAULT_MAX_STALLS: u32 = 5;

/// Per-phase progress tracked across polls.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PhaseProgress {
    /// Consecutive polls that did not report completion.
    pub stall_count: u32,
    /// Whether the single retry for this stall episode has been spent.
    pub retry_used: bool,
}

impl PhaseProgress {
    /// Forget everything observed for the phase.
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// What the sequencer should do after a poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Phase finished: advance, or finish the run on the last phase.
    Proceed,
    /// Still running within bounds: sleep and poll again.
    Wait,
    /// Re-issue the current phase's commands, then poll again.
    Retry,
    /// Phase made no progress within the bound.
    Stalled,
    /// Phase reported an error again after its retry.
    RetryExhausted,
}

/// Bounded stall detection with one retry per stall episode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StallPolicy {
    /// Consecutive `Running` polls tolerated before the phase is stalled.
    pub max_stalls: u32,
}

impl Default for StallPolicy {
    fn default() -> Self {
        Self {
            max_stalls: DEFAULT_MAX_STALLS,
        }
    }
}

impl StallPolicy {
    /// Create a policy with a custom stall bound.
    #[must_use]
    pub fn new(max_stalls: u32) -> Self {
        Self { max_stalls }
    }

    /// Decide the next step for a poll result and update `progress`.
    ///
    /// Once the retry is spent, the very next poll must report completion;
    /// anything else ends the phase.
    #[must_use]
    pub fn decide(&self, progress: &mut PhaseProgress, status: PollStatus) -> Decision {
        match status {
            PollStatus::Completed => {
                progress.reset();
                Decision::Proceed
            }
            PollStatus::Running => {
                progress.stall_count += 1;
                if progress.retry_used || progress.stall_count >= self.max_stalls {
                    Decision::Stalled
                } else {
                    Decision::Wait
                }
            }
            PollStatus::Other => {
                if progress.retry_used || progress.stall_count >= self.max_stalls {
                    return Decision::RetryExhausted;
                }
                progress.stall_count += 1;
                progress.retry_used = true;
                Decision::Retry
            }
        }
    }
}
