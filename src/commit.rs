use crate::fence::ExtractedBlock;
use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_millis(2000);

/// The candidate block and the last block that reached the sink.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommitState {
    last_committed: Option<ExtractedBlock>,
    current: ExtractedBlock,
}

impl CommitState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> &ExtractedBlock {
        &self.current
    }

    pub fn last_committed(&self) -> Option<&ExtractedBlock> {
        self.last_committed.as_ref()
    }

    pub fn set_current(&mut self, block: ExtractedBlock) {
        self.current = block;
    }

    /// The block a tick would commit right now, without recording it.
    pub fn pending(&self) -> Option<&ExtractedBlock> {
        let changed = self.last_committed.as_ref() != Some(&self.current);
        (self.current.is_valid() && changed).then_some(&self.current)
    }

    pub fn mark_committed(&mut self, block: ExtractedBlock) {
        self.last_committed = Some(block);
    }
}

/// One sampling point of the committer: returns the block to forward, if any,
/// and records it as committed.
pub fn tick(state: &mut CommitState) -> Option<ExtractedBlock> {
    let block = state.pending()?.clone();
    state.mark_committed(block.clone());
    Some(block)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DebouncePolicy {
    pub interval: Duration,
    /// Commit a change immediately when nothing was committed within `interval`.
    pub leading: bool,
    /// Commit on every timer tick.
    pub trailing: bool,
}

impl Default for DebouncePolicy {
    fn default() -> Self {
        Self {
            interval: DEFAULT_TICK_INTERVAL,
            leading: false,
            trailing: true,
        }
    }
}

impl DebouncePolicy {
    pub fn validate(&self) -> Result<()> {
        if self.interval.is_zero() {
            bail!("debounce interval must be greater than zero");
        }
        if !self.leading && !self.trailing {
            bail!("debounce policy must enable the leading edge, the trailing edge, or both");
        }
        Ok(())
    }
}

/// Decides when the committer may run. Holds no block state of its own.
#[derive(Debug, Clone)]
pub struct Debouncer {
    policy: DebouncePolicy,
    last_fire: Option<Instant>,
}

impl Debouncer {
    pub fn new(policy: DebouncePolicy) -> Self {
        Self {
            policy,
            last_fire: None,
        }
    }

    pub fn policy(&self) -> DebouncePolicy {
        self.policy
    }

    pub fn fires_on_tick(&self) -> bool {
        self.policy.trailing
    }

    pub fn fires_on_change(&self, now: Instant) -> bool {
        self.policy.leading
            && self.last_fire.map_or(true, |at| {
                now.saturating_duration_since(at) >= self.policy.interval
            })
    }

    pub fn record_fire(&mut self, now: Instant) {
        self.last_fire = Some(now);
    }

    pub fn reset(&mut self) {
        self.last_fire = None;
    }
}
