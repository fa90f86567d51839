//! Per-entity step timing and error counting.

use crate::steps::StepOrder;
use crate::trace::Trace;
use anyhow::{Context, Result};
use chrono::TimeDelta;
use std::collections::HashMap;

/// Outcome of replaying one entity's trace against the step order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntitySummary {
    pub entity_id: String,
    /// Number of invalid transitions.
    pub error_count: usize,
    /// Number of valid transitions.
    pub n_valid: usize,
    /// Time spent in each step, summed over the valid transitions departing it.
    /// Steps never validly departed are absent.
    pub durations: HashMap<String, TimeDelta>,
    /// Whether a valid transition ever reached the terminal step.
    pub confirmed: bool,
    /// Number of events in the trace.
    pub n_events: usize,
}

impl EntitySummary {
    /// Replay a trace, pair by pair.
    ///
    /// An invalid transition only increments the error count and its elapsed
    /// time is discarded. A valid transition adds its elapsed time to the step
    /// being departed.
    ///
    /// # Errors
    /// Returns an error if the trace contains a step outside `steps`.
    pub fn from_trace(
        entity_id: impl Into<String>,
        trace: &Trace,
        steps: &StepOrder,
    ) -> Result<Self> {
        let mut summary = Self {
            entity_id: entity_id.into(),
            error_count: 0,
            n_valid: 0,
            durations: HashMap::new(),
            confirmed: false,
            n_events: trace.len(),
        };

        for (i_trans, trans) in trace.transitions().enumerate() {
            let valid = steps
                .is_valid_transition(trans.to, trans.from)
                .with_context(|| {
                    format!(
                        "invalid transition {i_trans} of entity {:?}",
                        summary.entity_id
                    )
                })?;
            if !valid {
                summary.error_count += 1;
                continue;
            }

            summary.n_valid += 1;
            *summary
                .durations
                .entry(trans.from.to_string())
                .or_insert(TimeDelta::zero()) += trans.elapsed;

            if steps.is_terminal(trans.to) {
                summary.confirmed = true;
            }
        }

        Ok(summary)
    }

    pub fn duration(&self, step: &str) -> Option<TimeDelta> {
        self.durations.get(step).copied()
    }

    pub fn n_transitions(&self) -> usize {
        self.n_events.saturating_sub(1)
    }
}
