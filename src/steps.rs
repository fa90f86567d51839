//! Ordered process steps.

use crate::config::{DEFAULT_STEPS, check_steps};
use anyhow::{Context, Result, bail};
use std::collections::HashMap;

/// Fixed total order of named process steps.
///
/// Each step is ranked by its position. The last step is the terminal one:
/// reaching it through a valid transition marks an entity as confirmed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepOrder {
    names: Vec<String>,
    ranks: HashMap<String, usize>,
}

impl StepOrder {
    /// Create a step order from names listed first to last.
    ///
    /// # Errors
    /// Returns an error if fewer than two steps are given
    /// or if a name is empty or repeated.
    pub fn new<I, S>(names: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let names: Vec<String> = names.into_iter().map(Into::into).collect();
        check_steps(&names).context("invalid step order")?;
        Ok(Self::from_checked(names))
    }

    fn from_checked(names: Vec<String>) -> Self {
        let ranks = names
            .iter()
            .enumerate()
            .map(|(rank, name)| (name.clone(), rank))
            .collect();
        Self { names, ranks }
    }

    /// Get the rank of a step.
    ///
    /// # Errors
    /// Returns an error if the step is not part of the order.
    pub fn rank(&self, step: &str) -> Result<usize> {
        match self.ranks.get(step) {
            Some(&rank) => Ok(rank),
            None => bail!("unknown step {step:?}, expected one of {:?}", self.names),
        }
    }

    /// Check whether moving from `previous` to `current` is a valid transition,
    /// that is whether `current` is exactly the step following `previous`.
    ///
    /// Repeating a step, skipping steps or going back are all invalid.
    ///
    /// # Errors
    /// Returns an error if either step is unknown. Malformed input is never
    /// reported as an invalid transition.
    pub fn is_valid_transition(&self, current: &str, previous: &str) -> Result<bool> {
        let current_rank = self.rank(current).context("invalid current step")?;
        let previous_rank = self.rank(previous).context("invalid previous step")?;
        Ok(current_rank == previous_rank + 1)
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn terminal(&self) -> &str {
        // Construction guarantees at least two steps.
        &self.names[self.names.len() - 1]
    }

    pub fn is_terminal(&self, step: &str) -> bool {
        step == self.terminal()
    }

    /// Steps that can be departed through a valid transition, in order.
    pub fn non_terminal(&self) -> &[String] {
        &self.names[..self.names.len() - 1]
    }
}

impl Default for StepOrder {
    fn default() -> Self {
        Self::from_checked(DEFAULT_STEPS.iter().map(ToString::to_string).collect())
    }
}
