use crate::entity::EntitySummary;
use crate::event::{Event, EventLog};
use crate::stats::DurationMean;
use crate::steps::StepOrder;
use crate::trace::Trace;
use anyhow::{Context, Result, bail};
use chrono::TimeDelta;
use serde::{Serialize, Serializer, ser::SerializeMap};
use std::collections::BTreeMap;

/// Funnel KPIs of one experiment group.
#[derive(Debug, Clone, PartialEq)]
pub struct GroupSummary {
    pub group: String,
    /// Number of entities that validly reached the terminal step.
    pub confirm_count: usize,
    /// Number of distinct entities.
    pub total_size: usize,
    /// `confirm_count / total_size`.
    pub completion_rate: f64,
    /// Mean time spent in each non-terminal step, in step order.
    pub step_means: Vec<StepMean>,
    /// Invalid transitions over event rows.
    pub error_rate: f64,
}

/// Mean time spent in a step by the entities that spent any time in it,
/// rounded to the nearest whole second.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepMean {
    pub step: String,
    /// `None` if no entity ever validly departed the step.
    pub mean: Option<TimeDelta>,
}

impl GroupSummary {
    pub fn step_mean(&self, step: &str) -> Option<TimeDelta> {
        self.step_means
            .iter()
            .find(|step_mean| step_mean.step == step)
            .and_then(|step_mean| step_mean.mean)
    }
}

/// Flat record: `group`, `confirm_count`, `total_size`, `completion_rate`,
/// one `<step>_mean` in whole seconds per non-terminal step, `error_rate`.
impl Serialize for GroupSummary {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(5 + self.step_means.len()))?;
        map.serialize_entry("group", &self.group)?;
        map.serialize_entry("confirm_count", &self.confirm_count)?;
        map.serialize_entry("total_size", &self.total_size)?;
        map.serialize_entry("completion_rate", &self.completion_rate)?;
        for step_mean in &self.step_means {
            let secs = step_mean.mean.map(|mean| mean.num_seconds());
            map.serialize_entry(&format!("{}_mean", step_mean.step), &secs)?;
        }
        map.serialize_entry("error_rate", &self.error_rate)?;
        map.end()
    }
}

/// Mergeable accumulator of entity summaries.
///
/// Entities can be added in any order and partial rollups merged in any
/// order with the same final result.
#[derive(Debug, Clone)]
pub struct Rollup {
    steps: StepOrder,
    total_size: usize,
    confirm_count: usize,
    error_count: usize,
    n_events: usize,
    step_means: Vec<DurationMean>,
}

impl Rollup {
    pub fn new(steps: &StepOrder) -> Self {
        Self {
            steps: steps.clone(),
            total_size: 0,
            confirm_count: 0,
            error_count: 0,
            n_events: 0,
            step_means: vec![DurationMean::new(); steps.non_terminal().len()],
        }
    }

    pub fn add(&mut self, entity: &EntitySummary) {
        self.total_size += 1;
        self.confirm_count += usize::from(entity.confirmed);
        self.error_count += entity.error_count;
        self.n_events += entity.n_events;
        for (step, mean) in self.steps.non_terminal().iter().zip(&mut self.step_means) {
            if let Some(duration) = entity.duration(step) {
                mean.add(duration);
            }
        }
    }

    /// # Errors
    /// Returns an error if the rollups were built with different step orders.
    pub fn merge(&mut self, other: &Self) -> Result<()> {
        if self.steps != other.steps {
            bail!("cannot merge rollups of different step orders");
        }
        self.total_size += other.total_size;
        self.confirm_count += other.confirm_count;
        self.error_count += other.error_count;
        self.n_events += other.n_events;
        for (mean, other_mean) in self.step_means.iter_mut().zip(&other.step_means) {
            mean.merge(other_mean);
        }
        Ok(())
    }

    pub fn total_size(&self) -> usize {
        self.total_size
    }

    /// Compute the group KPIs.
    ///
    /// The error rate divides the invalid transitions by the number of event
    /// rows, not by the number of transitions.
    ///
    /// # Errors
    /// Returns an error if no entity was added, since the completion rate
    /// would divide by zero.
    pub fn finish(&self, group: impl Into<String>) -> Result<GroupSummary> {
        if self.total_size == 0 {
            bail!("division by zero: cannot compute the completion rate of an empty group");
        }

        let step_means = self
            .steps
            .non_terminal()
            .iter()
            .zip(&self.step_means)
            .map(|(step, mean)| StepMean {
                step: step.clone(),
                mean: mean.rounded_mean(),
            })
            .collect();

        Ok(GroupSummary {
            group: group.into(),
            confirm_count: self.confirm_count,
            total_size: self.total_size,
            completion_rate: self.confirm_count as f64 / self.total_size as f64,
            step_means,
            error_rate: self.error_count as f64 / self.n_events as f64,
        })
    }
}

/// Group events by entity, keeping input order within each entity.
pub fn partition_by_entity(events: &[Event]) -> BTreeMap<&str, Vec<&Event>> {
    let mut entities: BTreeMap<&str, Vec<&Event>> = BTreeMap::new();
    for event in events {
        entities.entry(&event.entity_id).or_default().push(event);
    }
    entities
}

/// Summarize the events of one group.
///
/// The group label is read from the first event. Callers are expected to
/// pass the rows of a single group; rows with another label are still
/// counted, with a warning.
///
/// # Errors
/// Returns an error if `events` is empty or contains an unknown step.
pub fn summarize(events: &[Event], steps: &StepOrder) -> Result<GroupSummary> {
    let Some(first) = events.first() else {
        bail!("division by zero: cannot summarize an empty event table");
    };
    let group = first.group.as_str();
    if let Some(other) = events.iter().find(|event| event.group != group) {
        log::warn!(
            "event table mixes groups {group:?} and {:?}, summarizing all rows as {group:?}",
            other.group
        );
    }

    let mut rollup = Rollup::new(steps);
    for (entity_id, entity_events) in partition_by_entity(events) {
        let trace = Trace::new(entity_events);
        let entity = EntitySummary::from_trace(entity_id, &trace, steps)
            .with_context(|| format!("failed to summarize entity {entity_id:?}"))?;
        log::debug!("{entity:?}");
        rollup.add(&entity);
    }

    let summary = rollup.finish(group)?;
    log::info!(
        "group {:?}: {}/{} confirmed (completion rate {:.4}), error rate {:.4}",
        summary.group,
        summary.confirm_count,
        summary.total_size,
        summary.completion_rate,
        summary.error_rate
    );
    Ok(summary)
}

/// Summarize each group of a mixed event table, in order of first appearance.
pub fn summarize_by_group(events: &EventLog, steps: &StepOrder) -> Result<Vec<GroupSummary>> {
    events
        .groups()
        .into_iter()
        .map(|group| {
            summarize(events.filter_group(group).events(), steps)
                .with_context(|| format!("failed to summarize group {group:?}"))
        })
        .collect()
}
