//! Funnel KPIs for Test/Control experiments.
//!
//! An event table records, for each tracked entity, the process steps it
//! visited and when. [`analysis::summarize`] rebuilds each entity's trace,
//! counts invalid step transitions, measures the time spent in each step and
//! rolls everything up into a [`GroupSummary`]. The [`hypothesis`] module
//! compares the resulting metrics between groups.

pub mod analysis;
pub mod config;
pub mod entity;
pub mod event;
pub mod hypothesis;
pub mod stats;
pub mod steps;
pub mod trace;

pub use analysis::{GroupSummary, Rollup, StepMean, summarize, summarize_by_group};
pub use config::Config;
pub use entity::EntitySummary;
pub use event::{Event, EventLog};
pub use steps::StepOrder;
pub use trace::{Trace, Transition};
