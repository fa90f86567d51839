use crate::steps::StepOrder;
use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::{
    collections::HashSet,
    fmt::Debug,
    fs,
    ops::{Bound::Excluded, RangeBounds},
    path::Path,
};

/// Analysis configuration parameters.
///
/// Loaded from a TOML file and validated before use.
/// See [`Config::from_file`] for loading.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Ordered process steps, the last one being the terminal step.
    pub steps: Vec<String>,

    /// Column names of the event table.
    pub columns: Columns,

    /// Hypothesis testing parameters.
    pub testing: Testing,
}

/// Column names used to read an event table.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Columns {
    /// Entity identifier column (`client_id`, `visitor_id`, `visit_id`, ...).
    pub entity: String,
    /// Process step column.
    pub step: String,
    /// Event timestamp column.
    pub timestamp: String,
    /// Experiment group column.
    pub group: String,
}

#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Testing {
    /// Significance threshold.
    pub alpha: f64,
    /// Minimum completion rate increase the test group must show over the control group.
    pub cost_threshold: f64,
}

pub const DEFAULT_STEPS: [&str; 5] = ["start", "step_1", "step_2", "step_3", "confirm"];

pub const DEFAULT_ALPHA: f64 = 0.05;

impl Default for Config {
    fn default() -> Self {
        Self {
            steps: DEFAULT_STEPS.iter().map(ToString::to_string).collect(),
            columns: Columns::default(),
            testing: Testing::default(),
        }
    }
}

impl Default for Columns {
    fn default() -> Self {
        Self {
            entity: "client_id".to_string(),
            step: "process_step".to_string(),
            timestamp: "date_time".to_string(),
            group: "variation".to_string(),
        }
    }
}

impl Default for Testing {
    fn default() -> Self {
        Self {
            alpha: DEFAULT_ALPHA,
            cost_threshold: 0.05,
        }
    }
}

impl Config {
    /// Load a [`Config`] from a file.
    ///
    /// The file must be TOML-encoded. Missing keys take their default values.
    /// Performs validation on all parameters before returning.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read, deserialized,
    /// or if the configuration values are invalid.
    pub fn from_file<P: AsRef<Path>>(file: P) -> Result<Self> {
        let file = file.as_ref();
        let contents =
            fs::read_to_string(file).with_context(|| format!("failed to read {file:?}"))?;
        Self::from_toml_str(&contents)
    }

    /// Parse and validate a [`Config`] from a TOML string.
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let config: Config = toml::from_str(contents).context("failed to deserialize config")?;

        config.validate().context("failed to validate config")?;

        Ok(config)
    }

    /// Build the [`StepOrder`] described by `steps`.
    pub fn step_order(&self) -> Result<StepOrder> {
        StepOrder::new(self.steps.iter().cloned())
    }

    fn validate(&self) -> Result<()> {
        check_steps(&self.steps).context("invalid steps")?;

        check_name(&self.columns.entity).context("invalid entity column")?;
        check_name(&self.columns.step).context("invalid step column")?;
        check_name(&self.columns.timestamp).context("invalid timestamp column")?;
        check_name(&self.columns.group).context("invalid group column")?;

        check_num(self.testing.alpha, (Excluded(0.0), Excluded(1.0)))
            .context("invalid significance threshold")?;
        check_num(self.testing.cost_threshold, 0.0..1.0).context("invalid cost threshold")?;

        Ok(())
    }
}

pub(crate) fn check_num<T, R>(num: T, range: R) -> Result<()>
where
    T: PartialOrd + Debug,
    R: RangeBounds<T> + Debug,
{
    if !range.contains(&num) {
        bail!("number must be in the range {range:?}, but is {num:?}");
    }
    Ok(())
}

fn check_name(name: &str) -> Result<()> {
    if name.trim().is_empty() {
        bail!("name must not be empty");
    }
    Ok(())
}

pub(crate) fn check_steps(steps: &[String]) -> Result<()> {
    check_num(steps.len(), 2..).context("invalid number of steps")?;
    let mut seen = HashSet::with_capacity(steps.len());
    for (i_step, step) in steps.iter().enumerate() {
        check_name(step).with_context(|| format!("invalid step {i_step}"))?;
        if !seen.insert(step.as_str()) {
            bail!("step {step:?} appears more than once");
        }
    }
    Ok(())
}
