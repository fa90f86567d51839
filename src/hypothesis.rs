//! Test/Control comparisons.
//!
//! Each test returns its statistic and p-value along with a verdict against
//! a significance threshold, and logs that verdict.

use crate::analysis::GroupSummary;
use crate::stats::{Accumulator, finite};
use anyhow::{Context, Result, bail};
use rand::{Rng, seq::SliceRandom};
use statrs::distribution::{ContinuousCDF, FisherSnedecor, Normal, StudentsT};
use std::fmt;

/// Alternative hypothesis, stated for the test group relative to the control group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Alternative {
    #[default]
    TwoSided,
    Greater,
    Less,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TestOutcome {
    pub statistic: f64,
    pub p_value: f64,
    pub reject_null: bool,
    /// Human-readable verdict.
    pub message: String,
}

impl fmt::Display for TestOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "statistic = {}, p_value = {}: {}",
            self.statistic, self.p_value, self.message
        )
    }
}

impl TestOutcome {
    fn new(statistic: f64, p_value: f64, reject_null: bool, message: String) -> Self {
        let outcome = Self {
            statistic,
            p_value,
            reject_null,
            message,
        };
        log::info!("{outcome}");
        outcome
    }
}

fn tail_p_value<D: ContinuousCDF<f64, f64>>(dist: &D, statistic: f64, alt: Alternative) -> f64 {
    match alt {
        Alternative::TwoSided => (2.0 * dist.sf(statistic.abs())).min(1.0),
        Alternative::Greater => dist.sf(statistic),
        Alternative::Less => dist.cdf(statistic),
    }
}

/// Welch's two-sample t-test (unequal variances) on the means of two samples.
///
/// Missing (NaN) values are dropped first. For one-sided alternatives the
/// null hypothesis is rejected only if the statistic has the matching sign.
///
/// # Errors
/// Returns an error if a sample has fewer than two values or if both
/// samples have zero variance.
pub fn welch_t_test(
    test: &[f64],
    control: &[f64],
    alt: Alternative,
    alpha: f64,
    subject: &str,
) -> Result<TestOutcome> {
    let test = finite(test).into_iter().collect::<Accumulator>().report();
    let control = finite(control).into_iter().collect::<Accumulator>().report();
    if test.n_vals < 2 || control.n_vals < 2 {
        bail!(
            "each sample needs at least two values, got {} and {}",
            test.n_vals,
            control.n_vals
        );
    }

    let var_a = test.var / test.n_vals as f64;
    let var_b = control.var / control.n_vals as f64;
    let std_err = (var_a + var_b).sqrt();
    if std_err == 0.0 {
        bail!("samples have zero variance");
    }
    let statistic = (test.mean - control.mean) / std_err;
    let dof = (var_a + var_b).powi(2)
        / (var_a.powi(2) / (test.n_vals as f64 - 1.0)
            + var_b.powi(2) / (control.n_vals as f64 - 1.0));

    let dist = StudentsT::new(0.0, 1.0, dof).context("failed to build t distribution")?;
    let p_value = tail_p_value(&dist, statistic, alt);

    let (cond, cond_msg) = match alt {
        Alternative::TwoSided => (
            true,
            format!("the average {subject} across the test/control groups isn't the same"),
        ),
        Alternative::Greater => (
            statistic > 0.0,
            format!("the average {subject} in the test group is greater than in the control group"),
        ),
        Alternative::Less => (
            statistic < 0.0,
            format!("the average {subject} in the test group is less than in the control group"),
        ),
    };
    let reject_null = p_value < alpha && cond;
    let message = if reject_null {
        format!("reject the null hypothesis: {cond_msg}")
    } else {
        format!(
            "fail to reject: the average {subject} across the test/control groups is probably the same"
        )
    };

    Ok(TestOutcome::new(statistic, p_value, reject_null, message))
}

/// Pooled two-proportion z statistic, NaN when the pooled proportion leaves
/// no variance.
fn pooled_z(successes: [f64; 2], trials: [usize; 2]) -> f64 {
    let [n_a, n_b] = trials.map(|n| n as f64);
    let [s_a, s_b] = successes;
    let pooled = (s_a + s_b) / (n_a + n_b);
    let var = pooled * (1.0 - pooled) * (1.0 / n_a + 1.0 / n_b);
    if var <= 0.0 {
        return f64::NAN;
    }
    (s_a / n_a - s_b / n_b) / var.sqrt()
}

fn check_trials(trials: [usize; 2]) -> Result<()> {
    if trials.contains(&0) {
        bail!("each group needs at least one trial, got {trials:?}");
    }
    Ok(())
}

fn z_statistic(successes: [f64; 2], trials: [usize; 2]) -> Result<f64> {
    check_trials(trials)?;
    let [n_a, n_b] = trials.map(|n| n as f64);
    let [s_a, s_b] = successes;
    if s_a < 0.0 || s_b < 0.0 || s_a > n_a || s_b > n_b {
        bail!("successes {successes:?} must lie between 0 and trials {trials:?}");
    }

    let statistic = pooled_z(successes, trials);
    if statistic.is_nan() {
        bail!("pooled proportion leaves no variance to test against");
    }
    Ok(statistic)
}

/// Two-proportion z-test with pooled variance.
///
/// `successes` and `trials` are given as `[test, control]`.
///
/// # Errors
/// Returns an error if a group has no trials, if successes exceed trials,
/// or if the pooled proportion is 0 or 1.
pub fn proportions_z_test(
    successes: [f64; 2],
    trials: [usize; 2],
    alt: Alternative,
    alpha: f64,
) -> Result<TestOutcome> {
    let statistic = z_statistic(successes, trials)?;
    let p_value = tail_p_value(&Normal::standard(), statistic, alt);

    let reject_null = p_value < alpha;
    let message = if reject_null {
        let relation = match alt {
            Alternative::TwoSided => "differs from",
            Alternative::Greater => "is greater than",
            Alternative::Less => "is less than",
        };
        format!(
            "reject the null hypothesis: the completion rate of the test group {relation} the control group's"
        )
    } else {
        "fail to reject: there is no significant difference in completion rates between the two groups"
            .to_string()
    };

    Ok(TestOutcome::new(statistic, p_value, reject_null, message))
}

/// One-sided z-test that the test group's completion rate beats the control
/// group's by more than `cost_threshold`.
///
/// The control group's success count is raised by `len(control) * cost_threshold`
/// before testing, without capping it at the number of trials.
///
/// # Errors
/// Returns an error if either sample is empty.
pub fn completion_with_cost_threshold(
    test: &[bool],
    control: &[bool],
    cost_threshold: f64,
    alpha: f64,
) -> Result<TestOutcome> {
    let count = |sample: &[bool]| sample.iter().filter(|&&done| done).count() as f64;
    let successes = [
        count(test),
        count(control) + control.len() as f64 * cost_threshold,
    ];
    let trials = [test.len(), control.len()];

    check_trials(trials).context("invalid completion samples")?;

    // The raised control count may exceed its trials; the pooled proportion
    // then reaches 1 and the statistic is undefined, which never rejects.
    let statistic = pooled_z(successes, trials);
    let p_value = if statistic.is_nan() {
        log::warn!("completion rates {successes:?} over {trials:?} leave no variance to test");
        f64::NAN
    } else {
        tail_p_value(&Normal::standard(), statistic, Alternative::Greater)
    };

    let reject_null = p_value < alpha;
    let message = if reject_null {
        format!(
            "reject the null hypothesis: the completion rate of the test group exceeds the control group's by more than {cost_threshold}"
        )
    } else {
        format!(
            "fail to reject: the completion rate of the test group doesn't exceed the control group's by more than {cost_threshold}"
        )
    };

    Ok(TestOutcome::new(statistic, p_value, reject_null, message))
}

/// One-way ANOVA F-test on the means of several samples.
///
/// Missing (NaN) values are dropped first.
///
/// # Errors
/// Returns an error if fewer than two non-empty samples are given, if there
/// are no more values than samples, or if every sample is constant.
pub fn one_way_anova(groups: &[&[f64]], alpha: f64, subject: &str) -> Result<TestOutcome> {
    let reports: Vec<_> = groups
        .iter()
        .map(|group| finite(group).into_iter().collect::<Accumulator>().report())
        .collect();
    if reports.len() < 2 {
        bail!("at least two samples are needed, got {}", reports.len());
    }
    if let Some(i_group) = reports.iter().position(|report| report.n_vals == 0) {
        bail!("sample {i_group} is empty");
    }

    let n_groups = reports.len();
    let n_vals: usize = reports.iter().map(|report| report.n_vals).sum();
    if n_vals <= n_groups {
        bail!("{n_vals} values are not enough for {n_groups} samples");
    }

    let grand_mean = reports
        .iter()
        .map(|report| report.mean * report.n_vals as f64)
        .sum::<f64>()
        / n_vals as f64;
    let ss_between: f64 = reports
        .iter()
        .map(|report| report.n_vals as f64 * (report.mean - grand_mean).powi(2))
        .sum();
    let ss_within: f64 = reports
        .iter()
        .filter(|report| report.n_vals > 1)
        .map(|report| report.var * (report.n_vals as f64 - 1.0))
        .sum();
    if ss_within == 0.0 {
        bail!("every sample is constant");
    }

    let dof_between = (n_groups - 1) as f64;
    let dof_within = (n_vals - n_groups) as f64;
    let statistic = (ss_between / dof_between) / (ss_within / dof_within);

    let dist = FisherSnedecor::new(dof_between, dof_within)
        .context("failed to build F distribution")?;
    let p_value = dist.sf(statistic);

    let reject_null = p_value < alpha;
    let message = if reject_null {
        format!("reject the null hypothesis: there is a significant difference in {subject} across groups")
    } else {
        format!("fail to reject: the average {subject} across groups is probably the same")
    };

    Ok(TestOutcome::new(statistic, p_value, reject_null, message))
}

/// Expand confirmation counts into a shuffled completion sample.
///
/// # Errors
/// Returns an error if `confirm_count` exceeds `total_size`.
pub fn completion_sample<R: Rng + ?Sized>(
    confirm_count: usize,
    total_size: usize,
    rng: &mut R,
) -> Result<Vec<bool>> {
    if confirm_count > total_size {
        bail!("confirm count {confirm_count} exceeds total size {total_size}");
    }
    let mut sample = vec![true; confirm_count];
    sample.resize(total_size, false);
    sample.shuffle(rng);
    Ok(sample)
}

/// Completion samples of the test and control groups, in that order.
///
/// # Errors
/// Returns an error if either group is missing from `summaries`.
pub fn completion_samples<R: Rng + ?Sized>(
    summaries: &[GroupSummary],
    test_group: &str,
    control_group: &str,
    rng: &mut R,
) -> Result<(Vec<bool>, Vec<bool>)> {
    let mut sample_of = |group: &str| -> Result<Vec<bool>> {
        let summary = summaries
            .iter()
            .find(|summary| summary.group == group)
            .with_context(|| format!("no summary for group {group:?}"))?;
        completion_sample(summary.confirm_count, summary.total_size, rng)
    };
    let test = sample_of(test_group)?;
    let control = sample_of(control_group)?;
    Ok((test, control))
}
