//! Statistics Engine
//!
//! Compares adaptive and fixed session summaries:
//! - Descriptive statistics per group (count, mean, sample std, median, min, max)
//! - Welch two-sample t-test (unequal variances), two-sided p-value from
//!   Student's t with Welch–Satterthwaite degrees of freedom
//! - Cohen's d with pooled standard deviation
//! - Learning gain: per learner, last session minus first session, averaged
//!
//! Groups too small for a statistic are never reported as NaN or zero. The
//! low-level functions return `SimError::InsufficientData`; `compare`
//! records the same condition in `ComparisonReport::issues` and still fills
//! in everything that can be computed.

mod report;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use statrs::distribution::{ContinuousCDF, StudentsT};
use tracing::warn;

use crate::error::{Result, SimError};
use crate::sanitize::has_invalid_values;
use crate::types::{Policy, SessionSummary, EPSILON};

pub use report::{ComparisonReport, MetricComparison, PolicyGains};

// ==================== Constants ====================

/// Two-sided significance level
pub const SIGNIFICANCE_LEVEL: f64 = 0.05;

/// Smallest group for which std, t-test and effect size are defined
pub const MIN_GROUP_SIZE: usize = 2;

/// |d| below this is a small effect
const SMALL_EFFECT: f64 = 0.2;

/// |d| below this (and above small) is a medium effect
const MEDIUM_EFFECT: f64 = 0.8;

// ==================== Data Structures ====================

/// Per-session metric under comparison
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    Accuracy,
    MasteryIndex,
    MeanResponseTime,
}

impl Metric {
    pub const ALL: [Metric; 3] = [Metric::Accuracy, Metric::MasteryIndex, Metric::MeanResponseTime];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Accuracy => "accuracy",
            Self::MasteryIndex => "mastery_index",
            Self::MeanResponseTime => "mean_response_time",
        }
    }

    pub fn of(&self, summary: &SessionSummary) -> f64 {
        match self {
            Self::Accuracy => summary.accuracy,
            Self::MasteryIndex => summary.mastery_index,
            Self::MeanResponseTime => summary.mean_response_time,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DescriptiveStats {
    pub count: usize,
    pub mean: f64,
    /// Sample standard deviation; `None` below two observations
    pub std_dev: Option<f64>,
    pub median: f64,
    pub min: f64,
    pub max: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TTestResult {
    pub t_statistic: f64,
    pub degrees_of_freedom: f64,
    pub p_value: f64,
    pub significant: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EffectMagnitude {
    Small,
    Medium,
    Large,
}

impl EffectMagnitude {
    pub fn of(d: f64) -> Self {
        let d = d.abs();
        if d < SMALL_EFFECT {
            Self::Small
        } else if d < MEDIUM_EFFECT {
            Self::Medium
        } else {
            Self::Large
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Small => "small",
            Self::Medium => "medium",
            Self::Large => "large",
        }
    }
}

/// Last-minus-first improvement across a policy's learners
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LearningGain {
    /// Learners with at least two sessions
    pub learners: usize,
    pub mean_gain: f64,
    /// Population standard deviation of the per-learner gains
    pub std_gain: f64,
    pub median_gain: f64,
    pub positive_gains: usize,
}

// ==================== Descriptive ====================

pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// Unbiased (n - 1) variance
pub fn sample_variance(values: &[f64]) -> Result<f64> {
    require(values.len(), "variance", "sample")?;
    let m = values.iter().sum::<f64>() / values.len() as f64;
    Ok(values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / (values.len() - 1) as f64)
}

pub fn median(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    let mid = sorted.len() / 2;
    Some(if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    })
}

/// Summary of a sample; `None` when empty
pub fn describe(values: &[f64]) -> Option<DescriptiveStats> {
    let mean = mean(values)?;
    let median = median(values)?;
    let min = values.iter().copied().fold(f64::INFINITY, f64::min);
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);

    Some(DescriptiveStats {
        count: values.len(),
        mean,
        std_dev: sample_variance(values).ok().map(f64::sqrt),
        median,
        min,
        max,
    })
}

// ==================== Significance ====================

/// Welch's unequal-variance t-test, two-sided
pub fn welch_t_test(a: &[f64], b: &[f64]) -> Result<TTestResult> {
    require(a.len(), "t_test", "sample_a")?;
    require(b.len(), "t_test", "sample_b")?;

    let (na, nb) = (a.len() as f64, b.len() as f64);
    let diff = a.iter().sum::<f64>() / na - b.iter().sum::<f64>() / nb;
    let va = sample_variance(a)? / na;
    let vb = sample_variance(b)? / nb;
    let se_sq = va + vb;

    if se_sq <= EPSILON {
        // Both groups constant: the test degenerates
        let (t_statistic, p_value) = if diff.abs() <= EPSILON {
            (0.0, 1.0)
        } else {
            (f64::INFINITY.copysign(diff), 0.0)
        };
        return Ok(TTestResult {
            t_statistic,
            degrees_of_freedom: na + nb - 2.0,
            p_value,
            significant: p_value < SIGNIFICANCE_LEVEL,
        });
    }

    let t_statistic = diff / se_sq.sqrt();
    let degrees_of_freedom = se_sq.powi(2) / (va.powi(2) / (na - 1.0) + vb.powi(2) / (nb - 1.0));
    let p_value = two_sided_p_value(t_statistic, degrees_of_freedom);

    Ok(TTestResult {
        t_statistic,
        degrees_of_freedom,
        p_value,
        significant: p_value < SIGNIFICANCE_LEVEL,
    })
}

fn two_sided_p_value(t: f64, df: f64) -> f64 {
    match StudentsT::new(0.0, 1.0, df) {
        Ok(dist) => (2.0 * dist.sf(t.abs())).clamp(0.0, 1.0),
        // df is positive and finite whenever se > 0; keep a sane fallback
        Err(_) => {
            if t.abs() <= EPSILON {
                1.0
            } else {
                0.0
            }
        }
    }
}

/// Standardized mean difference `(mean_a - mean_b) / pooled_std`
///
/// With zero pooled spread the effect is 0.0 for equal means and infinite,
/// signed like the difference, otherwise.
pub fn cohens_d(a: &[f64], b: &[f64]) -> Result<f64> {
    require(a.len(), "cohens_d", "sample_a")?;
    require(b.len(), "cohens_d", "sample_b")?;

    let (na, nb) = (a.len() as f64, b.len() as f64);
    let pooled_var =
        ((na - 1.0) * sample_variance(a)? + (nb - 1.0) * sample_variance(b)?) / (na + nb - 2.0);
    let pooled_std = pooled_var.sqrt();
    let diff = a.iter().sum::<f64>() / na - b.iter().sum::<f64>() / nb;

    if pooled_std <= EPSILON {
        return Ok(if diff.abs() <= EPSILON {
            0.0
        } else {
            f64::INFINITY.copysign(diff)
        });
    }
    Ok(diff / pooled_std)
}

// ==================== Learning Gain ====================

/// Per-learner `last - first` of `metric`, summarized
///
/// Learners with a single session are skipped; if none remain the result is
/// `InsufficientData`.
pub fn learning_gain(summaries: &[SessionSummary], metric: Metric) -> Result<LearningGain> {
    let mut by_learner: BTreeMap<&str, Vec<&SessionSummary>> = BTreeMap::new();
    for summary in summaries {
        by_learner
            .entry(summary.learner_id.as_str())
            .or_default()
            .push(summary);
    }

    let gains: Vec<f64> = by_learner
        .into_values()
        .filter(|sessions| sessions.len() >= MIN_GROUP_SIZE)
        .filter_map(|sessions| {
            let first = sessions.iter().min_by_key(|s| s.session_index)?;
            let last = sessions.iter().max_by_key(|s| s.session_index)?;
            Some(metric.of(last) - metric.of(first))
        })
        .collect();

    let (Some(mean_gain), Some(median_gain)) = (mean(&gains), median(&gains)) else {
        return Err(SimError::InsufficientData {
            metric: format!("learning_gain.{}", metric.as_str()),
            group: "learners".to_string(),
            available: 0,
            required: 1,
        });
    };
    let std_gain =
        (gains.iter().map(|g| (g - mean_gain).powi(2)).sum::<f64>() / gains.len() as f64).sqrt();

    Ok(LearningGain {
        learners: gains.len(),
        mean_gain,
        std_gain,
        median_gain,
        positive_gains: gains.iter().filter(|&&g| g > 0.0).count(),
    })
}

// ==================== Comparison ====================

/// Full adaptive-vs-fixed comparison
pub fn compare(adaptive: &[SessionSummary], fixed: &[SessionSummary]) -> ComparisonReport {
    let mut issues = Vec::new();

    let metrics = Metric::ALL
        .iter()
        .map(|&metric| compare_metric(metric, adaptive, fixed, &mut issues))
        .collect();

    let mut gains_for = |policy: Policy, summaries: &[SessionSummary]| {
        let mut gain = |metric: Metric| match learning_gain(summaries, metric) {
            Ok(gain) => Some(gain),
            Err(err) => {
                issues.push(relabel(err, policy));
                None
            }
        };
        PolicyGains {
            accuracy: gain(Metric::Accuracy),
            mastery_index: gain(Metric::MasteryIndex),
        }
    };
    let adaptive_gain = gains_for(Policy::Adaptive, adaptive);
    let fixed_gain = gains_for(Policy::Fixed, fixed);

    for issue in &issues {
        warn!(%issue, "comparison incomplete");
    }

    ComparisonReport {
        adaptive_sessions: adaptive.len(),
        fixed_sessions: fixed.len(),
        metrics,
        adaptive_gain,
        fixed_gain,
        issues,
    }
}

/// Split a flat collection by policy, then `compare`
pub fn compare_summaries(summaries: &[SessionSummary]) -> ComparisonReport {
    let (adaptive, fixed): (Vec<SessionSummary>, Vec<SessionSummary>) = summaries
        .iter()
        .cloned()
        .partition(|s| s.policy == Policy::Adaptive);
    compare(&adaptive, &fixed)
}

fn compare_metric(
    metric: Metric,
    adaptive: &[SessionSummary],
    fixed: &[SessionSummary],
    issues: &mut Vec<SimError>,
) -> MetricComparison {
    let a: Vec<f64> = adaptive.iter().map(|s| metric.of(s)).collect();
    let b: Vec<f64> = fixed.iter().map(|s| metric.of(s)).collect();

    let mut sufficient = true;
    for (policy, values) in [(Policy::Adaptive, &a), (Policy::Fixed, &b)] {
        if values.len() < MIN_GROUP_SIZE {
            sufficient = false;
            issues.push(SimError::InsufficientData {
                metric: metric.as_str().to_string(),
                group: policy.as_str().to_string(),
                available: values.len(),
                required: MIN_GROUP_SIZE,
            });
        }
    }
    if has_invalid_values(&a) || has_invalid_values(&b) {
        sufficient = false;
        issues.push(SimError::invalid(format!(
            "{} contains non-finite values",
            metric.as_str()
        )));
    }

    let (t_test, cohens_d) = if sufficient {
        (welch_t_test(&a, &b).ok(), cohens_d(&a, &b).ok())
    } else {
        (None, None)
    };

    let adaptive_stats = describe(&a);
    let fixed_stats = describe(&b);
    let improvement_pct = match (&adaptive_stats, &fixed_stats) {
        (Some(x), Some(y)) if y.mean > 0.0 => Some((x.mean - y.mean) / y.mean * 100.0),
        _ => None,
    };

    MetricComparison {
        metric,
        adaptive: adaptive_stats,
        fixed: fixed_stats,
        t_test,
        cohens_d,
        effect_magnitude: cohens_d.map(EffectMagnitude::of),
        improvement_pct,
    }
}

fn require(available: usize, metric: &str, group: &str) -> Result<()> {
    if available < MIN_GROUP_SIZE {
        return Err(SimError::InsufficientData {
            metric: metric.to_string(),
            group: group.to_string(),
            available,
            required: MIN_GROUP_SIZE,
        });
    }
    Ok(())
}

fn relabel(err: SimError, policy: Policy) -> SimError {
    match err {
        SimError::InsufficientData {
            metric,
            available,
            required,
            ..
        } => SimError::InsufficientData {
            metric,
            group: policy.as_str().to_string(),
            available,
            required,
        },
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Difficulty;

    const TOL: f64 = 1e-9;

    fn summary(learner: &str, policy: Policy, index: usize, accuracy: f64, mastery: f64) -> SessionSummary {
        SessionSummary {
            session_id: format!("{learner}_{policy}_{}", index + 1),
            learner_id: learner.to_string(),
            policy,
            session_index: index,
            num_questions: 10,
            accuracy,
            mastery_index: mastery,
            mean_response_time: 30.0 + accuracy,
            avg_difficulty: 2.0,
            avg_time_ratio: 1.0,
            difficulty_change_count: 0,
            difficulty_sequence: vec![Difficulty::Medium; 10],
        }
    }

    // ==================== Descriptive Tests ====================

    #[test]
    fn test_describe_known_sample() {
        let stats = describe(&[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]).unwrap();
        assert_eq!(stats.count, 8);
        assert!((stats.mean - 5.0).abs() < TOL);
        assert!((stats.median - 4.5).abs() < TOL);
        assert_eq!(stats.min, 2.0);
        assert_eq!(stats.max, 9.0);
        // sample variance = 32 / 7
        assert!((stats.std_dev.unwrap() - (32.0f64 / 7.0).sqrt()).abs() < TOL);
    }

    #[test]
    fn test_describe_single_value_has_no_std() {
        let stats = describe(&[0.7]).unwrap();
        assert_eq!(stats.std_dev, None);
        assert_eq!(stats.median, 0.7);
        assert!(describe(&[]).is_none());
    }

    #[test]
    fn test_median_odd() {
        assert_eq!(median(&[3.0, 1.0, 2.0]), Some(2.0));
    }

    // ==================== Significance Tests ====================

    #[test]
    fn test_welch_reference_values() {
        // mean_a = 3, var_a = 2.5 ; mean_b = 5, var_b = 2.5 ; n = 5 each
        let a = [1.0, 2.0, 3.0, 4.0, 5.0];
        let b = [3.0, 4.0, 5.0, 6.0, 7.0];
        let result = welch_t_test(&a, &b).unwrap();

        assert!((result.t_statistic + 2.0).abs() < TOL);
        assert!((result.degrees_of_freedom - 8.0).abs() < TOL);
        // two-sided p for t = -2 with 8 df is about 0.0805
        assert!((result.p_value - 0.0805).abs() < 1e-3);
        assert!(!result.significant);
    }

    #[test]
    fn test_welch_clear_difference_is_significant() {
        let a = [0.9, 0.92, 0.88, 0.91, 0.93, 0.89];
        let b = [0.5, 0.52, 0.48, 0.51, 0.49, 0.5];
        let result = welch_t_test(&a, &b).unwrap();
        assert!(result.t_statistic > 0.0);
        assert!(result.p_value < 0.001);
        assert!(result.significant);
    }

    #[test]
    fn test_welch_constant_groups() {
        let same = welch_t_test(&[1.0, 1.0], &[1.0, 1.0, 1.0]).unwrap();
        assert_eq!(same.t_statistic, 0.0);
        assert_eq!(same.p_value, 1.0);

        let apart = welch_t_test(&[2.0, 2.0], &[1.0, 1.0]).unwrap();
        assert!(apart.t_statistic.is_infinite() && apart.t_statistic > 0.0);
        assert_eq!(apart.p_value, 0.0);
    }

    #[test]
    fn test_welch_requires_two_per_group() {
        let err = welch_t_test(&[1.0], &[1.0, 2.0]).unwrap_err();
        assert!(err.is_insufficient_data());
    }

    // ==================== Effect Size Tests ====================

    #[test]
    fn test_cohens_d_identical_groups_is_zero() {
        let a = [0.4, 0.6, 0.5, 0.7, 0.3];
        let d = cohens_d(&a, &a).unwrap();
        assert!(d.abs() < TOL);
    }

    #[test]
    fn test_cohens_d_constant_groups() {
        let equal = cohens_d(&[1.0; 3], &[1.0; 4]).unwrap();
        assert_eq!(equal, 0.0);

        let higher = cohens_d(&[1.0; 3], &[0.5; 3]).unwrap();
        assert!(higher.is_infinite() && higher > 0.0);
        assert_eq!(EffectMagnitude::of(higher), EffectMagnitude::Large);

        let lower = cohens_d(&[0.5; 3], &[1.0; 3]).unwrap();
        assert!(lower.is_infinite() && lower < 0.0);

        // agrees with the degenerate t-test on the same data
        let t = welch_t_test(&[1.0; 3], &[0.5; 3]).unwrap();
        assert!(t.significant);
        assert_eq!(t.t_statistic.signum(), higher.signum());
    }

    #[test]
    fn test_cohens_d_known_value() {
        let a = [1.0, 2.0, 3.0, 4.0, 5.0];
        let b = [3.0, 4.0, 5.0, 6.0, 7.0];
        // pooled std = sqrt(2.5)
        let d = cohens_d(&a, &b).unwrap();
        assert!((d + 2.0 / 2.5f64.sqrt()).abs() < TOL);
        assert_eq!(EffectMagnitude::of(d), EffectMagnitude::Large);
    }

    #[test]
    fn test_effect_magnitude_bands() {
        assert_eq!(EffectMagnitude::of(0.1), EffectMagnitude::Small);
        assert_eq!(EffectMagnitude::of(-0.5), EffectMagnitude::Medium);
        assert_eq!(EffectMagnitude::of(0.8), EffectMagnitude::Large);
    }

    // ==================== Learning Gain Tests ====================

    #[test]
    fn test_learning_gain_uses_first_and_last_session() {
        let summaries = vec![
            summary("a", Policy::Adaptive, 2, 0.9, 2.0),
            summary("a", Policy::Adaptive, 0, 0.5, 1.0),
            summary("a", Policy::Adaptive, 1, 0.7, 1.5),
            summary("b", Policy::Adaptive, 0, 0.6, 1.2),
            summary("b", Policy::Adaptive, 1, 0.5, 1.0),
            summary("c", Policy::Adaptive, 0, 0.8, 1.6),
        ];
        let gain = learning_gain(&summaries, Metric::Accuracy).unwrap();

        // a: +0.4, b: -0.1, c skipped
        assert_eq!(gain.learners, 2);
        assert!((gain.mean_gain - 0.15).abs() < TOL);
        assert!((gain.median_gain - 0.15).abs() < TOL);
        assert!((gain.std_gain - 0.25).abs() < TOL);
        assert_eq!(gain.positive_gains, 1);
    }

    #[test]
    fn test_learning_gain_needs_repeat_sessions() {
        let summaries = vec![summary("a", Policy::Fixed, 0, 0.5, 1.0)];
        let err = learning_gain(&summaries, Metric::MasteryIndex).unwrap_err();
        assert!(err.is_insufficient_data());
    }

    // ==================== Comparison Tests ====================

    #[test]
    fn test_compare_complete() {
        let adaptive = vec![
            summary("a", Policy::Adaptive, 0, 0.6, 1.4),
            summary("a", Policy::Adaptive, 1, 0.8, 1.9),
            summary("b", Policy::Adaptive, 0, 0.7, 1.5),
            summary("b", Policy::Adaptive, 1, 0.75, 1.8),
        ];
        let fixed = vec![
            summary("a", Policy::Fixed, 0, 0.6, 1.2),
            summary("a", Policy::Fixed, 1, 0.65, 1.3),
            summary("b", Policy::Fixed, 0, 0.7, 1.4),
            summary("b", Policy::Fixed, 1, 0.7, 1.4),
        ];
        let report = compare(&adaptive, &fixed);

        assert!(report.is_complete(), "issues: {:?}", report.issues);
        let mastery = report.metric(Metric::MasteryIndex).unwrap();
        assert!(mastery.t_test.is_some());
        assert!(mastery.cohens_d.unwrap() > 0.0);
        assert!(mastery.improvement_pct.unwrap() > 0.0);
        assert_eq!(report.adaptive_gain.accuracy.as_ref().unwrap().learners, 2);
    }

    #[test]
    fn test_compare_flags_small_group_without_failing() {
        let adaptive = vec![summary("a", Policy::Adaptive, 0, 0.8, 2.0)];
        let fixed = vec![
            summary("a", Policy::Fixed, 0, 0.6, 1.2),
            summary("b", Policy::Fixed, 0, 0.7, 1.4),
        ];
        let report = compare(&adaptive, &fixed);

        assert!(!report.is_complete());
        assert!(report.insufficient_data().count() >= Metric::ALL.len());
        let accuracy = report.metric(Metric::Accuracy).unwrap();
        assert!(accuracy.t_test.is_none());
        assert!(accuracy.cohens_d.is_none());
        // partial results are still there
        assert!((accuracy.adaptive.as_ref().unwrap().mean - 0.8).abs() < TOL);
        assert_eq!(accuracy.fixed.as_ref().unwrap().count, 2);
    }

    #[test]
    fn test_compare_empty_groups() {
        let report = compare(&[], &[]);
        assert!(!report.is_complete());
        assert!(report.metrics.iter().all(|m| m.adaptive.is_none() && m.fixed.is_none()));
        assert!(report.adaptive_gain.accuracy.is_none());
    }

    #[test]
    fn test_compare_summaries_splits_by_policy() {
        let all = vec![
            summary("a", Policy::Adaptive, 0, 0.6, 1.4),
            summary("a", Policy::Fixed, 0, 0.6, 1.2),
            summary("b", Policy::Adaptive, 0, 0.7, 1.5),
            summary("b", Policy::Fixed, 0, 0.7, 1.4),
        ];
        let report = compare_summaries(&all);
        assert_eq!(report.adaptive_sessions, 2);
        assert_eq!(report.fixed_sessions, 2);
    }
}
