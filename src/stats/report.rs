use std::collections::BTreeMap;
use std::fmt;

use serde::{Serialize, Serializer};
use serde_json::{Map, Number, Value};

use super::{DescriptiveStats, EffectMagnitude, LearningGain, Metric, TTestResult};
use crate::error::SimError;
use crate::types::Policy;

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct MetricComparison {
    pub metric: Metric,
    pub adaptive: Option<DescriptiveStats>,
    pub fixed: Option<DescriptiveStats>,
    pub t_test: Option<TTestResult>,
    /// Positive when adaptive is higher
    pub cohens_d: Option<f64>,
    pub effect_magnitude: Option<EffectMagnitude>,
    /// `(adaptive - fixed) / fixed * 100`, when the fixed mean is positive
    pub improvement_pct: Option<f64>,
}

impl MetricComparison {
    fn group(&self, policy: Policy) -> Option<&DescriptiveStats> {
        match policy {
            Policy::Adaptive => self.adaptive.as_ref(),
            Policy::Fixed => self.fixed.as_ref(),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct PolicyGains {
    pub accuracy: Option<LearningGain>,
    pub mastery_index: Option<LearningGain>,
}

impl PolicyGains {
    fn entries(&self) -> [(Metric, Option<&LearningGain>); 2] {
        [
            (Metric::Accuracy, self.accuracy.as_ref()),
            (Metric::MasteryIndex, self.mastery_index.as_ref()),
        ]
    }
}

/// Everything the statistics engine could compute, plus what it could not
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ComparisonReport {
    pub adaptive_sessions: usize,
    pub fixed_sessions: usize,
    pub metrics: Vec<MetricComparison>,
    pub adaptive_gain: PolicyGains,
    pub fixed_gain: PolicyGains,
    #[serde(serialize_with = "issues_as_strings")]
    pub issues: Vec<SimError>,
}

impl ComparisonReport {
    pub fn metric(&self, metric: Metric) -> Option<&MetricComparison> {
        self.metrics.iter().find(|m| m.metric == metric)
    }

    pub fn gains(&self, policy: Policy) -> &PolicyGains {
        match policy {
            Policy::Adaptive => &self.adaptive_gain,
            Policy::Fixed => &self.fixed_gain,
        }
    }

    /// No statistic was skipped
    pub fn is_complete(&self) -> bool {
        self.issues.is_empty()
    }

    pub fn insufficient_data(&self) -> impl Iterator<Item = &SimError> {
        self.issues.iter().filter(|e| e.is_insufficient_data())
    }

    /// Dotted-key view, e.g. `accuracy.adaptive.mean` or `mastery_index.p_value`
    ///
    /// Statistics that could not be computed are absent rather than zero.
    pub fn to_flat_map(&self) -> BTreeMap<String, f64> {
        let mut out = BTreeMap::new();
        out.insert("sessions.adaptive".to_string(), self.adaptive_sessions as f64);
        out.insert("sessions.fixed".to_string(), self.fixed_sessions as f64);
        out.insert("issues".to_string(), self.issues.len() as f64);

        for comparison in &self.metrics {
            let name = comparison.metric.as_str();
            for policy in Policy::ALL {
                let Some(stats) = comparison.group(policy) else {
                    continue;
                };
                let prefix = format!("{name}.{}", policy.as_str());
                out.insert(format!("{prefix}.count"), stats.count as f64);
                out.insert(format!("{prefix}.mean"), stats.mean);
                out.insert(format!("{prefix}.median"), stats.median);
                out.insert(format!("{prefix}.min"), stats.min);
                out.insert(format!("{prefix}.max"), stats.max);
                if let Some(std_dev) = stats.std_dev {
                    out.insert(format!("{prefix}.std"), std_dev);
                }
            }
            if let Some(t) = &comparison.t_test {
                out.insert(format!("{name}.t_statistic"), t.t_statistic);
                out.insert(format!("{name}.df"), t.degrees_of_freedom);
                out.insert(format!("{name}.p_value"), t.p_value);
                out.insert(format!("{name}.significant"), if t.significant { 1.0 } else { 0.0 });
            }
            if let Some(d) = comparison.cohens_d {
                out.insert(format!("{name}.cohens_d"), d);
            }
            if let Some(pct) = comparison.improvement_pct {
                out.insert(format!("{name}.improvement_pct"), pct);
            }
        }

        for policy in Policy::ALL {
            for (metric, gain) in self.gains(policy).entries() {
                let Some(gain) = gain else { continue };
                let prefix = format!("learning_gain.{}.{}", policy.as_str(), metric.as_str());
                out.insert(format!("{prefix}.mean"), gain.mean_gain);
                out.insert(format!("{prefix}.std"), gain.std_gain);
                out.insert(format!("{prefix}.median"), gain.median_gain);
                out.insert(format!("{prefix}.positive"), gain.positive_gains as f64);
                out.insert(format!("{prefix}.learners"), gain.learners as f64);
            }
        }

        out
    }

    /// Flat map as a JSON object; non-finite values become `null`
    pub fn to_json(&self) -> Value {
        let map: Map<String, Value> = self
            .to_flat_map()
            .into_iter()
            .map(|(k, v)| (k, Number::from_f64(v).map_or(Value::Null, Value::Number)))
            .collect();
        Value::Object(map)
    }
}

fn issues_as_strings<S: Serializer>(issues: &[SimError], serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_seq(issues.iter().map(ToString::to_string))
}

// ==================== Text Report ====================

fn opt(value: Option<f64>, precision: usize) -> String {
    value.map_or_else(|| "n/a".to_string(), |v| format!("{v:.precision$}"))
}

impl fmt::Display for ComparisonReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rule = "=".repeat(64);
        writeln!(f, "{rule}")?;
        writeln!(f, "ADAPTIVE vs FIXED DIFFICULTY: STATISTICAL COMPARISON")?;
        writeln!(f, "{rule}")?;
        writeln!(
            f,
            "Sessions: adaptive={} fixed={}",
            self.adaptive_sessions, self.fixed_sessions
        )?;

        writeln!(f)?;
        writeln!(f, "Descriptive statistics")?;
        writeln!(
            f,
            "  {:<20} {:<9} {:>6} {:>9} {:>9} {:>9}",
            "metric", "policy", "n", "mean", "std", "median"
        )?;
        for comparison in &self.metrics {
            for policy in Policy::ALL {
                match comparison.group(policy) {
                    Some(s) => writeln!(
                        f,
                        "  {:<20} {:<9} {:>6} {:>9.3} {:>9} {:>9.3}",
                        comparison.metric.as_str(),
                        policy.as_str(),
                        s.count,
                        s.mean,
                        opt(s.std_dev, 3),
                        s.median
                    )?,
                    None => writeln!(
                        f,
                        "  {:<20} {:<9} {:>6}",
                        comparison.metric.as_str(),
                        policy.as_str(),
                        0
                    )?,
                }
            }
        }

        writeln!(f)?;
        writeln!(f, "Significance (Welch t-test) and effect size")?;
        for comparison in &self.metrics {
            let name = comparison.metric.as_str();
            match &comparison.t_test {
                Some(t) => writeln!(
                    f,
                    "  {name:<20} t={:.3} df={:.1} p={:.4}{}",
                    t.t_statistic,
                    t.degrees_of_freedom,
                    t.p_value,
                    if t.significant { " *" } else { "" }
                )?,
                None => writeln!(f, "  {name:<20} not computed")?,
            }
            if let (Some(d), Some(magnitude)) = (comparison.cohens_d, comparison.effect_magnitude) {
                writeln!(f, "  {:<20} d={d:.3} ({})", "", magnitude.as_str())?;
            }
            if let Some(pct) = comparison.improvement_pct {
                writeln!(f, "  {:<20} change vs fixed: {pct:+.1}%", "")?;
            }
        }

        writeln!(f)?;
        writeln!(f, "Learning gain (last session - first session)")?;
        for policy in Policy::ALL {
            for (metric, gain) in self.gains(policy).entries() {
                match gain {
                    Some(g) => writeln!(
                        f,
                        "  {:<9} {:<14} mean={:+.3} median={:+.3} improved {}/{}",
                        policy.as_str(),
                        metric.as_str(),
                        g.mean_gain,
                        g.median_gain,
                        g.positive_gains,
                        g.learners
                    )?,
                    None => writeln!(
                        f,
                        "  {:<9} {:<14} not computed",
                        policy.as_str(),
                        metric.as_str()
                    )?,
                }
            }
        }

        if !self.issues.is_empty() {
            writeln!(f)?;
            writeln!(f, "Warnings")?;
            for issue in &self.issues {
                writeln!(f, "  - {issue}")?;
            }
        }
        write!(f, "{rule}")
    }
}
