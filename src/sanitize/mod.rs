//! Data Sanitization
//!
//! Numerical stability utilities shared by the learner model and the
//! statistics engine.
//!
//! Functions:
//! - Invalid value detection
//! - Probability clamping
//! - Response time flooring

/// Lowest success probability the learner model will use
pub const MIN_PROBABILITY: f64 = 0.05;

/// Highest success probability the learner model will use
pub const MAX_PROBABILITY: f64 = 0.95;

/// Shortest simulated response time (seconds)
pub const MIN_RESPONSE_TIME: f64 = 5.0;

/// Check whether a slice contains NaN or Inf
pub fn has_invalid_values(arr: &[f64]) -> bool {
    arr.iter().any(|&x| x.is_nan() || x.is_infinite())
}

/// Clamp a probability into the model's working range; NaN maps to 0.5
pub fn clamp_probability(p: f64) -> f64 {
    if p.is_nan() {
        return 0.5;
    }
    p.clamp(MIN_PROBABILITY, MAX_PROBABILITY)
}

/// Floor a response time; non-finite values collapse to the floor
pub fn sanitize_response_time(t: f64) -> f64 {
    if t.is_finite() {
        t.max(MIN_RESPONSE_TIME)
    } else {
        MIN_RESPONSE_TIME
    }
}

/// Clamp a unit-interval parameter, rejecting non-finite input
pub fn unit_interval(value: f64) -> Option<f64> {
    if value.is_finite() && (0.0..=1.0).contains(&value) {
        Some(value)
    } else {
        None
    }
}
