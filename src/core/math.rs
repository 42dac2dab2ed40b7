// Numeric helpers shared by progress aggregation and signal handling

/// Clamp a value between min and max
pub fn clamp<T: PartialOrd>(value: T, min: T, max: T) -> T {
    if value < min {
        min
    } else if value > max {
        max
    } else {
        value
    }
}

/// Clamp a fraction into `[0, 1]`, mapping NaN to zero
pub fn clamp_unit(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        clamp(value, 0.0, 1.0)
    }
}

/// Ratio of two counters as a unit fraction
///
/// Returns `None` when the denominator is zero.
pub fn ratio(numerator: u64, denominator: u64) -> Option<f64> {
    if denominator == 0 {
        return None;
    }
    Some(clamp_unit(numerator as f64 / denominator as f64))
}

/// Exponentially weighted moving average step
pub fn ewma(previous: Option<f64>, sample: f64, weight: f64) -> f64 {
    match previous {
        Some(prev) => prev + (sample - prev) * clamp_unit(weight),
        None => sample,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_clamp() {
        assert_eq!(clamp(5.0, 0.0, 10.0), 5.0);
        assert_eq!(clamp(-5.0, 0.0, 10.0), 0.0);
        assert_eq!(clamp(15.0, 0.0, 10.0), 10.0);
    }

    #[test]
    fn test_clamp_unit_nan() {
        assert_eq!(clamp_unit(f64::NAN), 0.0);
        assert_eq!(clamp_unit(1.5), 1.0);
    }

    #[test]
    fn test_ratio() {
        assert_eq!(ratio(1, 0), None);
        assert_relative_eq!(ratio(1, 4).unwrap(), 0.25);
        assert_relative_eq!(ratio(8, 4).unwrap(), 1.0);
    }

    #[test]
    fn test_ewma() {
        assert_relative_eq!(ewma(None, 10.0, 0.5), 10.0);
        assert_relative_eq!(ewma(Some(10.0), 20.0, 0.5), 15.0);
        assert_relative_eq!(ewma(Some(10.0), 20.0, 0.0), 10.0);
    }
}
