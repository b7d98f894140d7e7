// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Distance conversions between Strava's meters and displayed miles.

/// Miles per meter.
pub const MILES_PER_METER: f64 = 0.000621371;

/// Convert meters to miles, rounded to two decimal places.
pub fn meters_to_miles(meters: f64) -> f64 {
    round_hundredths(meters * MILES_PER_METER)
}

/// Round to two decimal places (half away from zero).
pub fn round_hundredths(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_one_mile() {
        assert_eq!(meters_to_miles(1609.34), 1.00);
    }

    #[test]
    fn test_ten_kilometers() {
        assert_eq!(meters_to_miles(10_000.0), 6.21);
    }

    #[test]
    fn test_race_distances() {
        assert_eq!(meters_to_miles(5_000.0), 3.11);
        assert_eq!(meters_to_miles(15_000.0), 9.32);
        assert_eq!(meters_to_miles(20_000.0), 12.43);
        assert_eq!(meters_to_miles(42_195.0), 26.22);
    }

    #[test]
    fn test_zero_distance() {
        assert_eq!(meters_to_miles(0.0), 0.0);
    }

    #[test]
    fn test_round_hundredths() {
        assert_eq!(round_hundredths(27.960000000000004), 27.96);
        assert_eq!(round_hundredths(1.005_1), 1.01);
    }
}
