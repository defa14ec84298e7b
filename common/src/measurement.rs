//! Measurement data gathered for a single trial.

use std::fmt;
use std::fmt::Display;

/// Decimal places kept for every derived and statistical value.
pub const PRECISION: i32 = 5;

/// Round a value to [`PRECISION`] decimal places.
pub fn round(value: f64) -> f64 {
    let scale = 10f64.powi(PRECISION);
    (value * scale).round() / scale
}

/// Time span of a completed recording.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MeasurementWindow {
    /// Start of the recorded interval (seconds).
    pub start: f64,
    /// End of the recorded interval (seconds).
    pub end: f64,
    /// Offset reported by the measurement device.
    pub offset: f64,
    /// Samples per second.
    pub sample_rate: u32,
}

impl MeasurementWindow {
    /// Length of the window in seconds.
    pub fn duration(&self) -> f64 {
        self.end - self.start
    }
}

impl Display for MeasurementWindow {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "[{} s, {} s] @ {} Hz (offset {})",
               self.start, self.end, self.sample_rate, self.offset)
    }
}

/// Power readings over a [`MeasurementWindow`] in device-native units.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ChannelStatistics {
    pub minimum: f64,
    pub maximum: f64,
    pub average: f64,
}

impl Display for ChannelStatistics {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "min {:.5}, max {:.5}, avg {:.5}", self.minimum, self.maximum, self.average)
    }
}

/// One persisted line of a result file.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ResultRow {
    pub from: f64,
    pub to: f64,
    pub offset: f64,
    pub sample_rate: u32,
    pub min: f64,
    pub max: f64,
    pub average: f64,
    pub duration: f64,
    pub energy_consumption: f64,
}

impl ResultRow {
    /// Column names, in the order fields are written.
    pub const HEADER: [&'static str; 9] = [
        "From",
        "To",
        "Offset",
        "Sample rate",
        "Min",
        "Max",
        "Average",
        "Duration",
        "Energy consumption",
    ];

    /** Derive a row from a window and the statistics recorded over it.

    Duration and energy are computed from the unrounded inputs and only
    then rounded, so that `energy_consumption == round(average * duration)`.
     */
    pub fn derive(window: &MeasurementWindow, statistics: &ChannelStatistics) -> ResultRow {
        let duration = window.duration();
        let energy = statistics.average * duration;

        ResultRow {
            from: round(window.start),
            to: round(window.end),
            offset: round(window.offset),
            sample_rate: window.sample_rate,
            min: round(statistics.minimum),
            max: round(statistics.maximum),
            average: round(statistics.average),
            duration: round(duration),
            energy_consumption: round(energy),
        }
    }

    /// Text of each field in [`ResultRow::HEADER`] order.
    pub fn fields(&self) -> [String; 9] {
        [
            float_field(self.from),
            float_field(self.to),
            self.offset.to_string(),
            self.sample_rate.to_string(),
            float_field(self.min),
            float_field(self.max),
            float_field(self.average),
            float_field(self.duration),
            float_field(self.energy_consumption),
        ]
    }
}

impl Display for ResultRow {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.fields().join(","))
    }
}

/// Format a measurement so that integral values keep a trailing `.0`.
fn float_field(value: f64) -> String {
    if value.is_finite() && value.fract() == 0.0 && value.abs() < 1e16 {
        format!("{:.1}", value)
    } else {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn window(start: f64, end: f64) -> MeasurementWindow {
        MeasurementWindow { start, end, offset: 0.0, sample_rate: 1000 }
    }

    fn stats(minimum: f64, maximum: f64, average: f64) -> ChannelStatistics {
        ChannelStatistics { minimum, maximum, average }
    }

    #[test]
    fn energy_is_average_times_duration() {
        let row = ResultRow::derive(&window(0.0, 2.5), &stats(0.10, 0.55, 0.30));
        assert_eq!(row.duration, 2.5);
        assert_eq!(row.energy_consumption, 0.75);
    }

    #[test]
    fn energy_uses_unrounded_average() {
        let w = window(1.0, 4.0);
        let s = stats(0.0, 1.0, 0.123456789);
        let row = ResultRow::derive(&w, &s);
        assert_eq!(row.average, 0.12346);
        assert_eq!(row.energy_consumption, round(0.123456789 * 3.0));
        assert_eq!(row.energy_consumption, 0.37037);
    }

    #[test]
    fn duration_is_rounded_window_length() {
        let row = ResultRow::derive(&window(2.5, 4.0), &stats(0.1, 0.5, 0.4));
        assert_eq!(row.duration, 1.5);
        assert_eq!(row.energy_consumption, 0.6);
        assert!(row.duration >= 0.0);
    }

    #[test]
    fn fields_match_reference_formatting() {
        let row = ResultRow::derive(&window(0.0, 2.5), &stats(0.10, 0.55, 0.30));
        assert_eq!(row.to_string(), "0.0,2.5,0,1000,0.1,0.55,0.3,2.5,0.75");
    }

    #[test]
    fn window_bounds_are_rounded() {
        let w = MeasurementWindow { start: 12.3456789, end: 14.0000049, offset: 0.0000012, sample_rate: 4000 };
        let row = ResultRow::derive(&w, &stats(0.1, 0.2, 0.15));
        assert_eq!(row.from, 12.34568);
        assert_eq!(row.to, 14.0);
        assert_eq!(row.offset, 0.0);
        assert_eq!(row.duration, 1.65433);
        assert_eq!(row.to_string(), "12.34568,14.0,0,4000,0.1,0.2,0.15,1.65433,0.24815");
    }

    #[test]
    fn rounding_keeps_five_places() {
        assert_eq!(round(0.123456), 0.12346);
        assert_eq!(round(2.0), 2.0);
        assert_eq!(round(0.6000000000000001), 0.6);
    }
}
