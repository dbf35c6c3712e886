//! Time representation for decoded media.
//! Frame and sample timestamps are carried as nanoseconds (i64).

use ffmpeg_next::Rational;

/// Time in nanoseconds since the start of the media
pub type Time = i64;

/// Time constants for conversions
pub mod constants {
    use super::Time;

    pub const NANOS_PER_SECOND: Time = 1_000_000_000;
    pub const NANOS_PER_MILLI: Time = 1_000_000;
}

/// Time zero constant
pub const ZERO: Time = 0;

/// Convert seconds (f64) to nanoseconds (i64)
#[inline]
pub fn from_seconds(seconds: f64) -> Time {
    (seconds * constants::NANOS_PER_SECOND as f64) as Time
}

/// Convert nanoseconds (i64) to seconds (f64)
#[inline]
pub fn to_seconds(nanos: Time) -> f64 {
    nanos as f64 / constants::NANOS_PER_SECOND as f64
}

/// Convert nanoseconds to milliseconds
#[inline]
pub fn to_millis(nanos: Time) -> i64 {
    nanos / constants::NANOS_PER_MILLI
}

/// Convert a timestamp in `time_base` units to nanoseconds.
///
/// FFmpeg uses rational timebases: `ts * num / den` seconds. A zero
/// denominator yields zero.
pub fn from_time_base(ts: i64, time_base: Rational) -> Time {
    let (num, den) = (time_base.numerator(), time_base.denominator());
    if den == 0 {
        return 0;
    }
    // i128 avoids overflow for large pts values with 1/90000-style bases
    let result = (ts as i128 * num as i128 * constants::NANOS_PER_SECOND as i128) / den as i128;
    result as Time
}

/// Format time as HH:MM:SS.mmm
pub fn format_time(nanos: Time) -> String {
    let total_seconds = to_seconds(nanos);
    let hours = (total_seconds / 3600.0).floor() as i64;
    let minutes = ((total_seconds % 3600.0) / 60.0).floor() as i64;
    let seconds = (total_seconds % 60.0).floor() as i64;
    let millis = to_millis(nanos) % 1000;

    format!("{:02}:{:02}:{:02}.{:03}", hours, minutes, seconds, millis)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seconds_conversion() {
        let time = from_seconds(1.5);
        assert_eq!(time, 1_500_000_000);
        assert!((to_seconds(time) - 1.5).abs() < 0.000001);
    }

    #[test]
    fn test_millis_conversion() {
        assert_eq!(to_millis(from_seconds(1.5)), 1500);
        assert_eq!(to_millis(999_999), 0);
    }

    #[test]
    fn test_time_base_conversion() {
        // 90 kHz MPEG clock: 90000 ticks is one second
        let tb = Rational::new(1, 90_000);
        assert_eq!(from_time_base(90_000, tb), constants::NANOS_PER_SECOND);

        // 48 kHz audio, 1024-sample AAC frame
        let tb = Rational::new(1, 48_000);
        assert_eq!(from_time_base(1024, tb), 21_333_333);
    }

    #[test]
    fn test_time_base_degenerate() {
        assert_eq!(from_time_base(1234, Rational::new(1, 0)), 0);
    }

    #[test]
    fn test_large_pts_does_not_overflow() {
        // ~27 hours at 90 kHz
        let tb = Rational::new(1, 90_000);
        let pts = 90_000 * 100_000;
        assert_eq!(from_time_base(pts, tb), 100_000 * constants::NANOS_PER_SECOND);
    }

    #[test]
    fn test_format_time() {
        let time = from_seconds(3661.5); // 1 hour, 1 minute, 1.5 seconds
        assert_eq!(format_time(time), "01:01:01.500");
        assert_eq!(format_time(ZERO), "00:00:00.000");
    }
}
