pub type CollectorDateTime = time::OffsetDateTime;

pub trait CollectorDateTimeExt {
    fn from_unix_milliseconds_i64(timestamp: i64) -> Self;
    fn from_unix_seconds_i64(timestamp: i64) -> Self;
    fn to_unix_microseconds(&self) -> i64;
}

impl CollectorDateTimeExt for CollectorDateTime {
    fn from_unix_milliseconds_i64(timestamp: i64) -> Self {
        Self::UNIX_EPOCH + time::Duration::milliseconds(timestamp)
    }
    fn from_unix_seconds_i64(timestamp: i64) -> Self {
        Self::UNIX_EPOCH + time::Duration::seconds(timestamp)
    }
    fn to_unix_microseconds(&self) -> i64 {
        (self.unix_timestamp_nanos() / 1_000) as i64
    }
}

/// Elapsed time between two instants, clamped at zero when the clock went backwards.
pub fn elapsed_between(earlier: CollectorDateTime, later: CollectorDateTime) -> std::time::Duration {
    std::time::Duration::try_from(later - earlier).unwrap_or(std::time::Duration::ZERO)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_send<T: Send>() {}

    #[test]
    fn test_send() {
        assert_send::<CollectorDateTime>();
    }

    #[test]
    fn test_milliseconds_roundtrip() {
        let test_cases: &[i64] = &[
            1000,          // Small value
            1704067200000, // Jan 1, 2024 00:00:00 UTC
            1704067200123, // With subsecond precision
        ];

        for &input_ms in test_cases {
            let datetime = CollectorDateTime::from_unix_milliseconds_i64(input_ms);
            let output_ms = (datetime.unix_timestamp_nanos() / 1_000_000) as i64;
            assert_eq!(
                input_ms, output_ms,
                "from_unix_milliseconds_i64 should roundtrip for {}",
                input_ms
            );
        }
    }

    #[test]
    fn test_to_unix_microseconds() {
        let datetime = CollectorDateTime::from_unix_milliseconds_i64(1705315800123);
        assert_eq!(datetime.to_unix_microseconds(), 1705315800123000);
    }

    #[test]
    fn test_elapsed_between_clamps_backwards_clock() {
        let a = CollectorDateTime::from_unix_seconds_i64(100);
        let b = CollectorDateTime::from_unix_seconds_i64(105);
        assert_eq!(elapsed_between(a, b), std::time::Duration::from_secs(5));
        assert_eq!(elapsed_between(b, a), std::time::Duration::ZERO);
    }
}
