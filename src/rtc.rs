//! C7 — RTC encoder: compress a seconds-delta into the AIOC's 16-bit value
//! plus 3-bit granularity. Deliberately lossy (truncating integer division,
//! per spec.md §4.7/§9) — this is not a general duration codec.

use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum RtcError {
    #[error("timer delta {0} second(s) cannot be represented (too small)")]
    TooSmall(i64),

    #[error("timer delta {0} second(s) cannot be represented (too large)")]
    TooLarge(i64),
}

/// Granularity unit for an encoded RTC delta.
#[repr(u8)]
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Granularity {
    Second = 0,
    Minute = 1,
    Hour = 2,
    Day = 3,
    Week = 4,
}

impl Granularity {
    /// Seconds per unit, used only by tests to check the round-trip bound.
    pub fn unit_secs(self) -> i64 {
        match self {
            Granularity::Second => 1,
            Granularity::Minute => 60,
            Granularity::Hour => 60 * 60,
            Granularity::Day => 24 * 60 * 60,
            Granularity::Week => 7 * 24 * 60 * 60,
        }
    }
}

const DIVISORS: [i64; 4] = [60, 60, 24, 7];
const MAX_VALUE: i64 = 0xFFFF;

/// Encode a seconds-delta `d >= 1` into `(value, granularity)`.
pub fn encode(d: i64) -> Result<(u16, Granularity), RtcError> {
    if d < 1 {
        return Err(RtcError::TooSmall(d));
    }
    let mut delta = d;
    let mut gran = 0usize;
    while delta > MAX_VALUE {
        if gran >= DIVISORS.len() {
            return Err(RtcError::TooLarge(d));
        }
        delta /= DIVISORS[gran];
        gran += 1;
    }
    if delta > MAX_VALUE {
        return Err(RtcError::TooLarge(d));
    }
    let granularity = match gran {
        0 => Granularity::Second,
        1 => Granularity::Minute,
        2 => Granularity::Hour,
        3 => Granularity::Day,
        4 => Granularity::Week,
        _ => unreachable!(),
    };
    Ok((delta as u16, granularity))
}

/// Pack `(value, granularity)` into the low/high/gran bytes of the `Rtc`
/// heartbeat frame body (bytes 1..=3; byte 0 is the `0x05` frame tag).
pub fn encode_frame_bytes(value: u16, granularity: Granularity) -> [u8; 3] {
    [
        (value & 0xFF) as u8,
        ((value >> 8) & 0xFF) as u8,
        granularity as u8,
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn one_second_encodes_exactly() {
        assert_eq!(encode(1).unwrap(), (1, Granularity::Second));
    }

    #[test]
    fn sixty_seconds_stays_in_seconds() {
        assert_eq!(encode(60).unwrap(), (60, Granularity::Second));
    }

    #[test]
    fn just_over_16_bits_rolls_to_minutes() {
        // 65536 / 60 = 1092 (truncating division), matching spec.md §8.
        assert_eq!(encode(65536).unwrap(), (1092, Granularity::Minute));
    }

    #[test]
    fn rtc_timer_example_from_scenario_5() {
        // 3700s -> 61 minutes (truncating) -> still minutes granularity.
        assert_eq!(encode(3700).unwrap(), (0x3D, Granularity::Minute));
    }

    #[test]
    fn zero_is_too_small() {
        assert_eq!(encode(0), Err(RtcError::TooSmall(0)));
    }

    #[test]
    fn negative_is_too_small() {
        assert_eq!(encode(-5), Err(RtcError::TooSmall(-5)));
    }

    #[test]
    fn beyond_max_weeks_fails() {
        let too_far = 7 * 24 * 60 * 60 * 65536;
        assert!(encode(too_far).is_err());
    }

    #[test]
    fn round_trip_is_within_one_unit_and_never_undershoots() {
        for d in [1i64, 59, 61, 3599, 3601, 86399, 86401, 604799, 604801] {
            let (v, g) = encode(d).unwrap();
            let reconstructed = v as i64 * g.unit_secs();
            assert!(reconstructed <= d, "d={d} v={v} g={g:?}");
            assert!(reconstructed > d - g.unit_secs(), "d={d} v={v} g={g:?}");
        }
    }

    #[test]
    fn encode_frame_bytes_matches_wire_layout() {
        assert_eq!(encode_frame_bytes(0x3D, Granularity::Minute), [0x3D, 0x00, 1]);
    }
}
