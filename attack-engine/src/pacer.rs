//! Pacing policies deciding when the next hit fires

use crate::error::{AttackError, AttackResult};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Outcome of asking a [`Pacer`] about the next hit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pace {
    /// Wait this long before firing. Zero means fire immediately.
    Wait(Duration),
    /// Stop sending hits.
    Stop,
}

impl Pace {
    pub const NOW: Pace = Pace::Wait(Duration::ZERO);

    pub fn is_stop(&self) -> bool {
        matches!(self, Pace::Stop)
    }
}

/// A Pacer defines the rate of hits during an attack.
///
/// Implementations must be pure functions of their configuration and
/// arguments: the scheduler may call them from any task.
pub trait Pacer: Send + Sync {
    /// How long to wait before the next hit, given the elapsed attack time and
    /// the number of hits already released.
    fn pace(&self, elapsed: Duration, hits: u64) -> Pace;

    /// Instantaneous hit rate, in hits per second, at the given elapsed time.
    fn rate(&self, elapsed: Duration) -> f64;
}

/// Fires `freq` hits every `per`, spread evenly.
///
/// A zero `freq` or `per` means no rate limit at all; a negative one stops
/// the attack straight away.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConstantPacer {
    pub freq: i64,
    pub per: chrono::Duration,
}

impl ConstantPacer {
    pub fn new(freq: i64, per: chrono::Duration) -> Self {
        Self { freq, per }
    }

    pub fn per_second(freq: i64) -> Self {
        Self::new(freq, chrono::Duration::seconds(1))
    }

    /// A pacer that never waits and never stops.
    pub fn unbounded() -> Self {
        Self::new(0, chrono::Duration::zero())
    }

    pub fn is_unbounded(&self) -> bool {
        self.freq == 0 || self.per.is_zero()
    }

    fn is_invalid(&self) -> bool {
        self.freq < 0 || self.per < chrono::Duration::zero()
    }
}

impl Default for ConstantPacer {
    fn default() -> Self {
        Self::per_second(50)
    }
}

impl Pacer for ConstantPacer {
    fn pace(&self, elapsed: Duration, hits: u64) -> Pace {
        if self.is_unbounded() {
            return Pace::NOW;
        }
        if self.is_invalid() {
            return Pace::Stop;
        }
        let Some(per_ns) = self.per.num_nanoseconds() else {
            return Pace::Stop;
        };

        let elapsed_ns = elapsed.as_nanos();
        let expected_hits = (self.freq as u128).saturating_mul(elapsed_ns / per_ns as u128);
        if (hits as u128) < expected_hits {
            // Running behind, send next hit immediately.
            return Pace::NOW;
        }

        let interval = per_ns / self.freq;
        if interval == 0 {
            return Pace::NOW;
        }

        // (hits + 1) * interval must stay inside the i64 nanosecond range.
        let fire_at = i64::try_from(hits)
            .ok()
            .and_then(|hits| hits.checked_add(1))
            .and_then(|next| next.checked_mul(interval));
        let Some(fire_at) = fire_at else {
            return Pace::Stop;
        };

        let fire_at = fire_at as u128;
        if fire_at > elapsed_ns {
            Pace::Wait(Duration::from_nanos((fire_at - elapsed_ns) as u64))
        } else {
            Pace::NOW
        }
    }

    fn rate(&self, _elapsed: Duration) -> f64 {
        if self.is_unbounded() {
            return f64::INFINITY;
        }
        if self.is_invalid() {
            return 0.0;
        }
        let per_ns = self
            .per
            .num_nanoseconds()
            .map(|ns| ns as f64)
            .unwrap_or_else(|| self.per.num_milliseconds() as f64 * 1e6);
        self.freq as f64 * 1e9 / per_ns
    }
}

impl fmt::Display for ConstantPacer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Constant{{{} hits/{}}}", self.freq, format_duration(self.per))
    }
}

/// Parses `infinity`, `N`, `N/unit` or `N/<duration>` (e.g. `50/1s`).
impl FromStr for ConstantPacer {
    type Err = AttackError;

    fn from_str(value: &str) -> AttackResult<Self> {
        let value = value.trim();
        if value.eq_ignore_ascii_case("infinity") {
            return Ok(Self::unbounded());
        }

        let (freq, per) = value.split_once('/').unwrap_or((value, "1s"));
        let freq: i64 = freq
            .trim()
            .parse()
            .map_err(|_| AttackError::invalid_rate(value, "frequency must be an integer"))?;
        if freq == 0 {
            return Ok(Self::unbounded());
        }

        let per = per.trim();
        let per = match per {
            "ns" | "us" | "µs" | "μs" | "ms" | "s" | "m" | "h" => format!("1{}", per),
            other => other.to_string(),
        };
        let per = parse_duration(&per).map_err(|e| AttackError::invalid_rate(value, &e.to_string()))?;

        Ok(Self { freq, per })
    }
}

fn unit_nanos(unit: &str) -> Option<i128> {
    match unit {
        "ns" => Some(1),
        "us" | "µs" | "μs" => Some(1_000),
        "ms" => Some(1_000_000),
        "s" => Some(1_000_000_000),
        "m" => Some(60 * 1_000_000_000),
        "h" => Some(3_600 * 1_000_000_000),
        _ => None,
    }
}

/// Parse a duration such as `300ms`, `1.5s`, `1m30s` or `-2h`.
///
/// A bare `0` is accepted; any other number needs a unit.
pub fn parse_duration(value: &str) -> AttackResult<chrono::Duration> {
    let invalid = |reason: &str| AttackError::invalid_duration(value, reason);

    let mut rest = value.trim();
    let negative = match rest.strip_prefix('-') {
        Some(tail) => {
            rest = tail;
            true
        }
        None => {
            rest = rest.strip_prefix('+').unwrap_or(rest);
            false
        }
    };

    if rest == "0" {
        return Ok(chrono::Duration::zero());
    }
    if rest.is_empty() {
        return Err(invalid("empty duration"));
    }

    let is_number_char = |c: char| c.is_ascii_digit() || c == '.';
    let mut total: i128 = 0;

    while !rest.is_empty() {
        let int_len = rest.find(|c: char| !c.is_ascii_digit()).unwrap_or(rest.len());
        let (int_part, tail) = rest.split_at(int_len);
        let (frac_part, tail) = match tail.strip_prefix('.') {
            Some(tail) => {
                let frac_len = tail.find(|c: char| !c.is_ascii_digit()).unwrap_or(tail.len());
                tail.split_at(frac_len)
            }
            None => ("", tail),
        };
        if int_part.is_empty() && frac_part.is_empty() {
            return Err(invalid("expected a number"));
        }

        let unit_len = tail.find(is_number_char).unwrap_or(tail.len());
        let (unit, tail) = tail.split_at(unit_len);
        if unit.is_empty() {
            return Err(invalid("missing unit"));
        }
        let scale = unit_nanos(unit).ok_or_else(|| invalid(&format!("unknown unit {:?}", unit)))?;

        let whole: i128 = if int_part.is_empty() {
            0
        } else {
            int_part.parse().map_err(|_| invalid("number out of range"))?
        };

        // Digits past nanosecond precision cannot change the result.
        let frac_digits = &frac_part[..frac_part.len().min(18)];
        let fraction: i128 = if frac_digits.is_empty() {
            0
        } else {
            let digits: i128 = frac_digits.parse().map_err(|_| invalid("number out of range"))?;
            digits * scale / 10i128.pow(frac_digits.len() as u32)
        };

        total = whole
            .checked_mul(scale)
            .and_then(|n| n.checked_add(fraction))
            .and_then(|n| n.checked_add(total))
            .filter(|n| *n <= i64::MAX as i128)
            .ok_or_else(|| invalid("duration out of range"))?;

        rest = tail;
    }

    let nanos = (if negative { -total } else { total }) as i64;
    Ok(chrono::Duration::nanoseconds(nanos))
}

/// Like [`parse_duration`] but rejects negative values.
pub fn parse_std_duration(value: &str) -> AttackResult<Duration> {
    let duration = parse_duration(value)?;
    duration
        .to_std()
        .map_err(|_| AttackError::invalid_duration(value, "must not be negative"))
}

fn format_duration(duration: chrono::Duration) -> String {
    let Some(nanos) = duration.num_nanoseconds() else {
        return format!("{}ms", duration.num_milliseconds());
    };
    const UNITS: [(i64, &str); 6] = [
        (3_600_000_000_000, "h"),
        (60_000_000_000, "m"),
        (1_000_000_000, "s"),
        (1_000_000, "ms"),
        (1_000, "µs"),
        (1, "ns"),
    ];
    if nanos == 0 {
        return "0s".to_string();
    }
    UNITS
        .iter()
        .find(|(scale, _)| nanos % scale == 0)
        .map(|(scale, unit)| format!("{}{}", nanos / scale, unit))
        .unwrap_or_else(|| format!("{}ns", nanos))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    #[test]
    fn test_constant_pacer_spreads_hits_evenly() {
        let pacer = ConstantPacer::per_second(10);

        // First hit is due one interval in.
        assert_eq!(pacer.pace(Duration::ZERO, 0), Pace::Wait(ms(100)));
        assert_eq!(pacer.pace(ms(40), 0), Pace::Wait(ms(60)));
        assert_eq!(pacer.pace(ms(100), 1), Pace::Wait(ms(100)));
        assert_eq!(pacer.pace(ms(250), 2), Pace::Wait(ms(50)));
    }

    #[test]
    fn test_constant_pacer_catches_up_when_behind() {
        let pacer = ConstantPacer::per_second(10);

        // Two seconds in, twenty hits are expected.
        assert_eq!(pacer.pace(ms(2_000), 5), Pace::NOW);
        assert_eq!(pacer.pace(ms(2_000), 19), Pace::NOW);
        assert_eq!(pacer.pace(ms(2_000), 20), Pace::Wait(ms(100)));
    }

    #[test]
    fn test_constant_pacer_fires_now_when_target_time_passed() {
        let pacer = ConstantPacer::per_second(10);
        assert_eq!(pacer.pace(ms(150), 0), Pace::NOW);
    }

    #[test]
    fn test_zero_freq_or_per_is_unbounded() {
        let pacers = [
            ConstantPacer::new(0, chrono::Duration::seconds(1)),
            ConstantPacer::new(10, chrono::Duration::zero()),
            ConstantPacer::unbounded(),
        ];
        for pacer in pacers {
            assert_eq!(pacer.pace(Duration::ZERO, 0), Pace::NOW);
            assert_eq!(pacer.pace(ms(5), u64::MAX), Pace::NOW);
            assert_eq!(pacer.rate(Duration::ZERO), f64::INFINITY);
        }
    }

    #[test]
    fn test_negative_freq_or_per_stops() {
        let pacers = [
            ConstantPacer::new(-1, chrono::Duration::seconds(1)),
            ConstantPacer::new(10, chrono::Duration::seconds(-1)),
        ];
        for pacer in pacers {
            assert_eq!(pacer.pace(Duration::ZERO, 0), Pace::Stop);
            assert_eq!(pacer.rate(Duration::ZERO), 0.0);
        }
    }

    #[test]
    fn test_overflow_stops_instead_of_wrapping() {
        let pacer = ConstantPacer::new(1, chrono::Duration::hours(1));
        assert_eq!(pacer.pace(Duration::ZERO, u64::MAX), Pace::Stop);
        assert_eq!(pacer.pace(Duration::ZERO, i64::MAX as u64), Pace::Stop);
        assert!(!pacer.pace(Duration::ZERO, 1_000).is_stop());
    }

    #[test]
    fn test_rate_is_hits_per_second() {
        assert_eq!(ConstantPacer::per_second(50).rate(Duration::ZERO), 50.0);
        let pacer = ConstantPacer::new(30, chrono::Duration::minutes(1));
        assert!((pacer.rate(Duration::from_secs(10)) - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_parse_rate() {
        assert_eq!("50/1s".parse::<ConstantPacer>().unwrap(), ConstantPacer::per_second(50));
        assert_eq!("50/s".parse::<ConstantPacer>().unwrap(), ConstantPacer::per_second(50));
        assert_eq!("50".parse::<ConstantPacer>().unwrap(), ConstantPacer::per_second(50));
        assert_eq!(
            "5/2m".parse::<ConstantPacer>().unwrap(),
            ConstantPacer::new(5, chrono::Duration::minutes(2))
        );
        assert_eq!(
            "100/ms".parse::<ConstantPacer>().unwrap(),
            ConstantPacer::new(100, chrono::Duration::milliseconds(1))
        );
        assert!("infinity".parse::<ConstantPacer>().unwrap().is_unbounded());
        assert!("0".parse::<ConstantPacer>().unwrap().is_unbounded());
        assert_eq!("-5/1s".parse::<ConstantPacer>().unwrap().freq, -5);
    }

    #[test]
    fn test_parse_rate_rejects_garbage() {
        for bad in ["", "fast", "10/", "10/abc", "1.5/s", "10/5"] {
            let err = bad.parse::<ConstantPacer>().unwrap_err();
            assert!(matches!(err, AttackError::InvalidRate { .. }), "{bad:?} gave {err:?}");
        }
    }

    #[test]
    fn test_parse_duration() {
        assert_eq!(parse_duration("0").unwrap(), chrono::Duration::zero());
        assert_eq!(parse_duration("300ms").unwrap(), chrono::Duration::milliseconds(300));
        assert_eq!(parse_duration("1.5s").unwrap(), chrono::Duration::milliseconds(1_500));
        assert_eq!(parse_duration("1m30s").unwrap(), chrono::Duration::seconds(90));
        assert_eq!(parse_duration("2h").unwrap(), chrono::Duration::hours(2));
        assert_eq!(parse_duration("10µs").unwrap(), chrono::Duration::microseconds(10));
        assert_eq!(parse_duration("-1s").unwrap(), chrono::Duration::seconds(-1));
    }

    #[test]
    fn test_parse_duration_errors() {
        for bad in ["", "5", "s", "1x", "1.s5", "9999999999999h"] {
            assert!(parse_duration(bad).is_err(), "{bad:?} should not parse");
        }
        assert!(parse_std_duration("-1s").is_err());
        assert_eq!(parse_std_duration("2s").unwrap(), Duration::from_secs(2));
    }

    #[test]
    fn test_display() {
        assert_eq!(ConstantPacer::per_second(1).to_string(), "Constant{1 hits/1s}");
        assert_eq!(
            ConstantPacer::new(5, chrono::Duration::milliseconds(250)).to_string(),
            "Constant{5 hits/250ms}"
        );
        assert_eq!(ConstantPacer::unbounded().to_string(), "Constant{0 hits/0s}");
    }
}
