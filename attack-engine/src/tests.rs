//! Property-based tests for pacing, targeting and result aggregation

#[cfg(test)]
mod tests {
    use crate::pacer::*;
    use crate::result::*;
    use crate::target::*;
    use crate::targeter::*;
    use chrono::Utc;
    use proptest::prelude::*;
    use std::time::Duration;

    prop_compose! {
        fn arb_constant_pacer()
            (freq in 1i64..200, per_ms in 1i64..1000)
        -> ConstantPacer {
            ConstantPacer::new(freq, chrono::Duration::milliseconds(per_ms))
        }
    }

    prop_compose! {
        fn arb_url_part()
            (plain in "[a-z0-9/._-]{0,16}", encoded in prop::option::of("%[0-9A-F]{2}"))
        -> String {
            match encoded {
                Some(encoded) => format!("{}{}", plain, encoded),
                None => plain,
            }
        }
    }

    prop_compose! {
        fn arb_hit_result()
            (
                code in prop_oneof![Just(0u16), 200u16..600],
                latency_us in 0u64..5_000_000,
                bytes_in in 0u64..10_000,
                failed in any::<bool>(),
            )
        -> HitResult {
            let mut result = HitResult::new("prop", 0, Utc::now());
            result.code = code;
            result.latency = Duration::from_micros(latency_us);
            result.bytes_in = bytes_in;
            if failed || !(200..400).contains(&code) {
                result.error = Some(format!("{} failure", code));
            }
            result
        }
    }

    /// Drive a pacer on a virtual clock and count the hits released by `until`.
    fn simulate(pacer: &ConstantPacer, until: Duration) -> u64 {
        let mut elapsed = Duration::ZERO;
        let mut hits = 0u64;
        loop {
            match pacer.pace(elapsed, hits) {
                Pace::Stop => break,
                Pace::Wait(wait) if wait.is_zero() => hits += 1,
                Pace::Wait(wait) => {
                    if elapsed + wait > until {
                        break;
                    }
                    elapsed += wait;
                }
            }
        }
        hits
    }

    proptest! {
        /// **Property 1: Constant Pacing**
        /// A constant pacer releases one hit per interval on an ideal clock,
        /// never bursting ahead of the configured rate.
        #[test]
        fn property_constant_pacer_spreads_hits_evenly(
            pacer in arb_constant_pacer(),
            fraction in 0.0f64..5.0,
        ) {
            let per_ns = pacer.per.num_nanoseconds().unwrap() as u64;
            let interval = per_ns / pacer.freq as u64;
            let until = Duration::from_nanos((per_ns as f64 * fraction) as u64);

            let hits = simulate(&pacer, until);
            prop_assert_eq!(hits, until.as_nanos() as u64 / interval);
        }

        #[test]
        fn property_pacer_catches_up_when_behind(
            pacer in arb_constant_pacer(),
            periods in 1u64..20,
        ) {
            let per = pacer.per.to_std().unwrap();
            let elapsed = per * periods as u32;
            let expected = pacer.freq as u64 * periods;

            for hits in 0..expected.min(50) {
                prop_assert_eq!(pacer.pace(elapsed, hits), Pace::NOW);
            }
        }

        /// **Property 2: Degenerate Rates**
        /// Zero frequency or period never waits; a negative one always stops.
        #[test]
        fn property_zero_rate_is_unbounded(
            per_ms in 0i64..10_000,
            elapsed_ms in 0u64..100_000,
            hits in any::<u64>(),
        ) {
            let elapsed = Duration::from_millis(elapsed_ms);
            let zero_freq = ConstantPacer::new(0, chrono::Duration::milliseconds(per_ms));
            let zero_per = ConstantPacer::new(per_ms + 1, chrono::Duration::zero());

            prop_assert_eq!(zero_freq.pace(elapsed, hits), Pace::NOW);
            prop_assert_eq!(zero_per.pace(elapsed, hits), Pace::NOW);
            prop_assert!(zero_freq.rate(elapsed).is_infinite());
        }

        #[test]
        fn property_negative_rate_stops(
            freq in 1i64..1_000,
            per_ms in 1i64..10_000,
            elapsed_ms in 0u64..100_000,
            hits in 0u64..1_000_000,
        ) {
            let elapsed = Duration::from_millis(elapsed_ms);
            let negative_freq = ConstantPacer::new(-freq, chrono::Duration::milliseconds(per_ms));
            let negative_per = ConstantPacer::new(freq, chrono::Duration::milliseconds(-per_ms));

            prop_assert_eq!(negative_freq.pace(elapsed, hits), Pace::Stop);
            prop_assert_eq!(negative_per.pace(elapsed, hits), Pace::Stop);
        }

        /// **Property 3: Rate Flag Parsing**
        #[test]
        fn property_rate_with_bare_unit_parses(
            freq in 1i64..100_000,
            unit in prop::sample::select(vec![
                ("ns", 1i64),
                ("us", 1_000),
                ("ms", 1_000_000),
                ("s", 1_000_000_000),
                ("m", 60_000_000_000),
                ("h", 3_600_000_000_000),
            ]),
        ) {
            let pacer: ConstantPacer = format!("{}/{}", freq, unit.0).parse().unwrap();
            prop_assert_eq!(pacer.freq, freq);
            prop_assert_eq!(pacer.per, chrono::Duration::nanoseconds(unit.1));
        }

        #[test]
        fn property_compound_durations_parse(
            hours in 0i64..100,
            minutes in 0i64..60,
            seconds in 0i64..60,
            millis in 0i64..1000,
        ) {
            let text = format!("{}h{}m{}s{}ms", hours, minutes, seconds, millis);
            let expected = chrono::Duration::hours(hours)
                + chrono::Duration::minutes(minutes)
                + chrono::Duration::seconds(seconds)
                + chrono::Duration::milliseconds(millis);
            prop_assert_eq!(parse_duration(&text).unwrap(), expected);
        }

        /// **Property 4: Placeholder Substitution**
        /// Only the placeholder is replaced; every other byte of the URL,
        /// percent-encoded sequences included, is kept verbatim.
        #[test]
        fn property_substitution_preserves_url(
            prefix in arb_url_part(),
            suffix in arb_url_part(),
            value in "[A-Za-z0-9-]{1,24}",
        ) {
            let url = format!("http://api.test/{}%s{}", prefix, suffix);
            let resolved = substitute_placeholder(&url, Some(&value));
            prop_assert_eq!(resolved.as_ref(), format!("http://api.test/{}{}{}", prefix, value, suffix));

            let unresolved = substitute_placeholder(&url, None);
            prop_assert_eq!(unresolved.as_ref(), url.as_str());
        }

        #[test]
        fn property_urls_without_placeholder_are_untouched(
            path in arb_url_part(),
            value in "[a-z0-9]{1,8}",
        ) {
            let url = format!("http://api.test/{}", path);
            let resolved = substitute_placeholder(&url, Some(&value));
            prop_assert_eq!(resolved.as_ref(), url.as_str());
        }

        /// **Property 5: Round-Robin Targeting**
        /// Sequential decodes visit every chain, counts differing by at most one.
        #[test]
        fn property_static_targeter_is_fair(
            chains in 1usize..10,
            decodes in 0usize..200,
        ) {
            let targeter = StaticTargeter::new(
                (0..chains)
                    .map(|i| TargetChain::new(Target::new(reqwest::Method::GET, format!("http://t/{}", i))))
                    .collect(),
            );

            let mut counts = vec![0usize; chains];
            for _ in 0..decodes {
                let mut slot = TargetChain::default();
                targeter.decode(&mut slot).unwrap();
                let index: usize = slot.head().unwrap().url.trim_start_matches("http://t/").parse().unwrap();
                counts[index] += 1;
            }

            let min = counts.iter().min().copied().unwrap_or(0);
            let max = counts.iter().max().copied().unwrap_or(0);
            prop_assert!(max - min <= 1);
            prop_assert_eq!(counts.iter().sum::<usize>(), decodes);
        }

        /// **Property 6: Statistics Consistency**
        #[test]
        fn property_statistics_are_consistent(
            results in prop::collection::vec(arb_hit_result(), 1..100),
        ) {
            let mut stats = AttackStatistics::new();
            for result in &results {
                stats.record(result);
            }

            prop_assert_eq!(stats.total_requests, results.len() as u64);
            prop_assert_eq!(stats.successful_requests + stats.failed_requests, stats.total_requests);
            prop_assert!(stats.min_latency <= stats.mean_latency());
            prop_assert!(stats.mean_latency() <= stats.max_latency);
            prop_assert_eq!(
                stats.status_code_distribution.values().sum::<u64>(),
                stats.total_requests
            );
            prop_assert_eq!(stats.bytes_in, results.iter().map(|r| r.bytes_in).sum::<u64>());
        }
    }
}
