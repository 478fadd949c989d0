//! Property tests for aggregation and scoring

#[cfg(test)]
mod tests {
    use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
    use fleetscope_core::aggregate::aggregate;
    use fleetscope_core::confidence::{ConfidenceScorer, QualityInputs, Signal};
    use fleetscope_core::config::{AnalyticsConfig, FuelSettings};
    use fleetscope_core::delta::{total_distance_km, ReadingSeries};
    use fleetscope_core::domain::{DomainAnalyzer, DrivingAnalyzer, FuelAnalyzer};
    use fleetscope_core::filter::{remove_jitter, FuelSample};
    use fleetscope_core::prelude::{Granularity, Reading, TimeRange};
    use proptest::prelude::*;
    use tokio_util::sync::CancellationToken;

    const WEEK_SECONDS: i64 = 7 * 86_400;

    fn origin() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
    }

    fn week() -> TimeRange {
        TimeRange::days(
            NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            NaiveDate::from_ymd_opt(2024, 1, 7).unwrap(),
        )
        .unwrap()
    }

    fn reading_strategy() -> impl Strategy<Value = Reading> {
        (
            0..WEEK_SECONDS,
            prop::option::of(0.0..160.0f64),
            prop::option::of(0.0..500_000.0f64),
            prop::option::of(0.0..100.0f64),
        )
            .prop_map(|(offset, speed, odometer, fuel_level)| Reading {
                speed,
                odometer,
                fuel_level,
                ..Reading::new("prop-1", origin() + Duration::seconds(offset))
            })
    }

    fn series_for<A: DomainAnalyzer>(analyzer: &A, readings: Vec<Reading>) -> ReadingSeries {
        ReadingSeries::prepare(readings, &week(), analyzer.required_fields())
    }

    proptest! {
        #[test]
        fn prop_day_buckets_conserve_distance(
            readings in prop::collection::vec(reading_strategy(), 0..80)
        ) {
            let analyzer = DrivingAnalyzer::from_config(&AnalyticsConfig::default());
            let series = series_for(&analyzer, readings);
            let total = total_distance_km(&series.readings);

            for granularity in [Granularity::Day, Granularity::Week, Granularity::Month] {
                let keys = granularity.keys_in_range(&week());
                let buckets = aggregate(
                    &analyzer,
                    "prop-1",
                    &series,
                    &keys,
                    &ConfidenceScorer::default(),
                    &CancellationToken::new(),
                )
                .unwrap();

                let summed: f64 = buckets.values().map(|b| b.summary.distance_km).sum();
                prop_assert!((summed - total).abs() < 1e-6, "{summed} != {total}");

                let counted: usize = buckets.values().map(|b| b.reading_count).sum();
                prop_assert_eq!(counted, series.len());
            }
        }

        #[test]
        fn prop_aggregation_is_idempotent(
            mut readings in prop::collection::vec(reading_strategy(), 0..60)
        ) {
            // equal timestamps keep arrival order, so only distinct ones may be shuffled
            readings.sort_by_key(|r| r.timestamp);
            readings.dedup_by_key(|r| r.timestamp);
            let analyzer = FuelAnalyzer::from_config(&AnalyticsConfig::default());
            let keys = Granularity::Day.keys_in_range(&week());
            let first = aggregate(
                &analyzer,
                "prop-1",
                &series_for(&analyzer, readings.clone()),
                &keys,
                &ConfidenceScorer::default(),
                &CancellationToken::new(),
            )
            .unwrap();

            // arrival order must not matter either
            readings.reverse();
            let second = aggregate(
                &analyzer,
                "prop-1",
                &series_for(&analyzer, readings),
                &keys,
                &ConfidenceScorer::default(),
                &CancellationToken::new(),
            )
            .unwrap();

            prop_assert_eq!(
                serde_json::to_string(&first.values().collect::<Vec<_>>()).unwrap(),
                serde_json::to_string(&second.values().collect::<Vec<_>>()).unwrap()
            );
        }

        #[test]
        fn prop_more_readings_never_lower_confidence(
            fewer in 0usize..100,
            extra in 0usize..100,
            skipped in 0usize..5,
            signals in prop::collection::vec(
                prop_oneof![Just(Signal::Agree), Just(Signal::Suspicious), Just(Signal::Neutral)],
                0..3,
            )
        ) {
            let scorer = ConfidenceScorer::default();
            let inputs = |count| QualityInputs {
                reading_count: count,
                skipped,
                signals: signals.clone(),
            };

            let low = scorer.assess(&inputs(fewer));
            let high = scorer.assess(&inputs(fewer + extra));
            prop_assert!(low <= high, "{low:?} > {high:?}");
        }

        #[test]
        fn prop_isolated_gauge_bounces_are_removed(
            level in 10.0..90.0f64,
            len in 3usize..40,
            bounces in prop::collection::vec((1usize..39, -4.9..4.9f64), 0..10)
        ) {
            let mut levels = vec![level; len];
            let mut bounced = vec![false; len];
            for (index, offset) in bounces {
                let interior = index >= 1 && index + 1 < len;
                // at least two steady samples between bounces
                let isolated = interior
                    && (index.saturating_sub(2)..=(index + 2).min(len - 1)).all(|i| !bounced[i]);
                if isolated && offset.abs() > 0.01 {
                    levels[index] = level + offset;
                    bounced[index] = true;
                }
            }
            let samples: Vec<FuelSample> = levels
                .iter()
                .enumerate()
                .map(|(i, level)| FuelSample {
                    at: origin() + Duration::minutes(i as i64 * 10),
                    level: *level,
                })
                .collect();

            let kept = remove_jitter(&samples, FuelSettings::default().jitter_threshold);

            prop_assert!(kept.iter().all(|s| s.level == level));
            prop_assert_eq!(kept.len(), len - bounced.iter().filter(|b| **b).count());
        }
    }
}
