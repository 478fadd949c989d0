//! Tests for reports over simulated fleet data

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use fleetscope_core::delta::total_distance_km;
    use fleetscope_core::demo::FleetSimulator;
    use fleetscope_core::prelude::*;
    use tokio_util::sync::CancellationToken;

    const DEVICE: &str = "sim-1";

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, d).unwrap()
    }

    fn simulated(seed: u64) -> Vec<Reading> {
        FleetSimulator::new(DEVICE, seed).generate_range(date(4), date(6))
    }

    #[tokio::test]
    async fn test_every_domain_reports_every_day() {
        let engine = AnalyticsEngine::new(
            MemoryReadingSource::from_readings(simulated(11)),
            AnalyticsConfig::default(),
        )
        .unwrap();
        let request =
            ReportRequest::parse(DEVICE, "2024-03-04", "2024-03-06", Granularity::Day).unwrap();

        let report = engine
            .combined_report(&request, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(report.rows.len(), 3);
        assert!(report.failed_domains.is_empty());
        for row in &report.rows {
            let driving = row.driving_summary.as_ref().unwrap();
            assert!(driving.has_data);
            assert_eq!(driving.reading_count, 1440);
            assert_eq!(driving.skipped_count, 0);
            assert_ne!(driving.confidence, Confidence::Low);

            assert!(row.fuel_summary.as_ref().unwrap().has_data);
            assert!(row.battery_summary.as_ref().unwrap().has_data);
            assert!(row.engine_summary.as_ref().unwrap().has_data);
            assert!(row.tire_summary.as_ref().unwrap().has_data);
        }
    }

    #[tokio::test]
    async fn test_daily_distance_adds_up_to_total() {
        let readings = simulated(5);
        let total = total_distance_km(&readings);
        let engine = AnalyticsEngine::new(
            MemoryReadingSource::from_readings(readings),
            AnalyticsConfig::default(),
        )
        .unwrap();

        let daily = ReportRequest::parse(DEVICE, "2024-03-04", "2024-03-06", Granularity::Day)
            .unwrap();
        let monthly = ReportRequest::parse(DEVICE, "2024-03-04", "2024-03-06", Granularity::Month)
            .unwrap();
        let cancel = CancellationToken::new();

        let days = engine.driving_report(&daily, &cancel).await.unwrap();
        let month = engine.driving_report(&monthly, &cancel).await.unwrap();

        let summed: f64 = days.values().map(|b| b.summary.distance_km).sum();
        let whole = month.values().next().unwrap().summary.distance_km;

        assert!(total > 0.0);
        assert!((summed - total).abs() < 1e-6, "{summed} != {total}");
        assert!((whole - total).abs() < 1e-6, "{whole} != {total}");
        assert_eq!(month.values().next().unwrap().label, "2024-03");
    }

    #[tokio::test]
    async fn test_simulated_fuel_use_is_positive() {
        let engine = AnalyticsEngine::new(
            MemoryReadingSource::from_readings(simulated(23)),
            AnalyticsConfig::default(),
        )
        .unwrap();
        let request =
            ReportRequest::parse(DEVICE, "2024-03-04", "2024-03-06", Granularity::Week).unwrap();

        let fuel = engine
            .fuel_report(&request, &CancellationToken::new())
            .await
            .unwrap();

        let consumed: f64 = fuel.values().map(|b| b.summary.consumed_liters).sum();
        assert!(consumed > 0.0);
        assert!(fuel
            .values()
            .all(|b| (0.0..=100.0).contains(&b.summary.end_level_percent)));
    }
}
