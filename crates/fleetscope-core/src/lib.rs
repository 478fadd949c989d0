//! # FleetScope Core Library
//!
//! Core analytics engine for the FleetScope vehicle telemetry reports.

#![warn(missing_docs)]
#![cfg_attr(docsrs, feature(doc_cfg))]

//!
//! This library provides:
//! - Delta computation between time-adjacent readings of one device
//! - Fuel gauge jitter filtering
//! - Event classification (speeding, rapid accel/decel, refuel, faults, ...)
//! - Heuristic confidence scoring of every bucket
//! - Calendar bucketing (day / ISO week / month) with gap filling
//! - Combined per-period reports across the driving, fuel, battery,
//!   engine and tire domains
//!
//! ## Example
//!
//! ```rust,ignore
//! use fleetscope_core::prelude::*;
//! use tokio_util::sync::CancellationToken;
//!
//! let source = MemoryReadingSource::load_json("readings.json")?;
//! let engine = AnalyticsEngine::new(source, AnalyticsConfig::default())?;
//!
//! let request = ReportRequest::parse("truck-17", "2024-01-01", "2024-01-07", Granularity::Day)?;
//! let report = engine.combined_report(&request, &CancellationToken::new()).await?;
//! println!("{}", serde_json::to_string_pretty(&report)?);
//! ```

pub mod aggregate;
pub mod bucket;
pub mod config;
pub mod confidence;
pub mod delta;
pub mod demo;
pub mod domain;
pub mod engine;
pub mod error;
pub mod events;
pub mod filter;
pub mod range;
pub mod reading;
pub mod report;
pub mod source;
pub mod status;
pub mod unit_conversion;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::aggregate::{Bucket, BucketMap};
    pub use crate::bucket::{BucketKey, Granularity};
    pub use crate::config::{AnalyticsConfig, ConfigError};
    pub use crate::confidence::Confidence;
    pub use crate::domain::{
        BatteryAnalyzer, Domain, DomainAnalyzer, DrivingAnalyzer, EngineAnalyzer, FuelAnalyzer,
        TireAnalyzer,
    };
    pub use crate::engine::{AnalyticsEngine, ReportRequest};
    pub use crate::error::{AnalyticsError, RequestContext};
    pub use crate::events::{Event, EventKind};
    pub use crate::range::TimeRange;
    pub use crate::reading::{Reading, ReadingField};
    pub use crate::report::{CombinedReport, CombinedReportRow};
    pub use crate::source::{MemoryReadingSource, ReadingSource, SourceError};
    pub use crate::status::DeviceStatus;
}

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
