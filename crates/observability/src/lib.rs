//! # voxplay-observability
//!
//! Observability-Crate fuer voxplay:
//! - Prometheus-kompatible Metriken der Voice-Wiedergabe
//! - Structured Logging (Text oder JSON) via tracing-subscriber

pub mod logging;
pub mod metrics;

pub use logging::logging_initialisieren;
pub use metrics::VoiceMetrics;
