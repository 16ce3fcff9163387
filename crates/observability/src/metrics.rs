//! Prometheus-kompatible Metriken der Voice-Wiedergabe
//!
//! Registrierte Metriken:
//! - `voxplay_streams_active` – Gauge: Streams mit laufender Stimme
//! - `voxplay_streams_speaking` – Gauge: Spieler ueber der Sprech-Schwelle
//! - `voxplay_streams_starving` – Gauge: Streams mit leerem Jitter-Buffer
//! - `voxplay_buffered_latency_seconds` – Gauge: Groesste gepufferte Latenz
//! - `voxplay_buffer_latency_seconds` – Histogram: Gepufferte Latenz pro Tick
//! - `voxplay_frames_decoded_total` – Counter: Dekodierte Opus-Pakete
//! - `voxplay_decode_errors_total` – Counter: Verworfene Frames
//! - `voxplay_underruns_total` – Counter: Nicht voll bediente Sink-Anforderungen
//! - `voxplay_dropped_samples_total` – Counter: Wegen Hochwassermarke verworfene Samples
//! - `voxplay_sink_errors_total` – Counter: Stimmen, die die Audio-Engine verweigert hat

use anyhow::Result;
use prometheus::{
    Encoder, Gauge, Histogram, HistogramOpts, IntCounter, IntGauge, Opts, Registry, TextEncoder,
};
use std::sync::Arc;

/// Alle Voice-Metriken eines Clients
#[derive(Clone)]
pub struct VoiceMetrics {
    pub registry: Arc<Registry>,

    // Momentaufnahmen
    pub streams_active: IntGauge,
    pub streams_speaking: IntGauge,
    pub streams_starving: IntGauge,
    pub buffered_latency_seconds: Gauge,
    pub buffer_latency_seconds: Histogram,

    // Zaehler
    pub frames_decoded_total: IntCounter,
    pub decode_errors_total: IntCounter,
    pub underruns_total: IntCounter,
    pub dropped_samples_total: IntCounter,
    pub sink_errors_total: IntCounter,
}

impl VoiceMetrics {
    /// Erstellt und registriert alle Metriken in einer neuen Registry
    pub fn neu() -> Result<Self> {
        let registry = Registry::new();

        // --- Gauges ---
        let streams_active = IntGauge::with_opts(Opts::new(
            "voxplay_streams_active",
            "Anzahl Streams mit laufender Stimme",
        ))?;
        registry.register(Box::new(streams_active.clone()))?;

        let streams_speaking = IntGauge::with_opts(Opts::new(
            "voxplay_streams_speaking",
            "Anzahl Spieler ueber der Sprech-Schwelle",
        ))?;
        registry.register(Box::new(streams_speaking.clone()))?;

        let streams_starving = IntGauge::with_opts(Opts::new(
            "voxplay_streams_starving",
            "Anzahl Streams, deren letzte Anforderung nicht bedient werden konnte",
        ))?;
        registry.register(Box::new(streams_starving.clone()))?;

        let buffered_latency_seconds = Gauge::with_opts(Opts::new(
            "voxplay_buffered_latency_seconds",
            "Groesste gepufferte Latenz eines Streams in Sekunden",
        ))?;
        registry.register(Box::new(buffered_latency_seconds.clone()))?;

        let buffer_latency_seconds = Histogram::with_opts(
            HistogramOpts::new(
                "voxplay_buffer_latency_seconds",
                "Gepufferte Latenz pro Spiel-Tick in Sekunden",
            )
            .buckets(vec![0.0, 0.01, 0.02, 0.04, 0.06, 0.1, 0.2, 0.5, 1.0]),
        )?;
        registry.register(Box::new(buffer_latency_seconds.clone()))?;

        // --- Counter ---
        let frames_decoded_total = IntCounter::with_opts(Opts::new(
            "voxplay_frames_decoded_total",
            "Gesamtanzahl dekodierter Opus-Pakete",
        ))?;
        registry.register(Box::new(frames_decoded_total.clone()))?;

        let decode_errors_total = IntCounter::with_opts(Opts::new(
            "voxplay_decode_errors_total",
            "Gesamtanzahl verworfener Frames",
        ))?;
        registry.register(Box::new(decode_errors_total.clone()))?;

        let underruns_total = IntCounter::with_opts(Opts::new(
            "voxplay_underruns_total",
            "Gesamtanzahl nicht voll bedienter Sink-Anforderungen",
        ))?;
        registry.register(Box::new(underruns_total.clone()))?;

        let dropped_samples_total = IntCounter::with_opts(Opts::new(
            "voxplay_dropped_samples_total",
            "Gesamtanzahl wegen Hochwassermarke verworfener Samples",
        ))?;
        registry.register(Box::new(dropped_samples_total.clone()))?;

        let sink_errors_total = IntCounter::with_opts(Opts::new(
            "voxplay_sink_errors_total",
            "Gesamtanzahl verweigerter Stimmen der Audio-Engine",
        ))?;
        registry.register(Box::new(sink_errors_total.clone()))?;

        Ok(Self {
            registry: Arc::new(registry),
            streams_active,
            streams_speaking,
            streams_starving,
            buffered_latency_seconds,
            buffer_latency_seconds,
            frames_decoded_total,
            decode_errors_total,
            underruns_total,
            dropped_samples_total,
            sink_errors_total,
        })
    }

    /// Exportiert alle Metriken im Prometheus-Textformat
    pub fn exportieren(&self) -> Result<String> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        Ok(String::from_utf8(buffer)?)
    }
}

/// Zieht einen Counter auf einen absoluten Stand nach
///
/// Kleinere Staende werden ignoriert, ein Counter faellt nie.
pub fn auf_stand_bringen(counter: &IntCounter, stand: u64) {
    let aktuell = counter.get();
    if stand > aktuell {
        counter.inc_by(stand - aktuell);
    }
}
