//! Client-Konfiguration
//!
//! Wird beim Start aus einer TOML-Datei geladen. Alle Felder haben
//! sinnvolle Standardwerte, sodass der Client ohne Konfigurationsdatei
//! lauffaehig ist.

use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use voxplay_audio::{EstimatorConfig, PlaybackConfig, QueueConfig, VirtualSinkConfig};
use voxplay_observability::logging::{log_format_gueltig, log_level_gueltig};
use voxplay_protocol::AudioPreset;

/// Vollstaendige Client-Konfiguration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Wiedergabe-Einstellungen
    pub audio: AudioEinstellungen,
    /// Audio-Engine
    pub sink: SinkEinstellungen,
    /// Simulierte Gegenspieler
    pub simulation: SimulationEinstellungen,
    /// Logging-Einstellungen
    pub logging: LoggingEinstellungen,
    /// Metrik-Export
    pub metrics: MetrikEinstellungen,
}

/// Wiedergabe-Einstellungen
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioEinstellungen {
    /// Codec-Preset aller Sprecher
    pub preset: AudioPreset,
    /// Hochwassermarke des Jitter-Buffers (0 = unbegrenzt)
    pub max_latency_ms: u32,
    /// Ab dieser Lautheit gilt ein Spieler als sprechend
    pub speaking_threshold: f32,
    /// Lautstaerke neuer Streams
    pub default_volume: f32,
    /// Anstieg des Lautheits-Schaetzers pro Batch
    pub attack: f32,
    /// Abfall des Lautheits-Schaetzers pro Sekunde
    pub decay_per_second: f32,
}

impl Default for AudioEinstellungen {
    fn default() -> Self {
        let playback = PlaybackConfig::default();
        Self {
            preset: AudioPreset::GameVoice,
            max_latency_ms: playback.queue.max_latency_ms.unwrap_or(0),
            speaking_threshold: playback.speaking_threshold,
            default_volume: playback.default_volume,
            attack: playback.estimator.attack,
            decay_per_second: playback.estimator.decay_per_second,
        }
    }
}

/// Art der Audio-Engine
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SinkTyp {
    /// Software-Mix ohne Audio-Hardware
    #[default]
    Virtual,
    /// Ausgabe ueber cpal (Feature `cpal-sink`)
    Cpal,
}

/// Einstellungen der Audio-Engine
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SinkEinstellungen {
    pub typ: SinkTyp,
    /// Name (oder Namensteil) des Ausgabegeraets, fehlt = Standardgeraet
    pub geraet: Option<String>,
    /// Stimmen-Limit der virtuellen Engine
    pub max_voices: usize,
    /// Render-Periode der virtuellen Engine in Millisekunden
    pub period_ms: u64,
}

impl Default for SinkEinstellungen {
    fn default() -> Self {
        let virtuell = VirtualSinkConfig::default();
        Self {
            typ: SinkTyp::Virtual,
            geraet: None,
            max_voices: virtuell.max_voices,
            period_ms: virtuell.period.as_millis() as u64,
        }
    }
}

/// Simulierte Gegenspieler
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationEinstellungen {
    /// Anzahl sprechender Spieler
    pub players: u32,
    /// Laufzeit der Simulation in Sekunden (0 = bis Ctrl-C)
    pub duration_secs: u64,
    /// Maximale zusaetzliche Verzoegerung pro Frame
    pub jitter_ms: u64,
    /// Spiel-Ticks pro Sekunde
    pub tick_hz: u32,
    /// Jeder n-te Frame wird beschaedigt (fehlt = keiner)
    pub corrupt_every: Option<u32>,
    /// Spieler verlassen das Spiel nach dieser Zeit (fehlt = nie)
    pub leave_after_secs: Option<u64>,
}

impl Default for SimulationEinstellungen {
    fn default() -> Self {
        Self {
            players: 4,
            duration_secs: 10,
            jitter_ms: 15,
            tick_hz: 60,
            corrupt_every: None,
            leave_after_secs: None,
        }
    }
}

/// Logging-Einstellungen
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingEinstellungen {
    /// Log-Level: "trace", "debug", "info", "warn", "error"
    pub level: String,
    /// Format: "json" oder "text"
    pub format: String,
}

impl Default for LoggingEinstellungen {
    fn default() -> Self {
        Self {
            level: "info".into(),
            format: "text".into(),
        }
    }
}

/// Metrik-Export
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MetrikEinstellungen {
    /// Abstand der Zusammenfassungen im Log
    pub log_interval_secs: u64,
    /// Prometheus-Textdatei, die beim Beenden geschrieben wird
    pub datei: Option<String>,
}

impl Default for MetrikEinstellungen {
    fn default() -> Self {
        Self {
            log_interval_secs: 1,
            datei: None,
        }
    }
}

impl ClientConfig {
    /// Laedt die Konfiguration aus einer TOML-Datei.
    /// Gibt die Standardkonfiguration zurueck wenn die Datei nicht existiert.
    pub fn laden(pfad: &str) -> anyhow::Result<Self> {
        match std::fs::read_to_string(pfad) {
            Ok(inhalt) => {
                let config: Self = toml::from_str(&inhalt)
                    .with_context(|| format!("Konfigurationsfehler in '{pfad}'"))?;
                config.validieren()?;
                Ok(config)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::warn!(
                    pfad = pfad,
                    "Konfigurationsdatei nicht gefunden, verwende Standardwerte"
                );
                Ok(Self::default())
            }
            Err(e) => Err(anyhow::anyhow!(
                "Konfigurationsdatei '{pfad}' nicht lesbar: {e}"
            )),
        }
    }

    /// Prueft Werte, die serde allein nicht abfangen kann
    pub fn validieren(&self) -> anyhow::Result<()> {
        if self.simulation.tick_hz == 0 {
            anyhow::bail!("simulation.tick_hz muss groesser als 0 sein");
        }
        if self.sink.period_ms == 0 {
            anyhow::bail!("sink.period_ms muss groesser als 0 sein");
        }
        if self.simulation.corrupt_every == Some(0) {
            anyhow::bail!("simulation.corrupt_every muss groesser als 0 sein");
        }
        if !log_level_gueltig(&self.logging.level) {
            anyhow::bail!("Ungueltiger Log-Level '{}'", self.logging.level);
        }
        if !log_format_gueltig(&self.logging.format) {
            anyhow::bail!("Ungueltiges Log-Format '{}'", self.logging.format);
        }
        self.playback_config()
            .validieren()
            .context("Ungueltige Audio-Einstellungen")?;
        Ok(())
    }

    /// Baut die Konfiguration des Playback-Managers
    pub fn playback_config(&self) -> PlaybackConfig {
        PlaybackConfig {
            codec: self.audio.preset.config(),
            queue: QueueConfig {
                max_latency_ms: (self.audio.max_latency_ms > 0).then_some(self.audio.max_latency_ms),
            },
            estimator: EstimatorConfig {
                attack: self.audio.attack,
                decay_per_second: self.audio.decay_per_second,
            },
            speaking_threshold: self.audio.speaking_threshold,
            default_volume: self.audio.default_volume,
        }
    }

    /// Baut die Konfiguration der virtuellen Engine
    pub fn virtual_sink_config(&self) -> VirtualSinkConfig {
        VirtualSinkConfig {
            max_voices: self.sink.max_voices,
            period: Duration::from_millis(self.sink.period_ms),
        }
    }

    /// Dauer eines Spiel-Ticks
    pub fn tick_dauer(&self) -> Duration {
        Duration::from_micros(1_000_000 / self.simulation.tick_hz.max(1) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_config_ist_valide() {
        let cfg = ClientConfig::default();
        cfg.validieren().unwrap();
        assert_eq!(cfg.audio.preset, AudioPreset::GameVoice);
        assert_eq!(cfg.audio.max_latency_ms, 500);
        assert_eq!(cfg.sink.typ, SinkTyp::Virtual);
        assert_eq!(cfg.logging.level, "info");
    }

    #[test]
    fn config_aus_toml_string() {
        let toml = r#"
            [audio]
            preset = "speech"
            speaking_threshold = 0.1

            [sink]
            typ = "cpal"
            geraet = "USB"

            [simulation]
            players = 2
            corrupt_every = 25
        "#;
        let cfg: ClientConfig = toml::from_str(toml).unwrap();
        assert_eq!(cfg.audio.preset, AudioPreset::Speech);
        assert_eq!(cfg.audio.speaking_threshold, 0.1);
        assert_eq!(cfg.sink.typ, SinkTyp::Cpal);
        assert_eq!(cfg.sink.geraet.as_deref(), Some("USB"));
        assert_eq!(cfg.simulation.players, 2);
        assert_eq!(cfg.simulation.corrupt_every, Some(25));
        // Nicht angegebene Felder behalten Standardwerte
        assert_eq!(cfg.simulation.tick_hz, 60);
        assert_eq!(cfg.audio.max_latency_ms, 500);
    }

    #[test]
    fn playback_config_uebernimmt_werte() {
        let mut cfg = ClientConfig::default();
        cfg.audio.preset = AudioPreset::LowBandwidth;
        cfg.audio.max_latency_ms = 0;
        cfg.audio.default_volume = 0.5;

        let playback = cfg.playback_config();
        assert_eq!(playback.codec, AudioPreset::LowBandwidth.config());
        assert_eq!(playback.queue.max_latency_ms, None);
        assert_eq!(playback.default_volume, 0.5);
    }

    #[test]
    fn ungueltige_werte_werden_abgelehnt() {
        let mut cfg = ClientConfig::default();
        cfg.simulation.tick_hz = 0;
        assert!(cfg.validieren().is_err());

        let mut cfg = ClientConfig::default();
        cfg.logging.format = "xml".into();
        assert!(cfg.validieren().is_err());

        let mut cfg = ClientConfig::default();
        cfg.audio.speaking_threshold = -1.0;
        assert!(cfg.validieren().is_err());
    }

    #[test]
    fn beispiel_datei_ist_gueltig() {
        let cfg: ClientConfig = toml::from_str(include_str!("../voxplay.toml")).unwrap();
        cfg.validieren().unwrap();
        assert_eq!(cfg.simulation.corrupt_every, Some(50));
    }

    #[test]
    fn fehlende_datei_liefert_standardwerte() {
        let cfg = ClientConfig::laden("/nicht/vorhanden/voxplay.toml").unwrap();
        assert_eq!(cfg.simulation.players, 4);
    }

    #[test]
    fn tick_dauer_aus_frequenz() {
        let mut cfg = ClientConfig::default();
        cfg.simulation.tick_hz = 50;
        assert_eq!(cfg.tick_dauer(), Duration::from_millis(20));
    }
}
