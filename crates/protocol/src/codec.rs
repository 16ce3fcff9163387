//! Codec-Konfiguration fuer die Voice-Uebertragung
//!
//! Abtastrate, Kanalanzahl und Frame-Groesse sind durch das Protokoll
//! festgelegt: Sender und Empfaenger muessen dieselbe Konfiguration nutzen,
//! sonst ist die Dekodierung ungueltig.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Opus-Konfiguration
// ---------------------------------------------------------------------------

/// Abtastrate fuer Opus
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SampleRate {
    /// 8 kHz – Schmalband
    Hz8000 = 8000,
    /// 12 kHz – Mittelband
    Hz12000 = 12000,
    /// 16 kHz – Breitband
    Hz16000 = 16000,
    /// 24 kHz – Superbreitband
    Hz24000 = 24000,
    /// 48 kHz – Vollband
    #[default]
    Hz48000 = 48000,
}

impl SampleRate {
    /// Gibt die Abtastrate in Hz zurueck
    pub fn hz(&self) -> u32 {
        *self as u32
    }
}

/// Anzahl der Audio-Kanaele
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelCount {
    /// Mono – Standard fuer Sprache
    #[default]
    Mono = 1,
    /// Stereo
    Stereo = 2,
}

impl ChannelCount {
    /// Gibt die Kanalanzahl als Zahl zurueck
    pub fn count(&self) -> usize {
        *self as usize
    }
}

/// Opus-Anwendungsmodus (nur fuer den Encoder relevant)
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OpusApplication {
    /// Optimiert fuer Sprachverstaendlichkeit
    #[default]
    Voip,
    /// Optimiert fuer allgemeine Audio-Qualitaet
    Audio,
    /// Minimale Verarbeitungsverzoegerung
    RestrictedLowdelay,
}

/// Frame-Groesse in Millisekunden
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FrameSizeMs {
    /// 2.5 ms (als Zehntelmillisekunden: 25)
    Ms2_5 = 25,
    /// 5 ms
    Ms5 = 50,
    /// 10 ms
    Ms10 = 100,
    /// 20 ms – Standard
    #[default]
    Ms20 = 200,
    /// 40 ms
    Ms40 = 400,
    /// 60 ms
    Ms60 = 600,
}

impl FrameSizeMs {
    /// Gibt die Frame-Groesse als Millisekunden zurueck
    pub fn as_ms(&self) -> f32 {
        (*self as u32) as f32 / 10.0
    }

    /// Berechnet die Anzahl der Samples pro Kanal und Frame bei gegebener Abtastrate
    pub fn samples_per_frame(&self, sample_rate: SampleRate) -> u32 {
        let rate = sample_rate as u32;
        let ms_x10 = *self as u32;
        // ms_x10 / 10 * rate / 1000 = ms_x10 * rate / 10000
        ms_x10 * rate / 10000
    }
}

/// Vollstaendige Opus-Codec-Konfiguration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpusConfig {
    /// Ziel-Bitrate in kbps (6–510)
    pub bitrate_kbps: u16,
    /// Abtastrate
    pub sample_rate: SampleRate,
    /// Anzahl der Kanaele
    pub channels: ChannelCount,
    /// Frame-Groesse
    pub frame_size: FrameSizeMs,
    /// Anwendungsmodus
    pub application: OpusApplication,
    /// Komplexitaet (0–10)
    pub complexity: u8,
}

impl OpusConfig {
    /// Validiert die Konfiguration
    pub fn validieren(&self) -> Result<(), String> {
        if self.bitrate_kbps < 6 || self.bitrate_kbps > 510 {
            return Err(format!(
                "Bitrate muss zwischen 6 und 510 kbps liegen (war: {})",
                self.bitrate_kbps
            ));
        }
        if self.complexity > 10 {
            return Err(format!(
                "Komplexitaet muss zwischen 0 und 10 liegen (war: {})",
                self.complexity
            ));
        }
        Ok(())
    }

    /// Samples pro Frame ueber alle Kanaele (interleaved)
    pub fn samples_per_frame(&self) -> usize {
        self.frame_size.samples_per_frame(self.sample_rate) as usize * self.channels.count()
    }

    /// Anzahl interleaved Samples fuer eine Dauer in Millisekunden
    pub fn samples_for_ms(&self, ms: u32) -> usize {
        (self.sample_rate.hz() as u64 * ms as u64 / 1000) as usize * self.channels.count()
    }
}

impl Default for OpusConfig {
    fn default() -> Self {
        AudioPreset::GameVoice.config()
    }
}

// ---------------------------------------------------------------------------
// Audio-Presets
// ---------------------------------------------------------------------------

/// Vordefinierte Codec-Konfigurationen
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AudioPreset {
    /// Ingame-Voice: 48 kHz, Mono, 20 ms Frames
    #[default]
    GameVoice,
    /// Breitband-Sprache mit niedriger Bitrate (16 kHz)
    Speech,
    /// Minimale Bandbreite (8 kHz, 40 ms Frames)
    LowBandwidth,
}

impl AudioPreset {
    /// Gibt die vordefinierte `OpusConfig` fuer dieses Preset zurueck
    pub fn config(&self) -> OpusConfig {
        match self {
            AudioPreset::GameVoice => OpusConfig {
                bitrate_kbps: 48,
                sample_rate: SampleRate::Hz48000,
                channels: ChannelCount::Mono,
                frame_size: FrameSizeMs::Ms20,
                application: OpusApplication::Voip,
                complexity: 8,
            },
            AudioPreset::Speech => OpusConfig {
                bitrate_kbps: 24,
                sample_rate: SampleRate::Hz16000,
                channels: ChannelCount::Mono,
                frame_size: FrameSizeMs::Ms20,
                application: OpusApplication::Voip,
                complexity: 8,
            },
            AudioPreset::LowBandwidth => OpusConfig {
                bitrate_kbps: 12,
                sample_rate: SampleRate::Hz8000,
                channels: ChannelCount::Mono,
                frame_size: FrameSizeMs::Ms40,
                application: OpusApplication::Voip,
                complexity: 5,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn game_voice_preset_konfiguration() {
        let config = AudioPreset::GameVoice.config();
        assert_eq!(config.sample_rate, SampleRate::Hz48000);
        assert_eq!(config.channels, ChannelCount::Mono);
        assert_eq!(config.frame_size, FrameSizeMs::Ms20);
        // 20ms bei 48kHz mono = 960 Samples
        assert_eq!(config.samples_per_frame(), 960);
    }

    #[test]
    fn alle_presets_validierbar() {
        for preset in [
            AudioPreset::GameVoice,
            AudioPreset::Speech,
            AudioPreset::LowBandwidth,
        ] {
            assert!(
                preset.config().validieren().is_ok(),
                "Preset {:?} hat ungueltige Konfiguration",
                preset
            );
        }
    }

    #[test]
    fn opus_config_validierung_ungueltige_bitrate() {
        let mut config = AudioPreset::Speech.config();
        config.bitrate_kbps = 5;
        assert!(config.validieren().is_err());

        config.bitrate_kbps = 511;
        assert!(config.validieren().is_err());
    }

    #[test]
    fn opus_config_validierung_ungueltige_komplexitaet() {
        let mut config = AudioPreset::GameVoice.config();
        config.complexity = 11;
        assert!(config.validieren().is_err());
    }

    #[test]
    fn frame_size_samples_per_frame() {
        assert_eq!(FrameSizeMs::Ms20.samples_per_frame(SampleRate::Hz48000), 960);
        assert_eq!(FrameSizeMs::Ms10.samples_per_frame(SampleRate::Hz16000), 160);
        assert_eq!(FrameSizeMs::Ms60.samples_per_frame(SampleRate::Hz24000), 1440);
    }

    #[test]
    fn samples_fuer_dauer_stereo() {
        let mut config = AudioPreset::GameVoice.config();
        config.channels = ChannelCount::Stereo;
        assert_eq!(config.samples_for_ms(60), 48_000 * 60 / 1000 * 2);
        assert_eq!(config.samples_per_frame(), 1920);
    }

    #[test]
    fn opus_config_serde_aus_snake_case() {
        let json = r#"{
            "bitrate_kbps": 32,
            "sample_rate": "hz24000",
            "channels": "mono",
            "frame_size": "ms60",
            "application": "voip",
            "complexity": 5
        }"#;
        let config: OpusConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.sample_rate, SampleRate::Hz24000);
        assert_eq!(config.frame_size, FrameSizeMs::Ms60);
    }
}
