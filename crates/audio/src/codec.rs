//! Opus Encoder/Decoder Wrapper
//!
//! Kapselt audiopus und stellt eine f32-PCM basierte API bereit.
//! Der Decoder ist zustandsbehaftet (Packet Loss Concealment): Frames eines
//! Sprechers muessen in Sequenz-Reihenfolge dekodiert werden.

use audiopus::{
    coder::{Decoder, Encoder},
    Application, Channels, SampleRate,
};
use tracing::{debug, trace};

use crate::error::{AudioError, AudioResult};
use crate::pcm::PcmBuffer;
use voxplay_protocol::codec::{
    ChannelCount, FrameSizeMs, OpusApplication, OpusConfig, SampleRate as ProtocolSampleRate,
};
use voxplay_protocol::voice::EncodedAudioFrame;

/// Opus-Encoder: kodiert f32-PCM zu Opus-Bytes
///
/// Wird fuer synthetische Sprecher und Tests benoetigt; im Spiel kodiert
/// der sendende Client.
pub struct OpusEncoder {
    encoder: Encoder,
    config: OpusConfig,
    frame_size: usize,
}

impl OpusEncoder {
    /// Erstellt einen neuen Encoder mit der gegebenen Konfiguration
    pub fn new(config: OpusConfig) -> AudioResult<Self> {
        config.validieren().map_err(AudioError::Konfiguration)?;

        let sample_rate = protocol_rate_to_audiopus(config.sample_rate);
        let channels = protocol_channels_to_audiopus(config.channels);
        let application = protocol_app_to_audiopus(config.application);

        let mut encoder = Encoder::new(sample_rate, channels, application)
            .map_err(|e| AudioError::CodecFehler(e.to_string()))?;

        encoder
            .set_bitrate(audiopus::Bitrate::BitsPerSecond(
                (config.bitrate_kbps as i32) * 1000,
            ))
            .map_err(|e| AudioError::CodecFehler(e.to_string()))?;

        // audiopus 0.2 erwartet u8
        encoder
            .set_complexity(config.complexity)
            .map_err(|e| AudioError::CodecFehler(e.to_string()))?;

        let frame_size = config.samples_per_frame();

        debug!(
            "OpusEncoder erstellt: {}kbps, {:?}, frame_size={}",
            config.bitrate_kbps, config.sample_rate, frame_size
        );

        Ok(Self {
            encoder,
            config,
            frame_size,
        })
    }

    /// Kodiert einen PCM-Frame (f32, interleaved) zu Opus-Bytes
    ///
    /// Die Eingabe muss exakt `frame_size()` Samples lang sein.
    pub fn encode(&mut self, pcm: &[f32]) -> AudioResult<Vec<u8>> {
        if pcm.len() != self.frame_size {
            return Err(AudioError::Konfiguration(format!(
                "PCM-Frame muss {} Samples lang sein, war {}",
                self.frame_size,
                pcm.len()
            )));
        }

        // max. 4000 Bytes reicht fuer alle Opus-Frames
        let mut output = vec![0u8; 4000];
        let written = self
            .encoder
            .encode_float(pcm, &mut output)
            .map_err(|e| AudioError::CodecFehler(e.to_string()))?;

        output.truncate(written);
        Ok(output)
    }

    /// Erwartete Frame-Groesse in Samples (alle Kanaele)
    pub fn frame_size(&self) -> usize {
        self.frame_size
    }

    pub fn config(&self) -> &OpusConfig {
        &self.config
    }
}

/// Konfiguration des Decoders. Muss zum Encoder des Senders passen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CodecState {
    pub sample_rate: ProtocolSampleRate,
    pub channels: ChannelCount,
    pub frame_size: FrameSizeMs,
}

impl From<&OpusConfig> for CodecState {
    fn from(config: &OpusConfig) -> Self {
        Self {
            sample_rate: config.sample_rate,
            channels: config.channels,
            frame_size: config.frame_size,
        }
    }
}

/// Opus-Decoder: dekodiert Opus-Bytes zu f32-PCM
pub struct OpusDecoder {
    decoder: Decoder,
    state: CodecState,
}

impl OpusDecoder {
    /// Erstellt einen neuen Decoder
    pub fn new(state: CodecState) -> AudioResult<Self> {
        let decoder = make_decoder(&state)?;
        debug!(
            "OpusDecoder erstellt: {:?} {:?} {:?}",
            state.sample_rate, state.channels, state.frame_size
        );
        Ok(Self { decoder, state })
    }

    /// Erstellt einen Decoder aus einer OpusConfig
    pub fn from_config(config: &OpusConfig) -> AudioResult<Self> {
        Self::new(CodecState::from(config))
    }

    /// Dekodiert ein Opus-Paket zu genau `samples_per_frame()` Samples
    ///
    /// Ein fehlerhaftes Paket oder eines mit abweichender Frame-Dauer liefert
    /// `AudioError::Dekodierung`. Der Decoder bleibt danach benutzbar.
    pub fn decode(&mut self, opus_data: &[u8]) -> AudioResult<PcmBuffer> {
        if opus_data.is_empty() {
            return Err(AudioError::Dekodierung("leeres Opus-Paket".into()));
        }

        let frame_size = self.frame_size();
        let channels = self.state.channels.count();
        let mut output = vec![0.0f32; frame_size * channels];
        let decoded = self
            .decoder
            .decode_float(Some(opus_data), &mut output, false)
            .map_err(|e| AudioError::Dekodierung(e.to_string()))?;

        if decoded != frame_size {
            return Err(AudioError::Dekodierung(format!(
                "Paket enthaelt {} Samples pro Kanal, erwartet {}",
                decoded, frame_size
            )));
        }

        trace!(bytes = opus_data.len(), samples = output.len(), "Opus-Paket dekodiert");
        Ok(PcmBuffer::from_vec(output))
    }

    /// Dekodiert alle Pakete eines Audio-Frames in einen zusammenhaengenden Puffer
    ///
    /// Schlaegt ein Paket fehl, wird der gesamte Frame verworfen.
    pub fn decode_frame(&mut self, frame: &EncodedAudioFrame) -> AudioResult<PcmBuffer> {
        let mut pcm = Vec::with_capacity(frame.len() * self.samples_per_frame());
        for opus in frame.opus_frames() {
            let decoded = self.decode(opus)?;
            pcm.extend_from_slice(decoded.as_slice());
        }
        Ok(PcmBuffer::from_vec(pcm))
    }

    /// Setzt die Abtastrate und erstellt den Decoder neu
    pub fn set_sample_rate(&mut self, sample_rate: ProtocolSampleRate) -> AudioResult<()> {
        self.state.sample_rate = sample_rate;
        self.remake_decoder()
    }

    /// Setzt die Frame-Groesse und erstellt den Decoder neu
    pub fn set_frame_size(&mut self, frame_size: FrameSizeMs) -> AudioResult<()> {
        self.state.frame_size = frame_size;
        self.remake_decoder()
    }

    /// Setzt die Kanalanzahl und erstellt den Decoder neu
    pub fn set_channels(&mut self, channels: ChannelCount) -> AudioResult<()> {
        self.state.channels = channels;
        self.remake_decoder()
    }

    /// Verwirft den internen Decoder-Zustand (PLC-Historie)
    pub fn reset(&mut self) -> AudioResult<()> {
        self.remake_decoder()
    }

    /// Frame-Groesse in Samples pro Kanal
    pub fn frame_size(&self) -> usize {
        self.state.frame_size.samples_per_frame(self.state.sample_rate) as usize
    }

    /// Samples pro dekodiertem Paket ueber alle Kanaele
    pub fn samples_per_frame(&self) -> usize {
        self.frame_size() * self.state.channels.count()
    }

    pub fn channels(&self) -> ChannelCount {
        self.state.channels
    }

    pub fn sample_rate(&self) -> ProtocolSampleRate {
        self.state.sample_rate
    }

    pub fn state(&self) -> CodecState {
        self.state
    }

    fn remake_decoder(&mut self) -> AudioResult<()> {
        self.decoder = make_decoder(&self.state)?;
        debug!(
            "OpusDecoder neu erstellt: {:?} {:?} {:?}",
            self.state.sample_rate, self.state.channels, self.state.frame_size
        );
        Ok(())
    }
}

fn make_decoder(state: &CodecState) -> AudioResult<Decoder> {
    let sr = protocol_rate_to_audiopus(state.sample_rate);
    let ch = protocol_channels_to_audiopus(state.channels);
    Decoder::new(sr, ch).map_err(|e| AudioError::Konfiguration(e.to_string()))
}

// ---------------------------------------------------------------------------
// Konvertierungs-Hilfsfunktionen
// ---------------------------------------------------------------------------

fn protocol_rate_to_audiopus(rate: ProtocolSampleRate) -> SampleRate {
    match rate {
        ProtocolSampleRate::Hz8000 => SampleRate::Hz8000,
        ProtocolSampleRate::Hz12000 => SampleRate::Hz12000,
        ProtocolSampleRate::Hz16000 => SampleRate::Hz16000,
        ProtocolSampleRate::Hz24000 => SampleRate::Hz24000,
        ProtocolSampleRate::Hz48000 => SampleRate::Hz48000,
    }
}

fn protocol_channels_to_audiopus(ch: ChannelCount) -> Channels {
    match ch {
        ChannelCount::Mono => Channels::Mono,
        ChannelCount::Stereo => Channels::Stereo,
    }
}

fn protocol_app_to_audiopus(app: OpusApplication) -> Application {
    match app {
        OpusApplication::Voip => Application::Voip,
        OpusApplication::Audio => Application::Audio,
        OpusApplication::RestrictedLowdelay => Application::LowDelay,
    }
}
