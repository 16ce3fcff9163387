//! Voice-Frames
//!
//! Ein Netzwerk-Paket buendelt bis zu `VOICE_MAX_FRAMES_IN_AUDIO_FRAME`
//! Opus-Pakete eines Sprechers. Der Netzwerk-Layer liefert die Frames bereits
//! entpackt, dedupliziert und in Sequenz-Reihenfolge pro Spieler aus.

use bytes::Bytes;
use thiserror::Error;
use voxplay_core::PlayerId;

/// Maximale Anzahl Opus-Pakete in einem `EncodedAudioFrame`
pub const VOICE_MAX_FRAMES_IN_AUDIO_FRAME: usize = 10;

/// Fehler beim Zusammenbauen eines Frames
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FrameError {
    #[error("Audio-Frame voll: maximal {max} Opus-Pakete erlaubt")]
    FrameVoll { max: usize },

    #[error("Leeres Opus-Paket")]
    LeeresPaket,
}

/// Bis zu zehn Opus-Pakete, die gemeinsam uebertragen werden
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EncodedAudioFrame {
    opus_frames: Vec<Bytes>,
}

impl EncodedAudioFrame {
    /// Erstellt einen leeren Frame
    pub fn new() -> Self {
        Self {
            opus_frames: Vec::with_capacity(VOICE_MAX_FRAMES_IN_AUDIO_FRAME),
        }
    }

    /// Erstellt einen Frame aus genau einem Opus-Paket
    pub fn single(opus: impl Into<Bytes>) -> Self {
        let mut frame = Self::new();
        frame.opus_frames.push(opus.into());
        frame
    }

    /// Haengt ein Opus-Paket an
    pub fn push_opus_frame(&mut self, opus: impl Into<Bytes>) -> Result<(), FrameError> {
        if self.opus_frames.len() >= VOICE_MAX_FRAMES_IN_AUDIO_FRAME {
            return Err(FrameError::FrameVoll {
                max: VOICE_MAX_FRAMES_IN_AUDIO_FRAME,
            });
        }
        let opus = opus.into();
        if opus.is_empty() {
            return Err(FrameError::LeeresPaket);
        }
        self.opus_frames.push(opus);
        Ok(())
    }

    /// Die enthaltenen Opus-Pakete in Sende-Reihenfolge
    pub fn opus_frames(&self) -> &[Bytes] {
        &self.opus_frames
    }

    pub fn len(&self) -> usize {
        self.opus_frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.opus_frames.is_empty()
    }

    /// Gesamtgroesse der Nutzdaten in Bytes
    pub fn payload_bytes(&self) -> usize {
        self.opus_frames.iter().map(Bytes::len).sum()
    }
}

/// Ein Voice-Frame wie ihn der Netzwerk-Layer ausliefert
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VoiceFrame {
    /// Sprecher
    pub player: PlayerId,
    /// Monoton steigende Sequenznummer pro Sprecher
    pub sequence: u32,
    /// Kodierte Audiodaten
    pub frame: EncodedAudioFrame,
}

impl VoiceFrame {
    pub fn new(player: PlayerId, sequence: u32, frame: EncodedAudioFrame) -> Self {
        Self {
            player,
            sequence,
            frame,
        }
    }
}
