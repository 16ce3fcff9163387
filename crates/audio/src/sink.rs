//! Abstraktion der Audio-Engine
//!
//! Die Engine stellt pro Sprecher eine Stimme (`SinkVoice`) bereit, die in
//! festem Takt aus einem `PlaybackFeed` zieht. Nach `stop()` darf die Engine
//! den Feed nicht mehr aufrufen.

use std::sync::Arc;
use tracing::debug;

use crate::error::AudioResult;
use crate::feed::PlaybackFeed;
use voxplay_protocol::codec::{ChannelCount, OpusConfig, SampleRate};

/// Format einer Stimme
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SinkFormat {
    pub sample_rate: SampleRate,
    pub channels: ChannelCount,
}

impl From<&OpusConfig> for SinkFormat {
    fn from(config: &OpusConfig) -> Self {
        Self {
            sample_rate: config.sample_rate,
            channels: config.channels,
        }
    }
}

/// Audio-Engine, die Streaming-Stimmen erzeugen kann
pub trait AudioSink {
    /// Erzeugt eine Stimme und startet die Wiedergabe sofort
    ///
    /// Die Stimme zieht ab diesem Zeitpunkt Samples (anfangs Stille) aus `feed`.
    fn create_voice(
        &mut self,
        format: SinkFormat,
        feed: Arc<PlaybackFeed>,
    ) -> AudioResult<Box<dyn SinkVoice>>;
}

/// Eine laufende Stimme der Audio-Engine
pub trait SinkVoice {
    /// Stoppt die Wiedergabe synchron
    ///
    /// Nach der Rueckkehr ist kein Callback mehr aktiv, der den Feed liest.
    fn stop(&mut self);

    /// Bisher wiedergegebene Frames (Wiedergabeposition)
    fn frames_played(&self) -> u64;
}

/// Besitz an einer Stimme; stoppt sie beim Drop genau einmal
#[derive(Default)]
pub struct SinkHandle {
    voice: Option<Box<dyn SinkVoice>>,
}

impl SinkHandle {
    pub fn new(voice: Box<dyn SinkVoice>) -> Self {
        Self { voice: Some(voice) }
    }

    /// True solange die Stimme nicht freigegeben wurde
    pub fn is_active(&self) -> bool {
        self.voice.is_some()
    }

    /// Stoppt und gibt die Stimme frei; weitere Aufrufe sind wirkungslos
    pub fn release(&mut self) {
        if let Some(mut voice) = self.voice.take() {
            voice.stop();
            debug!("Sink-Stimme freigegeben");
        }
    }

    /// Uebergibt die Stimme ohne sie zu stoppen; das Handle ist danach leer
    pub fn take(&mut self) -> Option<Box<dyn SinkVoice>> {
        self.voice.take()
    }

    pub fn frames_played(&self) -> u64 {
        self.voice.as_ref().map_or(0, |v| v.frames_played())
    }
}

impl Drop for SinkHandle {
    fn drop(&mut self) {
        self.release();
    }
}
