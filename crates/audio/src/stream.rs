//! Wiedergabe-Stream eines einzelnen Sprechers
//!
//! Buendelt Decoder, Jitter-Buffer, Lautheits-Schaetzer und eine Stimme der
//! Audio-Engine. Zustaende: `Idle` (erstellt, ohne Stimme) und `Active`
//! (Stimme laeuft). Zerstoert wird der Stream durch `Drop` bzw. `destroy`:
//! zuerst wird die Stimme gestoppt, danach werden Decoder und Puffer
//! freigegeben.

use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, warn};

use crate::codec::OpusDecoder;
use crate::error::AudioResult;
use crate::estimator::{EstimatorConfig, LoudnessEstimator};
use crate::feed::PlaybackFeed;
use crate::pcm::PcmBuffer;
use crate::sample_queue::{JitterBuffer, QueueStats};
use crate::sink::{AudioSink, SinkFormat, SinkHandle};
use voxplay_core::PlayerId;
use voxplay_protocol::voice::EncodedAudioFrame;

/// Lebenszyklus eines Streams
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamState {
    /// Erstellt, noch keine Stimme
    Idle,
    /// Stimme laeuft und zieht Samples
    Active,
}

/// Wiedergabe-Stream eines Spielers
pub struct PlaybackStream {
    player: PlayerId,
    sink: SinkHandle,
    feed: Arc<PlaybackFeed>,
    decoder: OpusDecoder,
    estimator: LoudnessEstimator,
    decode_errors: u64,
    frames_decoded: u64,
}

impl PlaybackStream {
    /// Erstellt einen Stream im Zustand `Idle`
    pub fn new(
        player: PlayerId,
        decoder: OpusDecoder,
        queue: JitterBuffer,
        estimator: EstimatorConfig,
        volume: f32,
    ) -> Self {
        Self {
            player,
            sink: SinkHandle::default(),
            feed: Arc::new(PlaybackFeed::new(queue, volume)),
            decoder,
            estimator: LoudnessEstimator::new(estimator),
            decode_errors: 0,
            frames_decoded: 0,
        }
    }

    /// Startet die Wiedergabe (Idle → Active)
    ///
    /// Die Stimme spielt sofort Stille, damit der Takt der Engine bereits
    /// laeuft, wenn die ersten Samples eintreffen. Ist der Stream schon aktiv,
    /// passiert nichts.
    pub fn start(&mut self, sink: &mut dyn AudioSink) -> AudioResult<()> {
        if self.sink.is_active() {
            return Ok(());
        }

        let format = SinkFormat {
            sample_rate: self.decoder.sample_rate(),
            channels: self.decoder.channels(),
        };
        let voice = sink.create_voice(format, Arc::clone(&self.feed))?;
        self.sink = SinkHandle::new(voice);
        debug!(player = %self.player, "Stream gestartet");
        Ok(())
    }

    /// Dekodiert einen Frame und haengt ihn an den Jitter-Buffer an
    ///
    /// Bei einem Dekodierfehler wird der Frame verworfen; der Stream bleibt
    /// benutzbar und der Fehler wird zurueckgegeben.
    pub fn write_frame(&mut self, frame: &EncodedAudioFrame) -> AudioResult<()> {
        match self.decoder.decode_frame(frame) {
            Ok(pcm) => {
                self.frames_decoded += frame.len() as u64;
                self.write_pcm(pcm);
                Ok(())
            }
            Err(e) => {
                self.decode_errors += 1;
                warn!(player = %self.player, "Frame verworfen: {}", e);
                Err(e)
            }
        }
    }

    /// Haengt rohe PCM-Samples an (ohne Dekodierung)
    pub fn write_pcm(&mut self, pcm: PcmBuffer) {
        self.estimator.update(pcm.as_slice());
        self.feed.queue().push(pcm);
    }

    /// Setzt die Lautstaerke (0.0 stumm, 1.0 normal, bis 2.0 Verstaerkung)
    pub fn set_volume(&mut self, volume: f32) {
        self.feed.set_volume(volume);
    }

    pub fn volume(&self) -> f32 {
        self.feed.volume()
    }

    /// Einmal pro Spiel-Tick aufrufen
    pub fn update_estimator(&mut self, dt: f32) {
        self.estimator.decay(dt);
    }

    /// Geglaettete Lautheit (0.0..=1.0)
    pub fn loudness(&self) -> f32 {
        self.estimator.current()
    }

    /// Zeitpunkt, zu dem der Sink zuletzt echte Samples gezogen hat
    pub fn last_playback_time(&self) -> Option<Instant> {
        self.feed.last_playback_time()
    }

    /// True wenn die letzte Anforderung des Sinks nicht bedient werden konnte
    pub fn is_starving(&self) -> bool {
        self.feed.queue().is_starving()
    }

    pub fn state(&self) -> StreamState {
        if self.sink.is_active() {
            StreamState::Active
        } else {
            StreamState::Idle
        }
    }

    pub fn player(&self) -> PlayerId {
        self.player
    }

    /// Aktuell gepufferte Samples
    pub fn buffered_samples(&self) -> usize {
        self.feed.queue().len()
    }

    pub fn queue_stats(&self) -> QueueStats {
        self.feed.queue().stats()
    }

    pub fn decode_errors(&self) -> u64 {
        self.decode_errors
    }

    pub fn frames_decoded(&self) -> u64 {
        self.frames_decoded
    }

    /// Wiedergabeposition der Stimme in Frames
    pub fn frames_played(&self) -> u64 {
        self.sink.frames_played()
    }

    /// Seite, aus der die Audio-Engine liest
    pub fn feed(&self) -> &Arc<PlaybackFeed> {
        &self.feed
    }

    /// Zerstoert den Stream explizit
    pub fn destroy(self) {
        drop(self);
    }
}

impl Drop for PlaybackStream {
    fn drop(&mut self) {
        // Stimme vor Decoder und Puffer freigeben
        self.sink.release();
        debug!(player = %self.player, "Stream zerstoert");
    }
}
