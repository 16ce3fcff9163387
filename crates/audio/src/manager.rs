//! Verwaltung aller Wiedergabe-Streams einer Client-Sitzung
//!
//! Der `PlaybackManager` ist nicht thread-sicher gedacht: er gehoert der
//! Voice-Sitzung und wird nur aus deren Schleife (Netzwerk-Frames, Spiel-Tick,
//! UI-Abfragen) per `&mut` benutzt. Nur die Feeds der Streams werden mit dem
//! Audio-Thread geteilt.
//!
//! Verhalten bei unbekannten Spielern:
//! - `prepare_stream`, `start_stream`, `play_frame_streamed` und
//!   `play_raw_streamed` legen den Stream bei Bedarf an
//! - `remove_stream` liefert `false`, Broadcast-Aufrufe tun nichts
//! - `is_speaking` liefert `false`
//! - alle anderen Einzelabfragen liefern `AudioError::UnbekannterStream`

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Instant;
use tracing::{debug, info, trace};

use crate::codec::OpusDecoder;
use crate::error::{AudioError, AudioResult};
use crate::estimator::EstimatorConfig;
use crate::feed::clamp_volume;
use crate::pcm::PcmBuffer;
use crate::sample_queue::{JitterBuffer, QueueConfig};
use crate::sink::AudioSink;
use crate::stream::{PlaybackStream, StreamState};
use voxplay_core::PlayerId;
use voxplay_protocol::codec::OpusConfig;
use voxplay_protocol::voice::EncodedAudioFrame;

/// Konfiguration der Wiedergabe
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaybackConfig {
    /// Codec-Parameter aller eingehenden Streams
    pub codec: OpusConfig,
    pub queue: QueueConfig,
    pub estimator: EstimatorConfig,
    /// Ab dieser Lautheit gilt ein Spieler als sprechend
    pub speaking_threshold: f32,
    /// Lautstaerke neuer Streams
    pub default_volume: f32,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            codec: OpusConfig::default(),
            queue: QueueConfig::default(),
            estimator: EstimatorConfig::default(),
            speaking_threshold: 0.02,
            default_volume: 1.0,
        }
    }
}

impl PlaybackConfig {
    /// Prueft die Konfiguration auf Konsistenz
    pub fn validieren(&self) -> AudioResult<()> {
        self.codec
            .validieren()
            .map_err(AudioError::Konfiguration)?;
        // Hochwassermarke unter einem Frame wuerde jeden Frame beschneiden
        if let Some(ms) = self.queue.max_latency_ms {
            let frame = self.codec.samples_per_frame();
            if self.codec.samples_for_ms(ms) < frame {
                return Err(AudioError::Konfiguration(format!(
                    "max_latency_ms = {ms} ist kuerzer als ein Frame ({} ms)",
                    self.codec.frame_size.as_ms()
                )));
            }
        }
        if !self.speaking_threshold.is_finite() || self.speaking_threshold < 0.0 {
            return Err(AudioError::Konfiguration(format!(
                "Ungueltige Sprech-Schwelle: {}",
                self.speaking_threshold
            )));
        }
        if !self.default_volume.is_finite() {
            return Err(AudioError::Konfiguration(
                "Standard-Lautstaerke muss endlich sein".to_string(),
            ));
        }
        Ok(())
    }
}

/// Momentaufnahme ueber alle Streams
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PlaybackStats {
    pub streams: usize,
    pub active: usize,
    pub speaking: usize,
    pub starving: usize,
    /// Summe der gepufferten Samples
    pub buffered_samples: usize,
    /// Groesste gepufferte Latenz eines Streams in Millisekunden
    pub max_buffered_ms: f32,
    pub frames_decoded: u64,
    pub decode_errors: u64,
    pub underruns: u64,
    pub dropped_samples: u64,
}

/// Registry aller Wiedergabe-Streams
pub struct PlaybackManager<S: AudioSink> {
    sink: S,
    config: PlaybackConfig,
    streams: HashMap<PlayerId, PlaybackStream>,
}

impl<S: AudioSink> PlaybackManager<S> {
    pub fn new(sink: S, config: PlaybackConfig) -> AudioResult<Self> {
        config.validieren()?;
        info!(
            sample_rate = config.codec.sample_rate.hz(),
            frame_ms = config.codec.frame_size.as_ms(),
            max_latency_ms = ?config.queue.max_latency_ms,
            "Playback-Manager erstellt"
        );
        Ok(Self {
            sink,
            config,
            streams: HashMap::new(),
        })
    }

    /// Legt einen Stream im Zustand `Idle` an, falls noch keiner existiert
    pub fn prepare_stream(&mut self, player: PlayerId) -> AudioResult<()> {
        if self.streams.contains_key(&player) {
            return Ok(());
        }
        let stream = self.create_stream(player)?;
        self.streams.insert(player, stream);
        debug!(player = %player, "Stream vorbereitet");
        Ok(())
    }

    /// Legt den Stream bei Bedarf an und startet ihn
    ///
    /// Schlaegt der Start fehl, wird ein neu angelegter Stream wieder
    /// verworfen; ein vorbereiteter Stream bleibt `Idle`.
    pub fn start_stream(&mut self, player: PlayerId) -> AudioResult<()> {
        self.active_stream(player).map(|_| ())
    }

    /// Dekodiert einen Frame eines Spielers und reiht ihn zur Wiedergabe ein
    pub fn play_frame_streamed(
        &mut self,
        player: PlayerId,
        frame: &EncodedAudioFrame,
    ) -> AudioResult<()> {
        trace!(player = %player, pakete = frame.len(), "Frame empfangen");
        self.active_stream(player)?.write_frame(frame)
    }

    /// Reiht bereits dekodierte Samples zur Wiedergabe ein
    pub fn play_raw_streamed(&mut self, player: PlayerId, pcm: PcmBuffer) -> AudioResult<()> {
        self.active_stream(player)?.write_pcm(pcm);
        Ok(())
    }

    /// Zerstoert den Stream; `false` wenn keiner existierte
    pub fn remove_stream(&mut self, player: PlayerId) -> bool {
        match self.streams.remove(&player) {
            Some(stream) => {
                stream.destroy();
                debug!(player = %player, "Stream entfernt");
                true
            }
            None => false,
        }
    }

    /// Zerstoert alle Streams
    pub fn stop_all_streams(&mut self) {
        let anzahl = self.streams.len();
        for (_, stream) in self.streams.drain() {
            stream.destroy();
        }
        if anzahl > 0 {
            info!(streams = anzahl, "Alle Streams gestoppt");
        }
    }

    /// Setzt die Lautstaerke aller Streams auf 0
    pub fn mute_everyone(&mut self) {
        self.set_volume_all(0.0);
    }

    pub fn set_volume_all(&mut self, volume: f32) {
        for stream in self.streams.values_mut() {
            stream.set_volume(volume);
        }
        debug!(volume = clamp_volume(volume), streams = self.streams.len(), "Lautstaerke fuer alle gesetzt");
    }

    pub fn set_volume(&mut self, player: PlayerId, volume: f32) -> AudioResult<()> {
        self.stream_mut(player)?.set_volume(volume);
        Ok(())
    }

    pub fn volume(&self, player: PlayerId) -> AudioResult<f32> {
        Ok(self.existing(player)?.volume())
    }

    /// True wenn die Lautheit ueber der Sprech-Schwelle liegt
    ///
    /// Fuer unbekannte Spieler `false`.
    pub fn is_speaking(&self, player: PlayerId) -> bool {
        self.streams
            .get(&player)
            .is_some_and(|s| s.loudness() >= self.config.speaking_threshold)
    }

    pub fn loudness(&self, player: PlayerId) -> AudioResult<f32> {
        Ok(self.existing(player)?.loudness())
    }

    /// `None` solange der Sink noch keine echten Samples gezogen hat
    pub fn last_playback_time(&self, player: PlayerId) -> AudioResult<Option<Instant>> {
        Ok(self.existing(player)?.last_playback_time())
    }

    pub fn update_estimator(&mut self, player: PlayerId, dt: f32) -> AudioResult<()> {
        self.stream_mut(player)?.update_estimator(dt);
        Ok(())
    }

    /// Einmal pro Spiel-Tick aufrufen
    pub fn update_all_estimators(&mut self, dt: f32) {
        for stream in self.streams.values_mut() {
            stream.update_estimator(dt);
        }
    }

    pub fn is_starving(&self, player: PlayerId) -> AudioResult<bool> {
        Ok(self.existing(player)?.is_starving())
    }

    /// Nur-lesende Iteration, z.B. fuer das Sprach-Overlay
    pub fn for_each_stream<F>(&self, mut f: F)
    where
        F: FnMut(PlayerId, &PlaybackStream),
    {
        for (player, stream) in &self.streams {
            f(*player, stream);
        }
    }

    pub fn stream_count(&self) -> usize {
        self.streams.len()
    }

    pub fn contains(&self, player: PlayerId) -> bool {
        self.streams.contains_key(&player)
    }

    pub fn stream(&self, player: PlayerId) -> Option<&PlaybackStream> {
        self.streams.get(&player)
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }

    pub fn config(&self) -> &PlaybackConfig {
        &self.config
    }

    /// Aggregierte Kennzahlen aller Streams
    pub fn stats(&self) -> PlaybackStats {
        let samples_per_ms = self.config.codec.samples_for_ms(1).max(1) as f32;
        let mut stats = PlaybackStats {
            streams: self.streams.len(),
            ..Default::default()
        };

        for stream in self.streams.values() {
            if stream.state() == StreamState::Active {
                stats.active += 1;
            }
            if stream.loudness() >= self.config.speaking_threshold {
                stats.speaking += 1;
            }
            if stream.is_starving() {
                stats.starving += 1;
            }
            let buffered = stream.buffered_samples();
            stats.buffered_samples += buffered;
            stats.max_buffered_ms = stats.max_buffered_ms.max(buffered as f32 / samples_per_ms);
            stats.frames_decoded += stream.frames_decoded();
            stats.decode_errors += stream.decode_errors();

            let queue = stream.queue_stats();
            stats.underruns += queue.underruns;
            stats.dropped_samples += queue.dropped;
        }
        stats
    }

    fn create_stream(&self, player: PlayerId) -> AudioResult<PlaybackStream> {
        let decoder = OpusDecoder::from_config(&self.config.codec)?;
        let limit = self
            .config
            .queue
            .max_latency_ms
            .map(|ms| self.config.codec.samples_for_ms(ms));
        Ok(PlaybackStream::new(
            player,
            decoder,
            JitterBuffer::with_limit(limit),
            self.config.estimator.clone(),
            self.config.default_volume,
        ))
    }

    /// Liefert einen laufenden Stream und legt ihn bei Bedarf an
    fn active_stream(&mut self, player: PlayerId) -> AudioResult<&mut PlaybackStream> {
        if !self.streams.contains_key(&player) {
            let mut stream = self.create_stream(player)?;
            // Erst nach erfolgreichem Start eintragen
            stream.start(&mut self.sink)?;
            debug!(player = %player, "Stream angelegt und gestartet");
            self.streams.insert(player, stream);
        }

        let stream = self
            .streams
            .get_mut(&player)
            .ok_or(AudioError::UnbekannterStream(player))?;
        stream.start(&mut self.sink)?;
        Ok(stream)
    }

    fn existing(&self, player: PlayerId) -> AudioResult<&PlaybackStream> {
        self.streams
            .get(&player)
            .ok_or(AudioError::UnbekannterStream(player))
    }

    fn stream_mut(&mut self, player: PlayerId) -> AudioResult<&mut PlaybackStream> {
        self.streams
            .get_mut(&player)
            .ok_or(AudioError::UnbekannterStream(player))
    }
}

impl<S: AudioSink> Drop for PlaybackManager<S> {
    fn drop(&mut self) {
        // Streams vor dem Sink abbauen
        self.stop_all_streams();
    }
}
