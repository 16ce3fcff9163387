//! Voice-Sitzung: Besitzer des Playback-Managers
//!
//! Alle Zugriffe auf den Manager laufen ueber die Sitzung und damit ueber
//! die Hauptschleife des Clients. Die Sitzung fuehrt ausserdem die
//! Prometheus-Metriken nach.

use anyhow::Result;
use std::collections::HashMap;
use tracing::{debug, info, warn};
use voxplay_audio::{AudioError, AudioSink, PlaybackManager, PlaybackStats};
use voxplay_core::PlayerId;
use voxplay_observability::metrics::{auf_stand_bringen, VoiceMetrics};
use voxplay_protocol::VoiceFrame;

/// Zaehlerstaende bereits entfernter Streams
#[derive(Debug, Default, Clone, Copy)]
struct Abgeschlossen {
    frames_decoded: u64,
    decode_errors: u64,
    underruns: u64,
    dropped_samples: u64,
}

/// Voice-Sitzung eines Clients
pub struct VoiceSession<S: AudioSink> {
    manager: PlaybackManager<S>,
    metrics: VoiceMetrics,
    abgeschlossen: Abgeschlossen,
    /// Letzte Sequenznummer pro Spieler
    letzte_sequenz: HashMap<PlayerId, u32>,
}

impl<S: AudioSink> VoiceSession<S> {
    pub fn neu(manager: PlaybackManager<S>, metrics: VoiceMetrics) -> Self {
        Self {
            manager,
            metrics,
            abgeschlossen: Abgeschlossen::default(),
            letzte_sequenz: HashMap::new(),
        }
    }

    /// Uebergibt einen Frame aus dem Netzwerk an die Wiedergabe
    ///
    /// Dekodierfehler betreffen nur diesen Frame und werden nicht
    /// weitergereicht. Verweigert die Audio-Engine eine Stimme, bleibt nur
    /// dieser Spieler stumm; der naechste Frame versucht es erneut.
    /// Alle anderen Fehler werden weitergereicht.
    pub fn frame_empfangen(&mut self, frame: VoiceFrame) -> Result<()> {
        if let Some(letzte) = self.letzte_sequenz.insert(frame.player, frame.sequence) {
            if frame.sequence != letzte.wrapping_add(1) {
                debug!(
                    player = %frame.player,
                    erwartet = letzte.wrapping_add(1),
                    erhalten = frame.sequence,
                    "Luecke in der Sequenz"
                );
            }
        }

        match self.manager.play_frame_streamed(frame.player, &frame.frame) {
            Ok(()) => Ok(()),
            Err(e) if e.ist_lokal() => Ok(()),
            Err(AudioError::SinkFehler(grund)) => {
                warn!(player = %frame.player, "Keine Stimme fuer Spieler, bleibt stumm: {}", grund);
                self.metrics.sink_errors_total.inc();
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Spieler hat das Spiel verlassen
    pub fn spieler_verlassen(&mut self, player: PlayerId) {
        if let Some(stream) = self.manager.stream(player) {
            let queue = stream.queue_stats();
            self.abgeschlossen.frames_decoded += stream.frames_decoded();
            self.abgeschlossen.decode_errors += stream.decode_errors();
            self.abgeschlossen.underruns += queue.underruns;
            self.abgeschlossen.dropped_samples += queue.dropped;
        }
        self.letzte_sequenz.remove(&player);

        if self.manager.remove_stream(player) {
            info!(player = %player, "Spieler hat verlassen, Stream entfernt");
        }
    }

    /// Ein Spiel-Tick: Lautheit abklingen lassen und Metriken nachfuehren
    pub fn tick(&mut self, dt: f32) -> PlaybackStats {
        self.manager.update_all_estimators(dt);
        let stats = self.manager.stats();
        self.metriken_aktualisieren(&stats);
        stats
    }

    /// Stoppt alle Streams
    pub fn beenden(&mut self) {
        let stats = self.manager.stats();
        self.metriken_aktualisieren(&stats);
        for player in self.spieler() {
            self.spieler_verlassen(player);
        }
        self.manager.stop_all_streams();
    }

    /// Lautstaerke eines Spielers aendern (z.B. aus der UI)
    pub fn lautstaerke_setzen(&mut self, player: PlayerId, volume: f32) -> Result<()> {
        if let Err(e) = self.manager.set_volume(player, volume) {
            warn!(player = %player, "Lautstaerke nicht gesetzt: {}", e);
            return Err(e.into());
        }
        Ok(())
    }

    /// Spieler, die gerade sprechen (fuer das Sprach-Overlay)
    pub fn sprechende_spieler(&self) -> Vec<PlayerId> {
        let mut sprechend = Vec::new();
        self.manager.for_each_stream(|player, _| {
            if self.manager.is_speaking(player) {
                sprechend.push(player);
            }
        });
        sprechend.sort_by_key(|p| p.inner());
        sprechend
    }

    pub fn manager(&self) -> &PlaybackManager<S> {
        &self.manager
    }

    pub fn manager_mut(&mut self) -> &mut PlaybackManager<S> {
        &mut self.manager
    }

    pub fn metrics(&self) -> &VoiceMetrics {
        &self.metrics
    }

    fn spieler(&self) -> Vec<PlayerId> {
        let mut spieler = Vec::with_capacity(self.manager.stream_count());
        self.manager.for_each_stream(|player, _| spieler.push(player));
        spieler
    }

    fn metriken_aktualisieren(&self, stats: &PlaybackStats) {
        let m = &self.metrics;
        m.streams_active.set(stats.active as i64);
        m.streams_speaking.set(stats.speaking as i64);
        m.streams_starving.set(stats.starving as i64);

        let latenz = stats.max_buffered_ms as f64 / 1000.0;
        m.buffered_latency_seconds.set(latenz);
        m.buffer_latency_seconds.observe(latenz);

        let a = &self.abgeschlossen;
        auf_stand_bringen(&m.frames_decoded_total, a.frames_decoded + stats.frames_decoded);
        auf_stand_bringen(&m.decode_errors_total, a.decode_errors + stats.decode_errors);
        auf_stand_bringen(&m.underruns_total, a.underruns + stats.underruns);
        auf_stand_bringen(&m.dropped_samples_total, a.dropped_samples + stats.dropped_samples);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use voxplay_audio::{OpusEncoder, PlaybackConfig, VirtualSink, VirtualSinkConfig};
    use voxplay_protocol::{AudioPreset, EncodedAudioFrame};

    fn session() -> VoiceSession<VirtualSink> {
        let manager = PlaybackManager::new(
            VirtualSink::manual(VirtualSinkConfig::default()),
            PlaybackConfig::default(),
        )
        .unwrap();
        VoiceSession::neu(manager, VoiceMetrics::neu().unwrap())
    }

    fn frame(enc: &mut OpusEncoder, player: i32, sequence: u32) -> VoiceFrame {
        let pcm: Vec<f32> = (0..enc.frame_size())
            .map(|i| (i as f32 * 0.05).sin() * 0.5)
            .collect();
        VoiceFrame::new(
            PlayerId(player),
            sequence,
            EncodedAudioFrame::single(enc.encode(&pcm).unwrap()),
        )
    }

    #[test]
    fn frames_erzeugen_streams_und_metriken() {
        let mut s = session();
        let mut enc = OpusEncoder::new(AudioPreset::GameVoice.config()).unwrap();
        for seq in 0..3 {
            s.frame_empfangen(frame(&mut enc, 1, seq)).unwrap();
        }
        s.frame_empfangen(frame(&mut enc, 2, 0)).unwrap();

        let stats = s.tick(1.0 / 60.0);
        assert_eq!(stats.streams, 2);
        assert_eq!(stats.active, 2);
        assert_eq!(s.metrics().streams_active.get(), 2);
        assert_eq!(s.metrics().frames_decoded_total.get(), 4);
        assert_eq!(s.sprechende_spieler(), vec![PlayerId(1), PlayerId(2)]);
    }

    #[test]
    fn kaputter_frame_ist_kein_sitzungsfehler() {
        let mut s = session();
        let kaputt = VoiceFrame::new(PlayerId(3), 0, EncodedAudioFrame::single(vec![0xFF, 0xFF]));
        s.frame_empfangen(kaputt).unwrap();
        s.tick(0.01);
        assert_eq!(s.metrics().decode_errors_total.get(), 1);
    }

    #[test]
    fn verweigerte_stimme_betrifft_nur_den_spieler() {
        let manager = PlaybackManager::new(
            VirtualSink::manual(VirtualSinkConfig {
                max_voices: 1,
                ..Default::default()
            }),
            PlaybackConfig::default(),
        )
        .unwrap();
        let mut s = VoiceSession::neu(manager, VoiceMetrics::neu().unwrap());
        let mut enc = OpusEncoder::new(AudioPreset::GameVoice.config()).unwrap();

        s.frame_empfangen(frame(&mut enc, 1, 0)).unwrap();
        s.frame_empfangen(frame(&mut enc, 2, 0)).unwrap();
        s.frame_empfangen(frame(&mut enc, 2, 1)).unwrap();
        assert_eq!(s.metrics().sink_errors_total.get(), 2);
        assert!(!s.manager().contains(PlayerId(2)));

        // Spieler 1 spielt weiter
        s.frame_empfangen(frame(&mut enc, 1, 1)).unwrap();
        let stats = s.tick(0.01);
        assert_eq!(stats.active, 1);
        assert_eq!(s.manager().stream(PlayerId(1)).unwrap().buffered_samples(), 1920);

        // Wird eine Stimme frei, bekommt Spieler 2 sie beim naechsten Frame
        s.spieler_verlassen(PlayerId(1));
        s.frame_empfangen(frame(&mut enc, 2, 2)).unwrap();
        assert!(s.manager().contains(PlayerId(2)));
        assert_eq!(s.metrics().sink_errors_total.get(), 2);
    }

    #[test]
    fn verlassen_behaelt_zaehlerstaende() {
        let mut s = session();
        let mut enc = OpusEncoder::new(AudioPreset::GameVoice.config()).unwrap();
        s.frame_empfangen(frame(&mut enc, 4, 0)).unwrap();
        s.frame_empfangen(frame(&mut enc, 4, 1)).unwrap();

        s.spieler_verlassen(PlayerId(4));
        assert!(!s.manager().contains(PlayerId(4)));
        assert_eq!(s.manager().sink().voice_count(), 0);

        s.tick(0.01);
        assert_eq!(s.metrics().frames_decoded_total.get(), 2);
        assert_eq!(s.metrics().streams_active.get(), 0);
    }

    #[test]
    fn lautstaerke_fuer_unbekannten_spieler() {
        let mut s = session();
        assert!(s.lautstaerke_setzen(PlayerId(9), 0.5).is_err());
    }

    #[test]
    fn beenden_stoppt_alles() {
        let mut s = session();
        let mut enc = OpusEncoder::new(AudioPreset::GameVoice.config()).unwrap();
        for player in 1..=3 {
            s.frame_empfangen(frame(&mut enc, player, 0)).unwrap();
        }
        s.beenden();
        assert_eq!(s.manager().stream_count(), 0);
        assert_eq!(s.manager().sink().voice_count(), 0);
        assert_eq!(s.metrics().frames_decoded_total.get(), 3);
    }
}
