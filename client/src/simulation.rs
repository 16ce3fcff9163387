//! Simuliertes Netzwerk: sprechende Gegenspieler
//!
//! Jeder Spieler ist ein lokaler Task, der einen Sinuston mit Opus kodiert
//! und die Frames in Sequenz-Reihenfolge mit zufaelliger Verzoegerung
//! ueber einen mpsc-Kanal zustellt. Der Opus-Encoder ist nicht `Send`,
//! daher laufen die Tasks per `spawn_local` in einem `LocalSet`.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::f32::consts::TAU;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, trace, warn};
use voxplay_audio::{AudioResult, OpusEncoder};
use voxplay_core::PlayerId;
use voxplay_protocol::{EncodedAudioFrame, OpusConfig, VoiceFrame};

use crate::config::SimulationEinstellungen;

/// Paket, das offensichtlich kein gueltiges Opus ist
const KAPUTTES_PAKET: [u8; 2] = [0xFF, 0xFF];

/// Pause zwischen zwei Sprech-Phasen
const SPRECHPAUSE_MS: u128 = 700;

/// Was das Netzwerk an die Sitzung meldet
#[derive(Debug)]
pub enum NetzEreignis {
    Frame(VoiceFrame),
    Verlassen(PlayerId),
}

/// Ein simulierter Sprecher
pub struct SimulatedPeer {
    player: PlayerId,
    encoder: OpusEncoder,
    sequence: u32,
    phase: f32,
    frequenz: f32,
    corrupt_every: Option<u32>,
}

impl SimulatedPeer {
    pub fn neu(player: PlayerId, codec: OpusConfig, corrupt_every: Option<u32>) -> AudioResult<Self> {
        // Jeder Spieler bekommt eine eigene Tonhoehe
        let frequenz = 180.0 + 40.0 * (player.inner().rem_euclid(8)) as f32;
        Ok(Self {
            player,
            encoder: OpusEncoder::new(codec)?,
            sequence: 0,
            phase: 0.0,
            frequenz,
            corrupt_every,
        })
    }

    pub fn player(&self) -> PlayerId {
        self.player
    }

    /// Dauer eines Frames
    pub fn frame_dauer(&self) -> Duration {
        Duration::from_millis(self.encoder.config().frame_size.as_ms() as u64)
    }

    /// Sprechphasen dauern je nach Spieler 1.5 bis 2.25 Sekunden
    pub fn spricht_zu(&self, vergangen: Duration) -> bool {
        let sprechen_ms = 1500 + 250 * self.player.inner().rem_euclid(4) as u128;
        vergangen.as_millis() % (sprechen_ms + SPRECHPAUSE_MS) < sprechen_ms
    }

    /// Kodiert den naechsten Frame des Tons
    pub fn naechster_frame(&mut self) -> AudioResult<VoiceFrame> {
        let config = self.encoder.config();
        let kanaele = config.channels.count();
        let schritt = TAU * self.frequenz / config.sample_rate.hz() as f32;

        let mut pcm = Vec::with_capacity(self.encoder.frame_size());
        for _ in 0..self.encoder.frame_size() / kanaele {
            let wert = self.phase.sin() * 0.4;
            pcm.extend(std::iter::repeat(wert).take(kanaele));
            self.phase = (self.phase + schritt) % TAU;
        }

        let mut frame = EncodedAudioFrame::single(self.encoder.encode(&pcm)?);
        let sequence = self.sequence;
        self.sequence = self.sequence.wrapping_add(1);

        if self
            .corrupt_every
            .is_some_and(|n| n > 0 && sequence.wrapping_add(1) % n == 0)
        {
            trace!(player = %self.player, sequence, "Frame wird beschaedigt");
            frame = EncodedAudioFrame::single(KAPUTTES_PAKET.to_vec());
        }

        Ok(VoiceFrame::new(self.player, sequence, frame))
    }
}

/// Zeitplan eines Sprechers
#[derive(Debug, Clone)]
pub struct SendePlan {
    /// Maximale zusaetzliche Verzoegerung
    pub jitter_ms: u64,
    /// Ende der Simulation (None = endlos)
    pub dauer: Option<Duration>,
    /// Spieler verlaesst das Spiel nach dieser Zeit
    pub verlassen_nach: Option<Duration>,
}

impl From<&SimulationEinstellungen> for SendePlan {
    fn from(sim: &SimulationEinstellungen) -> Self {
        Self {
            jitter_ms: sim.jitter_ms,
            dauer: (sim.duration_secs > 0).then(|| Duration::from_secs(sim.duration_secs)),
            verlassen_nach: sim.leave_after_secs.map(Duration::from_secs),
        }
    }
}

/// Startet alle Sprecher als lokale Tasks
///
/// Muss innerhalb eines `LocalSet` aufgerufen werden. Spieler-IDs beginnen
/// bei 1.
pub fn peers_starten(
    sim: &SimulationEinstellungen,
    codec: &OpusConfig,
    tx: mpsc::Sender<NetzEreignis>,
) -> AudioResult<Vec<JoinHandle<()>>> {
    let plan = SendePlan::from(sim);
    let mut tasks = Vec::with_capacity(sim.players as usize);

    for id in 1..=sim.players as i32 {
        let peer = SimulatedPeer::neu(PlayerId(id), codec.clone(), sim.corrupt_every)?;
        tasks.push(tokio::task::spawn_local(peer_ausfuehren(
            peer,
            plan.clone(),
            tx.clone(),
        )));
    }

    debug!(spieler = sim.players, "Simulierte Spieler gestartet");
    Ok(tasks)
}

async fn peer_ausfuehren(mut peer: SimulatedPeer, plan: SendePlan, tx: mpsc::Sender<NetzEreignis>) {
    let player = peer.player();
    let mut rng = StdRng::seed_from_u64(player.inner() as u64);
    let frame_dauer = peer.frame_dauer();

    let start = Instant::now();
    let mut naechster = start;
    // Zustellung nie vor dem vorigen Frame: Reihenfolge bleibt erhalten
    let mut frist = start;

    loop {
        tokio::time::sleep_until(naechster).await;
        let vergangen = naechster - start;

        if plan.verlassen_nach.is_some_and(|d| vergangen >= d) {
            let _ = tx.send(NetzEreignis::Verlassen(player)).await;
            break;
        }
        if plan.dauer.is_some_and(|d| vergangen >= d) {
            break;
        }

        if peer.spricht_zu(vergangen) {
            let frame = match peer.naechster_frame() {
                Ok(frame) => frame,
                Err(e) => {
                    warn!(player = %player, "Frame konnte nicht kodiert werden: {}", e);
                    break;
                }
            };

            let jitter = Duration::from_millis(rng.gen_range(0..=plan.jitter_ms));
            frist = frist.max(naechster + jitter);
            tokio::time::sleep_until(frist).await;

            if tx.send(NetzEreignis::Frame(frame)).await.is_err() {
                // Sitzung beendet
                break;
            }
        }

        naechster += frame_dauer;
    }

    debug!(player = %player, "Simulierter Spieler beendet");
}

#[cfg(test)]
mod tests {
    use super::*;
    use voxplay_audio::OpusDecoder;
    use voxplay_protocol::AudioPreset;

    #[test]
    fn frames_sind_dekodierbar_und_fortlaufend() {
        let codec = AudioPreset::GameVoice.config();
        let mut peer = SimulatedPeer::neu(PlayerId(1), codec.clone(), None).unwrap();
        let mut decoder = OpusDecoder::from_config(&codec).unwrap();

        for erwartet in 0..5 {
            let frame = peer.naechster_frame().unwrap();
            assert_eq!(frame.sequence, erwartet);
            assert_eq!(frame.player, PlayerId(1));
            let pcm = decoder.decode_frame(&frame.frame).unwrap();
            assert_eq!(pcm.len(), 960);
        }
    }

    #[test]
    fn jeder_n_te_frame_ist_kaputt() {
        let codec = AudioPreset::GameVoice.config();
        let mut peer = SimulatedPeer::neu(PlayerId(2), codec.clone(), Some(3)).unwrap();
        let mut decoder = OpusDecoder::from_config(&codec).unwrap();

        let ergebnisse: Vec<bool> = (0..6)
            .map(|_| decoder.decode_frame(&peer.naechster_frame().unwrap().frame).is_ok())
            .collect();
        assert_eq!(ergebnisse, vec![true, true, false, true, true, false]);
    }

    #[test]
    fn sprechplan_hat_pausen() {
        let peer = SimulatedPeer::neu(PlayerId(4), AudioPreset::GameVoice.config(), None).unwrap();
        assert!(peer.spricht_zu(Duration::from_millis(0)));
        assert!(peer.spricht_zu(Duration::from_millis(1400)));
        assert!(!peer.spricht_zu(Duration::from_millis(1600)));
        assert!(peer.spricht_zu(Duration::from_millis(2300)));
    }

    #[tokio::test]
    async fn peers_liefern_in_reihenfolge() {
        let sim = SimulationEinstellungen {
            players: 2,
            duration_secs: 0,
            jitter_ms: 5,
            tick_hz: 60,
            corrupt_every: None,
            leave_after_secs: None,
        };
        let codec = AudioPreset::GameVoice.config();
        let local = tokio::task::LocalSet::new();

        let frames = local
            .run_until(async move {
                let (tx, mut rx) = mpsc::channel(64);
                let tasks = peers_starten(&sim, &codec, tx).unwrap();

                let mut frames = Vec::new();
                while frames.len() < 20 {
                    match rx.recv().await {
                        Some(NetzEreignis::Frame(f)) => frames.push(f),
                        Some(NetzEreignis::Verlassen(_)) => panic!("niemand verlaesst"),
                        None => break,
                    }
                }
                for task in tasks {
                    task.abort();
                }
                frames
            })
            .await;

        assert_eq!(frames.len(), 20);
        for player in [PlayerId(1), PlayerId(2)] {
            let sequenzen: Vec<u32> = frames
                .iter()
                .filter(|f| f.player == player)
                .map(|f| f.sequence)
                .collect();
            assert!(!sequenzen.is_empty());
            assert!(sequenzen.windows(2).all(|w| w[1] == w[0] + 1));
        }
    }

    #[tokio::test]
    async fn spieler_verlaesst_nach_frist() {
        let sim = SimulationEinstellungen {
            players: 1,
            duration_secs: 0,
            jitter_ms: 0,
            tick_hz: 60,
            corrupt_every: None,
            leave_after_secs: Some(0),
        };
        let codec = AudioPreset::GameVoice.config();
        let local = tokio::task::LocalSet::new();

        let ereignis = local
            .run_until(async move {
                let (tx, mut rx) = mpsc::channel(4);
                let _tasks = peers_starten(&sim, &codec, tx).unwrap();
                rx.recv().await
            })
            .await;

        assert!(matches!(ereignis, Some(NetzEreignis::Verlassen(PlayerId(1)))));
    }
}
