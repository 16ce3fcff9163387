//! Software-Audio-Engine ohne Hardware
//!
//! Mischt alle Stimmen in festem Takt, entweder manuell (`render`) oder in
//! einem eigenen Render-Thread (`VirtualSink::spawn`). Wird fuer den
//! Headless-Client und fuer Tests verwendet.

use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::error::{AudioError, AudioResult};
use crate::estimator::rms;
use crate::feed::PlaybackFeed;
use crate::sink::{AudioSink, SinkFormat, SinkVoice};

/// Konfiguration der virtuellen Engine
#[derive(Debug, Clone)]
pub struct VirtualSinkConfig {
    /// Maximale Anzahl gleichzeitiger Stimmen
    pub max_voices: usize,
    /// Render-Periode des Hintergrund-Threads
    pub period: Duration,
}

impl Default for VirtualSinkConfig {
    fn default() -> Self {
        Self {
            max_voices: 64,
            period: Duration::from_millis(10),
        }
    }
}

/// Ergebnis eines Render-Durchlaufs
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RenderReport {
    /// Anzahl gemischter Stimmen
    pub voices: usize,
    /// Echte (nicht aufgefuellte) Samples ueber alle Stimmen
    pub real_samples: usize,
    /// RMS des Mixes
    pub level: f32,
}

struct VoiceSlot {
    id: u64,
    feed: Arc<PlaybackFeed>,
    format: SinkFormat,
    played: Arc<AtomicU64>,
    /// Angefangener Frame aus dem letzten Durchlauf (Rate * ns, < 1e9)
    rest: u128,
}

struct Shared {
    voices: Mutex<Vec<VoiceSlot>>,
    max_voices: usize,
    next_id: AtomicU64,
    running: AtomicBool,
    /// f32-Bits des letzten Mix-Pegels
    output_level: AtomicU32,
    renders: AtomicU64,
}

/// Virtuelle Audio-Engine
pub struct VirtualSink {
    shared: Arc<Shared>,
    worker: Option<JoinHandle<()>>,
}

impl VirtualSink {
    /// Engine ohne Render-Thread; gerendert wird nur ueber `render`
    pub fn manual(config: VirtualSinkConfig) -> Self {
        Self {
            shared: Arc::new(Shared {
                voices: Mutex::new(Vec::new()),
                max_voices: config.max_voices,
                next_id: AtomicU64::new(1),
                running: AtomicBool::new(false),
                output_level: AtomicU32::new(0f32.to_bits()),
                renders: AtomicU64::new(0),
            }),
            worker: None,
        }
    }

    /// Engine mit Render-Thread, der etwa alle `config.period` mischt
    ///
    /// Gemischt wird die tatsaechlich vergangene Zeit, nicht die Periode,
    /// damit die Wiedergabe nicht hinter der Uhr zurueckfaellt.
    pub fn spawn(config: VirtualSinkConfig) -> AudioResult<Self> {
        let period = config.period;
        let mut sink = Self::manual(config);
        sink.shared.running.store(true, Ordering::Release);

        let shared = Arc::clone(&sink.shared);
        let worker = std::thread::Builder::new()
            .name("voxplay-virtual-sink".to_string())
            .spawn(move || {
                debug!("Render-Thread gestartet");
                let mut letzter = Instant::now();
                while shared.running.load(Ordering::Acquire) {
                    std::thread::sleep(period);
                    let jetzt = Instant::now();
                    render_all(&shared, jetzt - letzter);
                    letzter = jetzt;
                }
                debug!("Render-Thread beendet");
            })
            .map_err(|e| AudioError::SinkFehler(e.to_string()))?;

        sink.worker = Some(worker);
        info!(period_ms = period.as_millis() as u64, "Virtuelle Audio-Engine gestartet");
        Ok(sink)
    }

    /// Mischt `dt` Wiedergabezeit aller Stimmen
    pub fn render(&self, dt: Duration) -> RenderReport {
        render_all(&self.shared, dt)
    }

    /// Anzahl aktiver Stimmen
    pub fn voice_count(&self) -> usize {
        self.shared.voices.lock().len()
    }

    /// Pegel des letzten Mixes (RMS)
    pub fn output_level(&self) -> f32 {
        f32::from_bits(self.shared.output_level.load(Ordering::Acquire))
    }

    /// Anzahl bisheriger Render-Durchlaeufe
    pub fn renders(&self) -> u64 {
        self.shared.renders.load(Ordering::Acquire)
    }
}

impl AudioSink for VirtualSink {
    fn create_voice(
        &mut self,
        format: SinkFormat,
        feed: Arc<PlaybackFeed>,
    ) -> AudioResult<Box<dyn SinkVoice>> {
        let mut voices = self.shared.voices.lock();
        if voices.len() >= self.shared.max_voices {
            warn!(max = self.shared.max_voices, "Keine freie Stimme verfuegbar");
            return Err(AudioError::SinkFehler(format!(
                "Stimmen-Limit von {} erreicht",
                self.shared.max_voices
            )));
        }

        let id = self.shared.next_id.fetch_add(1, Ordering::Relaxed);
        let played = Arc::new(AtomicU64::new(0));
        voices.push(VoiceSlot {
            id,
            feed,
            format,
            played: Arc::clone(&played),
            rest: 0,
        });
        debug!(voice = id, "Virtuelle Stimme erstellt");

        Ok(Box::new(VirtualVoice {
            id,
            shared: Arc::clone(&self.shared),
            played,
            stopped: false,
        }))
    }
}

impl Drop for VirtualSink {
    fn drop(&mut self) {
        self.shared.running.store(false, Ordering::Release);
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                warn!("Render-Thread ist abgestuerzt");
            }
        }
    }
}

/// Stimme der virtuellen Engine
pub struct VirtualVoice {
    id: u64,
    shared: Arc<Shared>,
    played: Arc<AtomicU64>,
    stopped: bool,
}

impl SinkVoice for VirtualVoice {
    fn stop(&mut self) {
        if self.stopped {
            return;
        }
        self.stopped = true;
        // Der Render-Durchlauf haelt denselben Lock: nach dem Entfernen
        // erreicht kein Durchlauf mehr diesen Feed.
        self.shared.voices.lock().retain(|slot| slot.id != self.id);
        debug!(voice = self.id, "Virtuelle Stimme gestoppt");
    }

    fn frames_played(&self) -> u64 {
        self.played.load(Ordering::Acquire)
    }
}

impl Drop for VirtualVoice {
    fn drop(&mut self) {
        self.stop();
    }
}

fn render_all(shared: &Shared, dt: Duration) -> RenderReport {
    let mut voices = shared.voices.lock();
    let mut mix: Vec<f32> = Vec::new();
    let mut scratch: Vec<f32> = Vec::new();
    let mut real_samples = 0;

    for slot in voices.iter_mut() {
        let channels = slot.format.channels.count();
        let faellig = slot.format.sample_rate.hz() as u128 * dt.as_nanos() + slot.rest;
        let frames = (faellig / 1_000_000_000) as usize;
        slot.rest = faellig % 1_000_000_000;
        let n = frames * channels;

        scratch.clear();
        scratch.resize(n, 0.0);
        real_samples += slot.feed.fill(&mut scratch);
        slot.played.fetch_add(frames as u64, Ordering::AcqRel);

        if mix.len() < n {
            mix.resize(n, 0.0);
        }
        for (m, s) in mix.iter_mut().zip(scratch.iter()) {
            *m += s;
        }
    }

    let level = rms(&mix);
    shared.output_level.store(level.to_bits(), Ordering::Release);
    shared.renders.fetch_add(1, Ordering::AcqRel);

    RenderReport {
        voices: voices.len(),
        real_samples,
        level,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pcm::PcmBuffer;
    use crate::sample_queue::JitterBuffer;
    use voxplay_protocol::codec::AudioPreset;

    fn format() -> SinkFormat {
        SinkFormat::from(&AudioPreset::GameVoice.config())
    }

    fn feed_mit(samples: Vec<f32>) -> Arc<PlaybackFeed> {
        let feed = Arc::new(PlaybackFeed::new(JitterBuffer::new(), 1.0));
        feed.queue().push(PcmBuffer::from_vec(samples));
        feed
    }

    #[test]
    fn render_zieht_periodengerecht() {
        let mut sink = VirtualSink::manual(VirtualSinkConfig::default());
        let feed = feed_mit(vec![0.5; 960]);
        let voice = sink.create_voice(format(), Arc::clone(&feed)).unwrap();

        // 10ms bei 48kHz = 480 Samples
        let report = sink.render(Duration::from_millis(10));
        assert_eq!(report.voices, 1);
        assert_eq!(report.real_samples, 480);
        assert!((report.level - 0.5).abs() < 1e-6);
        assert_eq!(feed.queue().len(), 480);
        assert_eq!(voice.frames_played(), 480);
    }

    #[test]
    fn krumme_zeitschritte_gehen_nicht_verloren() {
        let mut sink = VirtualSink::manual(VirtualSinkConfig::default());
        let feed = feed_mit(vec![0.5; 4800]);
        let voice = sink.create_voice(format(), Arc::clone(&feed)).unwrap();

        // 30 x 10.07ms = 302.1ms = 14500.8 Frames bei 48kHz
        for _ in 0..30 {
            sink.render(Duration::from_micros(10_070));
        }
        assert_eq!(voice.frames_played(), 14_500);
    }

    #[test]
    fn render_thread_haelt_mit_der_uhr_schritt() {
        let mut sink = VirtualSink::spawn(VirtualSinkConfig {
            max_voices: 1,
            period: Duration::from_millis(5),
        })
        .unwrap();
        let feed = feed_mit(vec![]);
        let start = Instant::now();
        let voice = sink.create_voice(format(), Arc::clone(&feed)).unwrap();

        std::thread::sleep(Duration::from_millis(200));
        let gespielt = voice.frames_played();
        let vergangen = start.elapsed();

        // Der erste Durchlauf kann bis zu einer Periode vor der Stimme beginnen
        let obergrenze = ((vergangen + Duration::from_millis(10)).as_secs_f64() * 48_000.0) as u64;
        assert!(gespielt <= obergrenze, "{gespielt} > {obergrenze}");
        assert!(gespielt >= 48 * 100, "nur {gespielt} Frames in {vergangen:?}");
        drop(voice);
        drop(sink);
    }

    #[test]
    fn stimmen_werden_gemischt() {
        let mut sink = VirtualSink::manual(VirtualSinkConfig::default());
        let _a = sink.create_voice(format(), feed_mit(vec![0.25; 480])).unwrap();
        let _b = sink.create_voice(format(), feed_mit(vec![0.25; 480])).unwrap();
        let report = sink.render(Duration::from_millis(10));
        assert_eq!(report.voices, 2);
        assert!((report.level - 0.5).abs() < 1e-6);
        assert!((sink.output_level() - 0.5).abs() < 1e-6);
    }

    #[test]
    fn gestoppte_stimme_wird_nicht_mehr_gelesen() {
        let mut sink = VirtualSink::manual(VirtualSinkConfig::default());
        let feed = feed_mit(vec![0.1; 4800]);
        let mut voice = sink.create_voice(format(), Arc::clone(&feed)).unwrap();
        voice.stop();
        assert_eq!(sink.voice_count(), 0);

        sink.render(Duration::from_millis(10));
        assert_eq!(feed.queue().len(), 4800);
        assert_eq!(Arc::strong_count(&feed), 1);
    }

    #[test]
    fn stimmen_limit_liefert_sink_fehler() {
        let mut sink = VirtualSink::manual(VirtualSinkConfig {
            max_voices: 1,
            ..Default::default()
        });
        let _erste = sink.create_voice(format(), feed_mit(vec![])).unwrap();
        let zweite = sink.create_voice(format(), feed_mit(vec![]));
        assert!(matches!(zweite, Err(AudioError::SinkFehler(_))));
    }

    #[test]
    fn render_thread_laeuft_und_endet() {
        let mut sink = VirtualSink::spawn(VirtualSinkConfig {
            max_voices: 4,
            period: Duration::from_millis(2),
        })
        .unwrap();
        let feed = feed_mit(vec![0.3; 48_000]);
        let _voice = sink.create_voice(format(), Arc::clone(&feed)).unwrap();

        std::thread::sleep(Duration::from_millis(50));
        assert!(sink.renders() > 0);
        assert!(feed.queue().len() < 48_000);
        drop(sink);
    }
}
