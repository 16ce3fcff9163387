//! Integration-Tests fuer PlaybackManager mit einem manuell gepullten Sink

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;
use std::sync::Arc;

use voxplay_audio::{
    AudioError, AudioResult, AudioSink, OpusEncoder, PcmBuffer, PlaybackConfig, PlaybackFeed,
    PlaybackManager, SinkFormat, SinkVoice, StreamState,
};
use voxplay_core::PlayerId;
use voxplay_protocol::{AudioPreset, EncodedAudioFrame};

/// Sink, bei dem der Test selbst die Rolle des Audio-Threads uebernimmt
#[derive(Default)]
struct PullSink {
    voices: Rc<RefCell<HashMap<u64, Arc<PlaybackFeed>>>>,
    next_id: u64,
    stops: Rc<RefCell<u32>>,
    fail: bool,
}

struct PullVoice {
    id: u64,
    voices: Rc<RefCell<HashMap<u64, Arc<PlaybackFeed>>>>,
    stops: Rc<RefCell<u32>>,
}

impl AudioSink for PullSink {
    fn create_voice(
        &mut self,
        _format: SinkFormat,
        feed: Arc<PlaybackFeed>,
    ) -> AudioResult<Box<dyn SinkVoice>> {
        if self.fail {
            return Err(AudioError::SinkFehler("keine Stimme frei".into()));
        }
        self.next_id += 1;
        self.voices.borrow_mut().insert(self.next_id, feed);
        Ok(Box::new(PullVoice {
            id: self.next_id,
            voices: Rc::clone(&self.voices),
            stops: Rc::clone(&self.stops),
        }))
    }
}

impl SinkVoice for PullVoice {
    fn stop(&mut self) {
        self.voices.borrow_mut().remove(&self.id);
        *self.stops.borrow_mut() += 1;
    }

    fn frames_played(&self) -> u64 {
        0
    }
}

fn manager() -> PlaybackManager<PullSink> {
    PlaybackManager::new(PullSink::default(), PlaybackConfig::default())
        .expect("Manager konnte nicht erstellt werden")
}

fn encoder() -> OpusEncoder {
    OpusEncoder::new(AudioPreset::GameVoice.config()).unwrap()
}

fn sinus_frame(enc: &mut OpusEncoder, offset: usize) -> EncodedAudioFrame {
    let pcm: Vec<f32> = (0..enc.frame_size())
        .map(|i| ((offset + i) as f32 * 2.0 * std::f32::consts::PI * 440.0 / 48_000.0).sin() * 0.5)
        .collect();
    EncodedAudioFrame::single(enc.encode(&pcm).unwrap())
}

/// Zieht `n` Samples aus dem Feed des Spielers, wie es der Audio-Thread tut
fn pull(m: &PlaybackManager<PullSink>, player: PlayerId, n: usize) -> (Vec<f32>, usize) {
    let feed = Arc::clone(m.stream(player).expect("Stream fehlt").feed());
    let mut out = vec![0.0f32; n];
    let real = feed.fill(&mut out);
    (out, real)
}

#[test]
fn drei_frames_ohne_luecke() {
    let mut m = manager();
    let mut enc = encoder();
    let spieler = PlayerId(7);

    for i in 0..3 {
        m.play_frame_streamed(spieler, &sinus_frame(&mut enc, i * 960))
            .unwrap();
    }

    // 60ms bei 48kHz Mono
    let (out, real) = pull(&m, spieler, 2880);
    assert_eq!(real, 2880);
    assert_eq!(out.len(), 2880);
    assert!(!m.is_starving(spieler).unwrap());
    assert_eq!(m.stream(spieler).unwrap().queue_stats().underruns, 0);
    assert!(m.last_playback_time(spieler).unwrap().is_some());
}

#[test]
fn zu_grosse_anforderung_wird_aufgefuellt() {
    let mut m = manager();
    let mut enc = encoder();
    let spieler = PlayerId(3);

    m.play_frame_streamed(spieler, &sinus_frame(&mut enc, 0)).unwrap();

    let (out, real) = pull(&m, spieler, 5 * 960);
    assert_eq!(real, 960);
    assert_eq!(out.len(), 4800);
    assert!(out[960..].iter().all(|&s| s == 0.0));
    assert!(m.is_starving(spieler).unwrap());

    // Naechster vollstaendiger Pull loescht das Flag
    m.play_frame_streamed(spieler, &sinus_frame(&mut enc, 960)).unwrap();
    let (_, real) = pull(&m, spieler, 960);
    assert_eq!(real, 960);
    assert!(!m.is_starving(spieler).unwrap());
}

#[test]
fn alle_stumm_und_wieder_laut() {
    let mut m = manager();
    for id in 1..=4 {
        m.play_raw_streamed(PlayerId(id), PcmBuffer::from_vec(vec![0.8; 10]))
            .unwrap();
    }

    m.mute_everyone();
    for id in 1..=4 {
        assert_eq!(m.volume(PlayerId(id)).unwrap(), 0.0);
    }
    let (out, _) = pull(&m, PlayerId(1), 5);
    assert!(out.iter().all(|&s| s == 0.0));

    m.set_volume_all(0.5);
    m.for_each_stream(|_, stream| assert_eq!(stream.volume(), 0.5));
    let (out, _) = pull(&m, PlayerId(2), 5);
    assert!(out.iter().all(|&s| (s - 0.4).abs() < 1e-6));
}

#[test]
fn prepare_und_play_sind_idempotent() {
    let mut m = manager();
    let spieler = PlayerId(11);

    m.prepare_stream(spieler).unwrap();
    m.prepare_stream(spieler).unwrap();
    assert_eq!(m.stream_count(), 1);
    assert_eq!(m.stream(spieler).unwrap().state(), StreamState::Idle);

    m.play_raw_streamed(spieler, PcmBuffer::silence(10)).unwrap();
    m.play_raw_streamed(spieler, PcmBuffer::silence(10)).unwrap();
    assert_eq!(m.stream_count(), 1);
    assert_eq!(m.sink().voices.borrow().len(), 1);
}

#[test]
fn entfernter_stream_wird_nicht_mehr_gelesen() {
    let mut m = manager();
    let spieler = PlayerId(5);
    m.play_raw_streamed(spieler, PcmBuffer::from_vec(vec![0.5; 960]))
        .unwrap();
    let feed = Arc::clone(m.stream(spieler).unwrap().feed());

    assert!(m.remove_stream(spieler));
    assert!(!m.is_speaking(spieler));
    assert!(matches!(
        m.loudness(spieler),
        Err(AudioError::UnbekannterStream(_))
    ));

    // Sink haelt keine Referenz mehr, Stop genau einmal
    assert!(m.sink().voices.borrow().is_empty());
    assert_eq!(*m.sink().stops.borrow(), 1);
    assert_eq!(Arc::strong_count(&feed), 1);

    assert!(!m.remove_stream(spieler));
    assert_eq!(*m.sink().stops.borrow(), 1);
}

#[test]
fn sink_fehler_wird_weitergereicht() {
    let mut m = manager();
    m.sink_mut().fail = true;

    let result = m.play_raw_streamed(PlayerId(1), PcmBuffer::silence(10));
    assert!(matches!(result, Err(AudioError::SinkFehler(_))));
    assert_eq!(m.stream_count(), 0);
}

#[test]
fn kaputtes_paket_verwirft_nur_den_frame() {
    let mut m = manager();
    let mut enc = encoder();
    let spieler = PlayerId(8);

    m.play_frame_streamed(spieler, &sinus_frame(&mut enc, 0)).unwrap();
    let err = m
        .play_frame_streamed(spieler, &EncodedAudioFrame::single(vec![0xFF, 0xFF]))
        .unwrap_err();
    assert!(err.ist_lokal());
    m.play_frame_streamed(spieler, &sinus_frame(&mut enc, 960)).unwrap();

    let stream = m.stream(spieler).unwrap();
    assert_eq!(stream.buffered_samples(), 1920);
    assert_eq!(stream.decode_errors(), 1);
}

#[test]
fn stop_all_beim_drop() {
    let stops;
    {
        let mut m = manager();
        for id in 0..3 {
            m.play_raw_streamed(PlayerId(id), PcmBuffer::silence(1)).unwrap();
        }
        stops = Rc::clone(&m.sink().stops);
    }
    assert_eq!(*stops.borrow(), 3);
}
