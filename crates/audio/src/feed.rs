//! Schnittstelle zwischen Playback-Stream und Audio-Thread
//!
//! `PlaybackFeed` ist der einzige Zustand, den Stream und Sink-Callback
//! teilen: Jitter-Buffer, Lautstaerke und Zeitpunkt der letzten Wiedergabe.
//! Lautstaerke und Zeitstempel sind Atomics, der Callback nimmt nur den
//! Mutex des Jitter-Buffers.

use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::time::{Duration, Instant};

use crate::sample_queue::JitterBuffer;

/// Obergrenze der Lautstaerke (1.0 = unveraendert, darueber Verstaerkung)
pub const MAX_VOLUME: f32 = 2.0;

/// Kein Pull mit echten Samples bisher
const NIE: u64 = u64::MAX;

/// Vom Sink gelesene Seite eines Playback-Streams
pub struct PlaybackFeed {
    queue: JitterBuffer,
    /// f32-Bits der Lautstaerke
    volume: AtomicU32,
    /// Nanosekunden seit `epoch` beim letzten Pull mit echten Samples
    last_pull_nanos: AtomicU64,
    epoch: Instant,
}

impl PlaybackFeed {
    pub fn new(queue: JitterBuffer, volume: f32) -> Self {
        Self {
            queue,
            volume: AtomicU32::new(clamp_volume(volume).to_bits()),
            last_pull_nanos: AtomicU64::new(NIE),
            epoch: Instant::now(),
        }
    }

    /// Vom Audio-Thread aufgerufen: fuellt `out` komplett
    ///
    /// Entnimmt Samples aus dem Jitter-Buffer, fuellt fehlende mit Stille auf
    /// und skaliert mit der aktuellen Lautstaerke. Gibt die Anzahl echter
    /// Samples zurueck.
    pub fn fill(&self, out: &mut [f32]) -> usize {
        let real = self.queue.pop_into(out);

        let volume = self.volume();
        if volume != 1.0 {
            for s in out[..real].iter_mut() {
                *s *= volume;
            }
        }

        if real > 0 {
            let nanos = self.epoch.elapsed().as_nanos().min(u64::MAX as u128 - 1) as u64;
            self.last_pull_nanos.store(nanos, Ordering::Release);
        }
        real
    }

    pub fn queue(&self) -> &JitterBuffer {
        &self.queue
    }

    pub fn set_volume(&self, volume: f32) {
        self.volume
            .store(clamp_volume(volume).to_bits(), Ordering::Release);
    }

    pub fn volume(&self) -> f32 {
        f32::from_bits(self.volume.load(Ordering::Acquire))
    }

    /// Zeitpunkt des letzten Pulls, der echte Samples geliefert hat
    pub fn last_playback_time(&self) -> Option<Instant> {
        match self.last_pull_nanos.load(Ordering::Acquire) {
            NIE => None,
            nanos => Some(self.epoch + Duration::from_nanos(nanos)),
        }
    }
}

/// Begrenzt die Lautstaerke auf 0.0..=MAX_VOLUME; NaN/unendlich wird zu 0.0
pub fn clamp_volume(volume: f32) -> f32 {
    if volume.is_finite() {
        volume.clamp(0.0, MAX_VOLUME)
    } else {
        0.0
    }
}
