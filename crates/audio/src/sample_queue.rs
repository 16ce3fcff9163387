//! Elastischer Sample-Puffer zwischen Netzwerk und Audio-Callback
//!
//! Der Spiel-Thread haengt dekodierte Samples an (`push`), der Audio-Thread
//! entnimmt in festem Takt (`pop_into`). Keine Seite blockiert laenger als
//! einen kurzen Kopiervorgang:
//! - `push` gelingt immer (der Puffer waechst bis zur Hochwassermarke)
//! - `pop` kehrt sofort zurueck und fuellt fehlende Samples mit Stille auf
//!
//! Reicht der Vorrat fuer eine Anforderung nicht, wird das Starvation-Flag
//! gesetzt. Die naechste vollstaendig bediente Anforderung loescht es wieder.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use tracing::debug;

use crate::pcm::PcmBuffer;

/// Konfiguration des Jitter-Buffers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    /// Maximale gepufferte Latenz in Millisekunden (None = unbegrenzt)
    pub max_latency_ms: Option<u32>,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            max_latency_ms: Some(500),
        }
    }
}

/// Statistiken des Jitter-Buffers (Snapshot)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueueStats {
    /// Angehaengte Samples gesamt
    pub pushed: u64,
    /// An den Sink ausgelieferte echte Samples
    pub popped: u64,
    /// Anzahl Anforderungen die nicht vollstaendig bedient werden konnten
    pub underruns: u64,
    /// Wegen der Hochwassermarke verworfene Samples
    pub dropped: u64,
}

struct QueueInner {
    samples: VecDeque<f32>,
    starving: bool,
    stats: QueueStats,
}

/// Jitter-Buffer fuer interleaved f32-Samples
///
/// Alle Zugriffe laufen ueber einen einzigen Mutex; `push` und `pop`
/// sind damit atomar zueinander.
pub struct JitterBuffer {
    inner: Mutex<QueueInner>,
    /// Hochwassermarke in Samples
    max_samples: Option<usize>,
}

impl JitterBuffer {
    /// Erstellt einen unbegrenzten Puffer
    pub fn new() -> Self {
        Self::with_limit(None)
    }

    /// Erstellt einen Puffer mit Hochwassermarke in Samples
    pub fn with_limit(max_samples: Option<usize>) -> Self {
        Self {
            inner: Mutex::new(QueueInner {
                samples: VecDeque::new(),
                starving: false,
                stats: QueueStats::default(),
            }),
            max_samples,
        }
    }

    /// Haengt Samples hinten an und uebernimmt den Puffer
    ///
    /// Ueberschreitet der Fuellstand die Hochwassermarke, werden die
    /// aeltesten Samples verworfen.
    pub fn push(&self, pcm: PcmBuffer) {
        if pcm.is_empty() {
            return;
        }

        let dropped = {
            let mut inner = self.inner.lock();
            inner.samples.extend(pcm.as_slice().iter().copied());
            inner.stats.pushed += pcm.len() as u64;

            let ueberschuss = match self.max_samples {
                Some(max) if inner.samples.len() > max => inner.samples.len() - max,
                _ => 0,
            };
            if ueberschuss > 0 {
                inner.samples.drain(..ueberschuss);
                inner.stats.dropped += ueberschuss as u64;
            }
            ueberschuss
        };
        // `pcm` wird hier freigegeben, ausserhalb des kritischen Abschnitts

        if dropped > 0 {
            debug!(dropped, "Hochwassermarke erreicht, aelteste Samples verworfen");
        }
    }

    /// Entnimmt genau `n` Samples; fehlende werden mit Stille aufgefuellt
    pub fn pop(&self, n: usize) -> PcmBuffer {
        let mut out = PcmBuffer::silence(n);
        self.pop_into(out.as_mut_slice());
        out
    }

    /// Fuellt `out` vollstaendig; gibt die Anzahl echter Samples zurueck
    ///
    /// Allokationsfrei, fuer den Audio-Callback gedacht.
    pub fn pop_into(&self, out: &mut [f32]) -> usize {
        // Leere Anforderung liefert nichts und laesst das Flag unveraendert
        if out.is_empty() {
            return 0;
        }
        let mut inner = self.inner.lock();
        let verfuegbar = inner.samples.len().min(out.len());

        let (a, b) = inner.samples.as_slices();
        let aus_a = verfuegbar.min(a.len());
        out[..aus_a].copy_from_slice(&a[..aus_a]);
        out[aus_a..verfuegbar].copy_from_slice(&b[..verfuegbar - aus_a]);
        inner.samples.drain(..verfuegbar);

        out[verfuegbar..].fill(0.0);

        inner.starving = verfuegbar < out.len();
        if inner.starving {
            inner.stats.underruns += 1;
        }
        inner.stats.popped += verfuegbar as u64;
        verfuegbar
    }

    /// True wenn die letzte Anforderung nicht vollstaendig bedient wurde
    pub fn is_starving(&self) -> bool {
        self.inner.lock().starving
    }

    /// Aktueller Fuellstand in Samples
    pub fn len(&self) -> usize {
        self.inner.lock().samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Verwirft alle gepufferten Samples
    pub fn clear(&self) {
        self.inner.lock().samples.clear();
    }

    pub fn stats(&self) -> QueueStats {
        self.inner.lock().stats
    }

    pub fn max_samples(&self) -> Option<usize> {
        self.max_samples
    }
}

impl Default for JitterBuffer {
    fn default() -> Self {
        Self::new()
    }
}
