//! voxplay-audio – Voice-Wiedergabe
//!
//! Echtzeit-Pipeline fuer die Stimmen entfernter Spieler:
//! - Opus-Dekodierung pro Sprecher
//! - Jitter-Buffer zwischen Netzwerk und Audio-Thread
//! - Lautheits-Schaetzung fuer die Sprech-Anzeige
//! - Playback-Manager als Registry aller Streams
//! - Audio-Engines: virtuell (Software-Mix) oder cpal (Feature `cpal-sink`)

pub mod codec;
pub mod error;
pub mod estimator;
pub mod feed;
pub mod manager;
pub mod pcm;
#[cfg(feature = "cpal-sink")]
pub mod playback;
pub mod sample_queue;
pub mod sink;
pub mod stream;
pub mod virtual_sink;

// Bequeme Re-Exporte der wichtigsten Typen
pub use codec::{CodecState, OpusDecoder, OpusEncoder};
pub use error::{AudioError, AudioResult};
pub use estimator::{EstimatorConfig, LoudnessEstimator};
pub use feed::{PlaybackFeed, MAX_VOLUME};
pub use manager::{PlaybackConfig, PlaybackManager, PlaybackStats};
pub use pcm::PcmBuffer;
#[cfg(feature = "cpal-sink")]
pub use playback::CpalSink;
pub use sample_queue::{JitterBuffer, QueueConfig, QueueStats};
pub use sink::{AudioSink, SinkFormat, SinkHandle, SinkVoice};
pub use stream::{PlaybackStream, StreamState};
pub use virtual_sink::{RenderReport, VirtualSink, VirtualSinkConfig};
