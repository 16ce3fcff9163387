//! voxplay-protocol – Protokoll-Definitionen
//!
//! Dieses Crate definiert die Codec-Konfiguration, die durch das
//! Netzwerkprotokoll festgelegt ist, sowie die bereits entpackten
//! Voice-Frames, die der Netzwerk-Layer an die Wiedergabe uebergibt.

pub mod codec;
pub mod voice;

pub use codec::{AudioPreset, ChannelCount, FrameSizeMs, OpusApplication, OpusConfig, SampleRate};
pub use voice::{EncodedAudioFrame, FrameError, VoiceFrame, VOICE_MAX_FRAMES_IN_AUDIO_FRAME};
