//! Audio-Playback via cpal
//!
//! Jede Stimme ist ein eigener cpal OutputStream, dessen Callback direkt aus
//! dem `PlaybackFeed` des Sprechers liest. Nur mit Feature `cpal-sink`.

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, SampleFormat, Stream, StreamConfig};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, error, info};

use crate::error::{AudioError, AudioResult};
use crate::feed::PlaybackFeed;
use crate::sink::{AudioSink, SinkFormat, SinkVoice};

/// Audio-Engine auf einem cpal-Ausgabegeraet
pub struct CpalSink {
    device: Device,
}

impl CpalSink {
    /// Oeffnet das Ausgabegeraet (None = Standardgeraet)
    pub fn open(device_name: Option<&str>) -> AudioResult<Self> {
        let device = load_cpal_output_device(device_name)?;
        info!(
            geraet = %device.name().unwrap_or_else(|_| "unbekannt".into()),
            "Ausgabegeraet geoeffnet"
        );
        Ok(Self { device })
    }
}

impl AudioSink for CpalSink {
    fn create_voice(
        &mut self,
        format: SinkFormat,
        feed: Arc<PlaybackFeed>,
    ) -> AudioResult<Box<dyn SinkVoice>> {
        let channels = format.channels.count() as u16;
        let sample_rate = format.sample_rate.hz();
        let stream_config = StreamConfig {
            channels,
            sample_rate: cpal::SampleRate(sample_rate),
            buffer_size: cpal::BufferSize::Default,
        };

        let supported = self
            .device
            .supported_output_configs()
            .map_err(|e| AudioError::SinkFehler(e.to_string()))?
            .find(|c| {
                c.min_sample_rate().0 <= sample_rate
                    && c.max_sample_rate().0 >= sample_rate
                    && c.channels() >= channels
            });

        let sample_format = supported
            .map(|c| c.sample_format())
            .unwrap_or(SampleFormat::F32);

        let played = Arc::new(AtomicU64::new(0));
        let err_fn = |err| error!("Playback-Fehler: {}", err);

        let stream = match sample_format {
            SampleFormat::F32 => {
                let played = Arc::clone(&played);
                self.device
                    .build_output_stream(
                        &stream_config,
                        move |data: &mut [f32], _| {
                            feed.fill(data);
                            played.fetch_add((data.len() / channels as usize) as u64, Ordering::Relaxed);
                        },
                        err_fn,
                        None,
                    )
                    .map_err(|e| AudioError::SinkFehler(e.to_string()))?
            }
            SampleFormat::I16 => {
                let played = Arc::clone(&played);
                let mut float_buf: Vec<f32> = Vec::new();
                self.device
                    .build_output_stream(
                        &stream_config,
                        move |data: &mut [i16], _| {
                            float_buf.resize(data.len(), 0.0);
                            feed.fill(&mut float_buf);
                            for (out, s) in data.iter_mut().zip(float_buf.iter()) {
                                *out = (*s * i16::MAX as f32)
                                    .clamp(i16::MIN as f32, i16::MAX as f32)
                                    as i16;
                            }
                            played.fetch_add((data.len() / channels as usize) as u64, Ordering::Relaxed);
                        },
                        err_fn,
                        None,
                    )
                    .map_err(|e| AudioError::SinkFehler(e.to_string()))?
            }
            _ => {
                return Err(AudioError::SinkFehler(format!(
                    "Nicht unterstuetztes Sample-Format: {:?}",
                    sample_format
                )))
            }
        };

        // Sofort starten: der Geraetetakt laeuft, bevor echte Daten ankommen
        stream
            .play()
            .map_err(|e| AudioError::SinkFehler(e.to_string()))?;

        debug!("Playback-Stimme geoeffnet: {}Hz {}ch", sample_rate, channels);

        Ok(Box::new(CpalVoice {
            stream: Some(stream),
            played,
        }))
    }
}

/// Stimme auf einem cpal-Stream
pub struct CpalVoice {
    stream: Option<Stream>,
    played: Arc<AtomicU64>,
}

impl SinkVoice for CpalVoice {
    fn stop(&mut self) {
        if let Some(stream) = self.stream.take() {
            if let Err(e) = stream.pause() {
                debug!("Stream liess sich nicht pausieren: {}", e);
            }
            // Drop beendet den Callback-Thread des Streams
            drop(stream);
        }
    }

    fn frames_played(&self) -> u64 {
        self.played.load(Ordering::Relaxed)
    }
}

impl Drop for CpalVoice {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Laedt ein cpal-Device anhand des Namens fuer Ausgabe
pub fn load_cpal_output_device(name: Option<&str>) -> AudioResult<Device> {
    let host = cpal::default_host();
    match name {
        None => host
            .default_output_device()
            .ok_or(AudioError::KeinStandardAusgabegeraet),
        Some(n) => {
            let devices = host
                .output_devices()
                .map_err(|e| AudioError::SinkFehler(e.to_string()))?;
            for device in devices {
                if let Ok(dev_name) = device.name() {
                    if dev_name.contains(n) {
                        return Ok(device);
                    }
                }
            }
            Err(AudioError::GeraetNichtGefunden(n.to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sample_queue::JitterBuffer;
    use voxplay_protocol::codec::AudioPreset;

    #[test]
    fn unbekanntes_geraet_liefert_fehler() {
        let result = load_cpal_output_device(Some("gibt-es-garantiert-nicht-4711"));
        assert!(result.is_err());
    }

    #[test]
    #[ignore = "Benoetigt Audio-Hardware"]
    fn stimme_oeffnen_und_stoppen() {
        let mut sink = CpalSink::open(None).unwrap();
        let feed = Arc::new(PlaybackFeed::new(JitterBuffer::new(), 1.0));
        let format = SinkFormat::from(&AudioPreset::GameVoice.config());
        let mut voice = sink.create_voice(format, Arc::clone(&feed)).unwrap();
        std::thread::sleep(std::time::Duration::from_millis(100));
        voice.stop();
        assert!(voice.frames_played() > 0);
    }
}
