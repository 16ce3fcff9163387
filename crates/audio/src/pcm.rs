//! Dekodierte PCM-Daten mit eindeutigem Besitzer
//!
//! `PcmBuffer` ist bewusst nicht `Clone`: der Puffer wandert vom Decoder in
//! den Jitter-Buffer und wird dort freigegeben. Die Freigabe erfolgt genau
//! einmal ueber `Drop`, auch auf fruehen Rueckkehrpfaden.

/// Interleaved f32-Samples (normalisiert -1.0..1.0)
#[derive(Debug, Default, PartialEq)]
pub struct PcmBuffer {
    samples: Vec<f32>,
}

impl PcmBuffer {
    /// Uebernimmt einen Sample-Vektor
    pub fn from_vec(samples: Vec<f32>) -> Self {
        Self { samples }
    }

    /// Puffer aus `len` Stille-Samples
    pub fn silence(len: usize) -> Self {
        Self {
            samples: vec![0.0; len],
        }
    }

    /// Kopiert Samples aus einem Slice (z.B. synthetisches Audio)
    pub fn copy_from_slice(samples: &[f32]) -> Self {
        Self {
            samples: samples.to_vec(),
        }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.samples
    }

    pub fn as_mut_slice(&mut self) -> &mut [f32] {
        &mut self.samples
    }

    /// Gibt den Besitz am inneren Vektor ab
    pub fn into_vec(self) -> Vec<f32> {
        self.samples
    }

    /// Haengt einen weiteren Puffer an und verbraucht ihn
    pub fn append(&mut self, other: PcmBuffer) {
        self.samples.extend_from_slice(&other.samples);
    }
}

impl From<Vec<f32>> for PcmBuffer {
    fn from(samples: Vec<f32>) -> Self {
        Self::from_vec(samples)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stille_hat_gewuenschte_laenge() {
        let buf = PcmBuffer::silence(480);
        assert_eq!(buf.len(), 480);
        assert!(buf.as_slice().iter().all(|&s| s == 0.0));
    }

    #[test]
    fn append_verbraucht_quelle() {
        let mut a = PcmBuffer::from_vec(vec![0.1, 0.2]);
        let b = PcmBuffer::copy_from_slice(&[0.3]);
        a.append(b);
        assert_eq!(a.into_vec(), vec![0.1, 0.2, 0.3]);
    }
}
