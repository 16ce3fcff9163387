//! Fehlertypen fuer die Voice-Wiedergabe

use thiserror::Error;
use voxplay_core::PlayerId;

/// Alle moeglichen Fehler der Voice-Wiedergabe
#[derive(Debug, Error)]
pub enum AudioError {
    /// Ein einzelner Frame konnte nicht dekodiert werden. Der Stream bleibt bestehen.
    #[error("Dekodierung fehlgeschlagen: {0}")]
    Dekodierung(String),

    #[error("Codec-Fehler: {0}")]
    CodecFehler(String),

    #[error("Konfigurationsfehler: {0}")]
    Konfiguration(String),

    /// Die Audio-Engine konnte keine Stimme bereitstellen
    #[error("Sink-Fehler: {0}")]
    SinkFehler(String),

    #[error("Kein Stream fuer {0}")]
    UnbekannterStream(PlayerId),

    #[error("Audio-Geraet nicht gefunden: {0}")]
    GeraetNichtGefunden(String),

    #[error("Kein Standard-Ausgabegeraet verfuegbar")]
    KeinStandardAusgabegeraet,
}

impl AudioError {
    /// Gibt true zurueck wenn nur der aktuelle Frame betroffen ist
    pub fn ist_lokal(&self) -> bool {
        matches!(self, Self::Dekodierung(_))
    }
}

pub type AudioResult<T> = Result<T, AudioError>;
