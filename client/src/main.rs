//! voxplay Client – Einstiegspunkt
//!
//! Laedt die Konfiguration, initialisiert das Logging und startet die
//! Voice-Sitzung.

use anyhow::Result;
use voxplay_client::config::ClientConfig;
use voxplay_observability::logging_initialisieren;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    // Konfigurationsdatei-Pfad aus Umgebungsvariable oder Standard
    let config_pfad = std::env::var("VOXPLAY_CONFIG").unwrap_or_else(|_| "voxplay.toml".into());

    // Konfiguration laden (Standardwerte falls Datei fehlt)
    let config = ClientConfig::laden(&config_pfad)?;

    logging_initialisieren(&config.logging.level, &config.logging.format);

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        config = %config_pfad,
        "voxplay Client wird initialisiert"
    );

    voxplay_client::ausfuehren(config).await
}
