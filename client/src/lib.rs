//! voxplay-client – Headless Voice-Client
//!
//! Verbindet simulierte Gegenspieler, den Playback-Manager und den
//! Spiel-Tick zu einer lauffaehigen Sitzung. Eine einzige Schleife besitzt
//! die Voice-Sitzung und verarbeitet:
//! - eingehende Frames und Verlassen-Ereignisse aus dem Netzwerk
//! - Spiel-Ticks (Lautheit, Metriken)
//! - Ende der Simulation bzw. Ctrl-C

pub mod config;
pub mod session;
pub mod simulation;

use anyhow::{Context, Result};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::LocalSet;
use tracing::{info, warn};
use voxplay_audio::{AudioSink, PlaybackManager, VirtualSink};
use voxplay_observability::VoiceMetrics;

use config::{ClientConfig, SinkTyp};
use session::VoiceSession;
use simulation::{peers_starten, NetzEreignis};

/// Groesse des Netzwerk-Kanals in Frames
const KANAL_KAPAZITAET: usize = 256;

/// Waehlt die Audio-Engine und fuehrt die Sitzung bis zum Ende aus
pub async fn ausfuehren(config: ClientConfig) -> Result<()> {
    match config.sink.typ {
        SinkTyp::Virtual => {
            let sink = VirtualSink::spawn(config.virtual_sink_config())
                .context("Virtuelle Audio-Engine konnte nicht gestartet werden")?;
            sitzung_ausfuehren(sink, config).await
        }
        #[cfg(feature = "cpal-sink")]
        SinkTyp::Cpal => {
            let sink = voxplay_audio::CpalSink::open(config.sink.geraet.as_deref())
                .context("Ausgabegeraet konnte nicht geoeffnet werden")?;
            sitzung_ausfuehren(sink, config).await
        }
        #[cfg(not(feature = "cpal-sink"))]
        SinkTyp::Cpal => anyhow::bail!(
            "sink.typ = \"cpal\" benoetigt das Feature `cpal-sink`"
        ),
    }
}

/// Fuehrt eine Sitzung auf der gegebenen Audio-Engine aus
pub async fn sitzung_ausfuehren<S: AudioSink>(sink: S, config: ClientConfig) -> Result<()> {
    let manager = PlaybackManager::new(sink, config.playback_config())?;
    let metrics = VoiceMetrics::neu()?;
    let mut session = VoiceSession::neu(manager, metrics);

    let local = LocalSet::new();
    let ergebnis = local
        .run_until(schleife(&mut session, &config))
        .await;

    session.beenden();

    if let Some(pfad) = &config.metrics.datei {
        let text = session.metrics().exportieren()?;
        std::fs::write(pfad, text)
            .with_context(|| format!("Metriken konnten nicht nach '{pfad}' geschrieben werden"))?;
        info!(pfad = %pfad, "Metriken exportiert");
    }

    ergebnis
}

async fn schleife<S: AudioSink>(session: &mut VoiceSession<S>, config: &ClientConfig) -> Result<()> {
    let (tx, mut rx) = mpsc::channel(KANAL_KAPAZITAET);
    let peers = peers_starten(&config.simulation, &config.playback_config().codec, tx)?;

    let tick_dauer = config.tick_dauer();
    let dt = tick_dauer.as_secs_f32();
    let mut ticks = tokio::time::interval(tick_dauer);
    ticks.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    let log_dauer = Duration::from_secs(config.metrics.log_interval_secs.max(1));
    let mut log_ticks = tokio::time::interval(log_dauer);

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    info!(
        spieler = config.simulation.players,
        tick_hz = config.simulation.tick_hz,
        "Voice-Sitzung laeuft"
    );

    loop {
        tokio::select! {
            ereignis = rx.recv() => match ereignis {
                Some(NetzEreignis::Frame(frame)) => session.frame_empfangen(frame)?,
                Some(NetzEreignis::Verlassen(player)) => session.spieler_verlassen(player),
                None => {
                    info!("Alle simulierten Spieler beendet");
                    break;
                }
            },
            _ = ticks.tick() => {
                session.tick(dt);
            }
            _ = log_ticks.tick() => {
                let stats = session.manager().stats();
                info!(
                    streams = stats.streams,
                    sprechend = ?session.sprechende_spieler(),
                    hungernd = stats.starving,
                    latenz_ms = stats.max_buffered_ms,
                    dekodierfehler = stats.decode_errors,
                    "Voice-Status"
                );
            }
            signal = &mut ctrl_c => {
                if let Err(e) = signal {
                    warn!("Ctrl-C konnte nicht abgefangen werden: {}", e);
                }
                info!("Shutdown-Signal empfangen");
                break;
            }
        }
    }

    for peer in peers {
        peer.abort();
    }
    Ok(())
}
