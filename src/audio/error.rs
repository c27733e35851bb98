//! Error types for the playback engine and its boundaries.

use std::time::Duration;
use thiserror::Error;

use crate::sources::ResolutionError;

/// Errores al abrir un stream de audio
#[derive(Debug, Error)]
pub enum StreamError {
    #[error("Error de extracción: {0}")]
    Extraction(String),

    #[error("No hay formato de audio disponible para {0}")]
    NoAudioFormat(String),

    #[error("La apertura del stream tardó más de {0:?}")]
    Timeout(Duration),

    #[error("Apertura cancelada")]
    Cancelled,
}

/// Errores de la sesión de voz o del reproductor
#[derive(Debug, Error)]
pub enum VoiceError {
    #[error("No se pudo conectar al canal de voz: {0}")]
    Join(String),

    #[error("Error al salir del canal de voz: {0}")]
    Leave(String),

    #[error("No hay sesión de voz activa")]
    NotConnected,

    #[error("Error de control del track: {0}")]
    Control(String),
}

/// Errors reported back to whoever issued a queue command.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("No hay nada reproduciéndose")]
    NothingPlaying,

    #[error("La reproducción ya está pausada")]
    AlreadyPaused,

    #[error("Debes estar en un canal de voz")]
    NotInVoiceChannel,

    #[error("La cola está llena (máximo {0} canciones)")]
    QueueFull(usize),

    #[error("No se pudo conectar al canal de voz: {0}")]
    VoiceJoin(String),

    #[error("La cola de este servidor ya no está activa")]
    QueueClosed,

    #[error(transparent)]
    Resolution(#[from] ResolutionError),

    #[error(transparent)]
    Stream(#[from] StreamError),

    #[error(transparent)]
    Voice(#[from] VoiceError),
}
