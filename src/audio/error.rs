use serenity::model::id::ChannelId;
use std::time::Duration;
use thiserror::Error;

use crate::request::RequestError;

/// Errores del reproductor.
#[derive(Debug, Error)]
pub enum PlayerError {
    /// Quien invoca no está en un canal de voz al que el bot pueda unirse.
    #[error("No se puede conectar al canal {}", channel_reference(.0))]
    InvalidChannel(Option<ChannelId>),

    #[error("El bot no está conectado a un canal de voz compatible.")]
    NotConnected,

    /// No llegó ningún request dentro del timeout de inactividad.
    #[error("Sin requests durante {}", idle_span(.0))]
    IdleTimeout(Duration),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Request(#[from] RequestError),
}

/// Errores del transporte de voz.
#[derive(Debug, Error)]
pub enum TransportError {
    /// La plataforma indica que el bot ya está en un canal de voz.
    #[error("Ya conectado a un canal de voz")]
    AlreadyConnected,

    #[error("Falló la conexión de voz: {0}")]
    Join(#[from] songbird::error::JoinError),

    #[error("Falló el control de la pista: {0}")]
    Control(#[from] songbird::error::ControlError),

    #[error("Transporte de voz no disponible: {0}")]
    Unavailable(String),
}

fn idle_span(after: &Duration) -> String {
    humantime::format_duration(*after).to_string()
}

fn channel_reference(channel: &Option<ChannelId>) -> String {
    channel
        .map(|id| format!("<#{}>", id))
        .unwrap_or_else(|| "desconocido".to_string())
}
