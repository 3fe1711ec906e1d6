//! Contratos con la plataforma de voz.
//!
//! El reproductor nunca habla directo con la plataforma. Un [`Connector`]
//! traduce a quien invoca en un [`VoiceLocation`] y se une a él, creando un
//! [`Transport`] que reproduce una fuente a la vez y avisa el fin de cada
//! reproducción con un [`Completion`].

use async_trait::async_trait;
use serenity::model::id::{ChannelId, GuildId};

use super::{error::TransportError, signal::Completion};

/// Tipo de canal donde está el usuario.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelKind {
    Voice,
    Stage,
    Other,
}

/// Canal de voz resuelto a partir de quien invoca el comando.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VoiceLocation {
    pub guild_id: GuildId,
    pub channel_id: ChannelId,
    pub kind: ChannelKind,
}

impl VoiceLocation {
    /// Solo canales de voz normales.
    pub fn is_connectable(&self) -> bool {
        self.kind == ChannelKind::Voice
    }
}

/// Conexión de voz activa.
///
/// `play` retorna en cuanto la fuente fue enviada; el transporte consume
/// `completion` una sola vez cuando la reproducción termina por cualquier
/// motivo. Descartar `completion` sin dispararlo también cuenta como fin.
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    type Source: Send + 'static;

    async fn play(&self, source: Self::Source, completion: Completion)
        -> Result<(), TransportError>;

    async fn pause(&self) -> Result<(), TransportError>;

    async fn resume(&self) -> Result<(), TransportError>;

    /// Detiene la fuente actual, disparando su completion.
    async fn stop(&self) -> Result<(), TransportError>;

    async fn is_connected(&self) -> bool;

    async fn disconnect(&self, force: bool) -> Result<(), TransportError>;
}

/// Resolución de canales y creación de transportes.
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    /// Identifica a quien ejecuta el comando.
    type Invoker: Send + Sync;
    type Transport: Transport;

    async fn locate(&self, invoker: &Self::Invoker) -> Option<VoiceLocation>;

    async fn join(&self, location: &VoiceLocation) -> Result<Self::Transport, TransportError>;
}

/// Tipo de fuente de audio que acepta el transporte de un conector.
pub type SourceOf<C> = <<C as Connector>::Transport as Transport>::Source;
