//! Conexión de voz real sobre songbird + caché de serenity.

use async_trait::async_trait;
use parking_lot::Mutex;
use serenity::{
    cache::Cache,
    model::{
        channel::ChannelType,
        id::{GuildId, UserId},
    },
};
use songbird::{
    input::Input,
    tracks::{PlayMode, TrackHandle},
    Call, Event, EventContext, EventHandler as VoiceEventHandler, Songbird, TrackEvent,
};
use std::sync::Arc;
use tokio::sync::Mutex as AsyncMutex;
use tracing::{debug, info};

use super::{
    error::TransportError,
    signal::{Completion, CompletionSlot},
    transport::{ChannelKind, Connector, Transport, VoiceLocation},
};

/// Usuario que ejecuta un comando.
#[derive(Clone)]
pub struct VoiceInvoker {
    pub cache: Arc<Cache>,
    pub guild_id: GuildId,
    pub user_id: UserId,
}

/// Conector basado en el manager de songbird.
#[derive(Clone)]
pub struct SongbirdConnector {
    manager: Arc<Songbird>,
}

impl SongbirdConnector {
    pub fn new(manager: Arc<Songbird>) -> Self {
        Self { manager }
    }
}

#[async_trait]
impl Connector for SongbirdConnector {
    type Invoker = VoiceInvoker;
    type Transport = SongbirdTransport;

    async fn locate(&self, invoker: &VoiceInvoker) -> Option<VoiceLocation> {
        voice_location(&invoker.cache, invoker.guild_id, invoker.user_id)
    }

    async fn join(&self, location: &VoiceLocation) -> Result<SongbirdTransport, TransportError> {
        let call = self
            .manager
            .join(location.guild_id, location.channel_id)
            .await?;

        Ok(SongbirdTransport {
            manager: self.manager.clone(),
            guild_id: location.guild_id,
            call,
            track: Mutex::new(None),
        })
    }
}

// Los guards del caché no son Send; fuera del código async.
fn voice_location(cache: &Cache, guild_id: GuildId, user_id: UserId) -> Option<VoiceLocation> {
    let guild = cache.guild(guild_id)?;
    let channel_id = guild.voice_states.get(&user_id)?.channel_id?;

    let kind = match guild.channels.get(&channel_id).map(|channel| channel.kind) {
        Some(ChannelType::Voice) => ChannelKind::Voice,
        Some(ChannelType::Stage) => ChannelKind::Stage,
        _ => ChannelKind::Other,
    };

    Some(VoiceLocation {
        guild_id,
        channel_id,
        kind,
    })
}

/// Llamada de songbird en un guild.
pub struct SongbirdTransport {
    manager: Arc<Songbird>,
    guild_id: GuildId,
    call: Arc<AsyncMutex<Call>>,
    track: Mutex<Option<TrackHandle>>,
}

impl SongbirdTransport {
    fn track(&self) -> Option<TrackHandle> {
        self.track.lock().clone()
    }
}

#[async_trait]
impl Transport for SongbirdTransport {
    type Source = Input;

    async fn play(&self, source: Input, completion: Completion) -> Result<(), TransportError> {
        let slot = CompletionSlot::new(completion);

        let handle = {
            let mut call = self.call.lock().await;
            if call.current_connection().is_none() {
                return Err(TransportError::Unavailable(format!(
                    "sin conexión activa en guild {}",
                    self.guild_id
                )));
            }
            call.play_only_input(source)
        };

        handle.add_event(
            Event::Track(TrackEvent::End),
            TrackEndNotifier { slot: slot.clone() },
        )?;
        handle.add_event(Event::Track(TrackEvent::Error), TrackEndNotifier { slot })?;

        *self.track.lock() = Some(handle);
        Ok(())
    }

    async fn pause(&self) -> Result<(), TransportError> {
        if let Some(track) = self.track() {
            track.pause()?;
        }
        Ok(())
    }

    async fn resume(&self) -> Result<(), TransportError> {
        if let Some(track) = self.track() {
            track.play()?;
        }
        Ok(())
    }

    async fn stop(&self) -> Result<(), TransportError> {
        self.call.lock().await.stop();
        self.track.lock().take();
        Ok(())
    }

    async fn is_connected(&self) -> bool {
        self.call.lock().await.current_connection().is_some()
    }

    async fn disconnect(&self, force: bool) -> Result<(), TransportError> {
        self.stop().await?;

        if force {
            if let Err(e) = self.manager.remove(self.guild_id).await {
                debug!("Eliminación forzada de la llamada: {}", e);
            }
        } else {
            self.manager.leave(self.guild_id).await?;
            self.manager.remove(self.guild_id).await?;
        }

        info!("👋 Llamada cerrada en guild {}", self.guild_id);
        Ok(())
    }
}

/// Dispara el completion al terminar o fallar la pista.
struct TrackEndNotifier {
    slot: CompletionSlot,
}

#[async_trait]
impl VoiceEventHandler for TrackEndNotifier {
    async fn act(&self, ctx: &EventContext<'_>) -> Option<Event> {
        let error = match ctx {
            EventContext::Track(tracks) => tracks.iter().find_map(|(state, _)| match &state.playing {
                PlayMode::Errored(e) => Some(format!("{:?}", e)),
                _ => None,
            }),
            _ => None,
        };

        self.slot.fire(error);
        None
    }
}
