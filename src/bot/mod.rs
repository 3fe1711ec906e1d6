//! # Bot Module
//!
//! Thin Discord layer over the [`Player`].
//!
//! [`OpenPlayerBot`] implements Serenity's [`EventHandler`]: it registers the
//! slash commands on `ready`, maps each command to a player operation, and
//! relays [`PlayerEvent`]s to the text channel of the last request.

use anyhow::Result;
use parking_lot::Mutex;
use serenity::{
    all::{ChannelId, Context, EventHandler, GuildId, Interaction, Ready, VoiceState},
    async_trait,
    http::Http,
};
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use tokio::sync::broadcast::error::RecvError;
use tracing::{error, info, warn};

pub mod commands;
pub mod handlers;

use crate::{
    audio::{Player, PlayerEvent, SongbirdConnector},
    config::Config,
    request::RequestKit,
};

/// Reproductor usado por el bot.
pub type BotPlayer = Player<SongbirdConnector>;

/// Main Discord bot handler.
pub struct OpenPlayerBot {
    /// Bot configuration loaded from environment variables
    config: Arc<Config>,
    pub player: Arc<BotPlayer>,
    pub kit: Arc<RequestKit>,
    /// Canal de texto donde se anuncian los eventos del reproductor
    announcements: Arc<Mutex<Option<ChannelId>>>,
    relaying: AtomicBool,
}

impl OpenPlayerBot {
    pub fn new(config: Config, player: Arc<BotPlayer>, kit: Arc<RequestKit>) -> Self {
        Self {
            config: Arc::new(config),
            player,
            kit,
            announcements: Arc::new(Mutex::new(None)),
            relaying: AtomicBool::new(false),
        }
    }

    /// Los eventos siguientes se anuncian en `channel_id`.
    pub fn announce_in(&self, channel_id: ChannelId) {
        *self.announcements.lock() = Some(channel_id);
    }

    /// Registers slash commands with Discord.
    ///
    /// Guild commands (when `GUILD_ID` is set) propagate in about a second;
    /// global commands can take up to an hour.
    async fn register_commands(&self, ctx: &Context) -> Result<()> {
        info!("📝 Registrando comandos slash...");

        match self.config.guild_id {
            Some(guild_id) => {
                let guild_id = GuildId::new(guild_id);

                if !ctx.cache.guilds().contains(&guild_id) {
                    warn!("⚠️ El bot no está en la guild especificada: {}", guild_id);
                    return Ok(());
                }

                commands::register_guild_commands(ctx, guild_id)
                    .await
                    .map_err(|e| {
                        error!("❌ Error registrando comandos de guild: {:?}", e);
                        anyhow::anyhow!("No se pudieron registrar comandos de guild. Verifica que el bot tenga permisos de 'applications.commands' en la guild.")
                    })?;
                info!("✅ Comandos de guild registrados para: {}", guild_id);
            }
            None => {
                commands::register_global_commands(ctx).await.map_err(|e| {
                    error!("❌ Error registrando comandos globales: {:?}", e);
                    anyhow::anyhow!("No se pudieron registrar comandos globales. Verifica que el bot tenga permisos de 'applications.commands'.")
                })?;
                info!("✅ Comandos globales registrados");
            }
        }

        Ok(())
    }

    fn spawn_relay(&self, http: Arc<Http>) {
        if self.relaying.swap(true, Ordering::AcqRel) {
            return;
        }

        let events = self.player.events();
        let channel = self.announcements.clone();
        tokio::spawn(relay_events(events, channel, http));
    }
}

/// Publica los eventos del reproductor en el canal de anuncios.
async fn relay_events(
    mut events: tokio::sync::broadcast::Receiver<PlayerEvent>,
    channel: Arc<Mutex<Option<ChannelId>>>,
    http: Arc<Http>,
) {
    loop {
        let event = match events.recv().await {
            Ok(event) => event,
            Err(RecvError::Lagged(skipped)) => {
                warn!("⚠️ {} eventos del reproductor descartados", skipped);
                continue;
            }
            Err(RecvError::Closed) => break,
        };

        let message = match &event {
            PlayerEvent::Started(metadata) => format!("🎵 Reproduciendo: {}", metadata),
            PlayerEvent::Failed { metadata, reason } => {
                format!("❌ No se pudo reproducir {}: {}", metadata.display_title(), reason)
            }
            PlayerEvent::Finished(_) | PlayerEvent::Disconnected => continue,
        };

        let target = *channel.lock();
        if let Some(channel_id) = target {
            if let Err(e) = channel_id.say(&http, message).await {
                warn!("No se pudo anunciar en {}: {}", channel_id, e);
            }
        }
    }
}

#[async_trait]
impl EventHandler for OpenPlayerBot {
    async fn ready(&self, ctx: Context, ready: Ready) {
        info!("🤖 {} está en línea!", ready.user.name);
        info!("📊 Conectado a {} servidores", ready.guilds.len());

        if let Err(e) = self.register_commands(&ctx).await {
            error!("Error al registrar comandos: {:?}", e);
        }

        self.spawn_relay(ctx.http.clone());
    }

    async fn interaction_create(&self, ctx: Context, interaction: Interaction) {
        if let Interaction::Command(command_interaction) = interaction {
            if let Err(e) = handlers::handle_command(&ctx, command_interaction, self).await {
                error!("Error manejando comando: {:?}", e);
            }
        }
    }

    /// Limpia el estado local si el bot fue expulsado del canal de voz.
    async fn voice_state_update(&self, ctx: Context, old: Option<VoiceState>, new: VoiceState) {
        let current_user_id = ctx.cache.current_user().id;
        if new.user_id != current_user_id || old.is_none() || new.channel_id.is_some() {
            return;
        }

        info!("🔌 Bot desconectado del canal de voz externamente");
        if self.player.is_attached() {
            if let Err(e) = self.player.disconnect(true).await {
                warn!("Limpieza tras desconexión externa: {}", e);
            }
        }
    }
}
