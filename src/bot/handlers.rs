use anyhow::Result;
use serenity::{
    builder::{CreateInteractionResponse, CreateInteractionResponseMessage, EditInteractionResponse},
    model::{application::CommandInteraction, channel::Attachment},
    prelude::Context,
};
use std::sync::Arc;
use tracing::info;

use crate::{
    audio::{PlayerError, VoiceInvoker},
    bot::OpenPlayerBot,
    config::parse_timeout,
    request::{AudioOptions, Metadata, PlayRequest, Request, Upload},
};

/// Requests mostrados por `/queue`
const QUEUE_PREVIEW: usize = 5;

/// Maneja comandos slash
pub async fn handle_command(
    ctx: &Context,
    command: CommandInteraction,
    bot: &OpenPlayerBot,
) -> Result<()> {
    let guild_id = command
        .guild_id
        .ok_or_else(|| anyhow::anyhow!("Comando usado fuera de un servidor"))?;

    info!(
        "📝 Comando /{} usado por {} en guild {}",
        command.data.name, command.user.name, guild_id
    );

    match command.data.name.as_str() {
        "play" => handle_play(ctx, command, bot).await?,
        "file" => handle_file(ctx, command, bot).await?,
        "midi" => handle_midi(ctx, command, bot).await?,
        "skip" => handle_skip(ctx, command, bot).await?,
        "pause" => handle_pause(ctx, command, bot).await?,
        "resume" => handle_resume(ctx, command, bot).await?,
        "stop" => handle_stop(ctx, command, bot).await?,
        "leave" => handle_leave(ctx, command, bot).await?,
        "queue" => handle_queue(ctx, command, bot).await?,
        "nowplaying" => handle_nowplaying(ctx, command, bot).await?,
        "timeout" => handle_timeout(ctx, command, bot).await?,
        _ => {
            command
                .create_response(
                    &ctx.http,
                    CreateInteractionResponse::Message(
                        CreateInteractionResponseMessage::new()
                            .content("❌ Comando no reconocido")
                            .ephemeral(true),
                    ),
                )
                .await?;
        }
    }

    Ok(())
}

// Handlers de reproducción

async fn handle_play(ctx: &Context, command: CommandInteraction, bot: &OpenPlayerBot) -> Result<()> {
    let query = string_option(&command, "query")
        .ok_or_else(|| anyhow::anyhow!("Query no proporcionado"))?
        .to_string();

    command.defer(&ctx.http).await?;

    let request = bot
        .kit
        .stream(&query, Some(command.user.id), request_options(bot, &command));
    let reply = enqueue_reply(ctx, &command, bot, request).await;
    respond(ctx, &command, reply).await
}

async fn handle_file(ctx: &Context, command: CommandInteraction, bot: &OpenPlayerBot) -> Result<()> {
    let file = attachment_option(&command, "file")
        .ok_or_else(|| anyhow::anyhow!("Archivo no proporcionado"))?;

    command.defer(&ctx.http).await?;

    let request = bot.kit.file(
        Upload::from(file),
        Some(command.user.id),
        request_options(bot, &command),
    );
    let reply = enqueue_reply(ctx, &command, bot, request).await;
    respond(ctx, &command, reply).await
}

async fn handle_midi(ctx: &Context, command: CommandInteraction, bot: &OpenPlayerBot) -> Result<()> {
    let midi = attachment_option(&command, "midi")
        .ok_or_else(|| anyhow::anyhow!("MIDI no proporcionado"))?;
    let soundfont = attachment_option(&command, "sf2").map(Upload::from);

    command.defer(&ctx.http).await?;

    let request = bot
        .kit
        .synth(Upload::from(midi), soundfont, Some(command.user.id));
    let reply = enqueue_reply(ctx, &command, bot, request).await;
    respond(ctx, &command, reply).await
}

/// Conecta, enriquece y encola; devuelve el texto de la respuesta.
async fn enqueue_reply(
    ctx: &Context,
    command: &CommandInteraction,
    bot: &OpenPlayerBot,
    request: PlayRequest,
) -> String {
    match enqueue(ctx, command, bot, request).await {
        Ok(metadata) => {
            bot.announce_in(command.channel_id);
            format!("🎵 En cola: {}", metadata)
        }
        Err(e) => format!("❌ {}", e),
    }
}

async fn enqueue(
    ctx: &Context,
    command: &CommandInteraction,
    bot: &OpenPlayerBot,
    request: PlayRequest,
) -> Result<Metadata> {
    bot.player.connect(&invoker(ctx, command)?).await?;
    request.prepare().await?;

    let metadata = request.metadata();
    bot.player.queue(Arc::new(request));
    Ok(metadata)
}

// Handlers de control

async fn handle_skip(ctx: &Context, command: CommandInteraction, bot: &OpenPlayerBot) -> Result<()> {
    command.defer(&ctx.http).await?;

    let reply = match bot.player.current() {
        Some(metadata) => {
            bot.player.skip().await?;
            format!("⏭️ Saltado: {}", metadata.display_title())
        }
        None => "Nada en reproducción".to_string(),
    };
    respond(ctx, &command, reply).await
}

async fn handle_pause(ctx: &Context, command: CommandInteraction, bot: &OpenPlayerBot) -> Result<()> {
    command.defer(&ctx.http).await?;
    bot.player.pause().await?;
    respond(ctx, &command, "⏸️ Reproducción pausada").await
}

async fn handle_resume(ctx: &Context, command: CommandInteraction, bot: &OpenPlayerBot) -> Result<()> {
    command.defer(&ctx.http).await?;
    bot.player.resume().await?;
    respond(ctx, &command, "▶️ Reproducción reanudada").await
}

async fn handle_stop(ctx: &Context, command: CommandInteraction, bot: &OpenPlayerBot) -> Result<()> {
    command.defer(&ctx.http).await?;
    bot.player.stop().await?;
    respond(ctx, &command, "⏹️ Reproducción detenida y cola vaciada").await
}

async fn handle_leave(ctx: &Context, command: CommandInteraction, bot: &OpenPlayerBot) -> Result<()> {
    command.defer(&ctx.http).await?;

    let reply = match bot.player.disconnect(false).await {
        Ok(()) => "👋 Desconectado".to_string(),
        Err(e @ PlayerError::NotConnected) => format!("❌ {}", e),
        Err(e) => return Err(e.into()),
    };
    respond(ctx, &command, reply).await
}

// Handlers de información

async fn handle_queue(ctx: &Context, command: CommandInteraction, bot: &OpenPlayerBot) -> Result<()> {
    command.defer(&ctx.http).await?;

    let reply = match bot.player.current() {
        Some(current) => queue_listing(&current, &bot.player.pending(QUEUE_PREVIEW)),
        None => "Nada en reproducción".to_string(),
    };
    respond(ctx, &command, reply).await
}

async fn handle_nowplaying(
    ctx: &Context,
    command: CommandInteraction,
    bot: &OpenPlayerBot,
) -> Result<()> {
    command.defer(&ctx.http).await?;

    let reply = match bot.player.current() {
        Some(current) => format!("🎶 {}", current),
        None => "Nada en reproducción".to_string(),
    };
    respond(ctx, &command, reply).await
}

async fn handle_timeout(
    ctx: &Context,
    command: CommandInteraction,
    bot: &OpenPlayerBot,
) -> Result<()> {
    let value = string_option(&command, "duration")
        .ok_or_else(|| anyhow::anyhow!("Duración no proporcionada"))?
        .to_string();

    command.defer(&ctx.http).await?;

    let reply = match parse_timeout(&value) {
        Ok(timeout) => {
            bot.player.set_idle_timeout(timeout);
            match timeout {
                Some(after) => format!(
                    "⏱️ Timeout de inactividad: {}",
                    humantime::format_duration(after)
                ),
                None => "⏱️ Timeout de inactividad desactivado".to_string(),
            }
        }
        Err(e) => format!("❌ Duración inválida {:?}: {}", value, e),
    };
    respond(ctx, &command, reply).await
}

// Funciones auxiliares

fn invoker(ctx: &Context, command: &CommandInteraction) -> Result<VoiceInvoker> {
    let guild_id = command
        .guild_id
        .ok_or_else(|| anyhow::anyhow!("Comando usado fuera de un servidor"))?;

    Ok(VoiceInvoker {
        cache: ctx.cache.clone(),
        guild_id,
        user_id: command.user.id,
    })
}

fn request_options(bot: &OpenPlayerBot, command: &CommandInteraction) -> AudioOptions {
    let mut options = bot.player.options();
    if let Some(tempo) = number_option(command, "tempo") {
        options = options.with_tempo(tempo);
    }
    if let Some(volume) = number_option(command, "volume") {
        options = options.with_volume(volume as f32);
    }
    options
}

fn string_option<'a>(command: &'a CommandInteraction, name: &str) -> Option<&'a str> {
    command
        .data
        .options
        .iter()
        .find(|opt| opt.name == name)
        .and_then(|opt| opt.value.as_str())
}

fn number_option(command: &CommandInteraction, name: &str) -> Option<f64> {
    command
        .data
        .options
        .iter()
        .find(|opt| opt.name == name)
        .and_then(|opt| opt.value.as_f64())
}

fn attachment_option<'a>(command: &'a CommandInteraction, name: &str) -> Option<&'a Attachment> {
    let id = command
        .data
        .options
        .iter()
        .find(|opt| opt.name == name)
        .and_then(|opt| opt.value.as_attachment_id())?;

    command.data.resolved.attachments.get(&id)
}

fn queue_listing(current: &Metadata, pending: &[Metadata]) -> String {
    let mut lines = vec![format!("🎶 {}", current)];
    if pending.is_empty() {
        lines.push("La cola está vacía".to_string());
    }
    for (position, metadata) in pending.iter().enumerate() {
        lines.push(format!(
            "{}. {} - {}",
            position + 1,
            metadata.display_title(),
            metadata.artist.as_deref().unwrap_or("Artista desconocido")
        ));
    }
    lines.join("\n")
}

async fn respond(
    ctx: &Context,
    command: &CommandInteraction,
    content: impl Into<String>,
) -> Result<()> {
    command
        .edit_response(&ctx.http, EditInteractionResponse::new().content(content))
        .await?;
    Ok(())
}
