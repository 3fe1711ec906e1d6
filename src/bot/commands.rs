use anyhow::Result;
use serenity::{
    builder::{CreateCommand, CreateCommandOption},
    model::{application::CommandOptionType, id::GuildId},
    prelude::Context,
};

/// Todos los comandos slash del bot
pub fn all() -> Vec<CreateCommand> {
    vec![
        play_command(),
        file_command(),
        midi_command(),
        skip_command(),
        pause_command(),
        resume_command(),
        stop_command(),
        leave_command(),
        queue_command(),
        nowplaying_command(),
        timeout_command(),
    ]
}

/// Registra comandos globales
pub async fn register_global_commands(ctx: &Context) -> Result<()> {
    for command in all() {
        ctx.http.create_global_command(&command).await?;
    }

    Ok(())
}

/// Registra comandos para una guild específica (desarrollo)
pub async fn register_guild_commands(ctx: &Context, guild_id: GuildId) -> Result<()> {
    guild_id.set_commands(&ctx.http, all()).await?;

    Ok(())
}

// Comandos de reproducción

fn play_command() -> CreateCommand {
    CreateCommand::new("play")
        .description("Reproduce una URL o el primer resultado de una búsqueda")
        .add_option(
            CreateCommandOption::new(
                CommandOptionType::String,
                "query",
                "URL o término de búsqueda",
            )
            .required(true),
        )
        .add_option(tempo_option())
        .add_option(volume_option())
}

fn file_command() -> CreateCommand {
    CreateCommand::new("file")
        .description("Reproduce un archivo de audio")
        .add_option(
            CreateCommandOption::new(CommandOptionType::Attachment, "file", "Archivo de audio")
                .required(true),
        )
        .add_option(tempo_option())
        .add_option(volume_option())
}

fn midi_command() -> CreateCommand {
    CreateCommand::new("midi")
        .description("Sintetiza y reproduce un archivo MIDI")
        .add_option(
            CreateCommandOption::new(CommandOptionType::Attachment, "midi", "Archivo MIDI")
                .required(true),
        )
        .add_option(
            CreateCommandOption::new(
                CommandOptionType::Attachment,
                "sf2",
                "SoundFont para la síntesis",
            )
            .required(false),
        )
}

fn tempo_option() -> CreateCommandOption {
    CreateCommandOption::new(
        CommandOptionType::Number,
        "tempo",
        "Multiplicador de velocidad (entre 0.5 y 2.0)",
    )
    .required(false)
}

fn volume_option() -> CreateCommandOption {
    CreateCommandOption::new(
        CommandOptionType::Number,
        "volume",
        "Volumen (0.0 - 2.0)",
    )
    .min_number_value(0.0)
    .max_number_value(2.0)
    .required(false)
}

// Comandos de control

fn skip_command() -> CreateCommand {
    CreateCommand::new("skip").description("Salta el request actual")
}

fn pause_command() -> CreateCommand {
    CreateCommand::new("pause").description("Pausa la reproducción")
}

fn resume_command() -> CreateCommand {
    CreateCommand::new("resume").description("Reanuda la reproducción")
}

fn stop_command() -> CreateCommand {
    CreateCommand::new("stop").description("Detiene la reproducción y vacía la cola")
}

fn leave_command() -> CreateCommand {
    CreateCommand::new("leave").description("Desconecta el bot del canal de voz")
}

// Comandos de información

fn queue_command() -> CreateCommand {
    CreateCommand::new("queue").description("Muestra los próximos requests")
}

fn nowplaying_command() -> CreateCommand {
    CreateCommand::new("nowplaying").description("Muestra el request actual")
}

fn timeout_command() -> CreateCommand {
    CreateCommand::new("timeout")
        .description("Cambia el timeout de inactividad")
        .add_option(
            CreateCommandOption::new(
                CommandOptionType::String,
                "duration",
                "Duración (ej. 90s, 5m) o \"none\"",
            )
            .required(true),
        )
}
