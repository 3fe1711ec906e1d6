use anyhow::Result;
use serenity::{model::gateway::GatewayIntents, Client};
use songbird::{SerenityInit, Songbird};
use std::sync::Arc;
use tracing::{error, info, warn};

use open_player::{
    audio::{Player, SongbirdConnector},
    bot::OpenPlayerBot,
    config::Config,
    request::{
        FileRequest, FluidSynth, Metadata, PlayRequest, RequestKit, SourceFactory, Upload, YtDlp,
    },
};

#[tokio::main]
async fn main() -> Result<()> {
    // Inicializar logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("open_player=debug".parse()?)
                .add_directive("serenity=info".parse()?)
                .add_directive("songbird=info".parse()?),
        )
        .init();

    info!("🎵 Iniciando Open Player v{}", env!("CARGO_PKG_VERSION"));

    // Cargar configuración
    let config = Config::load()?;
    info!("{}", config.summary());

    // Manejar health check si es necesario
    if std::env::args().any(|arg| arg == "--health-check") {
        return health_check(&config).await;
    }

    let http = reqwest::Client::builder()
        .user_agent(concat!("open-player/", env!("CARGO_PKG_VERSION")))
        .build()?;
    let factory = SourceFactory::new(&config.ffmpeg_path);

    let kit = Arc::new(RequestKit::new(
        http.clone(),
        factory.clone(),
        YtDlp::new(&config.ytdlp_path),
        Arc::new(FluidSynth::new(&config.fluidsynth_path)),
        config.soundfont_dir.clone(),
        config.default_soundfont.clone(),
    ));

    // Reproductor único con su loop
    let songbird = Songbird::serenity();
    let player_config = config.player();
    let mut player = Player::new(SongbirdConnector::new(songbird.clone()), player_config.clone());

    match &config.connection_tone {
        Some(path) if path.exists() => {
            info!("🔔 Tono de conexión: {}", path.display());
            let tone = PlayRequest::File(FileRequest::new(
                Metadata::new(0).with_title("tono de conexión"),
                Upload::Local { path: path.clone() },
                http,
                factory,
                player_config.options.clone(),
            ));
            player = player.with_tone(Arc::new(tone));
        }
        Some(path) => warn!("⚠️ Tono de conexión no encontrado: {}", path.display()),
        None => {}
    }

    let player = Arc::new(player);
    tokio::spawn(player.clone().run());

    // Configurar intents mínimos necesarios
    let intents = GatewayIntents::GUILDS | GatewayIntents::GUILD_VOICE_STATES;

    let handler = OpenPlayerBot::new(config.clone(), player, kit);

    let mut client = Client::builder(&config.discord_token, intents)
        .event_handler(handler)
        .register_songbird_with(songbird)
        .await?;

    // Manejar shutdown graceful
    let shard_manager = client.shard_manager.clone();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Error al registrar Ctrl+C: {:?}", e);
            return;
        }
        info!("⚠️ Señal de shutdown recibida, cerrando...");
        shard_manager.shutdown_all().await;
    });

    // Iniciar bot
    info!("🚀 Bot iniciado exitosamente");
    if let Err(why) = client.start().await {
        error!("Error al ejecutar cliente: {:?}", why);
    }

    Ok(())
}

async fn health_check(config: &Config) -> Result<()> {
    // Verificar dependencias críticas
    let checks = [
        (&config.ytdlp_path, "--version"),
        (&config.ffmpeg_path, "-version"),
        (&config.fluidsynth_path, "--version"),
    ];

    for (program, flag) in checks {
        let output = async_process::Command::new(program)
            .arg(flag)
            .output()
            .await?;

        if !output.status.success() {
            anyhow::bail!("Dependencia con errores: {}", program.display());
        }
    }

    println!("OK");
    Ok(())
}
