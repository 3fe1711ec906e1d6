use anyhow::Result;
use std::{path::PathBuf, time::Duration};

use crate::{audio::PlayerConfig, request::AudioOptions};

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    // Discord
    pub discord_token: String,
    pub guild_id: Option<u64>, // Para comandos de desarrollo

    // Reproductor
    pub idle_timeout: Option<Duration>,
    pub ffmpeg_before_options: Vec<String>,
    pub ffmpeg_options: Vec<String>,
    pub connection_tone: Option<PathBuf>,

    // Programas externos
    pub ffmpeg_path: PathBuf,
    pub ytdlp_path: PathBuf,
    pub fluidsynth_path: PathBuf,

    // SoundFonts
    pub soundfont_dir: PathBuf,
    pub default_soundfont: PathBuf,
}

impl Config {
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();

        let config = Self {
            // Discord
            discord_token: std::env::var("DISCORD_TOKEN")?,
            guild_id: std::env::var("GUILD_ID").ok().and_then(|s| s.parse().ok()),

            // Reproductor
            idle_timeout: parse_timeout(
                &std::env::var("IDLE_TIMEOUT").unwrap_or_else(|_| "5m".to_string()),
            )?,
            ffmpeg_before_options: split_options(
                &std::env::var("FFMPEG_BEFORE_OPTIONS").unwrap_or_else(|_| {
                    "-reconnect 1 -reconnect_streamed 1 -reconnect_delay_max 5".to_string()
                }),
            ),
            ffmpeg_options: split_options(
                &std::env::var("FFMPEG_OPTIONS").unwrap_or_else(|_| "-vn".to_string()),
            ),
            connection_tone: std::env::var("CONNECTION_TONE")
                .ok()
                .filter(|path| !path.trim().is_empty())
                .map(PathBuf::from),

            // Programas externos
            ffmpeg_path: std::env::var("FFMPEG_PATH")
                .unwrap_or_else(|_| "ffmpeg".to_string())
                .into(),
            ytdlp_path: std::env::var("YTDLP_PATH")
                .unwrap_or_else(|_| "yt-dlp".to_string())
                .into(),
            fluidsynth_path: std::env::var("FLUIDSYNTH_PATH")
                .unwrap_or_else(|_| "fluidsynth".to_string())
                .into(),

            // SoundFonts
            soundfont_dir: std::env::var("SOUNDFONT_DIR")
                .unwrap_or_else(|_| "./sf2".to_string())
                .into(),
            default_soundfont: std::env::var("DEFAULT_SOUNDFONT")
                .unwrap_or_else(|_| "/usr/share/sounds/sf2/FluidR3_GM.sf2".to_string())
                .into(),
        };

        // Create directories if they don't exist
        std::fs::create_dir_all(&config.soundfont_dir)?;

        config.validate()?;

        Ok(config)
    }

    /// Validates configuration values for correctness.
    ///
    /// # Validation Rules
    ///
    /// - The Discord token must be present
    /// - A configured idle timeout must be greater than zero
    /// - External program paths must not be empty
    pub fn validate(&self) -> Result<()> {
        if self.discord_token.trim().is_empty() {
            anyhow::bail!("DISCORD_TOKEN must not be empty");
        }

        if self.idle_timeout.is_some_and(|timeout| timeout.is_zero()) {
            anyhow::bail!("Idle timeout must be greater than 0 (use \"none\" to disable it)");
        }

        for (name, path) in [
            ("FFMPEG_PATH", &self.ffmpeg_path),
            ("YTDLP_PATH", &self.ytdlp_path),
            ("FLUIDSYNTH_PATH", &self.fluidsynth_path),
        ] {
            if path.as_os_str().is_empty() {
                anyhow::bail!("{} must not be empty", name);
            }
        }

        Ok(())
    }

    /// Returns a summary of the current configuration for logging.
    ///
    /// The token is never included.
    pub fn summary(&self) -> String {
        format!(
            "Config Summary:\n  \
            Discord: Guild {}\n  \
            Player: idle timeout {}, tone {}\n  \
            ffmpeg: {} [{}] / [{}]\n  \
            Tools: yt-dlp={}, fluidsynth={}\n  \
            SoundFonts: {} (default {})",
            self.guild_id.map_or("global".to_string(), |id| id.to_string()),
            self.idle_timeout
                .map_or("none".to_string(), |t| humantime::format_duration(t).to_string()),
            self.connection_tone
                .as_ref()
                .map_or("none".to_string(), |path| path.display().to_string()),
            self.ffmpeg_path.display(),
            self.ffmpeg_before_options.join(" "),
            self.ffmpeg_options.join(" "),
            self.ytdlp_path.display(),
            self.fluidsynth_path.display(),
            self.soundfont_dir.display(),
            self.default_soundfont.display(),
        )
    }

    /// Configuración inicial del reproductor.
    pub fn player(&self) -> PlayerConfig {
        PlayerConfig {
            idle_timeout: self.idle_timeout,
            options: AudioOptions::new(
                self.ffmpeg_before_options.clone(),
                self.ffmpeg_options.clone(),
            ),
        }
    }
}

/// Interpreta un timeout estilo humantime (`90s`, `5m`). Empty or `none`
/// disables it.
pub fn parse_timeout(value: &str) -> Result<Option<Duration>> {
    let value = value.trim();
    if value.is_empty() || value.eq_ignore_ascii_case("none") || value.eq_ignore_ascii_case("off") {
        return Ok(None);
    }

    // Zero disables the timeout instead of disconnecting immediately
    let duration = humantime::parse_duration(value)?;
    Ok((!duration.is_zero()).then_some(duration))
}

fn split_options(value: &str) -> Vec<String> {
    value.split_whitespace().map(str::to_string).collect()
}

/// Default configuration values.
///
/// Used as fallbacks when environment variables are not provided.
impl Default for Config {
    fn default() -> Self {
        Self {
            // Discord (no defaults - must be provided)
            discord_token: String::new(),
            guild_id: None,

            idle_timeout: Some(Duration::from_secs(5 * 60)),
            ffmpeg_before_options: split_options(
                "-reconnect 1 -reconnect_streamed 1 -reconnect_delay_max 5",
            ),
            ffmpeg_options: vec!["-vn".to_string()],
            connection_tone: None,

            ffmpeg_path: "ffmpeg".into(),
            ytdlp_path: "yt-dlp".into(),
            fluidsynth_path: "fluidsynth".into(),

            soundfont_dir: "./sf2".into(),
            default_soundfont: "/usr/share/sounds/sf2/FluidR3_GM.sf2".into(),
        }
    }
}
