use songbird::input::{ChildContainer, Input, RawAdapter};
use std::{
    io::{Cursor, Write},
    path::PathBuf,
    process::{Command, Stdio},
};
use symphonia::core::io::ReadOnlySource;
use tracing::{debug, warn};

use super::RequestError;

/// Formato de salida del decodificador (lo que espera el driver de songbird)
pub const OUTPUT_SAMPLE_RATE: u32 = 48_000;
pub const OUTPUT_CHANNELS: u32 = 2;

/// Opciones del decodificador.
///
/// `before` goes ahead of the input (e.g. reconnect flags for HTTP streams),
/// `after` follows it, and `filters` are merged into a single `-filter:a`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AudioOptions {
    pub before: Vec<String>,
    pub after: Vec<String>,
    pub filters: Vec<String>,
}

impl AudioOptions {
    pub fn new(before: Vec<String>, after: Vec<String>) -> Self {
        Self {
            before,
            after,
            filters: Vec::new(),
        }
    }

    /// Cambia la velocidad de reproducción.
    ///
    /// Only multipliers strictly between 0.5 and 2.0 are applied; anything
    /// else is ignored.
    pub fn with_tempo(mut self, multiplier: f64) -> Self {
        if multiplier > 0.5 && multiplier < 2.0 {
            self.filters.push(format!("atempo={}", multiplier));
        } else {
            debug!("Multiplicador de velocidad fuera de rango: {}", multiplier);
        }
        self
    }

    /// Ajusta el volumen (0.0 - 2.0)
    pub fn with_volume(mut self, volume: f32) -> Self {
        self.filters
            .push(format!("volume={}", volume.clamp(0.0, 2.0)));
        self
    }

    /// Argumentos completos para ffmpeg leyendo de `input`.
    pub fn arguments(&self, input: &str) -> Vec<String> {
        let mut args: Vec<String> = ["-hide_banner", "-loglevel", "error"]
            .iter()
            .map(|arg| arg.to_string())
            .collect();

        args.extend(self.before.iter().cloned());
        args.push("-i".to_string());
        args.push(input.to_string());
        args.extend(self.after.iter().cloned());

        if !self.filters.is_empty() {
            args.push("-filter:a".to_string());
            args.push(self.filters.join(","));
        }

        args.extend(
            [
                "-f".to_string(),
                "f32le".to_string(),
                "-ac".to_string(),
                OUTPUT_CHANNELS.to_string(),
                "-ar".to_string(),
                OUTPUT_SAMPLE_RATE.to_string(),
                "pipe:1".to_string(),
            ]
            .into_iter(),
        );
        args
    }
}

/// Crea fuentes de audio consumibles una sola vez.
#[derive(Debug, Clone)]
pub struct SourceFactory {
    ffmpeg: PathBuf,
}

impl SourceFactory {
    pub fn new(ffmpeg: impl Into<PathBuf>) -> Self {
        Self {
            ffmpeg: ffmpeg.into(),
        }
    }

    /// Decodifica una URL (stream HTTP o archivo).
    pub fn from_url(&self, url: &str, options: &AudioOptions) -> Result<Input, RequestError> {
        let args = options.arguments(url);
        debug!("🎛️ ffmpeg {}", args.join(" "));

        let child = Command::new(&self.ffmpeg)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()?;

        Ok(pcm_input(ChildContainer::from(child)))
    }

    /// Decodifica bytes en memoria, entregados a ffmpeg por stdin.
    pub fn from_bytes(&self, bytes: Vec<u8>, options: &AudioOptions) -> Result<Input, RequestError> {
        let args = options.arguments("pipe:0");
        debug!("🎛️ ffmpeg {} ({} bytes)", args.join(" "), bytes.len());

        let mut child = Command::new(&self.ffmpeg)
            .args(&args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| RequestError::Source("stdin de ffmpeg no disponible".to_string()))?;

        // ffmpeg only drains stdin as fast as playback drains stdout
        feed(stdin, bytes);

        Ok(pcm_input(ChildContainer::from(child)))
    }

    /// Fuente finita a partir de PCM f32 intercalado.
    pub fn from_pcm(samples: &[f32], sample_rate: u32, channels: u32) -> Input {
        let bytes: Vec<u8> = samples
            .iter()
            .flat_map(|sample| sample.to_le_bytes())
            .collect();

        RawAdapter::new(Cursor::new(bytes), sample_rate, channels).into()
    }
}

/// Escribe `bytes` en el stdin del decodificador desde el pool bloqueante.
fn feed<W>(mut stdin: W, bytes: Vec<u8>) -> tokio::task::JoinHandle<()>
where
    W: Write + Send + 'static,
{
    tokio::task::spawn_blocking(move || {
        if let Err(e) = stdin.write_all(&bytes) {
            if e.kind() != std::io::ErrorKind::BrokenPipe {
                warn!("Error escribiendo a ffmpeg: {}", e);
            }
        }
    })
}

fn pcm_input(child: ChildContainer) -> Input {
    RawAdapter::new(
        ReadOnlySource::new(child),
        OUTPUT_SAMPLE_RATE,
        OUTPUT_CHANNELS,
    )
    .into()
}
