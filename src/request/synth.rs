//! Síntesis de MIDI a PCM.

use async_process::{Command, Stdio};
use async_trait::async_trait;
use parking_lot::RwLock;
use songbird::input::Input;
use std::{
    path::{Path, PathBuf},
    sync::Arc,
};
use tracing::{debug, info};

use super::{Metadata, Request, RequestError, SourceFactory, Upload};

/// Frecuencia de muestreo de la síntesis
pub const SYNTH_SAMPLE_RATE: u32 = 44_100;
pub const SYNTH_CHANNELS: u32 = 2;

/// Renders a MIDI file with a SoundFont into interleaved stereo f32 samples.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Synthesizer: Send + Sync {
    async fn render(
        &self,
        midi: &Path,
        soundfont: &Path,
        sample_rate: u32,
    ) -> Result<Vec<f32>, RequestError>;
}

/// Sintetizador externo `fluidsynth`.
#[derive(Debug, Clone)]
pub struct FluidSynth {
    program: PathBuf,
}

impl FluidSynth {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

#[async_trait]
impl Synthesizer for FluidSynth {
    async fn render(
        &self,
        midi: &Path,
        soundfont: &Path,
        sample_rate: u32,
    ) -> Result<Vec<f32>, RequestError> {
        let output = tempfile::Builder::new().suffix(".raw").tempfile()?;

        let result = Command::new(&self.program)
            .args(["-ni", "-q", "-T", "raw", "-O", "float", "-E", "little", "-r"])
            .arg(sample_rate.to_string())
            .arg("-F")
            .arg(output.path())
            .arg(soundfont)
            .arg(midi)
            .stdin(Stdio::null())
            .output()
            .await?;

        if !result.status.success() {
            let stderr = String::from_utf8_lossy(&result.stderr);
            return Err(RequestError::Synthesis(stderr.trim().to_string()));
        }

        let raw = tokio::fs::read(output.path()).await?;
        let samples: Vec<f32> = raw
            .chunks_exact(4)
            .map(|bytes| f32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
            .collect();

        debug!("🎹 fluidsynth generó {} muestras", samples.len());
        Ok(samples)
    }
}

/// Escala la forma de onda para que su pico sea 1.0.
///
/// A silent render is left as is.
pub fn normalize(samples: &mut [f32]) {
    let peak = samples
        .iter()
        .fold(0.0f32, |peak, sample| peak.max(sample.abs()));

    if peak > 0.0 && peak.is_finite() {
        for sample in samples.iter_mut() {
            *sample /= peak;
        }
    }
}

/// MIDI subido por el usuario, con SoundFont opcional.
pub struct SynthRequest {
    midi: Upload,
    soundfont: Option<Upload>,
    http: reqwest::Client,
    synthesizer: Arc<dyn Synthesizer>,
    soundfont_dir: PathBuf,
    default_soundfont: PathBuf,
    metadata: RwLock<Metadata>,
}

impl SynthRequest {
    pub fn new(
        metadata: Metadata,
        midi: Upload,
        soundfont: Option<Upload>,
        http: reqwest::Client,
        synthesizer: Arc<dyn Synthesizer>,
        soundfont_dir: PathBuf,
        default_soundfont: PathBuf,
    ) -> Self {
        let mut metadata = metadata.with_title(midi.filename());
        metadata.hyperlink = midi.link();

        Self {
            midi,
            soundfont,
            http,
            synthesizer,
            soundfont_dir,
            default_soundfont,
            metadata: RwLock::new(metadata),
        }
    }

    /// Guarda el SoundFont del usuario, o devuelve el predeterminado.
    async fn soundfont_path(&self) -> Result<PathBuf, RequestError> {
        let Some(upload) = &self.soundfont else {
            return Ok(self.default_soundfont.clone());
        };

        let filename = upload.filename();
        let name = Path::new(&filename)
            .file_name()
            .ok_or_else(|| RequestError::Synthesis(format!("invalid SoundFont name {:?}", filename)))?;

        let path = self.soundfont_dir.join(name);
        let bytes = upload.read(&self.http).await?;
        tokio::fs::create_dir_all(&self.soundfont_dir).await?;
        tokio::fs::write(&path, bytes).await?;

        info!("💾 SoundFont guardado en {}", path.display());
        Ok(path)
    }
}

#[async_trait]
impl Request for SynthRequest {
    type Source = Input;

    fn metadata(&self) -> Metadata {
        self.metadata.read().clone()
    }

    async fn process(&self) -> Result<Input, RequestError> {
        let soundfont = self.soundfont_path().await?;

        let bytes = self.midi.read(&self.http).await?;
        let midi = tempfile::Builder::new().suffix(".mid").tempfile()?;
        tokio::fs::write(midi.path(), &bytes).await?;

        let mut samples = self
            .synthesizer
            .render(midi.path(), &soundfont, SYNTH_SAMPLE_RATE)
            .await?;

        if samples.is_empty() {
            return Err(RequestError::Synthesis(format!(
                "{} produced no audio",
                self.midi.filename()
            )));
        }

        normalize(&mut samples);
        Ok(SourceFactory::from_pcm(
            &samples,
            SYNTH_SAMPLE_RATE,
            SYNTH_CHANNELS,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_normalize_scales_to_unit_peak() {
        let mut samples = vec![0.25, -0.5, 0.1];
        normalize(&mut samples);
        assert_eq!(samples, vec![0.5, -1.0, 0.2]);
    }

    #[test]
    fn test_normalize_leaves_silence() {
        let mut samples = vec![0.0; 8];
        normalize(&mut samples);
        assert_eq!(samples, vec![0.0; 8]);
    }

    fn fixture(dir: &Path, name: &str, bytes: &[u8]) -> Upload {
        let path = dir.join(name);
        std::fs::write(&path, bytes).expect("write fixture");
        Upload::Local { path }
    }

    #[tokio::test]
    async fn test_process_uses_uploaded_soundfont() {
        let uploads = tempfile::tempdir().expect("tempdir");
        let soundfonts = tempfile::tempdir().expect("tempdir");

        let mut synthesizer = MockSynthesizer::new();
        synthesizer
            .expect_render()
            .withf(|midi, soundfont, rate| {
                std::fs::read(midi).is_ok_and(|bytes| bytes == b"MThd")
                    && soundfont.ends_with("piano.sf2")
                    && *rate == 44_100
            })
            .times(1)
            .returning(|_, _, _| Ok(vec![0.1, -0.2, 0.4, 0.0]));

        let request = SynthRequest::new(
            Metadata::new(9),
            fixture(uploads.path(), "song.mid", b"MThd"),
            Some(fixture(uploads.path(), "piano.sf2", b"RIFF")),
            reqwest::Client::new(),
            Arc::new(synthesizer),
            soundfonts.path().to_path_buf(),
            PathBuf::from("/unused/default.sf2"),
        );

        assert_eq!(request.metadata().title.as_deref(), Some("song.mid"));
        assert!(request.process().await.is_ok());

        let saved = std::fs::read(soundfonts.path().join("piano.sf2")).expect("soundfont saved");
        assert_eq!(saved, b"RIFF".to_vec());
    }

    #[tokio::test]
    async fn test_process_falls_back_to_default_soundfont() {
        let uploads = tempfile::tempdir().expect("tempdir");

        let mut synthesizer = MockSynthesizer::new();
        synthesizer
            .expect_render()
            .withf(|_, soundfont, _| soundfont == Path::new("/srv/default.sf2"))
            .times(1)
            .returning(|_, _, _| Ok(vec![0.0; 4]));

        let request = SynthRequest::new(
            Metadata::new(10),
            fixture(uploads.path(), "quiet.mid", b"MThd"),
            None,
            reqwest::Client::new(),
            Arc::new(synthesizer),
            uploads.path().join("soundfonts"),
            PathBuf::from("/srv/default.sf2"),
        );

        assert!(request.process().await.is_ok());
    }

    #[tokio::test]
    async fn test_synthesis_failure_is_propagated() {
        let uploads = tempfile::tempdir().expect("tempdir");

        let mut synthesizer = MockSynthesizer::new();
        synthesizer
            .expect_render()
            .returning(|_, _, _| Err(RequestError::Synthesis("bad midi".to_string())));

        let request = SynthRequest::new(
            Metadata::new(11),
            fixture(uploads.path(), "broken.mid", b"garbage"),
            None,
            reqwest::Client::new(),
            Arc::new(synthesizer),
            uploads.path().to_path_buf(),
            PathBuf::from("/srv/default.sf2"),
        );

        assert!(matches!(
            request.process().await,
            Err(RequestError::Synthesis(message)) if message == "bad midi"
        ));
    }
}
