use async_trait::async_trait;
use parking_lot::RwLock;
use songbird::input::Input;
use tracing::{debug, warn};

use super::{tags, thumbnail, AudioOptions, Metadata, Request, RequestError, SourceFactory, Upload};

/// Archivo de audio subido por el usuario.
pub struct FileRequest {
    upload: Upload,
    http: reqwest::Client,
    factory: SourceFactory,
    options: AudioOptions,
    metadata: RwLock<Metadata>,
}

impl FileRequest {
    pub fn new(
        metadata: Metadata,
        upload: Upload,
        http: reqwest::Client,
        factory: SourceFactory,
        options: AudioOptions,
    ) -> Self {
        let mut metadata = metadata.with_title(upload.filename());
        metadata.hyperlink = upload.link();

        Self {
            upload,
            http,
            factory,
            options,
            metadata: RwLock::new(metadata),
        }
    }

    /// Lee título, artista y carátula de los tags del archivo.
    ///
    /// Any failure leaves the filename/link metadata untouched.
    pub async fn parse(&self) {
        let bytes = match self.upload.read(&self.http).await {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!("No se pudo leer {}: {}", self.upload.filename(), e);
                return;
            }
        };

        let extension = self.upload.extension();
        let parsed = tokio::task::spawn_blocking(move || {
            let tags = tags::parse(bytes, extension.as_deref())?;
            let cover = tags.cover.as_deref().and_then(thumbnail::normalize);
            Ok::<_, RequestError>((tags, cover))
        })
        .await;

        let (tags, cover) = match parsed {
            Ok(Ok(parsed)) => parsed,
            Ok(Err(e)) => {
                debug!("Sin tags para {}: {}", self.upload.filename(), e);
                return;
            }
            Err(e) => {
                warn!("Tarea de tags abortada: {}", e);
                return;
            }
        };

        let mut metadata = self.metadata.write();
        if let Some(title) = tags.title {
            metadata.title = Some(title);
        }
        if tags.artist.is_some() {
            metadata.artist = tags.artist;
        }
        if cover.is_some() {
            metadata.thumbnail = cover;
        }
    }
}

#[async_trait]
impl Request for FileRequest {
    type Source = Input;

    fn metadata(&self) -> Metadata {
        self.metadata.read().clone()
    }

    async fn process(&self) -> Result<Input, RequestError> {
        let bytes = self.upload.read(&self.http).await?;
        self.factory.from_bytes(bytes, &self.options)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hound::{SampleFormat, WavSpec, WavWriter};
    use pretty_assertions::assert_eq;
    use std::path::PathBuf;

    fn file_request(path: PathBuf) -> FileRequest {
        FileRequest::new(
            Metadata::new(7),
            Upload::Local { path },
            reqwest::Client::new(),
            SourceFactory::new("ffmpeg"),
            AudioOptions::default(),
        )
    }

    #[test]
    fn test_metadata_starts_from_filename() {
        let request = file_request(PathBuf::from("/music/Intro.mp3"));
        let metadata = request.metadata();

        assert_eq!(metadata.id, 7);
        assert_eq!(metadata.title.as_deref(), Some("Intro.mp3"));
        assert_eq!(metadata.hyperlink, None);
    }

    #[tokio::test]
    async fn test_parse_degrades_silently() {
        let dir = tempfile::tempdir().expect("tempdir");

        let garbage = dir.path().join("noise.mp3");
        std::fs::write(&garbage, b"not audio").expect("write fixture");
        let request = file_request(garbage);
        request.parse().await;
        assert_eq!(request.metadata().title.as_deref(), Some("noise.mp3"));

        let missing = file_request(dir.path().join("missing.mp3"));
        missing.parse().await;
        assert_eq!(missing.metadata().title.as_deref(), Some("missing.mp3"));
    }

    #[tokio::test]
    async fn test_parse_untagged_wav_keeps_filename() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("tone.wav");

        let spec = WavSpec {
            channels: 1,
            sample_rate: 8_000,
            bits_per_sample: 16,
            sample_format: SampleFormat::Int,
        };
        let mut writer = WavWriter::create(&path, spec).expect("wav writer");
        for i in 0..800 {
            writer.write_sample((i % 100) as i16).expect("write sample");
        }
        writer.finalize().expect("finalize wav");

        let request = file_request(path);
        request.parse().await;

        let metadata = request.metadata();
        assert_eq!(metadata.title.as_deref(), Some("tone.wav"));
        assert_eq!(metadata.artist, None);
        assert_eq!(metadata.thumbnail, None);
    }
}
