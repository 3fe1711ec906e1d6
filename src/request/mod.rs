//! Requests reproducibles: metadatos + fuente de audio perezosa.
//!
//! Every request exposes its [`Metadata`] and a `process()` that builds a
//! fresh, once-consumable audio source each time it is called. The three
//! production variants (uploaded file, resolved stream, synthesized MIDI)
//! are grouped in [`PlayRequest`]; [`RequestKit`] builds them with the shared
//! HTTP client, decoder and external programs.

pub mod error;
pub mod file;
pub mod metadata;
pub mod source;
pub mod stream;
pub mod synth;
pub mod tags;
pub mod thumbnail;
pub mod ytdlp;

pub use error::RequestError;
pub use file::FileRequest;
pub use metadata::Metadata;
pub use source::{AudioOptions, SourceFactory};
pub use stream::StreamRequest;
pub use synth::{FluidSynth, SynthRequest, Synthesizer};
pub use ytdlp::YtDlp;

use async_trait::async_trait;
use serenity::model::{channel::Attachment, id::UserId};
use songbird::input::Input;
use std::{
    path::PathBuf,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
};

/// Unidad de reproducción.
#[async_trait]
pub trait Request: Send + Sync {
    /// What the transport plays.
    type Source: Send + 'static;

    fn metadata(&self) -> Metadata;

    /// Builds a new source. Called once per playback attempt; may be slow.
    async fn process(&self) -> Result<Self::Source, RequestError>;
}

/// Request compartido entre la cola y el loop.
pub type SharedRequest<S> = Arc<dyn Request<Source = S>>;

/// Variantes de producción.
pub enum PlayRequest {
    File(FileRequest),
    Stream(StreamRequest),
    Synth(SynthRequest),
}

impl PlayRequest {
    /// Enriquece los metadatos antes de encolar.
    ///
    /// Files parse their tags (never fails), streams resolve through yt-dlp
    /// and surface resolve errors, synth requests have nothing to do.
    pub async fn prepare(&self) -> Result<(), RequestError> {
        match self {
            PlayRequest::File(request) => {
                request.parse().await;
                Ok(())
            }
            PlayRequest::Stream(request) => request.resolve().await.map(|_| ()),
            PlayRequest::Synth(_) => Ok(()),
        }
    }
}

#[async_trait]
impl Request for PlayRequest {
    type Source = Input;

    fn metadata(&self) -> Metadata {
        match self {
            PlayRequest::File(request) => request.metadata(),
            PlayRequest::Stream(request) => request.metadata(),
            PlayRequest::Synth(request) => request.metadata(),
        }
    }

    async fn process(&self) -> Result<Input, RequestError> {
        match self {
            PlayRequest::File(request) => request.process().await,
            PlayRequest::Stream(request) => request.process().await,
            PlayRequest::Synth(request) => request.process().await,
        }
    }
}

/// Archivo subido por un usuario.
#[derive(Debug, Clone, PartialEq)]
pub enum Upload {
    Remote { filename: String, url: String },
    Local { path: PathBuf },
}

impl Upload {
    pub fn filename(&self) -> String {
        match self {
            Upload::Remote { filename, .. } => filename.clone(),
            Upload::Local { path } => path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_else(|| path.display().to_string()),
        }
    }

    /// Enlace público, si existe.
    pub fn link(&self) -> Option<String> {
        match self {
            Upload::Remote { url, .. } => Some(url.clone()),
            Upload::Local { .. } => None,
        }
    }

    /// Extensión del archivo en minúsculas
    pub fn extension(&self) -> Option<String> {
        let name = self.filename();
        std::path::Path::new(&name)
            .extension()
            .map(|ext| ext.to_string_lossy().to_lowercase())
    }

    pub async fn read(&self, http: &reqwest::Client) -> Result<Vec<u8>, RequestError> {
        match self {
            Upload::Remote { url, .. } => {
                let download = |source| RequestError::Download {
                    url: url.clone(),
                    source,
                };

                let response = http
                    .get(url)
                    .send()
                    .await
                    .and_then(|response| response.error_for_status())
                    .map_err(download)?;

                let bytes = response.bytes().await.map_err(download)?;
                Ok(bytes.to_vec())
            }
            Upload::Local { path } => Ok(tokio::fs::read(path).await?),
        }
    }
}

impl From<&Attachment> for Upload {
    fn from(attachment: &Attachment) -> Self {
        Upload::Remote {
            filename: attachment.filename.clone(),
            url: attachment.url.clone(),
        }
    }
}

/// Fábrica de requests de producción.
pub struct RequestKit {
    pub http: reqwest::Client,
    pub factory: SourceFactory,
    pub resolver: YtDlp,
    pub synthesizer: Arc<dyn Synthesizer>,
    pub soundfont_dir: PathBuf,
    pub default_soundfont: PathBuf,
    next_id: AtomicU64,
}

impl RequestKit {
    pub fn new(
        http: reqwest::Client,
        factory: SourceFactory,
        resolver: YtDlp,
        synthesizer: Arc<dyn Synthesizer>,
        soundfont_dir: PathBuf,
        default_soundfont: PathBuf,
    ) -> Self {
        Self {
            http,
            factory,
            resolver,
            synthesizer,
            soundfont_dir,
            default_soundfont,
            next_id: AtomicU64::new(1),
        }
    }

    fn metadata(&self, user: Option<UserId>) -> Metadata {
        Metadata::new(self.next_id.fetch_add(1, Ordering::Relaxed)).with_user(user)
    }

    pub fn stream(
        &self,
        query: &str,
        user: Option<UserId>,
        options: AudioOptions,
    ) -> PlayRequest {
        PlayRequest::Stream(StreamRequest::new(
            self.metadata(user),
            query,
            self.resolver.clone(),
            self.http.clone(),
            self.factory.clone(),
            options,
        ))
    }

    pub fn file(&self, upload: Upload, user: Option<UserId>, options: AudioOptions) -> PlayRequest {
        PlayRequest::File(FileRequest::new(
            self.metadata(user),
            upload,
            self.http.clone(),
            self.factory.clone(),
            options,
        ))
    }

    pub fn synth(
        &self,
        midi: Upload,
        soundfont: Option<Upload>,
        user: Option<UserId>,
    ) -> PlayRequest {
        PlayRequest::Synth(SynthRequest::new(
            self.metadata(user),
            midi,
            soundfont,
            self.http.clone(),
            self.synthesizer.clone(),
            self.soundfont_dir.clone(),
            self.default_soundfont.clone(),
        ))
    }
}
