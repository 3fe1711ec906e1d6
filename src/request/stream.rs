use async_trait::async_trait;
use parking_lot::RwLock;
use songbird::input::Input;
use std::time::{Duration, Instant};
use tracing::{debug, info};

use super::{
    thumbnail, ytdlp::ResolvedTrack, AudioOptions, Metadata, Request, RequestError,
    SourceFactory, YtDlp,
};

/// Tiempo durante el cual una URL resuelta se considera válida
pub const RESOLVE_TTL: Duration = Duration::from_secs(5 * 60);

#[derive(Debug, Clone)]
struct Resolution {
    url: Option<String>,
    at: Instant,
}

impl Resolution {
    fn is_fresh(&self) -> bool {
        self.at.elapsed() < RESOLVE_TTL
    }
}

/// Resultado de búsqueda o URL resuelta con yt-dlp.
pub struct StreamRequest {
    query: String,
    resolver: YtDlp,
    http: reqwest::Client,
    factory: SourceFactory,
    options: AudioOptions,
    metadata: RwLock<Metadata>,
    resolution: RwLock<Option<Resolution>>,
}

impl StreamRequest {
    pub fn new(
        metadata: Metadata,
        query: &str,
        resolver: YtDlp,
        http: reqwest::Client,
        factory: SourceFactory,
        options: AudioOptions,
    ) -> Self {
        Self {
            query: query.trim().to_string(),
            resolver,
            http,
            factory,
            options,
            metadata: RwLock::new(metadata),
            resolution: RwLock::new(None),
        }
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    /// Resuelve la consulta y actualiza los metadatos.
    pub async fn resolve(&self) -> Result<Metadata, RequestError> {
        let track = self.resolver.resolve(&self.query).await?;
        let cover = match track.thumbnail.as_deref() {
            Some(url) => thumbnail::fetch(&self.http, url).await,
            None => None,
        };

        self.apply(&track, cover);
        Ok(self.metadata())
    }

    fn apply(&self, track: &ResolvedTrack, cover: Option<Vec<u8>>) {
        {
            let mut metadata = self.metadata.write();
            if let Some(title) = &track.title {
                metadata.title = Some(title.clone());
            }
            metadata.artist = track.artist().map(str::to_string);
            metadata.hyperlink = track.webpage_url.clone();
            if cover.is_some() {
                metadata.thumbnail = cover;
            }
        }

        *self.resolution.write() = Some(Resolution {
            url: track.url.clone(),
            at: Instant::now(),
        });
    }

    /// URL reutilizable de una resolución reciente.
    fn fresh_url(&self) -> Option<Option<String>> {
        self.resolution
            .read()
            .as_ref()
            .filter(|resolution| resolution.is_fresh())
            .map(|resolution| resolution.url.clone())
    }
}

#[async_trait]
impl Request for StreamRequest {
    type Source = Input;

    fn metadata(&self) -> Metadata {
        self.metadata.read().clone()
    }

    async fn process(&self) -> Result<Input, RequestError> {
        let url = match self.fresh_url() {
            Some(url) => {
                debug!("Reutilizando resolución de {:?}", self.query);
                url
            }
            None => {
                info!("🔄 Resolución vencida o ausente para {:?}", self.query);
                self.resolve().await?;
                self.fresh_url().flatten()
            }
        };

        let url = url.ok_or_else(|| {
            RequestError::NoPlayableUrl(
                self.metadata
                    .read()
                    .title
                    .clone()
                    .unwrap_or_else(|| self.query.clone()),
            )
        })?;

        self.factory.from_url(&url, &self.options)
    }
}
