use async_process::{Command, Stdio};
use regex::Regex;
use serde::Deserialize;
use std::{path::PathBuf, sync::LazyLock};
use tracing::{debug, info};
use url::Url;

use super::RequestError;

/// Resultado de yt-dlp (`-J`).
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct ResolvedTrack {
    pub title: Option<String>,
    pub channel: Option<String>,
    pub uploader: Option<String>,
    pub webpage_url: Option<String>,
    pub thumbnail: Option<String>,
    /// Direct media URL; short-lived.
    pub url: Option<String>,
    /// Present when the query was a search or playlist.
    pub entries: Option<Vec<ResolvedTrack>>,
}

impl ResolvedTrack {
    pub fn artist(&self) -> Option<&str> {
        self.channel.as_deref().or(self.uploader.as_deref())
    }
}

/// Resolutor basado en yt-dlp.
#[derive(Debug, Clone)]
pub struct YtDlp {
    program: PathBuf,
}

impl YtDlp {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// URLs are passed as-is; anything else becomes a YouTube search.
    pub fn search_term(query: &str) -> String {
        let query = query.trim();
        match Url::parse(query) {
            Ok(url) if matches!(url.scheme(), "http" | "https") => query.to_string(),
            _ => format!("ytsearch:{}", query),
        }
    }

    pub async fn resolve(&self, query: &str) -> Result<ResolvedTrack, RequestError> {
        let term = Self::search_term(query);
        info!("🔍 Resolviendo: {}", term);

        let output = Command::new(&self.program)
            .args([
                "-J",
                "--no-playlist",
                "--default-search",
                "auto",
                "-f",
                "bestaudio/best",
                "--no-warnings",
                "--",
            ])
            .arg(&term)
            .stdin(Stdio::null())
            .output()
            .await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(RequestError::Resolve(strip_ansi(stderr.trim())));
        }

        let track = parse_info(&output.stdout, query)?;
        debug!("yt-dlp resolvió {:?} -> {:?}", query, track.title);
        Ok(track)
    }
}

/// Interpreta la salida JSON, tomando la primera entrada de una búsqueda.
pub fn parse_info(json: &[u8], query: &str) -> Result<ResolvedTrack, RequestError> {
    let info: ResolvedTrack =
        serde_json::from_slice(json).map_err(|e| RequestError::Resolve(e.to_string()))?;

    match info.entries {
        Some(entries) => entries
            .into_iter()
            .next()
            .ok_or_else(|| RequestError::NoResults(query.to_string())),
        None => Ok(info),
    }
}

static ANSI: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\x1B(?:[@-Z\\-_]|\[[0-?]*[ -/]*[@-~])").expect("literal ANSI pattern")
});

/// Elimina secuencias de escape ANSI (colores de yt-dlp).
pub fn strip_ansi(text: &str) -> String {
    ANSI.replace_all(text, "").into_owned()
}
