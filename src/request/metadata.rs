use chrono::{DateTime, Utc};
use serenity::model::id::UserId;
use std::fmt;

/// Datos descriptivos de un request.
///
/// Solo `id` es obligatorio; el resto se completa best-effort y puede faltar.
#[derive(Debug, Clone, PartialEq)]
pub struct Metadata {
    pub id: u64,
    pub user_id: Option<UserId>,
    pub title: Option<String>,
    pub artist: Option<String>,
    pub hyperlink: Option<String>,
    /// PNG de 256x256 como máximo.
    pub thumbnail: Option<Vec<u8>>,
    pub requested_at: DateTime<Utc>,
}

impl Metadata {
    pub fn new(id: u64) -> Self {
        Self {
            id,
            user_id: None,
            title: None,
            artist: None,
            hyperlink: None,
            thumbnail: None,
            requested_at: Utc::now(),
        }
    }

    pub fn with_user(mut self, user_id: Option<UserId>) -> Self {
        self.user_id = user_id;
        self
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_artist(mut self, artist: impl Into<String>) -> Self {
        self.artist = Some(artist.into());
        self
    }

    /// Título para mostrar
    pub fn display_title(&self) -> &str {
        self.title.as_deref().unwrap_or("Sin título")
    }
}

impl fmt::Display for Metadata {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(artist) = &self.artist {
            write!(f, "{} - ", artist)?;
        }
        write!(f, "{}", self.display_title())?;
        if let Some(link) = &self.hyperlink {
            write!(f, " <{}>", link)?;
        }
        Ok(())
    }
}
