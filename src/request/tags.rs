//! Lectura de tags (título, artista, carátula) de archivos de audio.

use std::io::Cursor;
use symphonia::core::{
    formats::FormatOptions,
    io::MediaSourceStream,
    meta::{MetadataOptions, MetadataRevision, StandardTagKey, StandardVisualKey},
    probe::Hint,
};
use tracing::debug;

use super::RequestError;

/// Tags encontrados en un archivo.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TagData {
    pub title: Option<String>,
    pub artist: Option<String>,
    /// Raw embedded picture, front cover preferred.
    pub cover: Option<Vec<u8>>,
}

impl TagData {
    fn absorb(&mut self, revision: &MetadataRevision) {
        if self.title.is_none() {
            self.title = joined(revision, StandardTagKey::TrackTitle);
        }
        if self.artist.is_none() {
            self.artist = joined(revision, StandardTagKey::Artist);
        }
        if self.cover.is_none() {
            let visuals = revision.visuals();
            self.cover = visuals
                .iter()
                .find(|visual| visual.usage == Some(StandardVisualKey::FrontCover))
                .or_else(|| visuals.first())
                .map(|visual| visual.data.to_vec());
        }
    }
}

/// Parses container tags (ID3, Vorbis comments, FLAC, MP4).
///
/// Fails when the container can't be identified at all; a recognised file
/// without tags yields an empty [`TagData`].
pub fn parse(bytes: Vec<u8>, extension: Option<&str>) -> Result<TagData, RequestError> {
    let stream = MediaSourceStream::new(Box::new(Cursor::new(bytes)), Default::default());

    let mut hint = Hint::new();
    if let Some(extension) = extension {
        hint.with_extension(extension);
    }

    let mut probed = symphonia::default::get_probe()
        .format(
            &hint,
            stream,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .map_err(|e| RequestError::Tags(e.to_string()))?;

    let mut tags = TagData::default();

    // Tags ahead of the container (ID3v2 on MP3) come first
    if let Some(metadata) = probed.metadata.get() {
        if let Some(revision) = metadata.current() {
            tags.absorb(revision);
        }
    }

    let metadata = probed.format.metadata();
    if let Some(revision) = metadata.current() {
        tags.absorb(revision);
    }

    debug!(
        "🏷️ Tags: título={:?} artista={:?} carátula={}",
        tags.title,
        tags.artist,
        tags.cover.is_some()
    );
    Ok(tags)
}

fn joined(revision: &MetadataRevision, key: StandardTagKey) -> Option<String> {
    let values: Vec<String> = revision
        .tags()
        .iter()
        .filter(|tag| tag.std_key == Some(key))
        .map(|tag| tag.value.to_string())
        .filter(|value| !value.trim().is_empty())
        .collect();

    if values.is_empty() {
        None
    } else {
        Some(values.join(", "))
    }
}
