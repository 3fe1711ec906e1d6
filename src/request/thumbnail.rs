use image::ImageFormat;
use std::io::Cursor;
use tracing::debug;

/// Tamaño máximo de las miniaturas
pub const THUMBNAIL_SIZE: u32 = 256;

/// Decodes any supported image and re-encodes it as PNG, shrunk to fit in
/// [`THUMBNAIL_SIZE`] (aspect ratio kept, never enlarged). `None` when the
/// bytes are not a readable image.
pub fn normalize(bytes: &[u8]) -> Option<Vec<u8>> {
    let image = match image::load_from_memory(bytes) {
        Ok(image) => image,
        Err(e) => {
            debug!("Miniatura ilegible: {}", e);
            return None;
        }
    };

    let image = if image.width() > THUMBNAIL_SIZE || image.height() > THUMBNAIL_SIZE {
        image.thumbnail(THUMBNAIL_SIZE, THUMBNAIL_SIZE)
    } else {
        image
    };

    let mut buffer = Cursor::new(Vec::new());
    image.write_to(&mut buffer, ImageFormat::Png).ok()?;
    Some(buffer.into_inner())
}

/// Descarga una miniatura remota (best-effort).
pub async fn fetch(http: &reqwest::Client, url: &str) -> Option<Vec<u8>> {
    let response = http
        .get(url)
        .send()
        .await
        .and_then(|response| response.error_for_status());

    let bytes = match response {
        Ok(response) => response.bytes().await.ok()?,
        Err(e) => {
            debug!("No se pudo descargar la miniatura {}: {}", url, e);
            return None;
        }
    };

    normalize(&bytes)
}
