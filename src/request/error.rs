use thiserror::Error;

/// Errores al preparar o materializar un request.
#[derive(Debug, Error)]
pub enum RequestError {
    #[error("Error durante la descarga.\nDetalles: {0}")]
    Resolve(String),

    #[error("Sin resultados para {0}")]
    NoResults(String),

    #[error("No se encontró audio reproducible para {0}")]
    NoPlayableUrl(String),

    #[error("No se pudo descargar {url}: {source}")]
    Download {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("No se pudieron leer los tags: {0}")]
    Tags(String),

    #[error("Falló la síntesis: {0}")]
    Synthesis(String),

    #[error("Falló la fuente de audio: {0}")]
    Source(String),
}
