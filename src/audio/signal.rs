//! Puente entre el callback de fin de reproducción y el loop.
//!
//! El transporte invoca su callback en un contexto ajeno al loop.
//! [`finish_signal`] crea un par de un solo uso: el [`Completion`] viaja con la
//! fuente hacia el transporte y el [`Finished`] queda en el loop, que espera
//! en él hasta que la reproducción termina.

use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::oneshot;
use tracing::{debug, error};

/// Crea el par completion/finished para una reproducción.
pub fn finish_signal() -> (Completion, Finished) {
    let (tx, rx) = oneshot::channel();
    (Completion { tx }, Finished { rx })
}

/// Mitad escritora; se consume con [`Completion::finish`].
#[derive(Debug)]
pub struct Completion {
    tx: oneshot::Sender<()>,
}

impl Completion {
    /// Marca la reproducción como terminada.
    ///
    /// Un error de reproducción se registra aquí y nunca se propaga.
    pub fn finish(self, error: Option<String>) {
        if let Some(error) = error {
            error!("❌ Error durante la reproducción: {}", error);
        }

        if self.tx.send(()).is_err() {
            debug!("Nadie espera el fin de esta reproducción");
        }
    }
}

/// Mitad lectora, esperada por el loop.
#[derive(Debug)]
pub struct Finished {
    rx: oneshot::Receiver<()>,
}

impl Finished {
    /// Resuelve cuando el completion se dispara o se descarta sin disparar
    /// (p. ej. el transporte se cerró junto con sus callbacks).
    pub async fn wait(self) {
        if self.rx.await.is_err() {
            debug!("Completion descartado sin señal; se considera terminado");
        }
    }
}

/// Slot compartido para callbacks que pueden dispararse más de una vez (fin y
/// error de la misma pista). Solo cuenta el primero.
#[derive(Debug, Clone)]
pub struct CompletionSlot {
    inner: Arc<Mutex<Option<Completion>>>,
}

impl CompletionSlot {
    pub fn new(completion: Completion) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Some(completion))),
        }
    }

    pub fn fire(&self, error: Option<String>) {
        let completion = self.inner.lock().take();
        if let Some(completion) = completion {
            completion.finish(error);
        }
    }
}
