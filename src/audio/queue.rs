use parking_lot::Mutex;
use std::collections::VecDeque;
use tokio::sync::Notify;
use tracing::debug;

/// Cola FIFO de un solo consumidor con un slot `current`.
///
/// Cualquier cantidad de llamadores puede hacer `put` en paralelo; un solo
/// consumidor (el loop) llama [`Queue::get`]. Un item nunca está a la vez en
/// la cola y en `current`.
#[derive(Debug)]
pub struct Queue<T> {
    inner: Mutex<Inner<T>>,
    available: Notify,
}

#[derive(Debug)]
struct Inner<T> {
    pending: VecDeque<T>,
    current: Option<T>,
}

impl<T: Clone> Queue<T> {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                pending: VecDeque::new(),
                current: None,
            }),
            available: Notify::new(),
        }
    }

    /// Agrega un item al final de la cola
    pub fn put(&self, item: T) {
        self.inner.lock().pending.push_back(item);
        self.available.notify_one();
    }

    /// Espera el siguiente item (FIFO) y lo marca como `current`.
    ///
    /// `current` se limpia antes de suspender. El future es cancel-safe: la
    /// cabeza se saca y se asigna a `current` bajo un mismo lock, sin `.await`
    /// entre medio, así que cancelarlo (p. ej. por timeout) no pierde items.
    pub async fn get(&self) -> T {
        self.inner.lock().current = None;

        loop {
            if let Some(item) = self.advance() {
                return item;
            }

            // notify_one keeps a permit when nobody waits, so a put between
            // advance() and this await still wakes us.
            self.available.notified().await;
        }
    }

    /// Elimina todos los items pendientes. `current` no se modifica.
    pub fn clear(&self) {
        let removed = {
            let mut inner = self.inner.lock();
            let removed = inner.pending.len();
            inner.pending.clear();
            removed
        };
        debug!("🗑️ Cola limpiada ({} pendientes eliminados)", removed);
    }

    /// Item actual, si existe
    pub fn current(&self) -> Option<T> {
        self.inner.lock().current.clone()
    }

    /// Limpia `current` cuando el consumidor terminó con él.
    pub fn take_current(&self) -> Option<T> {
        self.inner.lock().current.take()
    }

    /// Primeros `limit` items pendientes, en orden
    pub fn pending(&self, limit: usize) -> Vec<T> {
        self.inner
            .lock()
            .pending
            .iter()
            .take(limit)
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().pending.is_empty()
    }

    /// Devuelve un item ya sacado a la cabeza de la cola.
    pub(crate) fn restore(&self, item: T) {
        {
            let mut inner = self.inner.lock();
            inner.current = None;
            inner.pending.push_front(item);
        }
        self.available.notify_one();
    }

    fn advance(&self) -> Option<T> {
        let mut inner = self.inner.lock();
        let item = inner.pending.pop_front()?;
        inner.current = Some(item.clone());
        Some(item)
    }
}

impl<T: Clone> Default for Queue<T> {
    fn default() -> Self {
        Self::new()
    }
}
