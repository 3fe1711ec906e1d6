use parking_lot::{Mutex, RwLock};
use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::Duration,
};
use tokio::sync::{broadcast, watch};
use tracing::{debug, error, info, warn};

use crate::{
    audio::{
        error::{PlayerError, TransportError},
        queue::Queue,
        signal::finish_signal,
        transport::{Connector, SourceOf, Transport},
    },
    request::{AudioOptions, Metadata, SharedRequest},
};

/// Configuración de una sesión del reproductor.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PlayerConfig {
    /// `None` espera indefinidamente el siguiente request.
    pub idle_timeout: Option<Duration>,
    /// Opciones de la sesión; cada request agrega sus propios filtros.
    pub options: AudioOptions,
}

/// Estado del loop de reproducción
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerState {
    Disconnected,
    AwaitingRequest,
    Playing,
}

/// Notificaciones para la capa de comandos.
#[derive(Debug, Clone, PartialEq)]
pub enum PlayerEvent {
    Started(Metadata),
    Finished(Metadata),
    Failed { metadata: Metadata, reason: String },
    Disconnected,
}

const EVENT_CAPACITY: usize = 32;

/// Reproductor de un único canal de voz.
///
/// Contiene la cola y el estado de conexión, manejados por un único loop en
/// segundo plano ([`Player::run`]). Los comandos pueden llamar cualquier
/// operación pública en paralelo al loop; ningún lock cruza un `.await`.
pub struct Player<C: Connector> {
    connector: C,
    config: RwLock<PlayerConfig>,
    queue: Queue<SharedRequest<SourceOf<C>>>,
    client: Mutex<Option<Arc<C::Transport>>>,
    connection: watch::Sender<bool>,
    state: watch::Sender<PlayerState>,
    events: broadcast::Sender<PlayerEvent>,
    tone: Option<SharedRequest<SourceOf<C>>>,
    greet: AtomicBool,
}

impl<C: Connector> Player<C> {
    pub fn new(connector: C, config: PlayerConfig) -> Self {
        let (connection, _) = watch::channel(false);
        let (state, _) = watch::channel(PlayerState::Disconnected);
        let (events, _) = broadcast::channel(EVENT_CAPACITY);

        Self {
            connector,
            config: RwLock::new(config),
            queue: Queue::new(),
            client: Mutex::new(None),
            connection,
            state,
            events,
            tone: None,
            greet: AtomicBool::new(false),
        }
    }

    /// Request que se reproduce una vez tras cada conexión nueva.
    pub fn with_tone(mut self, tone: SharedRequest<SourceOf<C>>) -> Self {
        self.tone = Some(tone);
        self
    }

    /// Loop de reproducción. No retorna nunca; lanzar una vez por reproductor.
    pub async fn run(self: Arc<Self>) {
        info!("🔁 Loop de reproducción iniciado");

        loop {
            if let Err(e) = self.cycle().await {
                match e {
                    PlayerError::IdleTimeout(_) => info!("⏱️ {}", e),
                    _ => error!("❌ Error en el loop de reproducción: {}", e),
                }
                self.force_disconnect().await;
            }
        }
    }

    async fn cycle(&self) -> Result<(), PlayerError> {
        self.connection_signal(true).await;

        let Some(client) = self.client() else {
            warn!("⚠️ Señal de conexión sin cliente de voz; se descarta");
            self.connection.send_replace(false);
            self.set_state(PlayerState::Disconnected);
            return Ok(());
        };

        if self.greet.swap(false, Ordering::AcqRel) {
            if let Some(tone) = self.tone.clone() {
                debug!("Reproduciendo tono de conexión");
                self.play(&client, tone, false).await;
            }
        }

        self.set_state(PlayerState::AwaitingRequest);
        let idle_timeout = self.config.read().idle_timeout;

        let request = tokio::select! {
            next = self.next_request(idle_timeout) => next?,
            _ = self.connection_signal(false) => {
                debug!("Conexión cerrada mientras se esperaba un request");
                self.set_state(PlayerState::Disconnected);
                return Ok(());
            }
        };

        let Some(client) = self.client() else {
            debug!("Cliente desconectado tras sacar un request; se devuelve a la cola");
            self.queue.restore(request);
            return Ok(());
        };

        self.play(&client, request, true).await;
        self.queue.take_current();

        if !client.is_connected().await && self.is_attached_client(&client) {
            warn!("⚠️ El transporte se desconectó durante la reproducción");
            self.force_disconnect().await;
        }

        Ok(())
    }

    async fn next_request(
        &self,
        idle_timeout: Option<Duration>,
    ) -> Result<SharedRequest<SourceOf<C>>, PlayerError> {
        match idle_timeout {
            Some(after) => tokio::time::timeout(after, self.queue.get())
                .await
                .map_err(|_| PlayerError::IdleTimeout(after)),
            None => Ok(self.queue.get().await),
        }
    }

    /// Procesa y reproduce un request, esperando a que termine.
    async fn play(
        &self,
        client: &C::Transport,
        request: SharedRequest<SourceOf<C>>,
        announce: bool,
    ) {
        let metadata = request.metadata();
        self.set_state(PlayerState::Playing);
        info!("🎵 Reproduciendo: {}", metadata);

        let (completion, finished) = finish_signal();
        let submitted = match request.process().await {
            Ok(source) => client
                .play(source, completion)
                .await
                .map_err(PlayerError::from),
            Err(e) => Err(PlayerError::from(e)),
        };

        if let Err(e) = submitted {
            error!("❌ No se pudo reproducir {}: {}", metadata, e);
            if announce {
                self.emit(PlayerEvent::Failed {
                    metadata,
                    reason: e.to_string(),
                });
            }
            return;
        }

        if announce {
            self.emit(PlayerEvent::Started(metadata.clone()));
        }

        finished.wait().await;
        debug!("Reproducción terminada: {}", metadata);

        if announce {
            self.emit(PlayerEvent::Finished(metadata));
        }
    }

    /// Conecta al canal de voz de quien invoca.
    pub async fn connect(&self, invoker: &C::Invoker) -> Result<(), PlayerError> {
        let location = self
            .connector
            .locate(invoker)
            .await
            .ok_or(PlayerError::InvalidChannel(None))?;

        if !location.is_connectable() {
            return Err(PlayerError::InvalidChannel(Some(location.channel_id)));
        }

        if let Some(client) = self.client() {
            if client.is_connected().await {
                warn!("⚠️ Ya conectado; se mantiene la conexión actual");
                self.connection.send_replace(true);
                return Ok(());
            }
        }

        match self.connector.join(&location).await {
            Ok(transport) => {
                let mut client = self.client.lock();
                self.connection.send_replace(true);
                self.greet.store(true, Ordering::Release);
                *client = Some(Arc::new(transport));
                info!("🔊 Conectado al canal {}", location.channel_id);
                Ok(())
            }
            Err(TransportError::AlreadyConnected) => {
                warn!("⚠️ La plataforma indica que ya hay una conexión activa");
                self.connection.send_replace(true);
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Desconecta del canal de voz.
    ///
    /// El estado local siempre se limpia, aunque el cierre falle o no haya
    /// nada que cerrar.
    pub async fn disconnect(&self, force: bool) -> Result<(), PlayerError> {
        let result = match self.client() {
            None => Err(PlayerError::NotConnected),
            Some(client) => {
                if client.is_connected().await {
                    client.disconnect(force).await.map_err(PlayerError::from)
                } else {
                    if force {
                        if let Err(e) = client.disconnect(true).await {
                            debug!("Limpieza de transporte inactivo: {}", e);
                        }
                    }
                    Err(PlayerError::NotConnected)
                }
            }
        };

        self.clear_connection();
        result
    }

    async fn force_disconnect(&self) {
        if let Err(e) = self.disconnect(true).await {
            debug!("Desconexión forzada: {}", e);
        }
    }

    fn clear_connection(&self) {
        let previous = self.client.lock().take();
        self.connection.send_replace(false);
        self.set_state(PlayerState::Disconnected);

        if previous.is_some() {
            info!("🔌 Desconectado del canal de voz");
            self.emit(PlayerEvent::Disconnected);
        }
    }

    /// Agrega un request a la cola. No requiere conexión.
    pub fn queue(&self, request: SharedRequest<SourceOf<C>>) {
        debug!("➕ En cola: {}", request.metadata());
        self.queue.put(request);
    }

    /// Salta el request actual. Sin conexión no hace nada.
    pub async fn skip(&self) -> Result<(), PlayerError> {
        if let Some(client) = self.client() {
            client.stop().await?;
            info!("⏭️ Request saltado");
        }
        Ok(())
    }

    pub async fn pause(&self) -> Result<(), PlayerError> {
        if let Some(client) = self.client() {
            client.pause().await?;
            info!("⏸️ Reproducción pausada");
        }
        Ok(())
    }

    pub async fn resume(&self) -> Result<(), PlayerError> {
        if let Some(client) = self.client() {
            client.resume().await?;
            info!("▶️ Reproducción reanudada");
        }
        Ok(())
    }

    /// Vacía la cola y detiene el request actual.
    pub async fn stop(&self) -> Result<(), PlayerError> {
        self.queue.clear();
        if let Some(client) = self.client() {
            client.stop().await?;
        }
        info!("⏹️ Reproducción detenida");
        Ok(())
    }

    /// Metadatos del request en reproducción
    pub fn current(&self) -> Option<Metadata> {
        self.queue.current().map(|request| request.metadata())
    }

    /// Metadatos de los primeros `limit` requests en espera
    pub fn pending(&self, limit: usize) -> Vec<Metadata> {
        self.queue
            .pending(limit)
            .iter()
            .map(|request| request.metadata())
            .collect()
    }

    pub fn state(&self) -> PlayerState {
        *self.state.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<PlayerState> {
        self.state.subscribe()
    }

    pub fn events(&self) -> broadcast::Receiver<PlayerEvent> {
        self.events.subscribe()
    }

    /// Indica si hay un transporte asociado.
    pub fn is_attached(&self) -> bool {
        self.client.lock().is_some()
    }

    pub fn options(&self) -> AudioOptions {
        self.config.read().options.clone()
    }

    pub fn idle_timeout(&self) -> Option<Duration> {
        self.config.read().idle_timeout
    }

    /// Aplica desde la próxima espera de un request.
    pub fn set_idle_timeout(&self, idle_timeout: Option<Duration>) {
        self.config.write().idle_timeout = idle_timeout;
        info!(
            "⏱️ Timeout de inactividad: {}",
            idle_timeout
                .map(|after| humantime::format_duration(after).to_string())
                .unwrap_or_else(|| "desactivado".to_string())
        );
    }

    fn client(&self) -> Option<Arc<C::Transport>> {
        self.client.lock().clone()
    }

    fn is_attached_client(&self, client: &Arc<C::Transport>) -> bool {
        self.client
            .lock()
            .as_ref()
            .is_some_and(|attached| Arc::ptr_eq(attached, client))
    }

    async fn connection_signal(&self, active: bool) {
        let mut signal = self.connection.subscribe();
        // The sender lives in `self`, so the wait cannot fail
        let _ = signal.wait_for(|current| *current == active).await;
    }

    fn set_state(&self, state: PlayerState) {
        let changed = self.state.send_if_modified(|current| {
            if *current == state {
                false
            } else {
                *current = state;
                true
            }
        });
        if changed {
            debug!("Estado del reproductor: {:?}", state);
        }
    }

    fn emit(&self, event: PlayerEvent) {
        // No subscribers is fine
        let _ = self.events.send(event);
    }
}
