//! # Audio Module
//!
//! Orquestación de la reproducción en una única conexión de voz.
//!
//! ## Architecture
//!
//! ### [`player`] - Player
//! - Contiene la cola de requests y el estado de conexión
//! - Ejecuta el loop conectar → reproducir → inactivo → desconectar
//! - Expone `connect`, `queue`, `skip`, `pause`, `resume`, `stop`, `disconnect`
//!
//! ### [`queue`] - Queue
//! - FIFO de un solo consumidor con slot `current`
//! - `get` cancel-safe, acotable por el timeout de inactividad
//!
//! ### [`transport`] / [`voice`] - Voice transport
//! - Traits `Connector` y `Transport` sobre los que el reproductor es genérico
//! - Implementación con songbird y el caché de serenity
//!
//! ### [`signal`] - Completion bridge
//! - Señal de fin de un solo uso entre el callback del transporte y el loop
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use open_player::audio::{Player, PlayerConfig, SongbirdConnector, VoiceInvoker};
//! use std::sync::Arc;
//!
//! # async fn example(manager: Arc<songbird::Songbird>, invoker: VoiceInvoker) -> anyhow::Result<()> {
//! let player = Arc::new(Player::new(
//!     SongbirdConnector::new(manager),
//!     PlayerConfig::default(),
//! ));
//! tokio::spawn(player.clone().run());
//!
//! player.connect(&invoker).await?;
//! player.pause().await?;
//! player.resume().await?;
//! player.skip().await?;
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod player;
pub mod queue;
pub mod signal;
pub mod transport;
pub mod voice;

pub use error::{PlayerError, TransportError};
pub use player::{Player, PlayerConfig, PlayerEvent, PlayerState};
pub use queue::Queue;
pub use signal::{finish_signal, Completion, CompletionSlot, Finished};
pub use transport::{ChannelKind, Connector, SourceOf, Transport, VoiceLocation};
pub use voice::{SongbirdConnector, SongbirdTransport, VoiceInvoker};
