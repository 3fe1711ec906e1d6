//! # Open Player
//!
//! Playback orchestration core for a voice-channel audio bot: heterogeneous
//! requests (uploaded files, resolved streams, synthesized MIDI) go through a
//! single-consumer queue and are played one at a time on a voice connection,
//! with idle-timeout auto-disconnect and per-request error isolation.

pub mod audio;
pub mod bot;
pub mod config;
pub mod request;
