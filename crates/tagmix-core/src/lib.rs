//! Tagmix Core - Marker-driven channel mixer engine
//!
//! A camera watches for fiducial markers; every recognized marker ID is bound
//! to one audio channel of the active track and drives that channel's volume
//! (by vertical screen position) and its on-screen feedback (by live audio
//! loudness). This crate holds the whole stateful mixing loop (channel
//! registry, tick controller, level analysis, visual compositor) behind
//! trait seams for the camera, the marker detector, the playback backend
//! and the render sink, which live in the host application.

pub mod compositor;
pub mod config;
pub mod engine;
pub mod library;
pub mod mixer;
pub mod types;
pub mod vision;

pub use types::*;
