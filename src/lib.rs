//! rill: client-side state for a self-hosted feed reader.
//!
//! The [`session::Session`] owns folders, feeds, items and counters, talks
//! to the server through a [`backend::Backend`], and keeps everything
//! consistent across concurrent fetches, debounced writes and keyboard
//! navigation.

pub mod backend;
pub mod config;
pub mod debounce;
pub mod display;
pub mod keybindings;
pub mod model;
pub mod mutation;
pub mod navigation;
pub mod pagination;
pub mod session;
pub mod stats;
pub mod store;
