//! Community health coach: a streaming chat widget that answers exercise and
//! health questions in a fixed persona, logs every turn to CSV, and offers a
//! password-gated export of that log.

pub mod admin;
pub mod ai;
pub mod arbiter;
pub mod config;
pub mod session;
pub mod streamer;
pub mod theme;
pub mod transcript;
pub mod turn_log;
pub mod types;

#[cfg(feature = "dioxus")]
pub mod ui;
#[cfg(feature = "dioxus")]
pub mod views;
