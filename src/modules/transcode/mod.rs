use crate::state::AppState;
use axum::Router;
use axum::routing::get;

pub mod dto;
pub mod error;
pub mod events;
pub mod fetcher;
pub mod handler;
pub mod process;
pub mod progress;
pub mod sequencer;
pub mod service;
pub mod session;

#[cfg(test)]
mod test_support;

pub fn router() -> Router<AppState> {
    Router::new().route("/ws", get(handler::transcode_ws))
}
