//! routechat is a streaming chat client for the OpenRouter model-aggregation
//! API.
//!
//! The crate is organized around a small set of collaborating layers:
//! - [`core`] owns the message model, request building, the SSE stream
//!   decoder, the model catalog and local history/preference storage.
//! - [`api`] defines the wire payloads and the HTTP clients for the chat
//!   completions and model directory endpoints.
//! - [`cli`] parses arguments and runs the `chat`, `models`, `export` and
//!   settings commands.
//! - [`utils`] holds logging, URL and auth helpers.
//!
//! The binary crate (`src/main.rs`) routes straight into [`crate::cli::main`].

pub mod api;
pub mod cli;
pub mod core;
pub mod utils;
