pub mod builtin_models;
pub mod catalog;
pub mod chat_stream;
pub mod config;
pub mod error;
pub mod export;
pub mod image;
pub mod message;
pub mod request;
pub mod store;
pub mod wire;
