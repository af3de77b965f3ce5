pub mod cli;
pub mod client;
pub mod config;
pub mod download;
pub mod dto;
pub mod error;
pub mod pipeline;
pub mod server;
pub mod store;
pub mod transcript;
pub mod whisper;
