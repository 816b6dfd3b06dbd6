mod client;
pub mod migrations;
pub mod models;

pub use client::StorageClient;
pub use migrations::SchemaStatus;
