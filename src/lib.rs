pub mod core;
pub mod db;
pub mod error;
pub mod fetcher;
pub mod models;
pub mod server;
