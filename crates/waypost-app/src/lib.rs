pub mod app;
pub mod config;
pub mod context;
pub mod db_handler;
pub mod error;
pub mod middleware;
