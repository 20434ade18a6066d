pub mod api;
pub mod passthrough;
