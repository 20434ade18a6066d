pub mod auth;
pub mod dispatch;
