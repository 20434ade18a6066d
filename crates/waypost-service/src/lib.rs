pub mod auth;
pub mod content;
pub mod crm;
pub mod dispatch;
pub mod error;
pub mod extensions;
pub mod lifecycle;
pub mod redirect;
