pub mod chat;
pub mod error;
pub mod model;
