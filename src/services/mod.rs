// Services module - Business logic

pub mod auth;
pub mod authorization;
pub mod creators;
pub mod geo;
pub mod image_store;
pub mod oauth;
pub mod points;
pub mod search;
pub mod session_token;
