pub mod app;
pub mod auth;
pub mod categories;
pub mod config;
pub mod email;
pub mod error;
pub mod extract;
pub mod health;
pub mod products;
pub mod state;
