pub mod app;
pub mod auth;
pub mod cache;
pub mod categories;
pub mod config;
pub mod error;
pub mod pagination;
pub mod state;
pub mod transactions;
pub mod users;
