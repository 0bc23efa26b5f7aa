pub mod api;
pub mod auth;
pub mod clients;
pub mod config;
pub mod error;
pub mod gateway;
pub mod mapper;
pub mod models;
pub mod monitor;
pub mod schema;
pub mod service;
pub mod store;
pub mod validation;
