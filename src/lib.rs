pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod pos;
pub mod services;
pub mod state;
pub mod storage;
pub mod utils;
