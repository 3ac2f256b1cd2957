pub mod annotation;
pub mod config;
pub mod db;
pub mod dispatcher;
pub mod error;
pub mod events;
pub mod health;
pub mod http;
pub mod kafka;
pub mod metrics;
pub mod uploads;
pub mod worker;

pub use config::Config;
