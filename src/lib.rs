pub mod adapters;
pub mod auth;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;
pub mod web;

pub use crate::adapters::{InMemoryRepository, LocalStorage};
pub use crate::config::AppConfig;
pub use crate::core::{
    batch::BatchGeocoder, etl::GeocodeEngine, geocoding::GoogleGeocoder,
    loader::ResourceLoader, pipeline::GeocodePipeline,
};
pub use crate::utils::error::{ReferralError, Result};
pub use crate::web::state::AppState;
