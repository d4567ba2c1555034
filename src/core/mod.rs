pub mod address;
pub mod batch;
pub mod distance;
pub mod etl;
pub mod geocoding;
pub mod loader;
pub mod pipeline;
pub mod retry;

pub use crate::domain::model::{GeocodedResource, LoadReport, RawResourceRecord};
pub use crate::domain::ports::{Geocoder, Pipeline, Repository, ResourceSource, Storage};
pub use crate::utils::error::Result;
