use crate::domain::model::{
    GeocodedResource, GeocodingResult, LoadReport, NewUser, RawResourceRecord, User,
};
use crate::utils::error::Result;
use async_trait::async_trait;

pub trait Storage: Send + Sync {
    fn read_file(&self, path: &str) -> impl std::future::Future<Output = Result<Vec<u8>>> + Send;
    fn write_file(
        &self,
        path: &str,
        data: &[u8],
    ) -> impl std::future::Future<Output = Result<()>> + Send;
}

/// 地理編碼服務
#[async_trait]
pub trait Geocoder: Send + Sync {
    /// `Ok(None)` is a definitive negative answer from the service, `Err` means
    /// every attempt failed.
    async fn try_geocode(&self, address: &str) -> Result<Option<GeocodingResult>>;

    async fn geocode(&self, address: &str) -> Option<GeocodingResult> {
        match self.try_geocode(address).await {
            Ok(result) => result,
            Err(e) => {
                tracing::warn!("All geocoding attempts failed for '{}': {}", address, e);
                None
            }
        }
    }
}

/// Where raw resource rows come from.
#[async_trait]
pub trait ResourceSource: Send + Sync {
    async fn fetch_rows(&self) -> Result<Vec<RawResourceRecord>>;
}

/// Storage interface for resources and user accounts. The backing store is an
/// implementation detail.
#[async_trait]
pub trait Repository: Send + Sync {
    async fn get_resources(&self) -> Result<Vec<GeocodedResource>>;
    async fn get_resource(&self, id: &str) -> Result<Option<GeocodedResource>>;
    async fn upsert_resource(&self, resource: GeocodedResource) -> Result<()>;
    async fn get_users(&self) -> Result<Vec<User>>;
    async fn create_user(&self, user: NewUser) -> Result<User>;
    async fn verify_credentials(&self, email: &str, password: &str) -> Result<Option<User>>;
}

#[async_trait]
pub trait Pipeline: Send + Sync {
    async fn extract(&self) -> Result<Vec<RawResourceRecord>>;
    async fn transform(&self, data: Vec<RawResourceRecord>) -> Result<LoadReport>;
    async fn load(&self, result: LoadReport) -> Result<String>;
}
