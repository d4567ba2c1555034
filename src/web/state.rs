use crate::adapters::{
    FileResourceSource, HttpResourceSource, InMemoryRepository, LocalStorage, WhatsAppClient,
};
use crate::auth::JwtService;
use crate::config::AppConfig;
use crate::core::geocoding::GoogleGeocoder;
use crate::core::loader::ResourceLoader;
use crate::domain::model::{NewUser, Role};
use crate::domain::ports::{Geocoder, Repository, ResourceSource};
use crate::utils::error::{ReferralError, Result};
use std::sync::Arc;

pub type SharedState = Arc<AppState>;

/// 所有協作者在啟動時建立並注入
pub struct AppState {
    pub config: AppConfig,
    pub loader: ResourceLoader<dyn Geocoder>,
    pub repository: Arc<dyn Repository>,
    pub jwt: Arc<JwtService>,
    pub whatsapp: Option<WhatsAppClient>,
    /// Rooted at `data.base_path`
    pub storage: LocalStorage,
}

impl AppState {
    pub fn new(
        config: AppConfig,
        geocoder: Arc<dyn Geocoder>,
        source: Arc<dyn ResourceSource>,
        repository: Arc<dyn Repository>,
    ) -> Self {
        let batch = config.batch_geocoder(geocoder);
        let jwt = JwtService::new(&config.auth.jwt_secret)
            .with_ttl(chrono::Duration::hours(config.auth.token_ttl_hours));
        let whatsapp = config.messaging.as_ref().map(|messaging| {
            let mut client = WhatsAppClient::new(&messaging.phone_number_id, &messaging.token);
            if let Some(api_base) = &messaging.api_base {
                client = client.with_api_base(api_base);
            }
            if let Some(numbers) = &messaging.test_numbers {
                client = client.with_test_numbers(numbers.clone());
            }
            if client.is_test_mode() {
                tracing::warn!("📵 Messaging in test mode: only listed numbers can be reached");
            }
            client
        });

        Self {
            storage: LocalStorage::new(&config.data.base_path),
            loader: ResourceLoader::new(source, batch),
            repository,
            jwt: Arc::new(jwt),
            whatsapp,
            config,
        }
    }

    /// Production wiring: Google geocoder, configured source, in-memory store.
    pub fn from_config(config: AppConfig) -> Self {
        let mut geocoder = GoogleGeocoder::new(&config.geocoding.api_key)
            .with_qualifier(&config.geocoding.qualifier)
            .with_policy(config.retry_policy());
        if let Some(endpoint) = &config.geocoding.endpoint {
            geocoder = geocoder.with_endpoint(endpoint);
        }

        let source: Arc<dyn ResourceSource> = match &config.data.resources_url {
            Some(url) => {
                Arc::new(HttpResourceSource::new(url).with_timeout(config.source_timeout()))
            }
            None => Arc::new(FileResourceSource::new(
                LocalStorage::new(&config.data.base_path),
                config.data.resources_file.clone().unwrap_or_default(),
            )),
        };

        Self::new(
            config,
            Arc::new(geocoder),
            source,
            Arc::new(InMemoryRepository::new()),
        )
    }

    pub fn shared(self) -> SharedState {
        Arc::new(self)
    }

    /// Creates the configured admin account unless it already exists.
    pub async fn seed_admin(&self) -> Result<()> {
        let (Some(email), Some(password)) = (
            self.config.auth.admin_email.as_ref(),
            self.config.auth.admin_password.as_ref(),
        ) else {
            return Ok(());
        };

        let admin = NewUser {
            name: self
                .config
                .auth
                .admin_name
                .clone()
                .unwrap_or_else(|| "Administrator".to_string()),
            email: email.clone(),
            password: password.clone(),
            role: Role::Admin,
        };
        match self.repository.create_user(admin).await {
            Ok(user) => {
                tracing::info!("🔑 Seeded admin account {}", user.email);
                Ok(())
            }
            Err(ReferralError::ConflictError { .. }) => {
                tracing::debug!("Admin account {} already exists", email);
                Ok(())
            }
            Err(e) => Err(e),
        }
    }
}
