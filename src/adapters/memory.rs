use crate::auth::password::PasswordHash;
use crate::domain::model::{GeocodedResource, NewUser, User};
use crate::domain::ports::Repository;
use crate::utils::error::{ReferralError, Result};
use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

struct StoredUser {
    user: User,
    password: PasswordHash,
}

/// 記憶體內的資源與帳號存儲
#[derive(Default)]
pub struct InMemoryRepository {
    resources: RwLock<Vec<GeocodedResource>>,
    users: RwLock<Vec<StoredUser>>,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

#[async_trait]
impl Repository for InMemoryRepository {
    async fn get_resources(&self) -> Result<Vec<GeocodedResource>> {
        Ok(self.resources.read().await.clone())
    }

    async fn get_resource(&self, id: &str) -> Result<Option<GeocodedResource>> {
        let resources = self.resources.read().await;
        Ok(resources.iter().find(|r| r.id == id).cloned())
    }

    async fn upsert_resource(&self, resource: GeocodedResource) -> Result<()> {
        let mut resources = self.resources.write().await;
        match resources.iter_mut().find(|r| r.id == resource.id) {
            Some(existing) => *existing = resource,
            None => resources.push(resource),
        }
        Ok(())
    }

    async fn get_users(&self) -> Result<Vec<User>> {
        let users = self.users.read().await;
        Ok(users.iter().map(|stored| stored.user.clone()).collect())
    }

    async fn create_user(&self, new_user: NewUser) -> Result<User> {
        let email = normalize_email(&new_user.email);
        if email.is_empty() || new_user.name.trim().is_empty() {
            return Err(ReferralError::ValidationError {
                message: "Name, email and password are required".to_string(),
            });
        }

        // 雜湊計算較慢，先在鎖外完成
        let password = new_user.password.parse::<PasswordHash>()?;

        let mut users = self.users.write().await;
        if users.iter().any(|stored| stored.user.email == email) {
            return Err(ReferralError::ConflictError {
                message: "User already exists".to_string(),
            });
        }

        let user = User {
            id: uuid::Uuid::new_v4().to_string(),
            name: new_user.name.trim().to_string(),
            email,
            role: new_user.role,
            created_at: Utc::now(),
        };
        users.push(StoredUser {
            user: user.clone(),
            password,
        });
        tracing::info!("👤 Created user {} ({:?})", user.email, user.role);
        Ok(user)
    }

    async fn verify_credentials(&self, email: &str, password: &str) -> Result<Option<User>> {
        let email = normalize_email(email);
        let users = self.users.read().await;
        Ok(users
            .iter()
            .find(|stored| stored.user.email == email)
            .filter(|stored| stored.password.verify(password))
            .map(|stored| stored.user.clone()))
    }
}
