use std::sync::Arc;

use base64::{engine::general_purpose, Engine as _};
use chrono::{Duration, NaiveDate, NaiveDateTime, Utc};
use hmac::{Hmac, Mac};
use serde_json::json;
use sha2::Sha256;
use uuid::Uuid;

use shared_config::{AppConfig, StoreBackend};
use shared_database::{AppState, MemoryAppointmentStore, MemoryUserDirectory};
use shared_models::auth::User;
use shared_models::clock::FixedClock;
use shared_models::user::{Role, UserAccount};

pub struct TestConfig {
    pub jwt_secret: String,
}

impl Default for TestConfig {
    fn default() -> Self {
        Self {
            jwt_secret: "test-secret-key-for-jwt-validation-must-be-long-enough".to_string(),
        }
    }
}

impl TestConfig {
    pub fn to_app_config(&self) -> AppConfig {
        AppConfig {
            jwt_secret: self.jwt_secret.clone(),
            store_backend: StoreBackend::Memory,
            supabase_url: String::new(),
            supabase_anon_key: String::new(),
            directory_seed_path: None,
            server_port: 3000,
        }
    }
}

#[derive(Debug, Clone)]
pub struct TestUser {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub role: Role,
}

impl TestUser {
    pub fn new(name: &str, role: Role) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.to_string(),
            email: format!("{}.{}@clinic.test", name.to_lowercase().replace(' ', "."), Uuid::new_v4().simple()),
            role,
        }
    }

    pub fn doctor(name: &str) -> Self {
        Self::new(name, Role::Doctor)
    }

    pub fn patient(name: &str) -> Self {
        Self::new(name, Role::Patient)
    }

    pub fn admin(name: &str) -> Self {
        Self::new(name, Role::Admin)
    }

    pub fn to_account(&self) -> UserAccount {
        UserAccount {
            id: self.id,
            name: self.name.clone(),
            email: self.email.clone(),
            role: self.role,
        }
    }

    /// The principal a validated token for this user would carry.
    pub fn to_user(&self) -> User {
        User {
            id: self.id.to_string(),
            email: Some(self.email.clone()),
            role: Some(self.role.to_string().to_lowercase()),
            metadata: None,
            created_at: Some(Utc::now()),
        }
    }
}

pub struct JwtTestUtils;

impl JwtTestUtils {
    pub fn create_test_token(user: &TestUser, secret: &str, exp_hours: Option<i64>) -> String {
        let now = Utc::now();
        let exp = now + Duration::hours(exp_hours.unwrap_or(24));

        let header = json!({
            "alg": "HS256",
            "typ": "JWT"
        });

        let payload = json!({
            "sub": user.id,
            "email": user.email,
            "role": user.role.to_string().to_lowercase(),
            "iat": now.timestamp(),
            "exp": exp.timestamp()
        });

        let header_encoded = general_purpose::URL_SAFE_NO_PAD.encode(header.to_string());
        let payload_encoded = general_purpose::URL_SAFE_NO_PAD.encode(payload.to_string());

        let signing_input = format!("{}.{}", header_encoded, payload_encoded);

        let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes())
            .expect("HMAC can take key of any size");
        mac.update(signing_input.as_bytes());
        let signature = mac.finalize().into_bytes();
        let signature_encoded = general_purpose::URL_SAFE_NO_PAD.encode(signature);

        format!("{}.{}", signing_input, signature_encoded)
    }

    pub fn create_expired_token(user: &TestUser, secret: &str) -> String {
        Self::create_test_token(user, secret, Some(-1))
    }
}

/// 2030-01-15 08:00, a Tuesday morning before opening.
pub fn default_test_now() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2030, 1, 15)
        .and_then(|day| day.and_hms_opt(8, 0, 0))
        .expect("valid test timestamp")
}

/// In-memory wiring of every collaborator, with a clock the test drives.
pub struct TestState {
    pub config: AppConfig,
    pub appointments: Arc<MemoryAppointmentStore>,
    pub directory: Arc<MemoryUserDirectory>,
    pub clock: Arc<FixedClock>,
}

impl Default for TestState {
    fn default() -> Self {
        Self::new()
    }
}

impl TestState {
    pub fn new() -> Self {
        Self::at(default_test_now())
    }

    pub fn at(now: NaiveDateTime) -> Self {
        Self {
            config: TestConfig::default().to_app_config(),
            appointments: Arc::new(MemoryAppointmentStore::new()),
            directory: Arc::new(MemoryUserDirectory::new()),
            clock: Arc::new(FixedClock::new(now)),
        }
    }

    pub async fn add_user(&self, user: &TestUser) {
        self.directory.insert(user.to_account()).await;
    }

    pub fn token_for(&self, user: &TestUser) -> String {
        JwtTestUtils::create_test_token(user, &self.config.jwt_secret, Some(1))
    }

    pub fn app_state(&self) -> Arc<AppState> {
        Arc::new(AppState::new(
            self.config.clone(),
            self.appointments.clone(),
            self.directory.clone(),
            self.clock.clone(),
        ))
    }

    pub fn into_app_state(self) -> Arc<AppState> {
        self.app_state()
    }
}
