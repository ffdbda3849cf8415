use std::env;
use std::fmt;
use std::str::FromStr;
use tracing::warn;

/// Which persistence backend the API wires its store and directory to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Memory,
    Supabase,
}

impl FromStr for StoreBackend {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "memory" | "in_memory" | "in-memory" => Ok(StoreBackend::Memory),
            "supabase" | "postgrest" => Ok(StoreBackend::Supabase),
            other => Err(format!("unknown store backend: {}", other)),
        }
    }
}

impl fmt::Display for StoreBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreBackend::Memory => write!(f, "memory"),
            StoreBackend::Supabase => write!(f, "supabase"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub jwt_secret: String,
    pub store_backend: StoreBackend,
    pub supabase_url: String,
    pub supabase_anon_key: String,
    pub directory_seed_path: Option<String>,
    pub server_port: u16,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let config = Self {
            jwt_secret: env::var("JWT_SECRET")
                .or_else(|_| env::var("SUPABASE_JWT_SECRET"))
                .unwrap_or_else(|_| {
                    warn!("JWT_SECRET not set, using empty value");
                    String::new()
                }),
            store_backend: env::var("STORE_BACKEND")
                .ok()
                .and_then(|value| {
                    value.parse().map_err(|e| warn!("{}, using memory", e)).ok()
                })
                .unwrap_or(StoreBackend::Memory),
            supabase_url: env::var("SUPABASE_URL")
                .unwrap_or_else(|_| String::new()),
            supabase_anon_key: env::var("SUPABASE_ANON_PUBLIC_KEY")
                .unwrap_or_else(|_| String::new()),
            directory_seed_path: env::var("DIRECTORY_SEED_PATH").ok(),
            server_port: env::var("SERVER_PORT")
                .ok()
                .and_then(|port| port.parse().ok())
                .unwrap_or(3000),
        };

        if !config.is_configured() {
            warn!("Application not fully configured - missing environment variables");
        }

        config
    }

    pub fn is_configured(&self) -> bool {
        if self.jwt_secret.is_empty() {
            return false;
        }
        match self.store_backend {
            StoreBackend::Memory => true,
            StoreBackend::Supabase => self.is_supabase_configured(),
        }
    }

    pub fn is_supabase_configured(&self) -> bool {
        !self.supabase_url.is_empty() && !self.supabase_anon_key.is_empty()
    }
}
