use std::env;
use tracing::warn;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub supabase_url: String,
    pub supabase_anon_key: String,
    pub supabase_service_role_key: String,
    pub supabase_jwt_secret: String,
    pub voice_webhook_secret: String,
    pub auth_webhook_secret: String,
    pub auth_api_url: String,
    pub auth_secret_key: String,
    pub calendar_api_url: String,
    pub port: u16,
}

fn required(name: &str) -> String {
    env::var(name).unwrap_or_else(|_| {
        warn!("{} not set, using empty value", name);
        String::new()
    })
}

fn with_default(name: &str, default: &str) -> String {
    env::var(name).unwrap_or_else(|_| {
        warn!("{} not set, using default", name);
        default.to_string()
    })
}

impl AppConfig {
    pub fn from_env() -> Self {
        let port = env::var("PORT")
            .ok()
            .and_then(|p| match p.parse::<u16>() {
                Ok(port) => Some(port),
                Err(_) => {
                    warn!("PORT value {:?} is not a valid port, using 3000", p);
                    None
                }
            })
            .unwrap_or(3000);

        let config = Self {
            supabase_url: required("SUPABASE_URL"),
            supabase_anon_key: required("SUPABASE_ANON_PUBLIC_KEY"),
            supabase_service_role_key: required("SUPABASE_SERVICE_ROLE_KEY"),
            supabase_jwt_secret: required("SUPABASE_JWT_SECRET"),
            voice_webhook_secret: required("VOICE_WEBHOOK_SECRET"),
            auth_webhook_secret: required("AUTH_WEBHOOK_SECRET"),
            auth_api_url: with_default("AUTH_API_URL", "https://api.clerk.com"),
            auth_secret_key: required("AUTH_SECRET_KEY"),
            calendar_api_url: with_default("CALENDAR_API_URL", "https://www.googleapis.com"),
            port,
        };

        if !config.is_configured() {
            warn!("Application not fully configured - missing environment variables");
        }
        if !config.is_voice_configured() {
            warn!("Voice agent webhooks will reject every call until VOICE_WEBHOOK_SECRET and SUPABASE_SERVICE_ROLE_KEY are set");
        }

        config
    }

    pub fn is_configured(&self) -> bool {
        !self.supabase_url.is_empty()
            && !self.supabase_anon_key.is_empty()
            && !self.supabase_jwt_secret.is_empty()
    }

    pub fn is_voice_configured(&self) -> bool {
        !self.voice_webhook_secret.is_empty() && !self.supabase_service_role_key.is_empty()
    }

    pub fn is_calendar_configured(&self) -> bool {
        !self.auth_api_url.is_empty() && !self.auth_secret_key.is_empty()
    }
}
