use anyhow::{anyhow, Context, Result};

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database_url: String,
    pub email: EmailConfig,
    pub auth: AuthConfig,
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Public base URL used in notification links.
    pub base_url: String,
}

#[derive(Clone, Debug)]
pub struct EmailConfig {
    pub smtp_server: String,
    pub smtp_port: u16,
    pub username: String,
    pub password: String,
    pub from: String,
}

#[derive(Clone, Debug)]
pub struct AuthConfig {
    pub jwt_secret: String,
    pub token_expiry_hours: i64,
}

impl AppConfig {
    /// Build the configuration from the environment. `dotenvy::dotenv()` has
    /// already populated it from `.env` by the time this runs.
    pub fn from_env() -> Result<Self> {
        let database_url =
            std::env::var("DATABASE_URL").context("DATABASE_URL must be set")?;

        let host = env_or("SERVER_HOST", "0.0.0.0");
        let port = env_or("SERVER_PORT", "8080")
            .parse::<u16>()
            .context("SERVER_PORT must be a port number")?;
        let base_url = env_or("APP_URL", &format!("http://localhost:{port}"));

        let jwt_secret = std::env::var("JWT_SECRET").context("JWT_SECRET must be set")?;
        if jwt_secret.len() < 32 {
            return Err(anyhow!("JWT_SECRET must be at least 32 characters"));
        }
        let token_expiry_hours = env_or("TOKEN_EXPIRY_HOURS", "24")
            .parse::<i64>()
            .context("TOKEN_EXPIRY_HOURS must be an integer")?;

        let email = EmailConfig {
            smtp_server: env_or("SMTP_SERVER", "localhost"),
            smtp_port: env_or("SMTP_PORT", "587")
                .parse::<u16>()
                .context("SMTP_PORT must be a port number")?,
            username: env_or("SMTP_USERNAME", ""),
            password: env_or("SMTP_PASSWORD", ""),
            from: env_or("SMTP_FROM", "datadesk@localhost"),
        };

        Ok(Self {
            server: ServerConfig {
                host,
                port,
                base_url,
            },
            database_url,
            email,
            auth: AuthConfig {
                jwt_secret,
                token_expiry_hours,
            },
        })
    }
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}
