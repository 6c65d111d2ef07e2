use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub issuer: String,
    pub audience: String,
    pub access_ttl_minutes: i64,
    pub refresh_ttl_minutes: i64,
    /// Lifetime of the email-verification token, independent of the session TTLs.
    pub verify_ttl_minutes: i64,
    /// Validity window of derived password-reset tokens.
    pub reset_ttl_minutes: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub enum EmailTransportConfig {
    Smtp {
        host: String,
        port: u16,
        username: String,
        password: String,
        use_tls: bool,
    },
    /// Writes outgoing mail to a directory instead of a relay. Dev/test only.
    File { path: String },
}

#[derive(Debug, Clone, Deserialize)]
pub struct EmailConfig {
    pub transport: EmailTransportConfig,
    pub from_email: String,
    pub from_name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    /// Base URL embedded in verification and reset links.
    pub frontend_url: String,
    pub jwt: JwtConfig,
    pub email: EmailConfig,
}

fn env_i64(key: &str, default: i64) -> i64 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<i64>().ok())
        .unwrap_or(default)
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = std::env::var("DATABASE_URL")?;
        let frontend_url =
            std::env::var("FRONTEND_URL").unwrap_or_else(|_| "http://localhost:8080".into());

        let jwt = JwtConfig {
            secret: std::env::var("JWT_SECRET")?,
            issuer: std::env::var("JWT_ISSUER").unwrap_or_else(|_| "storefront".into()),
            audience: std::env::var("JWT_AUDIENCE").unwrap_or_else(|_| "storefront-users".into()),
            access_ttl_minutes: env_i64("JWT_TTL_MINUTES", 30),
            refresh_ttl_minutes: env_i64("JWT_REFRESH_TTL_MINUTES", 60 * 24),
            verify_ttl_minutes: env_i64("VERIFY_TOKEN_TTL_MINUTES", 30),
            reset_ttl_minutes: env_i64("RESET_TOKEN_TTL_MINUTES", 60),
        };

        let transport = match std::env::var("EMAIL_TRANSPORT").as_deref() {
            Ok("smtp") => EmailTransportConfig::Smtp {
                host: std::env::var("SMTP_HOST")?,
                port: std::env::var("SMTP_PORT")
                    .ok()
                    .and_then(|v| v.parse::<u16>().ok())
                    .unwrap_or(587),
                username: std::env::var("SMTP_USERNAME").unwrap_or_default(),
                password: std::env::var("SMTP_PASSWORD").unwrap_or_default(),
                use_tls: std::env::var("SMTP_USE_TLS")
                    .map(|v| v == "true" || v == "1")
                    .unwrap_or(true),
            },
            _ => EmailTransportConfig::File {
                path: std::env::var("EMAIL_OUT_DIR").unwrap_or_else(|_| "./emails".into()),
            },
        };

        let email = EmailConfig {
            transport,
            from_email: std::env::var("EMAIL_FROM")
                .unwrap_or_else(|_| "no-reply@example.com".into()),
            from_name: std::env::var("EMAIL_FROM_NAME").unwrap_or_else(|_| "Storefront".into()),
        };

        Ok(Self {
            database_url,
            frontend_url,
            jwt,
            email,
        })
    }
}
