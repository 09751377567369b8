use envconfig::Envconfig;

#[derive(Envconfig)]
pub struct Config {
    /// Postgres URL, or `memory://` for the in-process store.
    #[envconfig(from = "DATABASE_URL")]
    pub database_url: String,

    #[envconfig(from = "DATABASE_MAX_CONNECTIONS", default = "5")]
    pub database_max_connections: u32,

    #[envconfig(from = "PORT", default = "3000")]
    pub port: u16,

    #[envconfig(from = "JWT_SECRET")]
    pub jwt_secret: String,

    #[envconfig(from = "TOKEN_TTL_SECONDS", default = "3600")]
    pub token_ttl_seconds: i64,

    /// Social sign-in is disabled when unset.
    #[envconfig(from = "GOOGLE_CLIENT_ID")]
    pub google_client_id: Option<String>,

    #[envconfig(from = "EXPIRY_CHECK_SCHEDULE", default = "0 0 8 * * *")]
    pub expiry_check_schedule: String,

    #[envconfig(from = "EXPIRY_WINDOW_DAYS", default = "180")]
    pub expiry_window_days: i64,
}
