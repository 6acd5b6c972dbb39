pub mod domain;
pub mod engine;
pub mod time;

pub mod config {
    use anyhow::Context;

    #[derive(Debug, Clone)]
    pub struct Settings {
        pub port: Option<u16>,
        pub sentry_dsn: Option<String>,
        pub allowed_origins: Option<String>,
    }

    impl Settings {
        pub fn from_env() -> anyhow::Result<Self> {
            let port = match std::env::var("PORT").ok() {
                Some(v) => Some(v.parse::<u16>().context("PORT must be a port number")?),
                None => None,
            };
            Ok(Self {
                port,
                sentry_dsn: std::env::var("SENTRY_DSN").ok(),
                allowed_origins: std::env::var("ALLOWED_ORIGINS").ok(),
            })
        }
    }
}
