use std::net::SocketAddr;

use anyhow::Context;

#[derive(Clone, Debug)]
pub struct Config {
    pub addr: SocketAddr,
    pub database_url: String,
    pub auth0_domain: String,
    pub api_audience: String,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
        let port: u16 =
            std::env::var("PORT").unwrap_or_else(|_| "8080".to_string()).parse().context("PORT")?;

        let database_url = std::env::var("DATABASE_URL")
            .unwrap_or_else(|_| "sqlite://casting.db?mode=rwc".to_string());

        let auth0_domain = std::env::var("AUTH0_DOMAIN").context("AUTH0_DOMAIN")?;
        let api_audience = std::env::var("API_AUDIENCE").context("API_AUDIENCE")?;

        Ok(Self {
            addr: format!("{host}:{port}").parse().context("HOST/PORT")?,
            database_url,
            auth0_domain,
            api_audience,
        })
    }
}
