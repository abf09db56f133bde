//! HTTP server command
//!
//! Connects the entity store, prepares its schema, and runs the API until
//! Ctrl+C or SIGTERM.

use anyhow::{Context, Result};
use clap::Parser;
use std::net::SocketAddr;

use querybridge_core::{mask_dsn, QuerybridgeConfig};
use querybridge_server::db::{create_pool_with_options, database_time, migrations};
use querybridge_server::http::{run_server, ServerConfig};

/// Arguments for the serve command
#[derive(Parser, Debug)]
pub struct ServeArgs {
    /// Address to bind to (default: [server].bind from config, else 127.0.0.1:8080)
    #[arg(long, short = 'b')]
    pub bind: Option<SocketAddr>,

    /// Entity store database URL (overrides config)
    #[arg(long, env = "DATABASE_URL", hide_env_values = true)]
    pub database_url: Option<String>,

    /// Maximum pool connections for the entity store
    #[arg(long)]
    pub max_connections: Option<u32>,

    /// Do not create the users/transactions/sessions tables on startup
    #[arg(long)]
    pub skip_migrations: bool,
}

/// Effective settings after layering flags and env over the config file
#[derive(Debug, Clone, PartialEq)]
pub struct ServeSettings {
    pub bind: SocketAddr,
    pub database_url: String,
    pub max_connections: u32,
    pub allow_raw_sql: bool,
}

impl ServeSettings {
    pub fn resolve(args: &ServeArgs, config: &QuerybridgeConfig) -> Self {
        Self {
            bind: args.bind.unwrap_or(config.server.bind),
            database_url: args
                .database_url
                .clone()
                .unwrap_or_else(|| config.database.url.clone()),
            max_connections: args.max_connections.unwrap_or(config.database.max_connections),
            allow_raw_sql: config.query.allow_raw_sql,
        }
    }
}

/// Run the HTTP server
pub async fn run_serve(args: ServeArgs, config: &QuerybridgeConfig) -> Result<()> {
    let settings = ServeSettings::resolve(&args, config);

    tracing::info!(
        database = %mask_dsn(&settings.database_url),
        max_connections = settings.max_connections,
        "connecting entity store"
    );

    let pool = create_pool_with_options(&settings.database_url, settings.max_connections)
        .await
        .context("Failed to create database pool")?;

    let now = database_time(&pool)
        .await
        .context("Database did not answer SELECT NOW()")?;
    tracing::info!(database_time = %now, "entity store connected");

    if args.skip_migrations {
        tracing::info!("skipping migrations");
    } else {
        migrations::run(&pool)
            .await
            .context("Failed to run migrations")?;
    }

    let server_config = ServerConfig {
        bind_addr: settings.bind,
        allow_raw_sql: settings.allow_raw_sql,
    };

    // Run server (blocks until shutdown)
    run_server(pool, server_config)
        .await
        .context("Server error")?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(bind: Option<&str>, url: Option<&str>) -> ServeArgs {
        ServeArgs {
            bind: bind.map(|b| b.parse().unwrap()),
            database_url: url.map(str::to_string),
            max_connections: None,
            skip_migrations: false,
        }
    }

    #[test]
    fn config_fills_unset_flags() {
        let config = QuerybridgeConfig::parse(
            r#"
            [server]
            bind = "0.0.0.0:9000"
            [database]
            url = "postgres://db/app"
            max_connections = 12
            [query]
            allow_raw_sql = false
            "#,
        )
        .unwrap();

        let settings = ServeSettings::resolve(&args(None, None), &config);
        assert_eq!(settings.bind.port(), 9000);
        assert_eq!(settings.database_url, "postgres://db/app");
        assert_eq!(settings.max_connections, 12);
        assert!(!settings.allow_raw_sql);
    }

    #[test]
    fn flags_win_over_config() {
        let config = QuerybridgeConfig::default();
        let settings = ServeSettings::resolve(
            &args(Some("127.0.0.1:7001"), Some("postgres://override/db")),
            &config,
        );
        assert_eq!(settings.bind.port(), 7001);
        assert_eq!(settings.database_url, "postgres://override/db");
    }
}
