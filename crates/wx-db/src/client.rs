//! Database client and connection management

use crate::{DbError, DbResult};
use sqlx::mysql::{MySqlConnectOptions, MySqlConnection};
use sqlx::ConnectOptions;
use std::str::FromStr;
use tracing::debug;
use wx_core::{Connector, Persistence, PersistenceError, PersistenceResult};

/// Database client owning a single MySQL connection
pub struct DbClient {
    conn: MySqlConnection,
}

impl DbClient {
    /// Open a connection with prepared options
    pub async fn with_options(opts: &MySqlConnectOptions) -> DbResult<Self> {
        let conn = opts.connect().await?;
        Ok(Self { conn })
    }

    /// Get the underlying connection for direct queries
    pub fn connection(&mut self) -> &mut MySqlConnection {
        &mut self.conn
    }
}

fn parse_url(database_url: &str) -> DbResult<MySqlConnectOptions> {
    MySqlConnectOptions::from_str(database_url)
        .map_err(|e| DbError::ConfigError(format!("invalid database url: {e}")))
}

/// Opens one [`DbClient`] per call; shared by the insert workers and the
/// retention sweeper
#[derive(Clone)]
pub struct MySqlConnector {
    opts: MySqlConnectOptions,
}

impl MySqlConnector {
    pub fn new(database_url: &str) -> DbResult<Self> {
        Ok(Self {
            opts: parse_url(database_url)?,
        })
    }
}

#[async_trait::async_trait]
impl Connector for MySqlConnector {
    async fn connect(&self) -> PersistenceResult<Box<dyn Persistence>> {
        let client = DbClient::with_options(&self.opts)
            .await
            .map_err(|e| PersistenceError::Connect(e.to_string()))?;
        debug!("Opened database connection");
        Ok(Box::new(client))
    }
}
