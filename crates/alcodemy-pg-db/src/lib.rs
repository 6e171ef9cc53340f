// Copyright (c) Mysten Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

use std::ops::{Deref, DerefMut};
use std::time::Duration;

use anyhow::anyhow;
use diesel::migration::MigrationVersion;
use diesel::ConnectionError;
use diesel_async::async_connection_wrapper::AsyncConnectionWrapper;
use diesel_async::pooled_connection::ManagerConfig;
use diesel_async::AsyncConnection;
use diesel_async::{
    pooled_connection::{
        bb8::{Pool, PooledConnection},
        AsyncDieselConnectionManager,
    },
    AsyncPgConnection, RunQueryDsl,
};
use diesel_migrations::{embed_migrations, EmbeddedMigrations};
use futures::FutureExt;
use tracing::info;
use url::Url;

pub mod models;
pub mod schema;
pub mod temp;

pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

#[derive(clap::Args, Debug, Clone)]
pub struct DbArgs {
    /// Number of connections to keep in the pool.
    #[arg(long, default_value_t = Self::default().db_connection_pool_size)]
    pub db_connection_pool_size: u32,

    /// Time spent waiting for a connection from the pool to become available, in milliseconds.
    #[arg(long, default_value_t = Self::default().db_connection_timeout_ms)]
    pub db_connection_timeout_ms: u64,

    #[arg(long)]
    /// Time spent waiting for statements to complete, in milliseconds.
    pub db_statement_timeout_ms: Option<u64>,
}

/// A pool of connections to the blog database. Cloning shares the pool.
#[derive(Clone)]
pub struct Db(Pool<AsyncPgConnection>);

/// Wrapper struct over the remote `PooledConnection` type.
pub struct Connection<'a>(PooledConnection<'a, AsyncPgConnection>);

impl DbArgs {
    pub fn connection_timeout(&self) -> Duration {
        Duration::from_millis(self.db_connection_timeout_ms)
    }

    pub fn statement_timeout(&self) -> Option<Duration> {
        self.db_statement_timeout_ms.map(Duration::from_millis)
    }
}

impl Db {
    /// Construct a new connection pool talking to the database at `database_url`.
    pub async fn new(database_url: Url, config: DbArgs) -> anyhow::Result<Self> {
        Ok(Self(pool(database_url, config).await?))
    }

    /// Retrieves a connection from the pool. Can fail with a timeout if a connection cannot be
    /// established before the [DbArgs::connection_timeout] has elapsed.
    pub async fn connect(&self) -> anyhow::Result<Connection<'_>> {
        Ok(Connection(self.0.get().await?))
    }

    /// Statistics about the connection pool
    pub fn state(&self) -> bb8::State {
        self.0.state()
    }

    /// Run the embedded migrations, returning the versions that were applied.
    pub async fn run_migrations(&self) -> anyhow::Result<Vec<MigrationVersion<'static>>> {
        use diesel_migrations::MigrationHarness;

        info!("Running migrations ...");
        let conn = self.0.dedicated_connection().await?;
        let mut wrapper: AsyncConnectionWrapper<AsyncPgConnection> =
            AsyncConnectionWrapper::from(conn);

        let finished_migrations = tokio::task::spawn_blocking(move || {
            wrapper
                .run_pending_migrations(MIGRATIONS)
                .map(|versions| versions.iter().map(MigrationVersion::as_owned).collect())
        })
        .await?
        .map_err(|e| anyhow!("Failed to run migrations: {:?}", e))?;

        info!("Migrations complete.");
        Ok(finished_migrations)
    }
}

impl Default for DbArgs {
    fn default() -> Self {
        Self {
            db_connection_pool_size: 20,
            db_connection_timeout_ms: 30_000,
            db_statement_timeout_ms: None,
        }
    }
}

impl<'a> Deref for Connection<'a> {
    type Target = PooledConnection<'a, AsyncPgConnection>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl DerefMut for Connection<'_> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.0
    }
}

async fn pool(database_url: Url, args: DbArgs) -> anyhow::Result<Pool<AsyncPgConnection>> {
    let statement_timeout = args.statement_timeout();

    let mut config = ManagerConfig::default();
    config.custom_setup = Box::new(move |url| {
        async move {
            let mut conn = AsyncPgConnection::establish(url).await?;

            if let Some(timeout) = statement_timeout {
                diesel::sql_query(format!("SET statement_timeout = {}", timeout.as_millis()))
                    .execute(&mut conn)
                    .await
                    .map_err(ConnectionError::CouldntSetupConfiguration)?;
            }

            Ok(conn)
        }
        .boxed()
    });

    let manager = AsyncDieselConnectionManager::new_with_config(database_url.as_str(), config);

    Ok(Pool::builder()
        .max_size(args.db_connection_pool_size)
        .connection_timeout(args.connection_timeout())
        .build(manager)
        .await?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_args() {
        let args = DbArgs::default();
        assert_eq!(args.connection_timeout(), Duration::from_secs(30));
        assert_eq!(args.statement_timeout(), None);

        let args = DbArgs {
            db_statement_timeout_ms: Some(250),
            ..DbArgs::default()
        };
        assert_eq!(args.statement_timeout(), Some(Duration::from_millis(250)));
    }

    #[cfg(feature = "pg_integration")]
    mod pg_integration {
        use diesel::prelude::QueryableByName;
        use diesel_async::RunQueryDsl;

        use crate::temp::TempDb;
        use crate::{Db, DbArgs};

        #[derive(Debug, QueryableByName)]
        struct CountResult {
            #[diesel(sql_type = diesel::sql_types::BigInt)]
            cnt: i64,
        }

        #[tokio::test]
        async fn migrations_create_the_blog_tables() {
            let temp_db = TempDb::new().unwrap();
            let url = temp_db.database().url().clone();

            let db = Db::new(url, DbArgs::default()).await.unwrap();
            let applied = db.run_migrations().await.unwrap();
            assert_eq!(applied.len(), 1);

            let mut conn = db.connect().await.unwrap();
            let cnt: CountResult = diesel::sql_query(
                "SELECT COUNT(*) AS cnt FROM information_schema.tables WHERE table_name IN \
                 ('users', 'blogs', 'comments', 'follows', 'likes', 'resources')",
            )
            .get_result(&mut conn)
            .await
            .unwrap();
            assert_eq!(cnt.cnt, 6);

            // Running them again is a no-op.
            drop(conn);
            assert!(db.run_migrations().await.unwrap().is_empty());
        }

        #[tokio::test]
        async fn pool_state_tracks_connections() {
            let temp_db = TempDb::new().unwrap();
            let url = temp_db.database().url().clone();
            let db = Db::new(url, DbArgs::default()).await.unwrap();

            {
                let _conn = db.connect().await.unwrap();
                assert_eq!(db.state().idle_connections + 1, db.state().connections);
            }
            assert!(db.state().statistics.connections_created >= 1);
        }

        #[tokio::test]
        async fn statement_timeout() {
            let temp_db = TempDb::new().unwrap();
            let url = temp_db.database().url().clone();
            let db = Db::new(
                url,
                DbArgs {
                    db_statement_timeout_ms: Some(200),
                    ..DbArgs::default()
                },
            )
            .await
            .unwrap();

            let mut conn = db.connect().await.unwrap();
            let cnt: CountResult = diesel::sql_query("SELECT 1::BIGINT AS cnt")
                .get_result(&mut conn)
                .await
                .unwrap();
            assert_eq!(cnt.cnt, 1);

            diesel::sql_query("SELECT PG_SLEEP(2), 1::BIGINT AS cnt")
                .get_result::<CountResult>(&mut conn)
                .await
                .expect_err("The statement should be cancelled by the timeout");
        }
    }
}
