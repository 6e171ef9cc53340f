// Copyright (c) Mysten Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

use std::path::PathBuf;
use std::sync::Arc;

use alcodemy_blog::mailer::{HttpMailer, LogMailer, Mailer};
use alcodemy_blog::media::Media;
use alcodemy_blog::metrics::{start_prometheus_server, DbConnectionStatsCollector};
use alcodemy_blog::oauth::GoogleTokenInfo;
use alcodemy_blog::store::{BlogStore, InMemoryStore, PgStore};
use alcodemy_blog::summary::Summarizer;
use alcodemy_blog::{config, telemetry, BlogService};
use alcodemy_pg_db::{Db, DbArgs};
use anyhow::Context;
use clap::Parser;
use prometheus::Registry;
use tracing::{info, warn};
use url::Url;

#[derive(Parser, Debug)]
#[clap(
    name = "alcodemy-blog",
    about = "REST API of the Alcodemy blogging platform",
    rename_all = "kebab-case"
)]
struct Args {
    /// Path to the YAML service configuration.
    #[clap(long, default_value = "blog.yaml")]
    config: PathBuf,

    /// Emit logs as JSON lines.
    #[clap(long, default_value_t = false)]
    json_logs: bool,

    /// Secret used to sign session tokens.
    #[clap(long, env = "JWT_SECRET", hide_env_values = true)]
    jwt_secret: String,

    /// Without a database the service keeps everything in memory.
    #[clap(long, env = "DATABASE_URL")]
    database_url: Option<Url>,

    #[clap(long, env = "MAIL_API_KEY", hide_env_values = true)]
    mail_api_key: Option<String>,

    #[clap(long, env = "AI_API_KEY", hide_env_values = true)]
    ai_api_key: Option<String>,

    #[clap(flatten)]
    db_args: DbArgs,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    telemetry::init(args.json_logs)?;

    let config = config::load(&args.config)?;
    info!("Loaded config from {:?}", args.config);

    let registry = Registry::new();

    let store: Arc<dyn BlogStore> = match args.database_url {
        Some(url) => {
            let db = Db::new(url, args.db_args)
                .await
                .context("Failed to connect to the database")?;
            let applied = db.run_migrations().await?;
            info!("Applied {} migrations", applied.len());
            registry
                .register(Box::new(DbConnectionStatsCollector::new(None, db.clone())))
                .context("Failed to register database metrics")?;
            Arc::new(PgStore::new(db))
        }
        None => {
            warn!("DATABASE_URL is not set, data is kept in memory and lost on restart");
            Arc::new(InMemoryStore::new())
        }
    };

    let media = Media::from_config(&config.media, config.external_timeout)?;

    let mailer: Arc<dyn Mailer> = match (&config.mail, args.mail_api_key) {
        (Some(mail), Some(api_key)) => Arc::new(HttpMailer::new(
            mail.endpoint.clone(),
            mail.from.clone(),
            api_key,
            config.external_timeout,
        )?),
        _ => {
            warn!("Mail service is not configured, outgoing email is only logged");
            Arc::new(LogMailer)
        }
    };

    let summarizer = match (&config.summary, args.ai_api_key) {
        (Some(summary), Some(api_key)) => Summarizer::new(
            &summary.endpoint,
            &summary.model,
            api_key,
            config.external_timeout,
        )?,
        _ => Summarizer::disabled(),
    };

    let google = GoogleTokenInfo::new(config.google_client_id.clone(), config.external_timeout)?;

    start_prometheus_server(config.metrics_address, registry.clone());

    let listen_address = config.listen_address;
    let mut service = BlogService::new(config, store, media, args.jwt_secret.as_bytes());
    service.with_mailer(mailer);
    service.with_summarizer(summarizer);
    service.with_identity_provider(Arc::new(google));
    service.with_metrics(registry);

    service.start_service(listen_address).await
}
