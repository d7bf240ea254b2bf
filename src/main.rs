//! Quire - thesis management service

use clap::Parser;
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use quire::{
    auth::JwtValidator,
    config::Args,
    db::{MongoClient, Stores},
    logging::AuditLogger,
    server::{self, AppState},
    services::{accounts, Context, FileStore, LogMailer, Mailer, RelayMailer, Settings},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file if present
    let _ = dotenvy::dotenv();

    let args = Args::parse();

    let log_level = args.log_level.clone();
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("quire={},info", log_level).into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    if let Err(e) = args.validate() {
        error!("Configuration error: {}", e);
        std::process::exit(1);
    }

    info!("======================================");
    info!("  Quire - thesis management service");
    info!("======================================");
    info!("Listen: {}", args.listen);
    info!("Mode: {}", if args.dev_mode { "DEVELOPMENT" } else { "PRODUCTION" });
    info!("MongoDB: {} (db {})", args.mongodb_uri, args.mongodb_db);
    info!("Files: {}", args.files_dir.display());
    info!("======================================");

    // MongoDB is optional in dev mode
    let stores = match MongoClient::new(&args.mongodb_uri, &args.mongodb_db).await {
        Ok(client) => {
            info!("MongoDB connected successfully");
            Stores::mongo(&client).await?
        }
        Err(e) => {
            if args.dev_mode {
                warn!("MongoDB connection failed (dev mode, using in-memory store): {}", e);
                Stores::memory()
            } else {
                error!("MongoDB connection failed: {}", e);
                std::process::exit(1);
            }
        }
    };

    let mailer: Arc<dyn Mailer> = match args.mail_relay_url {
        Some(ref url) => Arc::new(RelayMailer::new(url, args.mail_api_key.clone(), &args.mail_from)),
        None => {
            warn!("MAIL_RELAY_URL not set, outgoing mail will only be logged");
            Arc::new(LogMailer)
        }
    };
    info!("Mailer: {}", mailer.name());

    let audit = AuditLogger::new();
    if let Some(ref path) = args.audit_log_path {
        audit.init_file(path.clone()).await?;
    }

    let jwt_secret = args.jwt_secret().map_err(anyhow::Error::msg)?;
    let jwt = Arc::new(JwtValidator::new(jwt_secret, args.jwt_expiry_seconds)?);

    let ctx = Context {
        stores,
        mailer,
        files: FileStore::new(&args.files_dir).await?,
        audit,
        jwt,
        settings: Settings {
            student_mail_domain: args.student_mail_domain.trim().to_lowercase(),
            frontend_url: args.frontend_url.trim_end_matches('/').to_string(),
            reset_token_ttl_seconds: args.reset_token_ttl_seconds,
        },
    };

    if let Some(seed) = args.admin_seed() {
        if accounts::seed_admin(&ctx, &seed).await? {
            info!("Seeded administrator {}", seed.user_id);
        }
    }

    let state = Arc::new(AppState::new(args, ctx));
    server::run(state).await?;

    Ok(())
}
