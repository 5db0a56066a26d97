use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use teloxide::prelude::*;
use tracing::{error, info};

use tg_quotebot::autofill::{AutoFill, InFlight};
use tg_quotebot::handlers::{self, AdminSession, BotCtx};
use tg_quotebot::provider::ProviderChain;
use tg_quotebot::{config, db};

#[derive(Debug, Parser)]
#[command(author, version, about)]
struct Args {
    /// Path to YAML config file
    #[arg(long, default_value = "config.yaml")]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_target(false)
        .compact()
        .init();

    let args = Args::parse();
    let cfg = config::load(Some(&args.config))?;
    cfg.ensure_dirs()?;

    let database_url = std::env::var("DATABASE_URL")
        .unwrap_or_else(|_| format!("sqlite://{}/quotebot.db", cfg.app.data_dir));

    let pool = db::init_pool(&database_url).await?;
    db::run_migrations(&pool).await?;

    let chain = Arc::new(ProviderChain::from_config(&cfg.providers));
    let in_flight = Arc::new(InFlight::default());
    let session = Arc::new(AdminSession::new(cfg.telegram.admin_password.clone()));

    let (autofill, changed) = AutoFill::new(
        pool.clone(),
        chain.clone(),
        in_flight.clone(),
        Duration::from_millis(cfg.app.autofill_debounce_ms),
    );
    tokio::spawn(autofill.run());
    // Kick one pass at startup so gaps left from the last run get filled.
    changed.notify();

    let ctx = Arc::new(BotCtx {
        pool,
        chain,
        session,
        in_flight,
        changed,
    });

    let bot = Bot::new(cfg.telegram.bot_token.clone());

    info!("starting telegram bot");
    teloxide::repl(bot, move |bot: Bot, msg: Message| {
        let ctx = ctx.clone();
        async move {
            if let Err(err) = handlers::handle_update(&bot, &ctx, &msg).await {
                error!(?err, "failed to handle update");
            }
            respond(())
        }
    })
    .await;

    Ok(())
}
