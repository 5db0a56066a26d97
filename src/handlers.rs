//! Telegram command surface for the editorial queue.
//!
//! Thin glue: parses text commands, enforces the shared-secret admin gate,
//! and relays results as messages. All queue semantics live in `db`,
//! `generate`, and `provider` — nothing here mutates state directly.

use anyhow::Result;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use teloxide::prelude::*;
use tracing::{instrument, warn};

use crate::autofill::{InFlight, QueueChanged};
use crate::db::{self, StoreError};
use crate::generate::{self, GenerateError};
use crate::model::{
    horizon_keys, parse_date_key, today_key, QueueStatus, Quote, ReactionKind,
};
use crate::provider::ProviderChain;

static COMMAND_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^/(\w+)(?:@\w+)?\s*(.*)$").expect("command regex"));

/// Shared-secret session gate. One secret unlocks editorial commands for a
/// chat until `/logout`. Thin auth, not a security boundary.
#[derive(Debug)]
pub struct AdminSession {
    secret: String,
    unlocked: Mutex<HashSet<i64>>,
}

impl AdminSession {
    pub fn new(secret: String) -> Self {
        Self {
            secret,
            unlocked: Mutex::new(HashSet::new()),
        }
    }

    pub fn login(&self, chat_id: i64, password: &str) -> bool {
        if password == self.secret {
            self.unlocked.lock().expect("session lock").insert(chat_id);
            true
        } else {
            false
        }
    }

    pub fn logout(&self, chat_id: i64) {
        self.unlocked.lock().expect("session lock").remove(&chat_id);
    }

    pub fn is_unlocked(&self, chat_id: i64) -> bool {
        self.unlocked.lock().expect("session lock").contains(&chat_id)
    }

    /// Drop every session, e.g. at shutdown or on secret rotation.
    pub fn reset(&self) {
        self.unlocked.lock().expect("session lock").clear();
    }
}

/// Everything a command handler needs, shared across updates.
pub struct BotCtx {
    pub pool: db::Pool,
    pub chain: Arc<ProviderChain>,
    pub session: Arc<AdminSession>,
    pub in_flight: Arc<InFlight>,
    pub changed: QueueChanged,
}

const HELP: &str = "Commands:\n\
    /today — today's approved quote\n\
    /react <love|power|sad> [date] — react to a day's quote\n\
    /login <password> — unlock editorial commands\n\
    /logout\n\
    Editorial (after /login):\n\
    /queue — 30-day schedule\n\
    /show <date> — one day in full\n\
    /generate <date> — generate a fresh draft\n\
    /edit <date> | <text> | <author> | [role] | [country]\n\
    /approve <date>\n\
    /reject <date> — back to draft, content kept\n\
    /cooldown [reset] — provider cooldown status";

#[instrument(skip_all)]
pub async fn handle_update(bot: &Bot, ctx: &BotCtx, msg: &Message) -> Result<()> {
    let Some(text) = msg.text() else {
        return Ok(());
    };
    let Some(caps) = COMMAND_RE.captures(text.trim()) else {
        return Ok(());
    };
    let command = caps[1].to_lowercase();
    let args = caps[2].trim().to_string();
    let chat_id = msg.chat.id.0;

    let reply = match command.as_str() {
        "start" | "help" => HELP.to_string(),
        "today" => cmd_today(ctx).await,
        "react" => cmd_react(ctx, msg, &args).await,
        "login" => {
            if ctx.session.login(chat_id, &args) {
                "Unlocked. Editorial commands are available.".to_string()
            } else {
                "Wrong password.".to_string()
            }
        }
        "logout" => {
            ctx.session.logout(chat_id);
            "Locked.".to_string()
        }
        "queue" | "show" | "generate" | "edit" | "approve" | "reject" | "cooldown" => {
            if !ctx.session.is_unlocked(chat_id) {
                "Locked. Use /login <password> first.".to_string()
            } else {
                match command.as_str() {
                    "queue" => cmd_queue(ctx).await,
                    "show" => cmd_show(ctx, &args).await,
                    "generate" => cmd_generate(ctx, &args).await,
                    "edit" => cmd_edit(ctx, &args).await,
                    "approve" => cmd_approve(ctx, &args).await,
                    "reject" => cmd_reject(ctx, &args).await,
                    "cooldown" => cmd_cooldown(ctx, &args),
                    _ => unreachable!(),
                }
            }
        }
        _ => format!("Unknown command /{command}. Try /help."),
    };

    if let Err(err) = bot.send_message(msg.chat.id, reply).await {
        warn!(?err, "failed to send reply");
    }
    Ok(())
}

async fn cmd_today(ctx: &BotCtx) -> String {
    let date = today_key();
    match db::get_approved_content(&ctx.pool, &date).await {
        Ok(Some(quote)) => format_quote(&quote),
        Ok(None) => "No approved quote for today yet.".to_string(),
        Err(err) => store_failure(&err),
    }
}

async fn cmd_react(ctx: &BotCtx, msg: &Message, args: &str) -> String {
    let Some(user) = msg.from() else {
        return "Reactions need a sender.".to_string();
    };
    let mut parts = args.split_whitespace();
    let Some(kind) = parts
        .next()
        .and_then(|s| ReactionKind::parse_kind(&s.to_lowercase()))
    else {
        return "Usage: /react <love|power|sad> [YYYY-MM-DD]".to_string();
    };
    let date = match parts.next() {
        Some(d) if parse_date_key(d).is_some() => d.to_string(),
        Some(_) => return "Dates look like YYYY-MM-DD.".to_string(),
        None => today_key(),
    };

    match db::register_reaction(&ctx.pool, &date, user.id.0 as i64, kind).await {
        Ok(counts) => format!(
            "{date}: love {} | power {} | sad {}",
            counts.love, counts.power, counts.sad
        ),
        Err(err) => store_failure(&err),
    }
}

async fn cmd_queue(ctx: &BotCtx) -> String {
    let items = match db::get_all(&ctx.pool).await {
        Ok(items) => items,
        Err(err) => return store_failure(&err),
    };

    let mut lines = Vec::new();
    for key in horizon_keys() {
        let line = match items.get(&key) {
            Some(item) => {
                let marker = match item.status {
                    QueueStatus::Approved => "✅",
                    QueueStatus::Draft => "📝",
                    QueueStatus::Empty => "·",
                };
                match &item.content {
                    Some(q) => format!("{key} {marker} {}", q.author_name),
                    None => format!("{key} {marker}"),
                }
            }
            None => format!("{key} ·"),
        };
        lines.push(line);
    }
    lines.join("\n")
}

async fn cmd_show(ctx: &BotCtx, args: &str) -> String {
    let Some(date) = valid_date(args) else {
        return "Usage: /show <YYYY-MM-DD>".to_string();
    };
    match db::get(&ctx.pool, &date).await {
        Ok(Some(item)) => {
            let body = match &item.content {
                Some(q) => format_quote(q),
                None => "(no content)".to_string(),
            };
            format!(
                "{date} [{}]\n{body}\nlove {} | power {} | sad {}",
                item.status.as_str(),
                item.reactions.love,
                item.reactions.power,
                item.reactions.sad
            )
        }
        Ok(None) => format!("{date} is empty."),
        Err(err) => store_failure(&err),
    }
}

async fn cmd_generate(ctx: &BotCtx, args: &str) -> String {
    let Some(date) = valid_date(args) else {
        return "Usage: /generate <YYYY-MM-DD>".to_string();
    };
    match db::get(&ctx.pool, &date).await {
        Ok(Some(item)) if item.status == QueueStatus::Approved => {
            return format!("{date} is approved. /reject it first to regenerate.");
        }
        Err(err) => return store_failure(&err),
        _ => {}
    }
    if !ctx.in_flight.begin(&date) {
        return format!("A generation for {date} is already running.");
    }
    let result = generate::generate_for_date(&ctx.pool, &ctx.chain, &date, false).await;
    ctx.in_flight.end(&date);

    match result {
        Ok(outcome) => {
            ctx.changed.notify();
            let mut reply = format!("Draft for {date}:\n{}", format_quote(&outcome.quote));
            if let Some(notice) = outcome.degraded {
                reply.push_str(&format!(
                    "\n⚠️ Degraded: {notice}. Check provider credentials or /cooldown reset."
                ));
            }
            reply
        }
        Err(GenerateError::Exhausted { attempts, .. }) => format!(
            "Could not find a unique quote for {date} after {attempts} attempts. \
             Try again, or /edit the day manually."
        ),
        Err(GenerateError::Store(err)) => store_failure(&err),
    }
}

async fn cmd_edit(ctx: &BotCtx, args: &str) -> String {
    const USAGE: &str = "Usage: /edit <YYYY-MM-DD> | <text> | <author> | [role] | [country]";
    let mut parts = args.split('|').map(str::trim);
    let Some(date) = parts.next().and_then(valid_date) else {
        return USAGE.to_string();
    };
    let text = parts.next().unwrap_or_default();
    let author = parts.next().unwrap_or_default();
    let role = parts.next().unwrap_or_default();
    let country = parts.next().unwrap_or_default();

    // Refused before any store call.
    if text.is_empty() || author.is_empty() {
        return format!("Text and author are required.\n{USAGE}");
    }

    match db::get(&ctx.pool, &date).await {
        Ok(Some(item)) if item.status == QueueStatus::Approved => {
            return format!("{date} is approved. /reject it first to edit.");
        }
        Err(err) => return store_failure(&err),
        _ => {}
    }

    let quote = Quote {
        text: text.to_string(),
        author_name: author.to_string(),
        author_role: role.to_string(),
        author_country: country.to_string(),
    };
    match db::upsert(&ctx.pool, &date, QueueStatus::Draft, Some(&quote)).await {
        Ok(()) => {
            ctx.changed.notify();
            format!("Draft for {date} saved:\n{}", format_quote(&quote))
        }
        Err(StoreError::Duplicate { date: clash }) => {
            format!("That quote text is already scheduled for {clash}.")
        }
        Err(err) => store_failure(&err),
    }
}

async fn cmd_approve(ctx: &BotCtx, args: &str) -> String {
    let Some(date) = valid_date(args) else {
        return "Usage: /approve <YYYY-MM-DD>".to_string();
    };
    let item = match db::get(&ctx.pool, &date).await {
        Ok(Some(item)) => item,
        Ok(None) => return format!("{date} is empty — nothing to approve."),
        Err(err) => return store_failure(&err),
    };
    let Some(quote) = item.content else {
        return format!("{date} has no content — nothing to approve.");
    };
    match db::upsert(&ctx.pool, &date, QueueStatus::Approved, Some(&quote)).await {
        Ok(()) => {
            ctx.changed.notify();
            format!("✅ {date} approved.")
        }
        Err(err) => store_failure(&err),
    }
}

async fn cmd_reject(ctx: &BotCtx, args: &str) -> String {
    let Some(date) = valid_date(args) else {
        return "Usage: /reject <YYYY-MM-DD>".to_string();
    };
    let item = match db::get(&ctx.pool, &date).await {
        Ok(Some(item)) => item,
        Ok(None) => return format!("{date} is empty — nothing to reject."),
        Err(err) => return store_failure(&err),
    };
    if item.status != QueueStatus::Approved {
        return format!("{date} is not approved.");
    }
    // Content is preserved: rejection is a status transition only.
    match db::upsert(&ctx.pool, &date, QueueStatus::Draft, item.content.as_ref()).await {
        Ok(()) => {
            ctx.changed.notify();
            format!("{date} back to draft; content kept.")
        }
        Err(err) => store_failure(&err),
    }
}

fn cmd_cooldown(ctx: &BotCtx, args: &str) -> String {
    if args.eq_ignore_ascii_case("reset") {
        ctx.chain.cooldown().reset();
        return "Cooldown cleared; providers back in rotation.".to_string();
    }
    match ctx.chain.cooldown().remaining() {
        Some(left) => format!(
            "Cooling down: {}s left. /cooldown reset to clear now.",
            left.as_secs()
        ),
        None => "No active cooldown.".to_string(),
    }
}

fn valid_date(s: &str) -> Option<String> {
    parse_date_key(s.trim()).map(|_| s.trim().to_string())
}

fn format_quote(quote: &Quote) -> String {
    let mut attribution = quote.author_name.clone();
    if !quote.author_role.is_empty() {
        attribution.push_str(&format!(" | {}", quote.author_role));
    }
    if !quote.author_country.is_empty() {
        attribution.push_str(&format!(" | {}", quote.author_country));
    }
    format!("\u{201c}{}\u{201d}\n— {attribution}", quote.text)
}

fn store_failure(err: &StoreError) -> String {
    format!("Storage failure: {err}. The update was NOT saved — retry now.")
}
