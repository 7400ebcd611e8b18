//! Terminal client for the Reclaim messaging core.
//!
//! Usage:
//!   reclaim chat <item-id> <counterpart-id>   tail one conversation, send from stdin
//!   reclaim inbox <item-id>                   watch an item's grouped conversations
//!   reclaim bell                              watch notifications; type an id to mark read
//!
//! Config comes from the environment (or a .env file): RECLAIM_API_URL,
//! RECLAIM_GATEWAY_URL, RECLAIM_TOKEN, RECLAIM_USER_ID.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, bail};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::info;
use uuid::Uuid;

use reclaim_client::ApiClient;
use reclaim_gateway::Gateway;
use reclaim_sync::SyncContext;
use reclaim_sync::conversation::ConversationView;
use reclaim_sync::item_view::ItemConversationsView;
use reclaim_sync::notifications::NotificationFeed;
use reclaim_types::models::Session;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "reclaim=info".into()),
        )
        .init();

    // Config
    let api_url =
        std::env::var("RECLAIM_API_URL").unwrap_or_else(|_| "http://localhost:5000".into());
    let gateway_url = std::env::var("RECLAIM_GATEWAY_URL").unwrap_or_else(|_| {
        api_url
            .replace("http://", "ws://")
            .replace("https://", "wss://")
    });
    let token = std::env::var("RECLAIM_TOKEN").context("RECLAIM_TOKEN is required")?;
    let user_id: Uuid = std::env::var("RECLAIM_USER_ID")
        .context("RECLAIM_USER_ID is required")?
        .parse()
        .context("RECLAIM_USER_ID is not a valid uuid")?;

    let session = Session { user_id, token };
    let api = ApiClient::new(api_url, session.clone());
    let gateway = Gateway::new();
    gateway.connect(&gateway_url, &session).await?;
    info!("connected as {}", user_id);

    let ctx = SyncContext::new(api, gateway);

    let args: Vec<String> = std::env::args().skip(1).collect();
    let result = match args.first().map(String::as_str) {
        Some("chat") => {
            let (item, user) = parse_two_ids(&args)?;
            run_chat(ctx.clone(), item, user).await
        }
        Some("inbox") => {
            let item = parse_one_id(&args)?;
            run_inbox(ctx.clone(), item).await
        }
        Some("bell") => run_bell(ctx.clone()).await,
        _ => bail!("usage: reclaim chat <item-id> <counterpart-id> | inbox <item-id> | bell"),
    };

    ctx.gateway.disconnect();
    result
}

fn parse_one_id(args: &[String]) -> anyhow::Result<Uuid> {
    let raw = args.get(1).context("missing <item-id>")?;
    raw.parse().context("invalid item id")
}

fn parse_two_ids(args: &[String]) -> anyhow::Result<(Uuid, Uuid)> {
    let item = args.get(1).context("missing <item-id>")?;
    let user = args.get(2).context("missing <counterpart-id>")?;
    Ok((
        item.parse().context("invalid item id")?,
        user.parse().context("invalid counterpart id")?,
    ))
}

async fn run_chat(ctx: Arc<SyncContext>, item_id: Uuid, counterpart_id: Uuid) -> anyhow::Result<()> {
    let me = ctx.session().user_id;
    let view = ConversationView::open(ctx, item_id, counterpart_id);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut ticker = tokio::time::interval(Duration::from_millis(300));
    let mut printed = 0usize;
    let mut announced = false;

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let state = view.snapshot();
                if !announced {
                    if state.failed {
                        println!("could not load this conversation");
                        announced = true;
                    } else if !state.loading {
                        match &state.counterpart_name {
                            Some(name) => println!("-- conversation with {name} --"),
                            None => println!("-- no messages yet, say hello --"),
                        }
                        announced = true;
                    }
                }
                let start = printed.min(state.messages.len());
                for msg in &state.messages[start..] {
                    let who = if msg.sender.id == me {
                        "me".to_string()
                    } else {
                        msg.sender
                            .display_name
                            .clone()
                            .unwrap_or_else(|| "them".to_string())
                    };
                    println!("[{}] {}: {}", msg.created_at.format("%H:%M:%S"), who, msg.content);
                }
                printed = state.messages.len();
            }
            line = lines.next_line() => match line? {
                Some(line) if line.trim() == "/quit" => break,
                Some(line) => {
                    if let Err(err) = view.send(&line) {
                        eprintln!("cannot send: {err}");
                    }
                }
                None => break,
            },
        }
    }

    Ok(())
}

async fn run_inbox(ctx: Arc<SyncContext>, item_id: Uuid) -> anyhow::Result<()> {
    let view = ItemConversationsView::open(ctx, item_id);

    let mut ticker = tokio::time::interval(Duration::from_millis(500));
    let mut last_render = String::new();

    loop {
        ticker.tick().await;
        let state = view.snapshot();
        if state.loading {
            continue;
        }
        if state.failed {
            println!("failed to load conversations");
            break;
        }

        let mut render = String::new();
        for convo in &state.conversations {
            let name = convo
                .counterpart
                .display_name
                .clone()
                .unwrap_or_else(|| convo.counterpart.id.to_string());
            let online = if state.online.contains(&convo.counterpart.id) {
                "online"
            } else {
                "offline"
            };
            let unread = state.unread_for(convo.counterpart.id);
            render.push_str(&format!(
                "{} [{}] unread={} | {} ({})\n",
                name,
                online,
                unread,
                convo.last_message,
                convo.last_activity.format("%H:%M:%S"),
            ));
        }
        if render.is_empty() {
            render = "no conversations yet for this item\n".into();
        }

        if render != last_render {
            print!("{render}");
            println!("--");
            last_render = render;
        }
    }

    Ok(())
}

async fn run_bell(ctx: Arc<SyncContext>) -> anyhow::Result<()> {
    let feed = NotificationFeed::open(ctx);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut ticker = tokio::time::interval(Duration::from_millis(500));
    let mut seen = 0usize;

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let state = feed.snapshot();
                if state.loading {
                    continue;
                }
                if state.notifications.len() != seen {
                    for n in &state.notifications {
                        let who = n
                            .sender
                            .display_name
                            .clone()
                            .unwrap_or_else(|| n.sender.id.to_string());
                        let flag = if n.is_read { " " } else { "*" };
                        println!("{flag} {} {} sent you a message ({})", n.id, who, n.created_at);
                    }
                    println!("unread: {}", state.unread_count());
                    seen = state.notifications.len();
                }
            }
            line = lines.next_line() => match line? {
                Some(line) if line.trim() == "/quit" => break,
                Some(line) => match line.trim().parse::<Uuid>() {
                    Ok(id) => match feed.mark_read(id) {
                        Some(target) => println!(
                            "open conversation: item {} with {}",
                            target.item_id, target.counterpart_id
                        ),
                        None => eprintln!("no such notification"),
                    },
                    Err(_) => eprintln!("type a notification id to mark it read, /quit to exit"),
                },
                None => break,
            },
        }
    }

    Ok(())
}
