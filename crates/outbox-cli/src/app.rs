//! Command implementations.

use chrono::Utc;
use event_publish_queue::{PublishQueue, QueueConfig};
use nostr_event_model::{
    parse_secret_key, verify_event, Event, LogicalKey, UnsignedEvent, KIND_KNOWLEDGE_NODE,
};
use pending_event_outbox::{OutboxEntry, OutboxStore, SqliteOutboxStore};
use publish_config_and_utils::{Config, Paths};
use relay_publish_executor::{
    relay_tallies, republish_events, PublishDeps, PublishResults, RelayCapability, RelayLists,
    User, WebSocketRelay,
};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

type CmdResult<T = ()> = Result<T, Box<dyn std::error::Error>>;

/// Hex secret key used to sign queued events.
const ENV_SECRET_KEY: &str = "NOTEGRAPH_SECRET_KEY";
const POLL_INTERVAL: Duration = Duration::from_millis(100);

async fn open_store(paths: &Paths) -> CmdResult<SqliteOutboxStore> {
    paths.ensure_dirs()?;
    Ok(SqliteOutboxStore::open(&paths.outbox_database_file()).await?)
}

fn load_user() -> CmdResult<User> {
    let hex_key = std::env::var(ENV_SECRET_KEY)
        .map_err(|_| format!("{ENV_SECRET_KEY} must hold the hex secret key to sign with"))?;
    let secret_key = parse_secret_key(&hex_key)?;
    Ok(User::local(secret_key)?)
}

fn relay_lists(config: &Config) -> RelayLists {
    RelayLists {
        defaults: config.default_relays.clone(),
        user: config.user_relays.clone(),
        contacts: Vec::new(),
    }
}

/// Show outbox size and configured relays.
pub async fn show_status(config: &Config, paths: &Paths) -> CmdResult {
    let store = open_store(paths).await?;
    let pending = store.count().await?;

    println!("Outbox: {}", paths.outbox_database_file().display());
    println!("Pending events: {pending}");
    print_relays("Default relays", &config.default_relays);
    print_relays("User relays", &config.user_relays);
    if std::env::var_os(ENV_SECRET_KEY).is_some() {
        println!("Signer: local key");
    } else {
        println!("Signer: none ({ENV_SECRET_KEY} not set)");
    }
    Ok(())
}

fn print_relays(label: &str, relays: &[String]) {
    if relays.is_empty() {
        println!("{label}: none");
    } else {
        println!("{label}: {}", relays.join(", "));
    }
}

/// Print every pending entry in publish order.
pub async fn list_pending(paths: &Paths) -> CmdResult {
    let store = open_store(paths).await?;
    let entries = store.get_pending_events().await?;
    if entries.is_empty() {
        println!("Outbox is empty");
        return Ok(());
    }
    for entry in &entries {
        println!("{}", describe_entry(entry));
    }
    Ok(())
}

fn describe_entry(entry: &OutboxEntry) -> String {
    format!(
        "{}  kind={}  queued={}",
        entry.key,
        entry.event.kind,
        entry.created_at.format("%Y-%m-%d %H:%M:%S")
    )
}

/// Remove one entry from the outbox.
pub async fn drop_entry(paths: &Paths, key: &str) -> CmdResult {
    let store = open_store(paths).await?;
    let key = LogicalKey::from(key);
    let exists = store
        .get_pending_events()
        .await?
        .iter()
        .any(|entry| entry.key == key);
    if !exists {
        println!("No pending entry {key}");
        return Ok(());
    }
    store.remove_pending_event(&key).await?;
    info!(key = %key, "Dropped pending entry");
    println!("Dropped {key}");
    Ok(())
}

/// A knowledge node event for `id`.
fn knowledge_node(pubkey: &str, id: &str, content: &str, created_at: u64) -> UnsignedEvent {
    UnsignedEvent::new(
        KIND_KNOWLEDGE_NODE,
        pubkey,
        created_at,
        vec![vec!["d".to_string(), id.to_string()]],
        content,
    )
}

/// Start a queue over the on-disk outbox, signing with the local key.
async fn start_queue(config: &Config, paths: &Paths) -> CmdResult<(PublishQueue, User)> {
    let user = load_user()?;
    let relays = relay_lists(config);
    let transport: Arc<dyn RelayCapability> = Arc::new(WebSocketRelay::new());
    let signer = user.clone();
    let deps = move || PublishDeps {
        user: Some(signer.clone()),
        relays: relays.clone(),
        relay: transport.clone(),
    };

    let store = Arc::new(open_store(paths).await?);
    let queue = PublishQueue::new(
        store,
        QueueConfig::from(config),
        Arc::new(deps),
        Arc::new(report_results),
    );
    queue.init().await;
    Ok((queue, user))
}

fn report_results(results: PublishResults) {
    println!("Delivered {} event(s)", results.len());
    for (url, tally) in relay_tallies(&results) {
        match &tally.last_reason {
            Some(reason) => println!(
                "  {url}: {}/{} accepted ({reason})",
                tally.succeeded, tally.total
            ),
            None => println!("  {url}: {}/{} accepted", tally.succeeded, tally.total),
        }
    }
}

/// Poll until the buffer is empty, Ctrl-C, or `timeout`.
async fn wait_for_delivery(queue: &PublishQueue, timeout: Duration) -> bool {
    let drained = async {
        loop {
            let status = queue.get_status();
            if status.pending_count == 0 && !status.flushing {
                return;
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    };
    tokio::select! {
        result = tokio::time::timeout(timeout, drained) => result.is_ok(),
        _ = tokio::signal::ctrl_c() => {
            warn!("Interrupted, keeping undelivered events in the outbox");
            false
        }
    }
}

async fn shut_down(queue: PublishQueue, delivered: bool) {
    let status = queue.get_status();
    queue.persist_buffer().await;
    queue.destroy();
    if delivered {
        return;
    }
    println!("{} event(s) left in the outbox", status.pending_count);
    for relay in status.backed_off_relays {
        println!("  {} backed off, retry in {}s", relay.url, relay.retry_after_secs);
    }
}

/// Enqueue one knowledge node and wait until a relay accepts it.
pub async fn publish_note(
    config: &Config,
    paths: &Paths,
    id: &str,
    content: &str,
    timeout_secs: u64,
) -> CmdResult {
    let (queue, user) = start_queue(config, paths).await?;
    let created_at = u64::try_from(Utc::now().timestamp()).unwrap_or_default();
    queue.enqueue(vec![knowledge_node(&user.pubkey, id, content, created_at)]);
    queue.flush().await;

    let delivered = wait_for_delivery(&queue, Duration::from_secs(timeout_secs)).await;
    shut_down(queue, delivered).await;
    Ok(())
}

/// Replay the outbox and publish until it is empty.
pub async fn drain(config: &Config, paths: &Paths, timeout_secs: u64) -> CmdResult {
    let (queue, _) = start_queue(config, paths).await?;
    let pending = queue.get_status().pending_count;
    if pending == 0 {
        println!("Outbox is empty");
        queue.destroy();
        return Ok(());
    }
    println!("Draining {pending} event(s)");
    queue.flush().await;

    let delivered = wait_for_delivery(&queue, Duration::from_secs(timeout_secs)).await;
    shut_down(queue, delivered).await;
    Ok(())
}

/// Read signed events from a JSON array, skipping any with a bad signature.
fn load_signed_events(path: &Path) -> CmdResult<Vec<Event>> {
    let content = std::fs::read_to_string(path)?;
    let events: Vec<Event> = serde_json::from_str(&content)?;
    let mut valid = Vec::with_capacity(events.len());
    for event in events {
        if verify_event(&event)? {
            valid.push(event);
        } else {
            warn!(event_id = %event.id, "Skipping event with invalid id or signature");
        }
    }
    Ok(valid)
}

/// Re-send signed events from `file` to `relay`.
pub async fn republish(config: &Config, relay: &str, file: &Path) -> CmdResult {
    let events = load_signed_events(file)?;
    if events.is_empty() {
        println!("No valid events in {}", file.display());
        return Ok(());
    }
    let transport = WebSocketRelay::new();
    let results = republish_events(&events, relay, &transport, config.publish_timeout()).await?;
    report_results(results);
    Ok(())
}
