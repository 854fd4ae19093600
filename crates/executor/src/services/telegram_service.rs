use anyhow::bail;
use async_trait::async_trait;
use teloxide::prelude::*;
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, error, info, warn};

use common::actors::{Actor, ActorType, ControlMessage};
use common::config::SignalSource;

/// Receives bot updates and forwards text from the signal source to the executor.
pub struct TelegramListener {
    bot: Bot,
    source: SignalSource,
    signal_tx: broadcast::Sender<String>,
}

impl TelegramListener {
    pub fn new(bot: Bot, source: SignalSource, signal_tx: broadcast::Sender<String>) -> Self {
        Self {
            bot,
            source,
            signal_tx,
        }
    }
}

#[async_trait]
impl Actor for TelegramListener {
    fn name(&self) -> ActorType {
        ActorType::TelegramListener
    }

    async fn run(&mut self, _supervisor_tx: mpsc::Sender<ControlMessage>) -> anyhow::Result<()> {
        info!("Starting Telegram Listener (source: {})", self.source);
        warn_on_bot_sender(&self.source);

        let handler = dptree::entry()
            .branch(Update::filter_message().endpoint(relay_message))
            .branch(Update::filter_channel_post().endpoint(relay_message));

        Dispatcher::builder(self.bot.clone(), handler)
            .dependencies(dptree::deps![self.source.clone(), self.signal_tx.clone()])
            .default_handler(|_| async {})
            .build()
            .dispatch()
            .await;

        bail!("Telegram dispatcher stopped");
    }
}

async fn relay_message(
    msg: Message,
    source: SignalSource,
    signal_tx: broadcast::Sender<String>,
) -> ResponseResult<()> {
    if !is_from_source(&msg, &source) {
        debug!("Ignoring message from chat {}", msg.chat.id);
        return Ok(());
    }

    let Some(text) = msg.text() else {
        debug!("Ignoring non-text message from {}", source);
        return Ok(());
    };

    info!("Bot response received: {}", text);
    if signal_tx.send(text.to_string()).is_err() {
        warn!("No executor listening, signal dropped");
    }
    Ok(())
}

/// Bots never see each other's direct or group messages, only channel posts.
fn warn_on_bot_sender(source: &SignalSource) {
    match source {
        SignalSource::Id(_) if source.is_account_id() => warn!(
            "Signal source {} is a user or bot id. If it is a bot, its messages never reach \
             this bot; use the id of a channel it posts to, with this bot as admin",
            source
        ),
        SignalSource::Username(_) => info!(
            "Signal source {} must be a channel with this bot as admin, or a human account",
            source
        ),
        SignalSource::Id(_) => {}
    }
}

/// Channel posts carry no sender, so the chat itself is matched as well.
fn is_from_source(msg: &Message, source: &SignalSource) -> bool {
    let mut ids = vec![msg.chat.id.0];
    let mut usernames = Vec::new();

    if let Some(user) = msg.from.as_ref() {
        ids.push(user.id.0 as i64);
        if let Some(name) = user.username.as_deref() {
            usernames.push(name);
        }
    }
    if let Some(name) = msg.chat.username() {
        usernames.push(name);
    }

    source.matches(&ids, &usernames)
}

/// Sends cycle reports to the configured report chat.
pub struct TelegramNotifier {
    bot: Bot,
    chat_id: ChatId,
    report_rx: broadcast::Receiver<String>,
}

impl TelegramNotifier {
    pub fn new(bot: Bot, chat_id: i64, report_rx: broadcast::Receiver<String>) -> Self {
        Self {
            bot,
            chat_id: ChatId(chat_id),
            report_rx,
        }
    }
}

#[async_trait]
impl Actor for TelegramNotifier {
    fn name(&self) -> ActorType {
        ActorType::Notifier
    }

    async fn run(&mut self, _supervisor_tx: mpsc::Sender<ControlMessage>) -> anyhow::Result<()> {
        info!("Starting Telegram Notification Service");

        loop {
            match self.report_rx.recv().await {
                Ok(report) => {
                    // A failed send is logged, the next report still goes out
                    if let Err(e) = self.bot.send_message(self.chat_id, report).await {
                        error!("Failed to send Telegram message: {}", e);
                    }
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    error!("Telegram notifier lagged behind. Missed {} reports.", n);
                }
                Err(broadcast::error::RecvError::Closed) => {
                    info!("Report channel closed. Stopping notifier.");
                    return Ok(());
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const SIGNAL: &str = "Symbol: BTCUSDT\nPrice: 100\nStop Loss: 90\nTake Profit: 120";

    fn message(value: serde_json::Value) -> Message {
        serde_json::from_value(value).unwrap()
    }

    fn channel_post(body: serde_json::Value) -> Message {
        let mut value = json!({
            "message_id": 10,
            "date": 1700000000,
            "chat": {
                "id": -1001234567890i64,
                "title": "Signals",
                "username": "SignalChannel",
                "type": "channel"
            }
        });
        if let (Some(target), Some(extra)) = (value.as_object_mut(), body.as_object()) {
            target.extend(extra.clone());
        }
        message(value)
    }

    fn group_message(from_id: u64, from_username: &str) -> Message {
        message(json!({
            "message_id": 11,
            "date": 1700000000,
            "chat": { "id": -4001, "title": "Traders", "type": "group" },
            "from": {
                "id": from_id,
                "is_bot": false,
                "first_name": "Eve",
                "username": from_username
            },
            "text": SIGNAL
        }))
    }

    fn private_message(from_id: u64, from_username: &str) -> Message {
        message(json!({
            "message_id": 12,
            "date": 1700000000,
            "chat": {
                "id": from_id,
                "first_name": "Sam",
                "username": from_username,
                "type": "private"
            },
            "from": {
                "id": from_id,
                "is_bot": false,
                "first_name": "Sam",
                "username": from_username
            },
            "text": SIGNAL
        }))
    }

    #[test]
    fn test_channel_post_matches_by_chat_username_and_id() {
        let post = channel_post(json!({ "text": SIGNAL }));
        assert!(is_from_source(&post, &"@signalchannel".parse().unwrap()));
        assert!(is_from_source(&post, &"-1001234567890".parse().unwrap()));
        assert!(!is_from_source(&post, &"@otherchannel".parse().unwrap()));
    }

    #[test]
    fn test_sender_matches_by_user_id_or_username() {
        let dm = private_message(777, "TraderSam");
        assert!(is_from_source(&dm, &"777".parse().unwrap()));
        assert!(is_from_source(&dm, &"@tradersam".parse().unwrap()));

        let group = group_message(555, "eve");
        assert!(is_from_source(&group, &"555".parse().unwrap()));
        assert!(!is_from_source(&group, &"@tradersam".parse().unwrap()));
    }

    #[tokio::test]
    async fn test_relays_text_from_source() {
        let (signal_tx, mut signal_rx) = broadcast::channel(4);
        let post = channel_post(json!({ "text": SIGNAL }));

        relay_message(post, "@signalchannel".parse().unwrap(), signal_tx)
            .await
            .unwrap();

        assert_eq!(signal_rx.try_recv().unwrap(), SIGNAL);
    }

    #[tokio::test]
    async fn test_ignores_other_senders() {
        let (signal_tx, mut signal_rx) = broadcast::channel(4);

        relay_message(
            group_message(555, "eve"),
            "@signalchannel".parse().unwrap(),
            signal_tx,
        )
        .await
        .unwrap();

        assert!(signal_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_ignores_non_text_from_source() {
        let (signal_tx, mut signal_rx) = broadcast::channel(4);
        let post = channel_post(json!({
            "location": { "latitude": 51.5, "longitude": -0.12 }
        }));
        assert!(post.text().is_none());

        relay_message(post, "@signalchannel".parse().unwrap(), signal_tx)
            .await
            .unwrap();

        assert!(signal_rx.try_recv().is_err());
    }
}
