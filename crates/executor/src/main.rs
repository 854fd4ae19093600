use std::sync::Arc;
use teloxide::Bot;
use tokio::sync::broadcast;
use tracing::{debug, info};

use common::actors::ActorType;
use common::config::RelayConfig;
use common::logger;
use exchange::BybitClient;

use crate::actors::supervisor::Supervisor;
use crate::processor::SignalProcessor;
use crate::services::execution_service::ExecutionService;
use crate::services::telegram_service::{TelegramListener, TelegramNotifier};

mod actors;
mod processor;
mod services;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = RelayConfig::from_env()?;
    logger::setup_logger(config.log_file.as_deref())?;
    debug!("System starting up...");
    debug!("Loaded configuration: {:?}", config);

    let client = BybitClient::new(&config.bybit)?;
    let processor = Arc::new(SignalProcessor::new(client));
    let bot = Bot::new(config.telegram.bot_token.clone());

    let (signal_tx, _) = broadcast::channel::<String>(1_000);
    let (report_tx, _) = broadcast::channel::<String>(1_000);
    let report_chat_id = config.telegram.report_chat_id;

    let mut supervisor = Supervisor::new();

    let bot_for_listener = bot.clone();
    let source = config.telegram.signal_source.clone();
    let tx_for_listener = signal_tx.clone();
    supervisor.register_actor(
        ActorType::TelegramListener,
        Box::new(move || {
            Box::new(TelegramListener::new(
                bot_for_listener.clone(),
                source.clone(),
                tx_for_listener.clone(),
            ))
        }),
    );

    let report_for_executor = report_chat_id.map(|_| report_tx.clone());
    let serialize_orders = config.serialize_orders;
    let tx_for_executor = signal_tx.clone();
    supervisor.register_actor(
        ActorType::Executor,
        Box::new(move || {
            Box::new(ExecutionService::new(
                processor.clone(),
                tx_for_executor.subscribe(),
                report_for_executor.clone(),
                serialize_orders,
            ))
        }),
    );

    match report_chat_id {
        Some(chat_id) => {
            info!("Reports will be sent to chat {}", chat_id);
            let bot_for_notifier = bot.clone();
            let tx_for_notifier = report_tx.clone();
            supervisor.register_actor(
                ActorType::Notifier,
                Box::new(move || {
                    Box::new(TelegramNotifier::new(
                        bot_for_notifier.clone(),
                        chat_id,
                        tx_for_notifier.subscribe(),
                    ))
                }),
            );
        }
        None => info!("No report chat configured, outcomes are only logged"),
    }

    supervisor.start().await;
    Ok(())
}
