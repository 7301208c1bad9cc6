use std::sync::Arc;

use teloxide::{dispatching::Dispatcher, dptree, prelude::*};

use lnb_core::{
    config::Config,
    messaging::port::MessagingPort,
    monitor,
    outbox::{run_delivery, DeliveryConfig, Notification, Outbox, Source},
    ports::{HostProbe, MarketData, NodeConnector},
    reports::{ReportLimits, Reports},
    supervisor::{WorkerExit, WorkerGroup},
};

use crate::handlers;
use crate::TelegramMessenger;

#[derive(Clone)]
pub struct AppState {
    pub cfg: Arc<Config>,
    pub reports: Arc<Reports>,
    pub messenger: Arc<dyn MessagingPort>,
    /// Background monitors that were started, for `/monitors`.
    pub monitors: Vec<Source>,
}

/// Collaborators the bot reads from.
pub struct Backends {
    pub node: Arc<dyn NodeConnector>,
    pub market: Arc<dyn MarketData>,
    pub host: Arc<dyn HostProbe>,
}

pub async fn run_polling(cfg: Arc<Config>, backends: Backends) -> anyhow::Result<()> {
    let bot = Bot::new(cfg.telegram_bot_token.clone());

    match bot.get_me().await {
        Ok(me) => tracing::info!(username = %me.username(), "bot started"),
        Err(e) => tracing::warn!("getMe failed: {e}"),
    }
    tracing::info!(
        chat_id = cfg.notify_chat_id.0,
        allowed_users = cfg.telegram_allowed_users.len(),
        lnd = %cfg.lnd.rest_url,
        "configuration loaded"
    );

    // Replies and notifications go through separate messenger instances; the
    // delivery task owns its own.
    let messenger: Arc<dyn MessagingPort> = Arc::new(TelegramMessenger::new(bot.clone()));
    let delivery_messenger: Arc<dyn MessagingPort> = Arc::new(TelegramMessenger::new(bot.clone()));

    let (outbox, rx) = Outbox::channel(cfg.notify_queue_capacity);
    let mut group = WorkerGroup::new();
    let delivery = run_delivery(
        rx,
        delivery_messenger,
        DeliveryConfig {
            chat_id: cfg.notify_chat_id,
            min_interval: cfg.notify_min_interval,
        },
        group.token(),
    );
    group.spawn("notification delivery", delivery);

    let monitors = monitor::spawn_enabled(&mut group, &cfg, backends.node.clone(), &outbox);
    tracing::info!(
        monitors = ?monitors.iter().map(|s| s.as_str()).collect::<Vec<_>>(),
        "background monitors started"
    );

    let reports = Arc::new(Reports::new(
        backends.node,
        backends.market,
        backends.host,
        ReportLimits {
            recent_items: cfg.recent_items,
            forwarding_window: cfg.forwarding_window,
        },
    ));

    let state = Arc::new(AppState {
        cfg: cfg.clone(),
        reports,
        messenger,
        monitors,
    });

    let handler = dptree::entry()
        .branch(Update::filter_callback_query().endpoint(handlers::handle_callback))
        .branch(Update::filter_message().endpoint(handlers::handle_message));

    let mut dispatcher = Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![state])
        .enable_ctrlc_handler()
        .build();

    {
        let dispatch = dispatcher.dispatch();
        tokio::pin!(dispatch);
        let mut workers_alive = true;
        loop {
            tokio::select! {
                _ = &mut dispatch => break,
                exit = group.next_exit(), if workers_alive => match exit {
                    Some(exit) => report_exit(&exit, &outbox),
                    None => workers_alive = false,
                },
            }
        }
    }

    tracing::info!("dispatcher stopped; shutting down background workers");
    drop(outbox);
    for exit in group.shutdown(cfg.shutdown_grace).await {
        tracing::info!("{exit}");
    }
    Ok(())
}

fn report_exit(exit: &WorkerExit, outbox: &Outbox) {
    if !exit.is_unexpected() {
        tracing::info!("{exit}");
        return;
    }
    tracing::error!("background worker exited: {exit}");
    let html = format!(
        "🚨 Background worker {}",
        lnb_core::formatting::escape_html(&exit.to_string())
    );
    if let Err(e) = outbox.try_send(Notification::new(Source::Supervisor, html)) {
        tracing::warn!("could not report worker exit: {e}");
    }
}
