//! Telegram update handlers.
//!
//! Every handler checks the allow-list first, then renders a report or a
//! static reply through the messaging port.

use std::sync::Arc;

use teloxide::{
    prelude::*,
    types::{CallbackQuery, Message},
};

use lnb_core::{
    domain::{ChatId, UserId},
    formatting::split_message,
    messaging::port::MessagingPort,
    reports::{ReportKind, Reports},
    security::is_authorized,
};

use crate::router::AppState;

mod callback;
mod commands;

const UNAUTHORIZED: &str = "Unauthorized";

pub async fn handle_callback(q: CallbackQuery, state: Arc<AppState>) -> ResponseResult<()> {
    callback::handle_callback(q, state).await
}

pub async fn handle_message(msg: Message, state: Arc<AppState>) -> ResponseResult<()> {
    let user_id = msg.from().map(|u| UserId(u.id.0 as i64));
    process_message(&state, ChatId(msg.chat.id.0), user_id, msg.text()).await;
    Ok(())
}

pub(crate) async fn process_message(
    state: &AppState,
    chat_id: ChatId,
    user_id: Option<UserId>,
    text: Option<&str>,
) {
    if !is_authorized(user_id, &state.cfg.telegram_allowed_users) {
        tracing::warn!(user_id = ?user_id.map(|u| u.0), "rejected message from unauthorized user");
        let _ = state.messenger.send_html(chat_id, UNAUTHORIZED).await;
        return;
    }

    match text {
        Some(text) if text.starts_with('/') => {
            commands::handle_command(state, chat_id, text).await;
        }
        _ => {
            let _ = state
                .messenger
                .send_html(chat_id, "Send /start to open the menu.")
                .await;
        }
    }
}

/// Render `kind` and send it, split to fit the transport.
pub(crate) async fn send_report(
    messenger: &dyn MessagingPort,
    reports: &Reports,
    chat_id: ChatId,
    kind: ReportKind,
    safe_limit: usize,
) {
    let text = reports.render(kind).await;
    let limit = safe_limit.min(messenger.capabilities().max_message_len);
    for chunk in split_message(&text, limit) {
        if let Err(e) = messenger.send_html(chat_id, &chunk).await {
            tracing::warn!(report = kind.callback_data(), "failed to send report: {e}");
            break;
        }
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::{
        path::PathBuf,
        sync::{Arc, Mutex},
        time::Duration,
    };

    use async_trait::async_trait;
    use lnb_core::{
        config::{Config, LndConfig, MonitorToggles},
        domain::{ChatId, MessageId, MessageRef},
        errors::Error,
        host::HostMetrics,
        messaging::{
            port::MessagingPort,
            types::{InlineKeyboard, MessagingCapabilities},
        },
        node::{BtcPrice, FeeEstimates},
        ports::{HostProbe, LightningNode, MarketData, NodeConnector},
        reports::{ReportLimits, Reports},
        Result,
    };

    use crate::router::AppState;

    #[derive(Default)]
    pub struct RecordingMessenger {
        pub max_len: usize,
        pub sends: Mutex<Vec<String>>,
        pub keyboards: Mutex<Vec<(String, InlineKeyboard)>>,
        pub answers: Mutex<Vec<Option<String>>>,
    }

    #[async_trait]
    impl MessagingPort for RecordingMessenger {
        fn capabilities(&self) -> MessagingCapabilities {
            MessagingCapabilities {
                max_message_len: if self.max_len == 0 { 4096 } else { self.max_len },
            }
        }

        async fn send_html(&self, chat_id: ChatId, html: &str) -> Result<MessageRef> {
            self.sends.lock().unwrap().push(html.to_string());
            Ok(MessageRef {
                chat_id,
                message_id: MessageId(1),
            })
        }

        async fn send_inline_keyboard(
            &self,
            chat_id: ChatId,
            text: &str,
            keyboard: InlineKeyboard,
        ) -> Result<MessageRef> {
            self.keyboards
                .lock()
                .unwrap()
                .push((text.to_string(), keyboard));
            Ok(MessageRef {
                chat_id,
                message_id: MessageId(2),
            })
        }

        async fn answer_callback_query(&self, _id: &str, text: Option<&str>) -> Result<()> {
            self.answers
                .lock()
                .unwrap()
                .push(text.map(str::to_string));
            Ok(())
        }
    }

    /// Node that is never reachable.
    pub struct DownNode;

    #[async_trait]
    impl NodeConnector for DownNode {
        async fn connect(&self) -> Result<Arc<dyn LightningNode>> {
            Err(Error::Rpc("failed to connect to all addresses".to_string()))
        }
    }

    pub struct StaticMarket;

    #[async_trait]
    impl MarketData for StaticMarket {
        async fn btc_price(&self) -> Result<BtcPrice> {
            Ok(BtcPrice {
                time: 1_700_000_000,
                usd: 40_000.0,
                eur: 37_000.0,
            })
        }

        async fn recommended_fees(&self) -> Result<FeeEstimates> {
            Ok(FeeEstimates {
                fastest: 12,
                half_hour: 10,
                hour: 8,
                economy: 4,
                minimum: 1,
            })
        }
    }

    pub struct NoHost;

    #[async_trait]
    impl HostProbe for NoHost {
        async fn sample(&self) -> Result<HostMetrics> {
            Err(Error::External("probe unavailable".to_string()))
        }
    }

    pub fn reports() -> Reports {
        Reports::new(
            Arc::new(DownNode),
            Arc::new(StaticMarket),
            Arc::new(NoHost),
            ReportLimits::default(),
        )
    }

    pub fn config(allowed_users: Vec<i64>) -> Config {
        Config {
            telegram_bot_token: "test-token".to_string(),
            notify_chat_id: ChatId(1),
            telegram_allowed_users: allowed_users,
            telegram_safe_limit: 4000,
            lnd: LndConfig {
                rest_url: "https://localhost:8080".to_string(),
                tls_cert_path: PathBuf::from("tls.cert"),
                macaroon_path: PathBuf::from("admin.macaroon"),
                rpc_timeout: Duration::from_secs(30),
            },
            poll_interval: Duration::from_secs(60),
            resubscribe_delay: Duration::from_secs(30),
            monitors: MonitorToggles::default(),
            notify_queue_capacity: 64,
            notify_min_interval: Duration::from_millis(1050),
            shutdown_grace: Duration::from_secs(5),
            recent_items: 10,
            forwarding_window: Duration::from_secs(24 * 3600),
            market_api_url: "https://mempool.space/api".to_string(),
            http_timeout: Duration::from_secs(10),
        }
    }

    /// Handler state over a recording messenger, returned alongside it.
    pub fn app_state(allowed_users: Vec<i64>) -> (AppState, Arc<RecordingMessenger>) {
        let messenger = Arc::new(RecordingMessenger::default());
        let state = AppState {
            cfg: Arc::new(config(allowed_users)),
            reports: Arc::new(reports()),
            messenger: messenger.clone(),
            monitors: Vec::new(),
        };
        (state, messenger)
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;

    #[tokio::test]
    async fn node_failure_is_sent_as_single_error_reply() {
        let messenger = RecordingMessenger::default();
        send_report(&messenger, &reports(), ChatId(1), ReportKind::NodeInfo, 4000).await;
        assert_eq!(
            *messenger.sends.lock().unwrap(),
            vec!["❌ Error retrieving node info: failed to connect to all addresses".to_string()]
        );
    }

    #[tokio::test]
    async fn long_reports_are_split_to_transport_limit() {
        let messenger = RecordingMessenger {
            max_len: 40,
            ..Default::default()
        };
        send_report(&messenger, &reports(), ChatId(1), ReportKind::Fees, 4000).await;
        let sends = messenger.sends.lock().unwrap();
        assert!(sends.len() > 1);
        assert!(sends.iter().all(|s| s.len() <= 40));
        assert!(sends[0].starts_with("⛽ Recommended Fees"));
    }

    #[tokio::test]
    async fn unauthorized_message_gets_single_rejection() {
        let (state, messenger) = app_state(vec![7]);
        process_message(&state, ChatId(1), Some(UserId(9)), Some("/price")).await;
        assert_eq!(
            *messenger.sends.lock().unwrap(),
            vec!["Unauthorized".to_string()]
        );

        process_message(&state, ChatId(1), None, Some("/start")).await;
        assert_eq!(messenger.sends.lock().unwrap().len(), 2);
        assert!(messenger.keyboards.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn authorized_commands_and_plain_text() {
        let (state, messenger) = app_state(vec![7]);
        process_message(&state, ChatId(1), Some(UserId(7)), Some("/start")).await;
        assert_eq!(messenger.keyboards.lock().unwrap().len(), 1);

        process_message(&state, ChatId(1), Some(UserId(7)), Some("hello")).await;
        process_message(&state, ChatId(1), Some(UserId(7)), None).await;
        assert_eq!(
            *messenger.sends.lock().unwrap(),
            vec![
                "Send /start to open the menu.".to_string(),
                "Send /start to open the menu.".to_string()
            ]
        );
    }
}
