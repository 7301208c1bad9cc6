use std::sync::Arc;

use teloxide::prelude::*;

use lnb_core::{
    domain::{ChatId, UserId},
    reports::ReportKind,
    security::is_authorized,
};

use crate::router::AppState;

use super::{send_report, UNAUTHORIZED};

/// How a menu button press is answered, and the report sent after it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct CallbackReply {
    /// Toast text for the callback answer; `None` just stops the spinner.
    pub answer: Option<&'static str>,
    pub report: Option<ReportKind>,
}

pub(crate) fn decide_callback(user: Option<UserId>, data: &str, allowed: &[i64]) -> CallbackReply {
    if !is_authorized(user, allowed) {
        return CallbackReply {
            answer: Some(UNAUTHORIZED),
            report: None,
        };
    }
    match ReportKind::from_callback(data) {
        Some(kind) => CallbackReply {
            answer: None,
            report: Some(kind),
        },
        None => CallbackReply {
            answer: Some("Unknown option"),
            report: None,
        },
    }
}

pub async fn handle_callback(q: CallbackQuery, state: Arc<AppState>) -> ResponseResult<()> {
    let chat_id = q.message.as_ref().map(|m| ChatId(m.chat.id.0));
    let user_id = Some(UserId(q.from.id.0 as i64));
    let data = q.data.as_deref().unwrap_or_default();
    process_callback(&state, &q.id, user_id, chat_id, data).await;
    Ok(())
}

/// Every press is answered exactly once, before any report is rendered.
pub(crate) async fn process_callback(
    state: &AppState,
    cb_id: &str,
    user_id: Option<UserId>,
    chat_id: Option<ChatId>,
    data: &str,
) {
    let reply = decide_callback(user_id, data, &state.cfg.telegram_allowed_users);
    if reply.answer == Some(UNAUTHORIZED) {
        tracing::warn!(user_id = ?user_id.map(|u| u.0), "rejected callback from unauthorized user");
    }
    let _ = state.messenger.answer_callback_query(cb_id, reply.answer).await;

    // Buttons on messages too old to carry their chat cannot be replied to.
    let (Some(kind), Some(chat_id)) = (reply.report, chat_id) else {
        return;
    };
    tracing::debug!(report = kind.callback_data(), "menu selection");
    send_report(
        state.messenger.as_ref(),
        &state.reports,
        chat_id,
        kind,
        state.cfg.telegram_safe_limit,
    )
    .await;
}
