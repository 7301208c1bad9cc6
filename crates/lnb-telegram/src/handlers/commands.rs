use std::{fmt::Write as _, time::Duration};

use lnb_core::{
    domain::ChatId,
    formatting::format_duration,
    outbox::Source,
    reports::{menu_keyboard, ReportKind},
};

use crate::router::AppState;

use super::send_report;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Command {
    Start,
    Help,
    Monitors,
    Report(ReportKind),
}

fn parse_command(text: &str) -> (String, String) {
    // Telegram may send `/cmd@botname arg1 ...`
    let mut parts = text.trim().splitn(2, char::is_whitespace);
    let first = parts.next().unwrap_or("").trim();
    let rest = parts.next().unwrap_or("").trim().to_string();

    let cmd = first
        .trim_start_matches('/')
        .split('@')
        .next()
        .unwrap_or("")
        .to_lowercase();

    (cmd, rest)
}

impl Command {
    fn from_name(cmd: &str) -> Option<Self> {
        match cmd {
            "start" | "menu" => Some(Command::Start),
            "help" => Some(Command::Help),
            "monitors" => Some(Command::Monitors),
            other => ReportKind::from_command(other).map(Command::Report),
        }
    }
}

fn help_text() -> String {
    let mut out = String::from(
        "<b>Lightning node bot</b>\n\n\
         /start - show the report menu\n\
         /help - this message\n\
         /monitors - background notifications",
    );
    for kind in ReportKind::ALL {
        let _ = write!(out, "\n/{} - {}", kind.command(), kind.label());
    }
    out
}

fn monitors_text(started: &[Source], poll_interval: Duration, resubscribe_delay: Duration) -> String {
    if started.is_empty() {
        return "🔕 No background monitors are running.".to_string();
    }
    let mut out = format!(
        "🔔 Background monitors (polling every {}):",
        format_duration(poll_interval)
    );
    for source in started {
        let detail = match source {
            Source::Channels => "opened, offline, back online, closed",
            Source::Invoices => "settled invoices (polled)",
            Source::Payments => "new outgoing payments",
            Source::Transactions => "new on-chain transactions",
            Source::Forwards => "new forwarding events",
            Source::Settlements => "incoming payments (live stream)",
            Source::Supervisor => continue,
        };
        let _ = write!(out, "\n• {source}: {detail}");
    }
    if started.contains(&Source::Settlements) {
        let _ = write!(
            out,
            "\nStream reconnects after {}.",
            format_duration(resubscribe_delay)
        );
    }
    out
}

pub(crate) async fn handle_command(state: &AppState, chat_id: ChatId, text: &str) {
    let (cmd, _args) = parse_command(text);

    let Some(command) = Command::from_name(&cmd) else {
        let _ = state
            .messenger
            .send_html(chat_id, "Unknown command. Send /help for the list.")
            .await;
        return;
    };
    tracing::debug!(command = %cmd, "command received");

    match command {
        Command::Start => {
            let _ = state
                .messenger
                .send_inline_keyboard(chat_id, "Choose an option:", menu_keyboard())
                .await;
        }
        Command::Help => {
            let _ = state.messenger.send_html(chat_id, &help_text()).await;
        }
        Command::Monitors => {
            let text = monitors_text(
                &state.monitors,
                state.cfg.poll_interval,
                state.cfg.resubscribe_delay,
            );
            let _ = state.messenger.send_html(chat_id, &text).await;
        }
        Command::Report(kind) => {
            send_report(
                state.messenger.as_ref(),
                &state.reports,
                chat_id,
                kind,
                state.cfg.telegram_safe_limit,
            )
            .await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use super::*;

    #[test]
    fn strips_slash_and_bot_name() {
        assert_eq!(
            parse_command("/NodeInfo@my_node_bot extra"),
            ("nodeinfo".to_string(), "extra".to_string())
        );
        assert_eq!(parse_command("/channels"), ("channels".to_string(), String::new()));
    }

    #[test]
    fn maps_names_to_commands() {
        assert_eq!(Command::from_name("start"), Some(Command::Start));
        assert_eq!(Command::from_name("monitors"), Some(Command::Monitors));
        assert_eq!(
            Command::from_name("closed"),
            Some(Command::Report(ReportKind::ClosedChannels))
        );
        assert_eq!(
            Command::from_name("transactions"),
            Some(Command::Report(ReportKind::Transactions))
        );
        assert_eq!(Command::from_name("shutdown"), None);
    }

    #[test]
    fn help_lists_every_report_command() {
        let help = help_text();
        for kind in ReportKind::ALL {
            assert!(help.contains(&format!("/{} ", kind.command())), "{help}");
        }
    }

    #[tokio::test]
    async fn start_sends_the_report_menu() {
        let (state, messenger) = app_state(vec![7]);
        handle_command(&state, ChatId(1), "/start@my_node_bot").await;
        let keyboards = messenger.keyboards.lock().unwrap();
        assert_eq!(keyboards.len(), 1);
        assert_eq!(keyboards[0].0, "Choose an option:");
        assert_eq!(keyboards[0].1, menu_keyboard());
        assert!(messenger.sends.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn unknown_command_gets_a_hint() {
        let (state, messenger) = app_state(vec![7]);
        handle_command(&state, ChatId(1), "/shutdown now").await;
        assert_eq!(
            *messenger.sends.lock().unwrap(),
            vec!["Unknown command. Send /help for the list.".to_string()]
        );
    }

    #[test]
    fn monitors_summary() {
        let text = monitors_text(
            &[Source::Channels, Source::Settlements],
            Duration::from_secs(60),
            Duration::from_secs(30),
        );
        assert!(text.starts_with("🔔 Background monitors (polling every 1m 0s):"));
        assert!(text.contains("• channels: opened, offline, back online, closed"));
        assert!(text.contains("• settlements: incoming payments (live stream)"));
        assert!(text.ends_with("Stream reconnects after 30s."));

        assert_eq!(
            monitors_text(&[], Duration::from_secs(60), Duration::from_secs(30)),
            "🔕 No background monitors are running."
        );
    }
}
