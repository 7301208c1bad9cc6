/// Inline keyboard (buttons) used for the report menu.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InlineKeyboard {
    pub rows: Vec<Vec<InlineButton>>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InlineButton {
    pub label: String,
    pub callback_data: String,
}

impl InlineKeyboard {
    /// Lays buttons out `per_row` at a time, keeping their order.
    pub fn grid(buttons: Vec<InlineButton>, per_row: usize) -> Self {
        let per_row = per_row.max(1);
        let mut rows: Vec<Vec<InlineButton>> = Vec::new();
        for button in buttons {
            match rows.last_mut() {
                Some(row) if row.len() < per_row => row.push(button),
                _ => rows.push(vec![button]),
            }
        }
        Self { rows }
    }
}

/// Transport limits of a messenger implementation.
#[derive(Clone, Copy, Debug)]
pub struct MessagingCapabilities {
    pub max_message_len: usize,
}
