//! In-memory port implementations shared by the unit tests.

use std::{
    collections::VecDeque,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Mutex,
    },
};

use async_trait::async_trait;

use crate::{
    domain::{ChatId, MessageId, MessageRef},
    errors::Error,
    host::HostMetrics,
    messaging::{
        port::MessagingPort,
        types::{InlineKeyboard, MessagingCapabilities},
    },
    node::*,
    ports::{HostProbe, InvoiceStream, LightningNode, MarketData, NodeConnector},
    Result,
};

#[derive(Default)]
pub struct FakeMessenger {
    pub sends: Mutex<Vec<(ChatId, String)>>,
    pub keyboards: Mutex<Vec<(ChatId, String, InlineKeyboard)>>,
    pub fail_on: Option<String>,
}

impl FakeMessenger {
    pub fn sent(&self) -> Vec<String> {
        self.sends
            .lock()
            .unwrap()
            .iter()
            .map(|(_, s)| s.clone())
            .collect()
    }
}

#[async_trait]
impl MessagingPort for FakeMessenger {
    fn capabilities(&self) -> MessagingCapabilities {
        MessagingCapabilities {
            max_message_len: 4096,
        }
    }

    async fn send_html(&self, chat_id: ChatId, html: &str) -> Result<MessageRef> {
        if self.fail_on.as_deref() == Some(html) {
            return Err(Error::External("telegram error: blocked".to_string()));
        }
        let mut sends = self.sends.lock().unwrap();
        sends.push((chat_id, html.to_string()));
        Ok(MessageRef {
            chat_id,
            message_id: MessageId(sends.len() as i32),
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
            .push((chat_id, text.to_string(), keyboard));
        Ok(MessageRef {
            chat_id,
            message_id: MessageId(0),
        })
    }

    async fn answer_callback_query(&self, _callback_id: &str, _text: Option<&str>) -> Result<()> {
        Ok(())
    }
}

/// Node calls a [`FakeNode`] can be told to fail.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Call {
    GetInfo,
    WalletBalance,
    ListChannels,
    ClosedChannels,
    ListInvoices,
    GetTransactions,
    ListPayments,
    ForwardingHistory,
    SubscribeInvoices,
}

#[derive(Clone, Default)]
pub struct FakeNode {
    pub info: NodeInfo,
    pub balance: WalletBalance,
    pub channels: Vec<Channel>,
    pub closed: Vec<ClosedChannel>,
    pub invoices: Vec<Invoice>,
    pub transactions: Vec<Transaction>,
    pub payments: Vec<Payment>,
    pub forwards: Vec<ForwardingEvent>,
    /// Replayed by `subscribe_invoices`, then the stream ends.
    pub invoice_updates: Vec<Invoice>,
    pub failing: Vec<Call>,
}

impl FakeNode {
    fn check(&self, call: Call) -> Result<()> {
        if self.failing.contains(&call) {
            return Err(Error::Rpc(format!("{call:?} unavailable")));
        }
        Ok(())
    }
}

#[async_trait]
impl LightningNode for FakeNode {
    async fn get_info(&self) -> Result<NodeInfo> {
        self.check(Call::GetInfo)?;
        Ok(self.info.clone())
    }

    async fn wallet_balance(&self) -> Result<WalletBalance> {
        self.check(Call::WalletBalance)?;
        Ok(self.balance.clone())
    }

    async fn list_channels(&self) -> Result<Vec<Channel>> {
        self.check(Call::ListChannels)?;
        Ok(self.channels.clone())
    }

    async fn closed_channels(&self) -> Result<Vec<ClosedChannel>> {
        self.check(Call::ClosedChannels)?;
        Ok(self.closed.clone())
    }

    async fn list_invoices(&self, max: u32) -> Result<Vec<Invoice>> {
        self.check(Call::ListInvoices)?;
        Ok(self.invoices.iter().take(max as usize).cloned().collect())
    }

    async fn get_transactions(&self) -> Result<Vec<Transaction>> {
        self.check(Call::GetTransactions)?;
        Ok(self.transactions.clone())
    }

    async fn list_payments(&self, max: u32) -> Result<Vec<Payment>> {
        self.check(Call::ListPayments)?;
        Ok(self.payments.iter().take(max as usize).cloned().collect())
    }

    async fn forwarding_history(&self, query: ForwardingQuery) -> Result<Vec<ForwardingEvent>> {
        self.check(Call::ForwardingHistory)?;
        Ok(self
            .forwards
            .iter()
            .take(query.max_events as usize)
            .cloned()
            .collect())
    }

    async fn subscribe_invoices(&self) -> Result<Box<dyn InvoiceStream>> {
        self.check(Call::SubscribeInvoices)?;
        Ok(Box::new(FakeInvoiceStream(
            self.invoice_updates.iter().cloned().collect(),
        )))
    }
}

pub struct FakeInvoiceStream(pub VecDeque<Invoice>);

#[async_trait]
impl InvoiceStream for FakeInvoiceStream {
    async fn next_invoice(&mut self) -> Result<Option<Invoice>> {
        Ok(self.0.pop_front())
    }
}

/// One scripted `connect()` outcome.
#[derive(Clone)]
pub enum Step {
    Node(FakeNode),
    Fail(String),
}

/// Replays scripted steps; the last step repeats once the script is exhausted.
pub struct FakeConnector {
    steps: Mutex<VecDeque<Step>>,
    last: Mutex<Option<Step>>,
    pub connects: AtomicUsize,
}

impl FakeConnector {
    pub fn new(steps: Vec<Step>) -> Self {
        Self {
            steps: Mutex::new(steps.into()),
            last: Mutex::new(None),
            connects: AtomicUsize::new(0),
        }
    }

    pub fn single(node: FakeNode) -> Self {
        Self::new(vec![Step::Node(node)])
    }

    pub fn connect_count(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl NodeConnector for FakeConnector {
    async fn connect(&self) -> Result<Arc<dyn LightningNode>> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        let step = {
            let mut steps = self.steps.lock().unwrap();
            let mut last = self.last.lock().unwrap();
            match steps.pop_front() {
                Some(s) => {
                    *last = Some(s.clone());
                    s
                }
                None => last
                    .clone()
                    .unwrap_or_else(|| Step::Fail("no script".to_string())),
            }
        };
        match step {
            Step::Node(node) => Ok(Arc::new(node)),
            Step::Fail(detail) => Err(Error::Rpc(detail)),
        }
    }
}

#[derive(Default)]
pub struct FakeMarket {
    pub price: BtcPrice,
    pub fees: FeeEstimates,
    pub fail: bool,
}

#[async_trait]
impl MarketData for FakeMarket {
    async fn btc_price(&self) -> Result<BtcPrice> {
        if self.fail {
            return Err(Error::External("price api returned 503".to_string()));
        }
        Ok(self.price.clone())
    }

    async fn recommended_fees(&self) -> Result<FeeEstimates> {
        if self.fail {
            return Err(Error::External("fee api returned 503".to_string()));
        }
        Ok(self.fees.clone())
    }
}

#[derive(Default)]
pub struct FakeHost(pub HostMetrics);

#[async_trait]
impl HostProbe for FakeHost {
    async fn sample(&self) -> Result<HostMetrics> {
        Ok(self.0.clone())
    }
}
