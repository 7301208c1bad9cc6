//! Newline-delimited JSON framing for the gateway's server-streaming calls.

use async_trait::async_trait;

use lnb_core::{errors::Error, node::Invoice, ports::InvoiceStream, Result};

use crate::wire::InvoiceStreamLine;

/// Accumulates response chunks and yields complete lines.
#[derive(Debug, Default)]
pub struct LineBuffer {
    buf: Vec<u8>,
}

impl LineBuffer {
    pub fn push(&mut self, chunk: &[u8]) {
        self.buf.extend_from_slice(chunk);
    }

    /// Next complete line without its terminator.
    pub fn next_line(&mut self) -> Option<Vec<u8>> {
        let pos = self.buf.iter().position(|b| *b == b'\n')?;
        let mut line: Vec<u8> = self.buf.drain(..=pos).collect();
        line.pop();
        if line.last() == Some(&b'\r') {
            line.pop();
        }
        Some(line)
    }

    /// Whatever is left once the stream has ended.
    pub fn take_rest(&mut self) -> Option<Vec<u8>> {
        if self.buf.iter().all(u8::is_ascii_whitespace) {
            self.buf.clear();
            return None;
        }
        Some(std::mem::take(&mut self.buf))
    }
}

/// Decode one stream line. `Ok(None)` for keep-alives and empty envelopes.
pub fn parse_invoice_line(line: &[u8]) -> Result<Option<Invoice>> {
    if line.iter().all(u8::is_ascii_whitespace) {
        return Ok(None);
    }
    let parsed: InvoiceStreamLine = serde_json::from_slice(line)?;
    if let Some(status) = parsed.error {
        return Err(Error::Rpc(status.detail().to_string()));
    }
    Ok(parsed.result.map(Invoice::from))
}

/// Invoice decoder over the raw body chunks of one subscription.
///
/// A line that is not valid JSON is logged and skipped; the subscription
/// itself stays usable. Error envelopes from the node are returned.
#[derive(Debug, Default)]
pub struct InvoiceDecoder {
    lines: LineBuffer,
}

impl InvoiceDecoder {
    pub fn push(&mut self, chunk: &[u8]) {
        self.lines.push(chunk);
    }

    /// Next invoice from the complete lines buffered so far.
    pub fn next_invoice(&mut self) -> Result<Option<Invoice>> {
        while let Some(line) = self.lines.next_line() {
            if let Some(invoice) = decode_line(&line)? {
                return Ok(Some(invoice));
            }
        }
        Ok(None)
    }

    /// Decode the unterminated tail once the body has ended.
    pub fn finish(&mut self) -> Result<Option<Invoice>> {
        match self.lines.take_rest() {
            Some(rest) => decode_line(&rest),
            None => Ok(None),
        }
    }
}

fn decode_line(line: &[u8]) -> Result<Option<Invoice>> {
    match parse_invoice_line(line) {
        Err(Error::Json(e)) => {
            let preview: String = String::from_utf8_lossy(line).chars().take(200).collect();
            tracing::warn!("invoice stream line parse failed: {e}\nline: {preview}");
            Ok(None)
        }
        other => other,
    }
}

pub struct RestInvoiceStream {
    resp: reqwest::Response,
    decoder: InvoiceDecoder,
    finished: bool,
}

impl RestInvoiceStream {
    pub fn new(resp: reqwest::Response) -> Self {
        Self {
            resp,
            decoder: InvoiceDecoder::default(),
            finished: false,
        }
    }
}

#[async_trait]
impl InvoiceStream for RestInvoiceStream {
    async fn next_invoice(&mut self) -> Result<Option<Invoice>> {
        loop {
            if let Some(invoice) = self.decoder.next_invoice()? {
                return Ok(Some(invoice));
            }
            if self.finished {
                return self.decoder.finish();
            }

            match self.resp.chunk().await {
                Ok(Some(bytes)) => self.decoder.push(&bytes),
                Ok(None) => self.finished = true,
                Err(e) => return Err(Error::Rpc(format!("invoice stream interrupted: {e}"))),
            }
        }
    }
}
