// Copyright 2020 Joyent, Inc.

//! Client-side message handling for client-initiated workflows: caches
//! the capabilities a component advertises and tracks pending receipts
//! and completed results, de-duplicated by token. Transport is the
//! caller's concern; this is the state behind it.

use std::collections::HashMap;
use std::io::{Error, ErrorKind};

use slog::{debug, info, o, warn, Drain, Logger};

use crate::message::{Capability, Message, Receipt, ResultMessage};

pub struct Client {
    capabilities: Vec<Capability>,
    caplabels: HashMap<String, usize>,
    receipts: Vec<Receipt>,
    results: Vec<ResultMessage>,
    log: Logger,
}

impl Client {
    pub fn new(log: Option<&Logger>) -> Client {
        let log = match log {
            Some(log) => log.clone(),
            None => Logger::root(slog_stdlog::StdLog.fuse(), o!()),
        };
        Client {
            capabilities: Vec::new(),
            caplabels: HashMap::new(),
            receipts: Vec::new(),
            results: Vec::new(),
            log,
        }
    }

    /// Process one incoming message: cache capabilities, receipts, and
    /// results, open envelopes, and log exceptions. Messages a client
    /// has no business receiving are an error.
    pub fn handle_message(&mut self, msg: Message) -> Result<(), Error> {
        debug!(self.log, "got message"; "kind" => msg.kind());
        match msg {
            Message::Capability(cap) => {
                self.add_capability(cap);
                Ok(())
            }
            Message::Receipt(receipt) => {
                self.add_receipt(receipt);
                Ok(())
            }
            Message::Result(result) => {
                self.add_result(result);
                Ok(())
            }
            Message::Exception(exc) => {
                warn!(self.log, "component reported an exception";
                      "token" => exc.token().unwrap_or("-"),
                      "errmsg" => exc.errmsg());
                Ok(())
            }
            Message::Envelope(envelope) => {
                for inner in envelope.into_messages() {
                    self.handle_message(inner)?;
                }
                Ok(())
            }
            other => Err(Error::new(
                ErrorKind::Other,
                format!("client cannot handle {} message", other.kind()),
            )),
        }
    }

    pub fn add_capability(&mut self, cap: Capability) {
        info!(self.log, "adding capability";
              "label" => cap.label().unwrap_or("-"), "when" => %cap.when());
        if let Some(label) = cap.label() {
            self.caplabels
                .insert(label.to_string(), self.capabilities.len());
        }
        self.capabilities.push(cap);
    }

    pub fn clear_capabilities(&mut self) {
        self.capabilities.clear();
        self.caplabels.clear();
    }

    pub fn capabilities(&self) -> &[Capability] {
        &self.capabilities
    }

    pub fn capability_at(&self, index: usize) -> Option<&Capability> {
        self.capabilities.get(index)
    }

    pub fn capability_by_label(&self, label: &str) -> Option<&Capability> {
        self.caplabels
            .get(label)
            .and_then(|&index| self.capabilities.get(index))
    }

    /// Track a pending measurement. Duplicate tokens collapse.
    pub fn add_receipt(&mut self, receipt: Receipt) {
        let dup = receipt.token().is_some()
            && self
                .receipts
                .iter()
                .any(|pending| pending.token() == receipt.token());
        if !dup {
            self.receipts.push(receipt);
        }
    }

    pub fn receipts(&self) -> &[Receipt] {
        &self.receipts
    }

    /// Record a completed measurement, dropping the receipt it redeems.
    /// Duplicate tokens collapse.
    pub fn add_result(&mut self, result: ResultMessage) {
        let dup = result.token().is_some()
            && self
                .results
                .iter()
                .any(|existing| existing.token() == result.token());
        if dup {
            return;
        }
        if let Some(token) = result.token() {
            let token = token.to_string();
            self.receipts
                .retain(|pending| pending.token() != Some(token.as_str()));
        }
        self.results.push(result);
    }

    pub fn results(&self) -> &[ResultMessage] {
        &self.results
    }

    /// All measurements, completed first, then pending.
    pub fn measurement_count(&self) -> usize {
        self.results.len() + self.receipts.len()
    }

    pub fn measurement_at(&self, index: usize) -> Option<Message> {
        if index < self.results.len() {
            self.results.get(index).cloned().map(Message::Result)
        } else {
            self.receipts
                .get(index - self.results.len())
                .cloned()
                .map(Message::Receipt)
        }
    }
}
