// Copyright 2020 Joyent, Inc.

//! The mPlane protocol message shell: capabilities, specifications, and
//! the messages that report on them. Each message carries the temporal
//! scope that governs its validity; specifications may also carry a
//! calendar schedule. Only the surface the scheduling core and its
//! consumers exercise is modeled here, not the full mPlane registry.

use std::collections::BTreeMap;
use std::io::{Error, ErrorKind};

use rand::Rng;
use serde_derive::{Deserialize, Serialize};
use serde_json::Value;

use crate::schedule::Schedule;
use crate::scope::When;

fn new_token() -> String {
    format!("{:032x}", rand::thread_rng().gen::<u128>())
}

/// A measurement a component can perform: its temporal availability,
/// the parameters it accepts, and the result columns it produces.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct Capability {
    #[serde(skip_serializing_if = "Option::is_none")]
    label: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    token: Option<String>,
    when: When,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    parameters: BTreeMap<String, Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    results: Vec<String>,
}

impl Capability {
    pub fn new(label: &str, when: When) -> Capability {
        Capability {
            label: Some(label.to_string()),
            token: None,
            when,
            parameters: BTreeMap::new(),
            results: Vec::new(),
        }
    }

    pub fn label(&self) -> Option<&str> {
        self.label.as_ref().map(String::as_str)
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_ref().map(String::as_str)
    }

    pub fn when(&self) -> &When {
        &self.when
    }

    pub fn set_when(&mut self, when: When) {
        self.when = when;
    }

    /// Advertise a parameter, with a constraint value the component
    /// interprets (an allowed set, a range, or a single value).
    pub fn add_parameter(&mut self, name: &str, constraint: Value) {
        self.parameters.insert(name.to_string(), constraint);
    }

    pub fn has_parameter(&self, name: &str) -> bool {
        self.parameters.contains_key(name)
    }

    pub fn parameter_names(&self) -> Vec<&str> {
        self.parameters.keys().map(String::as_str).collect()
    }

    pub fn add_result_column(&mut self, name: &str) {
        self.results.push(name.to_string());
    }

    pub fn has_result_column(&self, name: &str) -> bool {
        self.results.iter().any(|column| column == name)
    }

    pub fn result_columns(&self) -> &[String] {
        &self.results
    }

    pub fn retoken(&mut self) {
        self.token = Some(new_token());
    }
}

/// A request to execute a capability: concrete parameter values plus the
/// temporal scope, and optionally a calendar schedule, governing the
/// execution.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct Specification {
    #[serde(skip_serializing_if = "Option::is_none")]
    label: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    token: Option<String>,
    when: When,
    #[serde(skip_serializing_if = "Option::is_none")]
    schedule: Option<Schedule>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    parameters: BTreeMap<String, Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    results: Vec<String>,
}

impl Specification {
    /// Derive a specification from a capability: same shape, with every
    /// parameter left to be filled in.
    pub fn from_capability(cap: &Capability) -> Specification {
        Specification {
            label: cap.label.clone(),
            token: None,
            when: cap.when,
            schedule: None,
            parameters: cap
                .parameters
                .keys()
                .map(|name| (name.clone(), Value::Null))
                .collect(),
            results: cap.results.clone(),
        }
    }

    pub fn label(&self) -> Option<&str> {
        self.label.as_ref().map(String::as_str)
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_ref().map(String::as_str)
    }

    pub fn when(&self) -> &When {
        &self.when
    }

    pub fn set_when(&mut self, when: When) {
        self.when = when;
    }

    pub fn schedule(&self) -> Option<&Schedule> {
        self.schedule.as_ref()
    }

    pub fn set_schedule(&mut self, schedule: Schedule) {
        self.schedule = Some(schedule);
    }

    pub fn parameter_names(&self) -> Vec<&str> {
        self.parameters.keys().map(String::as_str).collect()
    }

    pub fn has_parameter(&self, name: &str) -> bool {
        self.parameters.contains_key(name)
    }

    /// The filled-in value of a parameter, or `None` if it has not been
    /// filled in yet.
    pub fn get_parameter_value(&self, name: &str) -> Option<&Value> {
        match self.parameters.get(name) {
            None | Some(Value::Null) => None,
            Some(value) => Some(value),
        }
    }

    pub fn set_parameter_value(
        &mut self,
        name: &str,
        value: Value,
    ) -> Result<(), Error> {
        match self.parameters.get_mut(name) {
            Some(slot) => {
                *slot = value;
                Ok(())
            }
            None => Err(Error::new(
                ErrorKind::Other,
                format!("no parameter {} in specification", name),
            )),
        }
    }

    pub fn has_result_column(&self, name: &str) -> bool {
        self.results.iter().any(|column| column == name)
    }

    pub fn result_columns(&self) -> &[String] {
        &self.results
    }

    /// Check the specification is ready to execute: every parameter has
    /// a value.
    pub fn validate(&self) -> Result<(), Error> {
        for (name, value) in &self.parameters {
            if *value == Value::Null {
                return Err(Error::new(
                    ErrorKind::Other,
                    format!("parameter {} has no value", name),
                ));
            }
        }
        Ok(())
    }

    /// True if this specification is structurally satisfiable by `cap`:
    /// every parameter and result column it names is one the capability
    /// offers.
    pub fn fulfills(&self, cap: &Capability) -> bool {
        self.parameters.keys().all(|name| cap.has_parameter(name))
            && self.results.iter().all(|column| cap.has_result_column(column))
    }

    pub fn retoken(&mut self) {
        self.token = Some(new_token());
    }

    pub fn relabel(&mut self, label: &str) {
        self.label = Some(label.to_string());
    }
}

/// Acknowledgement that a measurement is pending; redeemed for its
/// result once the component has one.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct Receipt {
    #[serde(skip_serializing_if = "Option::is_none")]
    label: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    token: Option<String>,
    when: When,
}

impl Receipt {
    pub fn from_specification(spec: &Specification) -> Receipt {
        Receipt {
            label: spec.label.clone(),
            token: spec.token.clone(),
            when: spec.when,
        }
    }

    pub fn label(&self) -> Option<&str> {
        self.label.as_ref().map(String::as_str)
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_ref().map(String::as_str)
    }

    pub fn when(&self) -> &When {
        &self.when
    }
}

/// A request to exchange a receipt for the completed result.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct Redemption {
    #[serde(skip_serializing_if = "Option::is_none")]
    token: Option<String>,
}

impl Redemption {
    pub fn from_receipt(receipt: &Receipt) -> Redemption {
        Redemption {
            token: receipt.token.clone(),
        }
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_ref().map(String::as_str)
    }
}

/// A completed measurement's output: the window it actually covered and
/// one row of values per sample, cell order following the result
/// columns.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct ResultMessage {
    #[serde(skip_serializing_if = "Option::is_none")]
    label: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    token: Option<String>,
    when: When,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    parameters: BTreeMap<String, Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    results: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    values: Vec<Vec<Value>>,
}

impl ResultMessage {
    pub fn from_specification(spec: &Specification) -> ResultMessage {
        ResultMessage {
            label: spec.label.clone(),
            token: spec.token.clone(),
            when: spec.when,
            parameters: spec.parameters.clone(),
            results: spec.results.clone(),
            values: Vec::new(),
        }
    }

    pub fn label(&self) -> Option<&str> {
        self.label.as_ref().map(String::as_str)
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_ref().map(String::as_str)
    }

    pub fn when(&self) -> &When {
        &self.when
    }

    /// Record the window the measurement actually covered.
    pub fn set_when(&mut self, when: When) {
        self.when = when;
    }

    pub fn has_result_column(&self, name: &str) -> bool {
        self.results.iter().any(|column| column == name)
    }

    pub fn result_columns(&self) -> &[String] {
        &self.results
    }

    /// Set one cell, growing the row table as needed. Naming a column
    /// the result does not carry is an error.
    pub fn set_result_value(
        &mut self,
        column: &str,
        value: Value,
        row: usize,
    ) -> Result<(), Error> {
        let col = self
            .results
            .iter()
            .position(|c| c == column)
            .ok_or_else(|| {
                Error::new(
                    ErrorKind::Other,
                    format!("no result column {} in result", column),
                )
            })?;
        while self.values.len() <= row {
            self.values.push(vec![Value::Null; self.results.len()]);
        }
        self.values[row][col] = value;
        Ok(())
    }

    pub fn result_value(&self, column: &str, row: usize) -> Option<&Value> {
        let col = self.results.iter().position(|c| c == column)?;
        self.values.get(row).and_then(|cells| cells.get(col))
    }

    pub fn rows(&self) -> &[Vec<Value>] {
        &self.values
    }
}

/// A protocol-level error report, tied by token to the message that
/// caused it.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct Exception {
    #[serde(skip_serializing_if = "Option::is_none")]
    token: Option<String>,
    errmsg: String,
}

impl Exception {
    pub fn new(token: Option<&str>, errmsg: &str) -> Exception {
        Exception {
            token: token.map(String::from),
            errmsg: errmsg.to_string(),
        }
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_ref().map(String::as_str)
    }

    pub fn errmsg(&self) -> &str {
        &self.errmsg
    }
}

/// A bundle of messages delivered as one.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct Envelope {
    messages: Vec<Message>,
}

impl Envelope {
    pub fn new() -> Envelope {
        Envelope {
            messages: Vec::new(),
        }
    }

    pub fn from_messages(messages: Vec<Message>) -> Envelope {
        Envelope { messages }
    }

    pub fn push(&mut self, msg: Message) {
        self.messages.push(msg);
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn into_messages(self) -> Vec<Message> {
        self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

impl Default for Envelope {
    fn default() -> Envelope {
        Envelope::new()
    }
}

/// Any mPlane message, tagged by kind on the wire.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Message {
    Capability(Capability),
    Specification(Specification),
    Receipt(Receipt),
    Redemption(Redemption),
    Result(ResultMessage),
    Exception(Exception),
    Envelope(Envelope),
}

impl Message {
    pub fn kind(&self) -> &'static str {
        match self {
            Message::Capability(_) => "capability",
            Message::Specification(_) => "specification",
            Message::Receipt(_) => "receipt",
            Message::Redemption(_) => "redemption",
            Message::Result(_) => "result",
            Message::Exception(_) => "exception",
            Message::Envelope(_) => "envelope",
        }
    }

    /// The token of the carried message, where its kind has one.
    pub fn token(&self) -> Option<&str> {
        match self {
            Message::Capability(msg) => msg.token(),
            Message::Specification(msg) => msg.token(),
            Message::Receipt(msg) => msg.token(),
            Message::Redemption(msg) => msg.token(),
            Message::Result(msg) => msg.token(),
            Message::Exception(msg) => msg.token(),
            Message::Envelope(_) => None,
        }
    }
}
