#![allow(dead_code)]

use std::collections::VecDeque;

use serde_json::Value;
use tandem::model::{DataKind, DataValue, Document, ElementId, IdGenerator};
use tandem::ot::control::{ClientConcurrencyControl, IncomingOperation, OutgoingOperation};
use tandem::ot::ops::{DiscreteOperation, OpBody, Operation};
use tandem::ot::transform;
use tandem::ControlConfig;

pub fn op(id: &str, body: OpBody) -> DiscreteOperation {
    DiscreteOperation::new(id, body).expect("valid operation")
}

pub fn text(id: &str, value: &str) -> DataValue {
    DataValue::string(ElementId::from(id), value)
}

/// A root array `["e0", "e1", ...]` with id `root` and children `root:k`.
pub fn string_array(root: &str, len: usize) -> DataValue {
    let items = (0..len)
        .map(|k| text(&format!("{root}:{k}"), &format!("e{k}")))
        .collect();
    DataValue::new(ElementId::from(root), DataKind::Array(items))
}

pub fn from_json(prefix: &str, value: &Value) -> DataValue {
    DataValue::from_json(value, &mut IdGenerator::new(prefix))
}

/// Apply `a` then `b'`, and `b` then `a'`, to copies of `base`. Returns both
/// results, or a description of the first failure.
pub fn converge(
    base: &DataValue,
    a: &DiscreteOperation,
    b: &DiscreteOperation,
) -> Result<(DataValue, DataValue), String> {
    let pair = tandem::ot::transform_discrete(a, b).map_err(|e| format!("transform: {e}"))?;

    let mut left = Document::new(base.clone()).map_err(|e| e.to_string())?;
    left.apply_discrete(a).map_err(|e| format!("apply a: {e}"))?;
    left.apply_discrete(&pair.second)
        .map_err(|e| format!("apply b' {:?}: {e}", pair.second))?;

    let mut right = Document::new(base.clone()).map_err(|e| e.to_string())?;
    right.apply_discrete(b).map_err(|e| format!("apply b: {e}"))?;
    right.apply_discrete(&pair.first)
        .map_err(|e| format!("apply a' {:?}: {e}", pair.first))?;

    Ok((left.snapshot(), right.snapshot()))
}

// ── Simulated deployment ──────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub enum Message {
    Ack { seq_no: u64, version: u64 },
    Remote(IncomingOperation),
}

/// One participant: its local copy, its concurrency control and its inbox.
/// At most one operation is in flight; the next one is sent after the ack.
pub struct Client {
    pub doc: Document,
    pub control: ClientConcurrencyControl,
    inbox: VecDeque<Message>,
    in_flight: Option<u64>,
}

impl Client {
    pub fn new(base: &DataValue) -> Self {
        Self {
            doc: Document::new(base.clone()).expect("valid document"),
            control: ClientConcurrencyControl::new(0, ControlConfig::default()),
            inbox: VecDeque::new(),
            in_flight: None,
        }
    }

    /// Apply a local edit and queue it.
    pub fn edit(&mut self, op: DiscreteOperation) {
        let op = Operation::from(op);
        self.doc.apply(&op).expect("local edit applies");
        self.control.local_operation(op).expect("queue accepts");
    }

    fn next_to_send(&mut self) -> Option<OutgoingOperation> {
        if self.in_flight.is_some() {
            return None;
        }
        let (seq_no, operation) = self.control.pending().next()?;
        let out = OutgoingOperation {
            seq_no,
            context_version: self.control.context_version(),
            operation: operation.clone(),
        };
        self.in_flight = Some(seq_no);
        Some(out)
    }

    pub fn has_mail(&self) -> bool {
        !self.inbox.is_empty()
    }

    /// Process the oldest message in the inbox.
    pub fn receive_one(&mut self) -> bool {
        let Some(message) = self.inbox.pop_front() else {
            return false;
        };
        match message {
            Message::Ack { seq_no, version } => {
                self.control
                    .acknowledge(seq_no, version)
                    .expect("ack matches the pending head");
                self.in_flight = None;
            }
            Message::Remote(incoming) => {
                let operation = self
                    .control
                    .remote_operation(incoming)
                    .expect("remote operation reconciles");
                self.doc.apply(&operation).expect("remote operation applies");
            }
        }
        true
    }
}

/// Sequencer holding the authoritative copy and the committed history.
pub struct Server {
    pub doc: Document,
    history: Vec<Operation>,
}

impl Server {
    pub fn new(base: &DataValue) -> Self {
        Self {
            doc: Document::new(base.clone()).expect("valid document"),
            history: Vec::new(),
        }
    }

    /// Rebase a client operation over everything committed since its
    /// context version, apply and commit it.
    pub fn submit(&mut self, out: &OutgoingOperation) -> (u64, Operation) {
        let mut operation = out.operation.clone();
        for committed in &self.history[out.context_version as usize..] {
            operation = transform(committed, &operation)
                .expect("server transform")
                .second;
        }
        self.doc.apply(&operation).expect("server apply");
        let version = self.history.len() as u64;
        self.history.push(operation.clone());
        (version, operation)
    }
}

pub struct Network {
    pub server: Server,
    pub clients: Vec<Client>,
}

impl Network {
    pub fn new(base: &DataValue, clients: usize) -> Self {
        Self {
            server: Server::new(base),
            clients: (0..clients).map(|_| Client::new(base)).collect(),
        }
    }

    /// Send client `from`'s next pending operation, if it may send one.
    pub fn send(&mut self, from: usize) -> bool {
        let Some(out) = self.clients[from].next_to_send() else {
            return false;
        };
        let (version, operation) = self.server.submit(&out);
        for (k, client) in self.clients.iter_mut().enumerate() {
            let message = if k == from {
                Message::Ack {
                    seq_no: out.seq_no,
                    version,
                }
            } else {
                Message::Remote(IncomingOperation {
                    version,
                    operation: operation.clone(),
                })
            };
            client.inbox.push_back(message);
        }
        true
    }

    pub fn deliver(&mut self, to: usize) -> bool {
        self.clients[to].receive_one()
    }

    /// Run until every operation is committed and every message processed.
    pub fn settle(&mut self) {
        loop {
            let mut progressed = false;
            for k in 0..self.clients.len() {
                while self.deliver(k) {
                    progressed = true;
                }
                progressed |= self.send(k);
            }
            if !progressed {
                break;
            }
        }
    }

    pub fn assert_converged(&self) {
        let expected = self.server.doc.snapshot();
        for (k, client) in self.clients.iter().enumerate() {
            assert_eq!(client.doc.snapshot(), expected, "client {k} diverged");
            assert!(!client.control.has_pending(), "client {k} still has pending operations");
        }
    }
}
