//! Client-side concurrency control.
//!
//! Tracks the local operations the server has not acknowledged yet and
//! rewrites incoming server operations so they apply on top of them.
//! Server operations always take the first argument of a transform step,
//! so they win ties against pending local work.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::config::ControlConfig;
use crate::error::ControlError;
use crate::ot::ops::{CompoundOperation, DiscreteOperation, Operation};
use crate::ot::xform::transform;

/// A local operation ready to be sent to the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutgoingOperation {
    pub seq_no: u64,
    /// Server version the operation was issued against.
    pub context_version: u64,
    pub operation: Operation,
}

/// An operation another participant committed at server version `version`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IncomingOperation {
    pub version: u64,
    pub operation: Operation,
}

/// Per-document reconciliation state.
#[derive(Debug)]
pub struct ClientConcurrencyControl {
    config: ControlConfig,
    context_version: u64,
    pending: VecDeque<(u64, Operation)>,
    next_seq_no: u64,
    batch: Option<Vec<DiscreteOperation>>,
    resync_required: bool,
}

impl ClientConcurrencyControl {
    /// Start tracking a document loaded at server version `context_version`.
    pub fn new(context_version: u64, config: ControlConfig) -> Self {
        Self {
            config,
            context_version,
            pending: VecDeque::new(),
            next_seq_no: 0,
            batch: None,
            resync_required: false,
        }
    }

    pub fn context_version(&self) -> u64 {
        self.context_version
    }

    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    /// Pending operations in send order.
    pub fn pending(&self) -> impl Iterator<Item = (u64, &Operation)> {
        self.pending.iter().map(|(seq_no, op)| (*seq_no, op))
    }

    pub fn is_resync_required(&self) -> bool {
        self.resync_required
    }

    pub fn is_batch_open(&self) -> bool {
        self.batch.is_some()
    }

    /// Record an operation the local participant already applied.
    ///
    /// Returns the message to send, or `None` while a batch is collecting.
    ///
    /// # Errors
    ///
    /// [`ControlError::ResyncRequired`] after a failed reconciliation and
    /// [`ControlError::QueueFull`] once `max_pending` operations are waiting.
    pub fn local_operation(
        &mut self,
        operation: Operation,
    ) -> Result<Option<OutgoingOperation>, ControlError> {
        if self.resync_required {
            return Err(ControlError::ResyncRequired);
        }
        if let Some(batch) = &mut self.batch {
            batch.extend(operation.discrete_ops().iter().cloned());
            return Ok(None);
        }
        self.enqueue(operation).map(Some)
    }

    /// Start collecting local operations into one compound operation.
    pub fn begin_batch(&mut self) -> Result<(), ControlError> {
        if self.batch.is_some() {
            return Err(ControlError::BatchAlreadyOpen);
        }
        self.batch = Some(Vec::new());
        Ok(())
    }

    /// Close the open batch. An empty batch produces nothing to send.
    pub fn complete_batch(&mut self) -> Result<Option<OutgoingOperation>, ControlError> {
        let ops = self.batch.take().ok_or(ControlError::NoBatchOpen)?;
        if ops.is_empty() {
            return Ok(None);
        }
        self.enqueue(CompoundOperation::new(ops).into()).map(Some)
    }

    fn enqueue(&mut self, operation: Operation) -> Result<OutgoingOperation, ControlError> {
        if self.pending.len() >= self.config.max_pending {
            return Err(ControlError::QueueFull {
                max: self.config.max_pending,
            });
        }
        let seq_no = self.next_seq_no;
        self.next_seq_no += 1;
        self.pending.push_back((seq_no, operation.clone()));
        tracing::trace!(seq_no, pending = self.pending.len(), "queued local operation");
        Ok(OutgoingOperation {
            seq_no,
            context_version: self.context_version,
            operation,
        })
    }

    /// Reconcile a server operation with the pending queue.
    ///
    /// Returns the operation to apply to the local document. The pending
    /// queue is rewritten only if every transform step succeeds.
    ///
    /// # Errors
    ///
    /// Version and batch misuse are rejected without touching any state. A
    /// transform failure marks the document as requiring resynchronization.
    pub fn remote_operation(
        &mut self,
        incoming: IncomingOperation,
    ) -> Result<Operation, ControlError> {
        if self.resync_required {
            return Err(ControlError::ResyncRequired);
        }
        if self.batch.is_some() {
            return Err(ControlError::BatchInProgress);
        }
        if incoming.version != self.context_version {
            return Err(ControlError::VersionMismatch {
                expected: self.context_version,
                actual: incoming.version,
            });
        }

        let mut server = incoming.operation;
        let mut rewritten = VecDeque::with_capacity(self.pending.len());
        for (seq_no, local) in &self.pending {
            match transform(&server, local) {
                Ok(pair) => {
                    server = pair.first;
                    rewritten.push_back((*seq_no, pair.second));
                }
                Err(err) => {
                    self.resync_required = true;
                    tracing::warn!(
                        version = incoming.version,
                        seq_no,
                        error = %err,
                        "reconciliation failed, document requires resynchronization"
                    );
                    return Err(err.into());
                }
            }
        }

        self.pending = rewritten;
        self.context_version += 1;
        tracing::debug!(
            version = self.context_version,
            pending = self.pending.len(),
            "applied remote operation"
        );
        Ok(server)
    }

    /// The server committed our oldest pending operation at `version`.
    ///
    /// # Errors
    ///
    /// [`ControlError::UnexpectedAcknowledgement`] if `seq_no` is not the
    /// head of the queue, [`ControlError::VersionMismatch`] if the server
    /// skipped a version.
    pub fn acknowledge(&mut self, seq_no: u64, version: u64) -> Result<Operation, ControlError> {
        let head = self.pending.front().map(|(head, _)| *head);
        if head != Some(seq_no) {
            return Err(ControlError::UnexpectedAcknowledgement { seq_no, head });
        }
        if version != self.context_version {
            return Err(ControlError::VersionMismatch {
                expected: self.context_version,
                actual: version,
            });
        }
        let (_, operation) = self
            .pending
            .pop_front()
            .ok_or(ControlError::UnexpectedAcknowledgement { seq_no, head })?;
        self.context_version += 1;
        tracing::trace!(seq_no, version, "operation acknowledged");
        Ok(operation)
    }

    /// Drop all local state after the caller reloaded the document at
    /// `version`.
    pub fn resynchronize(&mut self, version: u64) {
        tracing::debug!(
            version,
            dropped = self.pending.len(),
            "resynchronized"
        );
        self.pending.clear();
        self.batch = None;
        self.resync_required = false;
        self.context_version = version;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TransformError;
    use crate::ot::ops::OpBody;

    fn op(id: &str, body: OpBody) -> Operation {
        DiscreteOperation::new(id, body).unwrap().into()
    }

    fn text_insert(index: usize, value: &str) -> Operation {
        op("t", OpBody::StringInsert { index, value: value.into() })
    }

    fn control() -> ClientConcurrencyControl {
        ClientConcurrencyControl::new(0, ControlConfig::default())
    }

    #[test]
    fn local_operations_get_sequence_numbers() {
        let mut cc = control();
        let a = cc.local_operation(text_insert(0, "a")).unwrap().unwrap();
        let b = cc.local_operation(text_insert(1, "b")).unwrap().unwrap();
        assert_eq!((a.seq_no, b.seq_no), (0, 1));
        assert_eq!(a.context_version, 0);
        assert_eq!(cc.pending().count(), 2);
    }

    #[test]
    fn remote_operation_rewrites_queue() {
        let mut cc = control();
        cc.local_operation(text_insert(2, "xy")).unwrap();

        let server = cc
            .remote_operation(IncomingOperation {
                version: 0,
                operation: text_insert(5, "S"),
            })
            .unwrap();
        assert_eq!(server, text_insert(7, "S"));
        assert_eq!(cc.context_version(), 1);
        let (_, local) = cc.pending().next().unwrap();
        assert_eq!(local, &text_insert(2, "xy"));
    }

    #[test]
    fn server_wins_ties() {
        let mut cc = control();
        cc.local_operation(text_insert(3, "L")).unwrap();
        let server = cc
            .remote_operation(IncomingOperation {
                version: 0,
                operation: text_insert(3, "S"),
            })
            .unwrap();
        assert_eq!(server, text_insert(3, "S"));
        assert_eq!(cc.pending().next().unwrap().1, &text_insert(4, "L"));
    }

    #[test]
    fn version_mismatch_is_rejected() {
        let mut cc = control();
        let err = cc.remote_operation(IncomingOperation {
            version: 3,
            operation: text_insert(0, "x"),
        });
        assert_eq!(err, Err(ControlError::VersionMismatch { expected: 0, actual: 3 }));
        assert_eq!(cc.context_version(), 0);
    }

    #[test]
    fn failed_transform_keeps_queue_and_requires_resync() {
        let mut cc = control();
        let local = op("t", OpBody::ArrayRemove { index: 0 });
        cc.local_operation(local.clone()).unwrap();

        let err = cc.remote_operation(IncomingOperation {
            version: 0,
            operation: op("t", OpBody::StringSet { value: "x".into() }),
        });
        assert!(matches!(
            err,
            Err(ControlError::Transform(TransformError::Unsupported { .. }))
        ));
        assert!(cc.is_resync_required());
        assert_eq!(cc.pending().next().unwrap().1, &local);
        assert_eq!(cc.context_version(), 0);
        assert_eq!(
            cc.local_operation(text_insert(0, "x")),
            Err(ControlError::ResyncRequired)
        );

        cc.resynchronize(5);
        assert!(!cc.is_resync_required());
        assert!(!cc.has_pending());
        assert_eq!(cc.context_version(), 5);
    }

    #[test]
    fn acknowledgement_pops_head() {
        let mut cc = control();
        cc.local_operation(text_insert(0, "a")).unwrap();
        cc.local_operation(text_insert(1, "b")).unwrap();

        assert_eq!(
            cc.acknowledge(1, 0),
            Err(ControlError::UnexpectedAcknowledgement { seq_no: 1, head: Some(0) })
        );
        assert_eq!(cc.acknowledge(0, 0), Ok(text_insert(0, "a")));
        assert_eq!(cc.context_version(), 1);
        assert_eq!(cc.acknowledge(1, 1), Ok(text_insert(1, "b")));
        assert!(!cc.has_pending());
    }

    #[test]
    fn batches_fold_into_one_compound() {
        let mut cc = control();
        cc.begin_batch().unwrap();
        assert_eq!(cc.begin_batch(), Err(ControlError::BatchAlreadyOpen));
        assert_eq!(cc.local_operation(text_insert(0, "a")), Ok(None));
        assert_eq!(cc.local_operation(text_insert(1, "b")), Ok(None));
        assert_eq!(
            cc.remote_operation(IncomingOperation {
                version: 0,
                operation: text_insert(0, "s"),
            }),
            Err(ControlError::BatchInProgress)
        );

        let sent = cc.complete_batch().unwrap().unwrap();
        assert_eq!(sent.operation.discrete_ops().len(), 2);
        assert!(matches!(sent.operation, Operation::Compound(_)));
        assert_eq!(cc.complete_batch(), Err(ControlError::NoBatchOpen));

        cc.begin_batch().unwrap();
        assert_eq!(cc.complete_batch(), Ok(None));
    }

    #[test]
    fn queue_is_bounded() {
        let mut cc = ClientConcurrencyControl::new(0, ControlConfig { max_pending: 1 });
        cc.local_operation(text_insert(0, "a")).unwrap();
        assert_eq!(
            cc.local_operation(text_insert(0, "b")),
            Err(ControlError::QueueFull { max: 1 })
        );
    }
}
