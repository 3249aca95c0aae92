//! Per-operation failure channel
//!
//! Every tag call of a lifecycle operation goes through a [`Channel`]. It
//! remembers the last transport fault seen during the operation, so a step
//! that later fails for a protocol reason is translated against whatever
//! the transport signalled before it.

use tracing::{debug, warn};

use crate::error::{OpenkeyError, OpenkeyResult};
use crate::logic::translate;
use crate::model::{Operation, StatusCode};
use crate::ports::{TagResult, TransportFault};

#[derive(Debug)]
pub(crate) struct Channel {
    operation: Operation,
    last_fault: Option<TransportFault>,
}

impl Channel {
    pub(crate) fn new(operation: Operation) -> Self {
        Self {
            operation,
            last_fault: None,
        }
    }

    /// Check the outcome of the tag call behind step `code`
    pub(crate) fn call<T>(&mut self, code: StatusCode, result: TagResult<T>) -> OpenkeyResult<T> {
        result.map_err(|fault| {
            warn!(operation = %self.operation, step = %code, %fault, "Tag call failed");
            let err = translate(self.operation, code, Some(&fault));
            self.last_fault = Some(fault);
            err
        })
    }

    /// Record a tag failure the operation can live with
    pub(crate) fn tolerate(&mut self, fault: TransportFault) {
        debug!(operation = %self.operation, %fault, "Tolerating tag failure");
        self.last_fault = Some(fault);
    }

    /// Fail step `code` for a reason found in the data, not in the call
    pub(crate) fn fail(&self, code: StatusCode) -> OpenkeyError {
        warn!(operation = %self.operation, step = %code, "Step failed");
        translate(self.operation, code, self.last_fault.as_ref())
    }
}
