//! Execution gateway seam.
//!
//! The engine never matches orders itself. A gateway takes an intent and
//! answers with a fill, a rejection, or "pending" when the confirmation
//! will arrive later through [`Engine::on_fill`](super::Engine::on_fill) or
//! [`Engine::on_rejection`](super::Engine::on_rejection).

use crate::domain::{Bar, ExitReason, Fill, OrderIntent, Position, Rejection};

/// Immediate answer to a submitted intent.
#[derive(Debug, Clone, PartialEq)]
pub enum Submission {
    Filled(Fill),
    Rejected(Rejection),
    /// Accepted; the confirmation arrives asynchronously.
    Pending,
}

pub trait ExecutionGateway {
    /// Submit an intent. `bar` is the bar on which it was issued.
    fn submit(&mut self, intent: &OrderIntent, bar: &Bar) -> Submission;

    /// Close the whole remaining position.
    fn close(&mut self, position: &Position, reason: ExitReason, bar: &Bar) -> Submission {
        let intent = OrderIntent::full_close(position.side, position.size, reason);
        self.submit(&intent, bar)
    }

    fn name(&self) -> &str {
        "gateway"
    }
}

impl<G: ExecutionGateway + ?Sized> ExecutionGateway for Box<G> {
    fn submit(&mut self, intent: &OrderIntent, bar: &Bar) -> Submission {
        (**self).submit(intent, bar)
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}
