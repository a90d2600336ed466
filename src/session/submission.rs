use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Submitted in place of an empty answer
pub const NO_ANSWER: &str = "(No answer provided)";

/// Final answer text for a buffer; never empty
pub fn answer_payload(buffer: &str) -> String {
    let trimmed = buffer.trim();
    if trimmed.is_empty() {
        NO_ANSWER.to_string()
    } else {
        trimmed.to_string()
    }
}

/// Proof of holding the in-flight flag
#[derive(Debug)]
#[must_use = "a ticket must be released or the coordinator stays locked until the next reset"]
pub struct SubmissionTicket {
    epoch: u64,
}

/// Collapses racing submission triggers into one network effect
///
/// A timer expiry and a manual submit can fire within milliseconds of each
/// other. Whichever takes the ticket first submits; everything else is
/// rejected until the cooldown after that submission has elapsed or the
/// session enters a new question.
#[derive(Debug, Clone)]
pub struct SubmissionCoordinator {
    in_flight: Arc<AtomicBool>,
    epoch: Arc<AtomicU64>,
    cooldown: Duration,
}

impl SubmissionCoordinator {
    pub fn new(cooldown: Duration) -> Self {
        Self {
            in_flight: Arc::new(AtomicBool::new(false)),
            epoch: Arc::new(AtomicU64::new(0)),
            cooldown,
        }
    }

    pub fn try_begin(&self) -> Option<SubmissionTicket> {
        self.in_flight
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .ok()
            .map(|_| SubmissionTicket {
                epoch: self.epoch.load(Ordering::SeqCst),
            })
    }

    /// Release the flag once the cooldown has passed
    ///
    /// A release that outlives a [`reset`](Self::reset) is dropped, so an old
    /// cooldown can never unlock the next question early.
    pub fn release_after_cooldown(&self, ticket: SubmissionTicket) {
        let in_flight = Arc::clone(&self.in_flight);
        let epoch = Arc::clone(&self.epoch);
        let cooldown = self.cooldown;

        tokio::spawn(async move {
            tokio::time::sleep(cooldown).await;
            if epoch.load(Ordering::SeqCst) == ticket.epoch {
                in_flight.store(false, Ordering::SeqCst);
            } else {
                debug!("Submission cooldown outlived its question, leaving flag alone");
            }
        });
    }

    /// Release immediately, for triggers that turned out to have nothing to send
    pub fn release_now(&self, ticket: SubmissionTicket) {
        if self.epoch.load(Ordering::SeqCst) == ticket.epoch {
            self.in_flight.store(false, Ordering::SeqCst);
        }
    }

    /// Unlock for a new question, invalidating outstanding tickets
    pub fn reset(&self) {
        self.epoch.fetch_add(1, Ordering::SeqCst);
        self.in_flight.store(false, Ordering::SeqCst);
    }

    pub fn is_in_flight(&self) -> bool {
        self.in_flight.load(Ordering::SeqCst)
    }
}
