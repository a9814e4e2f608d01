use tokio::sync::oneshot;

use crate::error::RefreshError;

pub type RefreshOutcome = Result<String, RefreshError>;

/// A caller parked behind the in-flight refresh.
///
/// Resolved exactly once with the new access token or the refresh error.
/// A caller that went away while parked only turns its resolution into a no-op.
#[derive(Debug)]
pub struct PendingRequest {
    pub id: u64,
    pub descriptor: String,
    resolve: oneshot::Sender<RefreshOutcome>,
}

impl PendingRequest {
    pub fn new(id: u64, descriptor: String) -> (Self, oneshot::Receiver<RefreshOutcome>) {
        let (resolve, receiver) = oneshot::channel();
        (Self { id, descriptor, resolve }, receiver)
    }

    /// false when the owner is gone
    pub fn resolve(self, outcome: RefreshOutcome) -> bool {
        self.resolve.send(outcome).is_ok()
    }
}
