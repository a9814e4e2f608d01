use tokio::sync::broadcast::{self, Sender};

use crate::coordinator::terminator::SessionEvent;


const BUFFER_SIZE: usize = 16;
pub fn run() -> Sender<SessionEvent> {
    let (session_sender, _) = broadcast::channel(BUFFER_SIZE);
    session_sender
}
