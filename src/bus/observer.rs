use super::LiveEvent;
use std::fmt::Debug;
use thiserror::Error;
use tokio::sync::mpsc;
use uuid::Uuid;

pub type ObserverId = Uuid;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ObserverError {
    #[error("Observer is gone")]
    Closed,
    #[error("Observer is not keeping up")]
    Lagging,
}

/// A live consumer of device events.
///
/// `send` must not block: it is called from the ingestion task.
pub trait Observer: Debug + Send + Sync {
    fn id(&self) -> ObserverId;
    fn send(&self, event: &LiveEvent) -> Result<(), ObserverError>;
}

/// Observer backed by a bounded channel, drained by a connection task.
#[derive(Debug, Clone)]
pub struct ChannelObserver {
    id: ObserverId,
    sender: mpsc::Sender<LiveEvent>,
}

impl ChannelObserver {
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<LiveEvent>) {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        (
            Self {
                id: Uuid::new_v4(),
                sender,
            },
            receiver,
        )
    }
}

impl Observer for ChannelObserver {
    fn id(&self) -> ObserverId {
        self.id
    }

    fn send(&self, event: &LiveEvent) -> Result<(), ObserverError> {
        self.sender.try_send(event.clone()).map_err(|err| match err {
            mpsc::error::TrySendError::Full(_) => ObserverError::Lagging,
            mpsc::error::TrySendError::Closed(_) => ObserverError::Closed,
        })
    }
}
