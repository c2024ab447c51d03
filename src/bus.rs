use std::sync::Arc;
use tokio::sync::broadcast;

use fieldnav_avoidance::CommandSink;
use fieldnav_kinematics::{TwistMsg, VelocityCommand};

/// Named broadcast topic with bounded capacity.
/// `T` must be `Send + Sync` because we hop across threads.
#[derive(Debug, Clone)]
pub struct Topic<T> {
    name: Arc<str>,
    tx: broadcast::Sender<Arc<T>>,
}

impl<T: Send + Sync + 'static> Topic<T> {
    pub fn new(name: &str, capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { name: Arc::from(name), tx }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Fire-and-forget; a topic without subscribers drops the message.
    pub fn publish(&self, msg: T) {
        let _ = self.tx.send(Arc::new(msg));
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Arc<T>> {
        self.tx.subscribe()
    }
}

impl CommandSink for Topic<TwistMsg> {
    fn send(&self, cmd: VelocityCommand) {
        self.publish(TwistMsg::from(cmd));
    }
}
