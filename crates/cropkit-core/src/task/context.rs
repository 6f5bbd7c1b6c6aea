//! Execution contexts that crop outcomes are delivered on.
//!
//! The pipeline runs on the tokio blocking pool; observers usually want their
//! callback somewhere else, such as a UI thread or a specific runtime. A
//! [`CompletionContext`] accepts the delivery closure and runs it there.
//!
//! [`DeliveryQueue`] and [`DeliveryPump`] cover the common case of a thread
//! that owns its observers and drains completions when convenient:
//!
//! ```ignore
//! let (queue, mut pump) = DeliveryQueue::channel();
//! let handle = CropTask::new(request, observer, stages, runtime, queue).start();
//!
//! // On the owning thread
//! pump.pump();
//! ```

use thiserror::Error;
use tokio::runtime::Handle;
use tokio::sync::mpsc;

/// A delivery closure waiting to run on a completion context.
pub type Completion = Box<dyn FnOnce() + Send + 'static>;

/// The context refused the completion; it is dropped unrun.
#[derive(Debug, Error)]
#[error("Completion context is closed")]
pub struct ContextClosed;

/// Somewhere completion closures can be run.
pub trait CompletionContext: Send + Sync {
    fn dispatch(&self, completion: Completion) -> Result<(), ContextClosed>;
}

impl CompletionContext for Handle {
    fn dispatch(&self, completion: Completion) -> Result<(), ContextClosed> {
        self.spawn(async move { completion() });
        Ok(())
    }
}

/// Sending side of a completion queue. Cheap to clone.
#[derive(Debug, Clone)]
pub struct DeliveryQueue {
    sender: mpsc::UnboundedSender<Completion>,
}

impl DeliveryQueue {
    /// Create a queue and the pump that drains it.
    pub fn channel() -> (Self, DeliveryPump) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, DeliveryPump { receiver })
    }
}

impl CompletionContext for DeliveryQueue {
    fn dispatch(&self, completion: Completion) -> Result<(), ContextClosed> {
        self.sender.send(completion).map_err(|_| ContextClosed)
    }
}

/// Receiving side of a [`DeliveryQueue`], owned by the delivering thread.
///
/// Dropping the pump drops every queued completion, releasing the outcomes
/// they carry.
#[derive(Debug)]
pub struct DeliveryPump {
    receiver: mpsc::UnboundedReceiver<Completion>,
}

impl DeliveryPump {
    /// Run every completion queued so far, without waiting. Returns how many ran.
    pub fn pump(&mut self) -> usize {
        let mut ran = 0;
        while let Ok(completion) = self.receiver.try_recv() {
            completion();
            ran += 1;
        }
        ran
    }

    /// Wait for the next completion and run it.
    ///
    /// Returns false once every [`DeliveryQueue`] is gone and the queue is empty.
    pub async fn next(&mut self) -> bool {
        match self.receiver.recv().await {
            Some(completion) => {
                completion();
                true
            }
            None => false,
        }
    }

    /// Run completions until every [`DeliveryQueue`] is gone.
    pub async fn run(mut self) {
        while self.next().await {}
    }
}
