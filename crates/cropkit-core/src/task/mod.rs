//! Asynchronous, cancellable crop tasks.
//!
//! # Architecture
//!
//! - `CropTask` - Owns one request; `start` moves it onto the blocking pool
//! - `CropHandle` - Lightweight handle to cancel or await the background part
//! - `Stages` - The decoder, transformer, resizer and sink a task calls
//! - `CompletionContext` - Where the outcome is delivered to the observer
//!
//! # Example
//!
//! ```ignore
//! let budget = MemoryBudget::from_config(&config);
//! let stages = Stages::from_config(&config, &budget);
//! let (queue, mut pump) = DeliveryQueue::channel();
//!
//! let request = CropRequest::builder(geometry)
//!     .stored(StoredImage::new("photo.jpg", 4000, 3000))
//!     .bounds(800, 600)
//!     .sizing(SizingPolicy::Fit)
//!     .build();
//!
//! let mut handle = CropTask::new(request, ObserverHandle::new(&view), stages, runtime, queue)
//!     .with_config(config)
//!     .start();
//!
//! // Later, on the thread that owns `view`
//! pump.pump();
//! ```

mod context;
mod observer;
mod outcome;
mod pipeline;
mod request;

pub use context::{Completion, CompletionContext, ContextClosed, DeliveryPump, DeliveryQueue};
pub use observer::{CropObserver, ObserverHandle};
pub use outcome::CropOutcome;
pub use request::{CropRequest, CropRequestBuilder, CropSource};

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::buffer::MemoryBudget;
use crate::config::CropConfig;
use crate::decode::{FileDecoder, SampledDecoder};
use crate::error::CropError;
use crate::persist::{FileSink, PersistSink};
use crate::resize::{PixelResizer, Resizer};
use crate::transform::{PixelTransformer, Transformer};
use pipeline::{Interrupt, Pipeline};

/// The collaborators a task calls, in pipeline order.
///
/// `budget` is the memory budget the stages allocate from; the task uses it
/// for the copies it makes itself when retrying after OOM.
#[derive(Clone)]
pub struct Stages {
    pub decoder: Arc<dyn SampledDecoder>,
    pub transformer: Arc<dyn Transformer>,
    pub resizer: Arc<dyn Resizer>,
    pub sink: Arc<dyn PersistSink>,
    pub budget: MemoryBudget,
}

impl Stages {
    /// The default file decoder, pixel transformer and resizer, and file sink.
    pub fn from_config(config: &CropConfig, budget: &MemoryBudget) -> Self {
        Self {
            decoder: Arc::new(FileDecoder::new(budget.clone())),
            transformer: Arc::new(PixelTransformer::from_config(config, budget.clone())),
            resizer: Arc::new(PixelResizer::from_config(config, budget.clone())),
            sink: Arc::new(FileSink::new()),
            budget: budget.clone(),
        }
    }

    pub fn with_decoder(mut self, decoder: Arc<dyn SampledDecoder>) -> Self {
        self.decoder = decoder;
        self
    }

    pub fn with_transformer(mut self, transformer: Arc<dyn Transformer>) -> Self {
        self.transformer = transformer;
        self
    }

    pub fn with_resizer(mut self, resizer: Arc<dyn Resizer>) -> Self {
        self.resizer = resizer;
        self
    }

    pub fn with_sink(mut self, sink: Arc<dyn PersistSink>) -> Self {
        self.sink = sink;
        self
    }
}

/// One crop, from source to delivered outcome.
///
/// Construction does no I/O and allocates no image memory. [`start`](Self::start)
/// consumes the task, so it can only run once.
pub struct CropTask {
    request: CropRequest,
    observer: ObserverHandle,
    stages: Stages,
    config: CropConfig,
    background: Handle,
    completion: Arc<dyn CompletionContext>,
    cancellation: CancellationToken,
}

impl CropTask {
    /// Create a task that runs on `background` and delivers on `completion`.
    pub fn new(
        request: CropRequest,
        observer: ObserverHandle,
        stages: Stages,
        background: Handle,
        completion: impl CompletionContext + 'static,
    ) -> Self {
        Self {
            request,
            observer,
            stages,
            config: CropConfig::default(),
            background,
            completion: Arc::new(completion),
            cancellation: CancellationToken::new(),
        }
    }

    pub fn with_config(mut self, config: CropConfig) -> Self {
        self.config = config;
        self
    }

    /// Request cancellation. Idempotent and safe from any thread.
    pub fn cancel(&self) {
        self.cancellation.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }

    /// Schedule the pipeline on the background runtime and return immediately.
    pub fn start(self) -> CropHandle {
        let cancellation = self.cancellation.clone();
        debug!(
            destination = self.request.destination().is_some(),
            "Starting crop task"
        );
        let background = self.background.clone();
        let join = background.spawn_blocking(move || self.run());
        CropHandle {
            cancellation,
            join: Some(join),
        }
    }

    fn run(self) {
        let Self {
            request,
            observer,
            stages,
            config,
            completion,
            cancellation,
            ..
        } = self;

        let was_persist_attempt = request.destination().is_some();
        let pipeline = Pipeline {
            stages: &stages,
            config: &config,
            cancellation: &cancellation,
        };

        let result = panic::catch_unwind(AssertUnwindSafe(|| {
            pipeline.execute(request.into_parts())
        }));

        let outcome = match result {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(Interrupt::Cancelled)) => return,
            Ok(Err(Interrupt::Failed(error))) => {
                warn!(error = %error, was_persist_attempt, "Crop failed");
                CropOutcome::Failed {
                    error,
                    was_persist_attempt,
                }
            }
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                warn!(%message, "Crop stage panicked");
                CropOutcome::Failed {
                    error: CropError::Internal(message),
                    was_persist_attempt,
                }
            }
        };

        deliver(outcome, observer, cancellation, completion.as_ref());
    }
}

/// Hand the outcome to the completion context, which passes it to the observer.
///
/// Wherever delivery stops, the outcome is dropped and any bitmap it carries
/// is released.
fn deliver(
    outcome: CropOutcome,
    observer: ObserverHandle,
    cancellation: CancellationToken,
    completion: &dyn CompletionContext,
) {
    if cancellation.is_cancelled() {
        debug!("Crop cancelled before delivery");
        return;
    }

    let job: Completion = Box::new(move || {
        if cancellation.is_cancelled() {
            debug!("Crop cancelled before delivery");
            return;
        }
        match observer.deliver(outcome) {
            Ok(()) => info!("Crop outcome delivered"),
            Err(_unclaimed) => debug!("Crop observer gone, releasing outcome"),
        }
    });

    if let Err(e) = completion.dispatch(job) {
        warn!(error = %e, "Crop outcome dropped");
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "stage panicked".to_string()
    }
}

/// Handle to a started crop task.
#[derive(Debug)]
pub struct CropHandle {
    cancellation: CancellationToken,
    join: Option<JoinHandle<()>>,
}

impl CropHandle {
    /// Request cancellation.
    ///
    /// Cancellation is cooperative: a stage already running finishes, but no
    /// outcome is delivered afterwards and its buffers are released.
    pub fn cancel(&self) {
        if !self.cancellation.is_cancelled() {
            info!("Crop cancellation requested");
        }
        self.cancellation.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }

    /// Wait for the background part of the task to finish.
    ///
    /// Delivery may still be pending on the completion context afterwards.
    pub async fn finished(&mut self) {
        if let Some(join) = self.join.take() {
            if let Err(e) = join.await {
                warn!(error = %e, "Crop task did not run to completion");
            }
        }
    }
}
