//! Single-run exclusivity.
//!
//! At most one run may be active process-wide. A second start attempt is
//! rejected with an explicit error, never queued.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::application::run_controller::RunController;
use crate::domain::errors::{SweepError, SweepResult};
use crate::domain::models::{BestConfigWeights, Run, SweepDefinition};

struct ActiveRun {
    cancel: CancellationToken,
    done: Arc<AtomicBool>,
    // Taken by `wait`; the slot itself stays occupied until the run resolves.
    handle: Option<JoinHandle<Run>>,
}

impl ActiveRun {
    fn is_finished(&self) -> bool {
        self.done.load(Ordering::SeqCst)
            || self
                .handle
                .as_ref()
                .is_some_and(JoinHandle::is_finished)
    }
}

pub struct RunManager {
    controller: Arc<RunController>,
    active: Mutex<Option<ActiveRun>>,
}

impl RunManager {
    pub fn new(controller: Arc<RunController>) -> Self {
        Self {
            controller,
            active: Mutex::new(None),
        }
    }

    /// Start a run in the background.
    ///
    /// Returns `SweepError::AlreadyRunning` while a previous run is still in
    /// flight.
    pub async fn start(
        &self,
        definition: SweepDefinition,
        weights: BestConfigWeights,
    ) -> SweepResult<()> {
        let mut active = self.active.lock().await;
        if let Some(current) = active.as_ref() {
            if !current.is_finished() {
                return Err(SweepError::AlreadyRunning);
            }
        }
        let cancel = CancellationToken::new();
        let done = Arc::new(AtomicBool::new(false));
        let controller = Arc::clone(&self.controller);
        let token = cancel.clone();
        let task_done = Arc::clone(&done);
        let handle = tokio::spawn(async move {
            let run = controller.execute(definition, weights, token).await;
            task_done.store(true, Ordering::SeqCst);
            run
        });
        *active = Some(ActiveRun {
            cancel,
            done,
            handle: Some(handle),
        });
        Ok(())
    }

    /// Request cancellation of the active run, if any. Cooperative: the run
    /// winds down and still reaches a terminal state.
    pub async fn cancel(&self) {
        let active = self.active.lock().await;
        if let Some(current) = active.as_ref() {
            info!("run cancellation requested");
            current.cancel.cancel();
        }
    }

    /// Wait for the active run to reach a terminal state.
    ///
    /// The slot stays occupied while waiting, so `is_running` keeps reporting
    /// true and a concurrent `start` is still rejected until the run resolves.
    pub async fn wait(&self) -> Option<Run> {
        let handle = {
            let mut active = self.active.lock().await;
            match active.as_mut() {
                Some(current) => current.handle.take()?,
                None => return None,
            }
        };
        let run = handle.await.ok();
        *self.active.lock().await = None;
        run
    }

    pub async fn is_running(&self) -> bool {
        let active = self.active.lock().await;
        active.as_ref().is_some_and(|current| !current.is_finished())
    }
}
