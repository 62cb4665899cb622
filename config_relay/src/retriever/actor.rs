//! The task that owns a retriever's stores and state.
//!
//! Every state transition, snapshot replacement and listener callback
//! happens here. The public handle only sends commands and reads the
//! published [`Status`].

use std::sync::Arc;
use std::time::Duration;

use futures::future::{self, BoxFuture};
use tokio::sync::{mpsc, oneshot, watch};
use tracing::Instrument;

use crate::cycle::{CycleOutcome, CycleRunner};
use crate::options::MandatoryStorePolicy;
use crate::{RelayError, RelayResult, RelayResultExt};

use super::listener::{ConfigChange, ListenerSet};
use super::scheduler::Scheduler;
use super::{RetrieverState, Snapshot, Status};

pub(super) enum Command {
    Refresh(oneshot::Sender<RelayResult<()>>),
    Close(oneshot::Sender<()>),
}

pub(super) struct Actor {
    pub(super) runner: CycleRunner,
    pub(super) scheduler: Arc<dyn Scheduler>,
    pub(super) scan_period: Option<Duration>,
    pub(super) policy: MandatoryStorePolicy,
    pub(super) commands: mpsc::UnboundedReceiver<Command>,
    pub(super) status: watch::Sender<Status>,
    pub(super) listeners: Arc<ListenerSet>,
    pub(super) refresh_waiters: Vec<oneshot::Sender<RelayResult<()>>>,
    pub(super) close_waiters: Vec<oneshot::Sender<()>>,
    pub(super) cycles: u64,
}

impl Actor {
    pub(super) async fn run(mut self) {
        if self.initialize().await {
            self.poll().await;
        }
        self.shutdown().await;
    }

    /// Run one cycle while serving commands. `None` means the retriever
    /// closed before the cycle settled and its result must be discarded.
    async fn cycle(&mut self) -> Option<CycleOutcome> {
        self.cycles += 1;
        let cycle = self.cycles;
        let runner = &self.runner;
        let settled = async move {
            tracing::debug!(stores = runner.len(), "configuration cycle started");
            let outcome = runner.run_cycle().await;
            tracing::debug!(
                succeeded = outcome.succeeded.len(),
                failed = outcome.failed.len(),
                "configuration cycle finished"
            );
            outcome
        }
        .instrument(tracing::info_span!("config_cycle", cycle));
        tokio::pin!(settled);

        loop {
            tokio::select! {
                biased;
                command = self.commands.recv() => match command {
                    Some(Command::Refresh(reply)) => {
                        tracing::trace!(cycle, "refresh coalesced onto the running cycle");
                        self.refresh_waiters.push(reply);
                    }
                    Some(Command::Close(reply)) => {
                        tracing::debug!(cycle, "discarding in-flight cycle on close");
                        self.close_waiters.push(reply);
                        return None;
                    }
                    None => return None,
                },
                outcome = &mut settled => return Some(outcome),
            }
        }
    }

    async fn initialize(&mut self) -> bool {
        let Some(outcome) = self.cycle().await else {
            return false;
        };
        self.report_failures(&outcome);
        let failures = outcome.failures();
        let mandatory_failed = self.policy == MandatoryStorePolicy::FailInitialization
            && outcome.mandatory_failures().next().is_some();

        let merged = if outcome.is_total_failure() || mandatory_failed {
            Err(RelayError::initialization(failures.clone()))
        } else {
            outcome.merge().into_relay()
        };
        let cycles = self.cycles;
        match merged {
            Ok(doc) => {
                let snapshot = Snapshot::new(Arc::new(doc), 1);
                tracing::info!(
                    version = snapshot.version(),
                    failed = failures.len(),
                    "configuration retriever initialized"
                );
                self.status.send_modify(|status| {
                    status.state = RetrieverState::Idle;
                    status.snapshot = Some(snapshot);
                    status.initial_failures = failures;
                    status.cycles = cycles;
                });
                self.answer_refreshes(&Ok(()));
                true
            }
            Err(error) => {
                tracing::warn!(%error, "configuration retriever failed to initialize");
                self.status.send_modify(|status| {
                    status.init_error = Some(Arc::clone(&error));
                    status.initial_failures = failures;
                    status.cycles = cycles;
                });
                false
            }
        }
    }

    async fn poll(&mut self) {
        loop {
            let delay: BoxFuture<'static, ()> = match self.scan_period {
                Some(period) => self.scheduler.delay(period),
                None => Box::pin(future::pending()),
            };
            tokio::select! {
                biased;
                command = self.commands.recv() => match command {
                    Some(Command::Refresh(reply)) => self.refresh_waiters.push(reply),
                    Some(Command::Close(reply)) => {
                        self.close_waiters.push(reply);
                        return;
                    }
                    None => return,
                },
                () = delay => {}
            }

            self.status
                .send_modify(|status| status.state = RetrieverState::Polling);
            let Some(outcome) = self.cycle().await else {
                return;
            };
            self.apply(&outcome);
            self.answer_refreshes(&Ok(()));
        }
    }

    fn apply(&self, outcome: &CycleOutcome) {
        self.report_failures(outcome);
        let cycles = self.cycles;
        let previous = self.status.borrow().snapshot.clone();

        let merged = if outcome.is_total_failure() {
            tracing::trace!("no store succeeded; keeping the current configuration");
            None
        } else {
            match outcome.merge() {
                Ok(doc) => Some(doc),
                Err(error) => {
                    tracing::warn!(%error, "cannot merge cycle results; keeping the current configuration");
                    None
                }
            }
        };
        let change = merged.and_then(|doc| match previous {
            Some(prev) if **prev.value() == doc => {
                tracing::trace!(version = prev.version(), "configuration unchanged");
                None
            }
            Some(prev) => Some(ConfigChange::new(
                Arc::clone(prev.value()),
                Arc::new(doc),
                prev.version() + 1,
            )),
            None => Some(ConfigChange::new(
                Arc::new(crate::document::empty()),
                Arc::new(doc),
                1,
            )),
        });

        let Some(change) = change else {
            self.status.send_modify(|status| {
                status.state = RetrieverState::Idle;
                status.cycles = cycles;
            });
            return;
        };
        tracing::info!(
            version = change.version(),
            changed = change.changed_paths().len(),
            "configuration changed"
        );
        let snapshot = Snapshot::new(Arc::clone(change.current()), change.version());
        self.status.send_modify(|status| {
            status.state = RetrieverState::Idle;
            status.snapshot = Some(snapshot);
            status.cycles = cycles;
        });
        self.listeners.change(&change);
    }

    fn report_failures(&self, outcome: &CycleOutcome) {
        for failure in outcome.failed.values() {
            if failure.is_optional() {
                tracing::debug!(
                    store = failure.index(),
                    store_type = failure.store_type(),
                    error = %failure.error(),
                    "optional configuration store failed"
                );
            } else {
                tracing::warn!(
                    store = failure.index(),
                    store_type = failure.store_type(),
                    error = %failure.error(),
                    "configuration store failed"
                );
            }
            self.listeners.error(failure);
        }
    }

    fn answer_refreshes(&mut self, result: &RelayResult<()>) {
        for waiter in self.refresh_waiters.drain(..) {
            waiter.send(result.clone()).ok();
        }
    }

    async fn shutdown(&mut self) {
        self.runner.close().await;
        self.status
            .send_modify(|status| status.state = RetrieverState::Closed);
        self.listeners.end();

        let error = self
            .status
            .borrow()
            .init_error
            .clone()
            .unwrap_or_else(RelayError::closed);
        self.answer_refreshes(&Err(error.clone()));

        self.commands.close();
        while let Ok(command) = self.commands.try_recv() {
            match command {
                Command::Refresh(reply) => {
                    reply.send(Err(error.clone())).ok();
                }
                Command::Close(reply) => self.close_waiters.push(reply),
            }
        }
        for waiter in self.close_waiters.drain(..) {
            waiter.send(()).ok();
        }
        tracing::debug!(cycles = self.cycles, "configuration retriever closed");
    }
}
