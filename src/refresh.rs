use crate::join::merge;
use crate::model::{BaseFeature, KeyFields, MergedCollection};
use crate::scale::{ColorRamp, ColorScale};
use crate::source::{AggregateSource, Filter};
use anyhow::{Context, Result};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Request-generation token for one fetch → merge → scale run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ticket {
    generation: u64,
    filter: Filter,
}

impl Ticket {
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn filter(&self) -> &Filter {
        &self.filter
    }
}

/// A merged collection and its scale, ready for the render sink
#[derive(Debug, Clone)]
pub struct Rendered<G> {
    pub ticket: Ticket,
    pub merged: MergedCollection<G>,
    pub scale: ColorScale,
}

/// Result of a pipeline run, tagged with the ticket that started it
pub struct Outcome<G> {
    pub ticket: Ticket,
    pub result: Result<Rendered<G>>,
}

/// Hands out tickets and decides which outcomes are still worth publishing
#[derive(Debug, Default)]
pub struct RefreshController {
    generation: u64,
}

impl RefreshController {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a new run; every earlier ticket becomes stale.
    pub fn begin(&mut self, filter: Filter) -> Ticket {
        self.generation += 1;
        Ticket {
            generation: self.generation,
            filter,
        }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn is_current(&self, ticket: &Ticket) -> bool {
        ticket.generation == self.generation
    }

    /// `None` if a newer run has been started since this outcome's ticket.
    pub fn accept<G>(&self, outcome: Outcome<G>) -> Option<Result<Rendered<G>>> {
        if self.is_current(&outcome.ticket) {
            Some(outcome.result)
        } else {
            debug!(
                stale = outcome.ticket.generation,
                current = self.generation,
                "discarding stale refresh"
            );
            None
        }
    }
}

/// Fetch, merge and build the scale for one ticket.
pub fn run_pipeline<G>(
    ticket: Ticket,
    source: &dyn AggregateSource,
    base: &[BaseFeature<G>],
    fields: &KeyFields,
    ramp: &ColorRamp,
) -> Result<Rendered<G>>
where
    G: Clone + Send + Sync,
{
    let status = ticket.filter.status;
    let records = source
        .fetch(&ticket.filter)
        .with_context(|| format!("fetching {status} cases"))?;
    let merged = merge(base, &records, fields).context("joining cases onto geometry")?;
    let values: Vec<f64> = merged.counts().map(|c| c as f64).collect();
    let scale = ramp.build(&values)?;
    debug!(
        generation = ticket.generation,
        %status,
        stops = scale.len(),
        total = merged.total(),
        "pipeline complete"
    );
    Ok(Rendered { ticket, merged, scale })
}

/// Runs pipelines on the rayon pool and publishes only the latest one.
pub struct Refresher<G> {
    controller: RefreshController,
    source: Arc<dyn AggregateSource>,
    geometry: Arc<Vec<BaseFeature<G>>>,
    fields: KeyFields,
    ramp: ColorRamp,
    tx: Sender<Outcome<G>>,
    rx: Receiver<Outcome<G>>,
    pending: bool,
}

impl<G> Refresher<G>
where
    G: Clone + Send + Sync + 'static,
{
    pub fn new(
        source: Arc<dyn AggregateSource>,
        geometry: Arc<Vec<BaseFeature<G>>>,
        fields: KeyFields,
        ramp: ColorRamp,
    ) -> Self {
        let (tx, rx) = mpsc::channel();
        Self {
            controller: RefreshController::new(),
            source,
            geometry,
            fields,
            ramp,
            tx,
            rx,
            pending: false,
        }
    }

    /// Start a background run for `filter`, superseding any run in flight.
    pub fn request(&mut self, filter: Filter) -> Ticket {
        let ticket = self.controller.begin(filter);
        self.pending = true;

        let source = Arc::clone(&self.source);
        let geometry = Arc::clone(&self.geometry);
        let fields = self.fields.clone();
        let ramp = self.ramp.clone();
        let tx = self.tx.clone();
        let job = ticket.clone();

        rayon::spawn(move || {
            let result = run_pipeline(job.clone(), source.as_ref(), &geometry, &fields, &ramp);
            // Receiver only goes away on shutdown.
            let _ = tx.send(Outcome { ticket: job, result });
        });

        ticket
    }

    /// Drain finished runs without blocking; returns the current one if it landed.
    pub fn poll(&mut self) -> Option<Result<Rendered<G>>> {
        let mut latest = None;
        while let Ok(outcome) = self.rx.try_recv() {
            if let Some(result) = self.controller.accept(outcome) {
                self.pending = false;
                latest = Some(result);
            }
        }
        latest
    }

    /// Block until the current run finishes or `timeout` elapses.
    pub fn wait(&mut self, timeout: Duration) -> Option<Result<Rendered<G>>> {
        if !self.pending {
            return None;
        }
        let deadline = Instant::now() + timeout;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match self.rx.recv_timeout(remaining) {
                Ok(outcome) => {
                    if let Some(result) = self.controller.accept(outcome) {
                        self.pending = false;
                        return Some(result);
                    }
                }
                Err(RecvTimeoutError::Timeout) => {
                    warn!(generation = self.controller.generation(), "refresh timed out");
                    return None;
                }
                Err(RecvTimeoutError::Disconnected) => return None,
            }
        }
    }

    pub fn is_pending(&self) -> bool {
        self.pending
    }

    pub fn controller(&self) -> &RefreshController {
        &self.controller
    }

    pub fn geometry(&self) -> &Arc<Vec<BaseFeature<G>>> {
        &self.geometry
    }

    pub fn summary(&self) -> Result<Option<crate::source::CaseSummary>> {
        self.source.summary()
    }
}
