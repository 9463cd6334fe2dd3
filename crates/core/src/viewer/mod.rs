//! Viewer controller: one task per preview that owns the animator, the
//! refresh debouncer and the host.
//!
//! All state transitions happen inside [`ViewerController::run`]. Input
//! arrives through a [`ViewerHandle`], timers are deadlines polled by the same
//! loop, and the only work that leaves the loop is the texture fetch. Its
//! result comes back over a channel tagged with the refresh that started it
//! and is dropped unless that refresh is still the one in flight.

use std::sync::Arc;

use tokio::{
    sync::{mpsc, watch},
    time::{sleep_until, Instant},
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use url::Url;

use crate::{
    animation::{ModeKind, RotationAnimator, RotationState},
    config::ViewerConfig,
    error::{FetchError, RenderError},
    material::MaterialApplier,
    media::{MediaAppearance, MediaModel},
    refresh::{RefreshDebouncer, RefreshRequest},
    render::{RebuildRequest, RenderHost},
    texture::{TextureHandle, TexturePipeline, Transport},
    timeline::earliest,
    PhysicalMediaError, Result,
};

#[derive(Debug, Clone, PartialEq)]
pub enum ViewerCommand {
    DragBegan,
    /// Translation accumulated since the drag began, in pointer units.
    DragMoved {
        dx: f32,
        dy: f32,
    },
    DragEnded,
    SetAppearance(MediaAppearance),
    Shutdown,
}

/// Snapshot published after every step of the viewer loop.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ViewerStatus {
    pub mode: ModeKind,
    pub rotation: RotationState,
    /// Raised while a refresh is settling; hosts show a loading indicator.
    pub refreshing: bool,
    pub completed_refreshes: u64,
    pub failed_refreshes: u64,
    pub applied_art: Option<Url>,
}

/// Cloneable input side of a running viewer.
#[derive(Debug, Clone)]
pub struct ViewerHandle {
    commands: mpsc::UnboundedSender<ViewerCommand>,
    status: watch::Receiver<ViewerStatus>,
}

impl ViewerHandle {
    pub fn send(&self, command: ViewerCommand) -> Result<()> {
        self.commands
            .send(command)
            .map_err(|_| PhysicalMediaError::msg("viewer has shut down"))
    }

    pub fn drag_began(&self) -> Result<()> {
        self.send(ViewerCommand::DragBegan)
    }

    pub fn drag_moved(&self, dx: f32, dy: f32) -> Result<()> {
        self.send(ViewerCommand::DragMoved { dx, dy })
    }

    pub fn drag_ended(&self) -> Result<()> {
        self.send(ViewerCommand::DragEnded)
    }

    pub fn set_appearance(&self, appearance: MediaAppearance) -> Result<()> {
        self.send(ViewerCommand::SetAppearance(appearance))
    }

    pub fn shutdown(&self) -> Result<()> {
        self.send(ViewerCommand::Shutdown)
    }

    pub fn status(&self) -> ViewerStatus {
        self.status.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<ViewerStatus> {
        self.status.clone()
    }
}

struct InFlightFetch {
    request: RefreshRequest,
    appearance: MediaAppearance,
    cancel: CancellationToken,
}

struct FetchOutcome {
    request: RefreshRequest,
    result: std::result::Result<TextureHandle, FetchError>,
}

enum LoopEvent {
    Command(Option<ViewerCommand>),
    Fetched(FetchOutcome),
    TimerDue,
}

pub struct ViewerController<H, T> {
    model: MediaModel,
    config: ViewerConfig,
    host: H,
    pipeline: Arc<TexturePipeline<T>>,
    applier: MaterialApplier,
    animator: RotationAnimator,
    debouncer: RefreshDebouncer,
    appearance: MediaAppearance,
    in_flight: Option<InFlightFetch>,
    commands: mpsc::UnboundedReceiver<ViewerCommand>,
    fetch_tx: mpsc::UnboundedSender<FetchOutcome>,
    fetch_rx: mpsc::UnboundedReceiver<FetchOutcome>,
    status: watch::Sender<ViewerStatus>,
    completed_refreshes: u64,
    failed_refreshes: u64,
    applied_art: Option<Url>,
}

impl<H: RenderHost, T: Transport> ViewerController<H, T> {
    /// Fails when `config` does not validate.
    pub fn new(
        model: MediaModel,
        appearance: MediaAppearance,
        config: ViewerConfig,
        host: H,
        pipeline: TexturePipeline<T>,
    ) -> Result<(Self, ViewerHandle)> {
        config.validate()?;
        let (command_tx, commands) = mpsc::unbounded_channel();
        let (fetch_tx, fetch_rx) = mpsc::unbounded_channel();
        let (status, status_rx) = watch::channel(ViewerStatus::default());

        let controller = Self {
            animator: RotationAnimator::new(config.animation.clone(), Instant::now()),
            debouncer: RefreshDebouncer::new(&config.refresh),
            model,
            config,
            host,
            pipeline: Arc::new(pipeline),
            applier: MaterialApplier::new(),
            appearance,
            in_flight: None,
            commands,
            fetch_tx,
            fetch_rx,
            status,
            completed_refreshes: 0,
            failed_refreshes: 0,
            applied_art: None,
        };
        let handle = ViewerHandle {
            commands: command_tx,
            status: status_rx,
        };
        Ok((controller, handle))
    }

    /// Loads the model, performs the initial restyle and then serves input
    /// and timers until shut down. Returns the host on a clean exit.
    pub async fn run(mut self) -> Result<H> {
        let entity = self.model.entity_name.clone();
        if let Err(err) = self.host.load_entity(&entity).await {
            error!(%entity, %err, "failed to load entity");
            return Err(err.into());
        }
        info!(%entity, kind = %self.model.kind, "viewer started");

        let now = Instant::now();
        self.animator = RotationAnimator::new(self.config.animation.clone(), now);
        self.orient();
        let initial = self.debouncer.fire_now(now);
        self.start_refresh(initial);
        self.publish();

        loop {
            let deadline = earliest(self.animator.next_deadline(), self.debouncer.next_deadline());
            let event = tokio::select! {
                command = self.commands.recv() => LoopEvent::Command(command),
                Some(outcome) = self.fetch_rx.recv() => LoopEvent::Fetched(outcome),
                _ = sleep_until_deadline(deadline) => LoopEvent::TimerDue,
            };

            match event {
                LoopEvent::Command(None | Some(ViewerCommand::Shutdown)) => break,
                LoopEvent::Command(Some(command)) => self.handle_command(command),
                LoopEvent::Fetched(outcome) => self.finish_refresh(outcome),
                LoopEvent::TimerDue => self.fire_timers(),
            }
            self.publish();
        }

        self.teardown();
        info!(%entity, "viewer stopped");
        Ok(self.host)
    }

    fn handle_command(&mut self, command: ViewerCommand) {
        let now = Instant::now();
        let moved = match command {
            ViewerCommand::DragBegan => self.animator.begin_drag(now),
            ViewerCommand::DragMoved { dx, dy } => self.animator.drag_to(dx, dy, now),
            ViewerCommand::DragEnded => self.animator.end_drag(now),
            ViewerCommand::SetAppearance(appearance) => {
                if appearance != self.appearance {
                    self.appearance = appearance;
                    let request = self.debouncer.notify_changed(now);
                    debug!(generation = request.generation(), "appearance changed");
                }
                false
            }
            ViewerCommand::Shutdown => false,
        };
        if moved {
            self.orient();
        }
    }

    fn fire_timers(&mut self) {
        let now = Instant::now();
        while self.animator.fire_due(now) {
            self.orient();
        }
        if let Some(request) = self.debouncer.poll(now) {
            self.start_refresh(request);
        }
    }

    fn start_refresh(&mut self, request: RefreshRequest) {
        if let Some(previous) = self.in_flight.take() {
            debug!(
                generation = previous.request.generation(),
                "superseding in-flight fetch"
            );
            previous.cancel.cancel();
        }

        let appearance = self.appearance.clone();
        info!(
            generation = request.generation(),
            art = %appearance.art_source,
            "refresh fired"
        );

        let cancel = CancellationToken::new();
        let token = cancel.clone();
        let pipeline = Arc::clone(&self.pipeline);
        let results = self.fetch_tx.clone();
        let uri = appearance.art_source.clone();
        tokio::spawn(async move {
            let result = pipeline.fetch_texture(&uri, &token).await;
            // The receiver is gone once the viewer has stopped.
            let _ = results.send(FetchOutcome { request, result });
        });

        self.in_flight = Some(InFlightFetch {
            request,
            appearance,
            cancel,
        });
    }

    fn finish_refresh(&mut self, outcome: FetchOutcome) {
        let Some(flight) = self.in_flight.take() else {
            debug!(generation = outcome.request.generation(), "discarding orphaned fetch result");
            return;
        };
        if flight.request != outcome.request || !self.debouncer.is_current(outcome.request) {
            debug!(generation = outcome.request.generation(), "discarding stale fetch result");
            self.in_flight = Some(flight);
            return;
        }

        match outcome.result {
            Ok(texture) => self.apply_texture(flight, texture),
            Err(err) if err.is_cancelled() => {
                debug!(generation = flight.request.generation(), "fetch cancelled");
            }
            Err(err) => {
                warn!(
                    generation = flight.request.generation(),
                    %err,
                    "refresh failed, keeping the previous appearance"
                );
                self.failed_refreshes += 1;
            }
        }
    }

    fn apply_texture(&mut self, flight: InFlightFetch, texture: TextureHandle) {
        let generation = flight.request.generation();
        let bindings = self.model.bindings(&flight.appearance, &texture);

        let Some(entity) = self.host.entity_mut(&self.model.entity_name) else {
            let err = RenderError::EntityMissing(self.model.entity_name.clone());
            warn!(generation, %err, "restyle failed, keeping the previous appearance");
            self.failed_refreshes += 1;
            return;
        };

        match self.applier.apply(entity, &bindings) {
            Ok(report) => {
                debug!(
                    generation,
                    updated = report.updated_materials,
                    skipped = report.skipped.len(),
                    "materials bound"
                );
                self.host.request_rebuild(&RebuildRequest {
                    entity_name: self.model.entity_name.clone(),
                    scale_factor: self.model.scale_factor(&flight.appearance),
                    generation,
                });
                self.completed_refreshes += 1;
                self.applied_art = Some(flight.appearance.art_source);
            }
            Err(err) => {
                warn!(generation, %err, "restyle failed, keeping the previous appearance");
                self.failed_refreshes += 1;
            }
        }
    }

    fn orient(&mut self) {
        self.host
            .set_orientation(&self.model.entity_name, self.animator.rotation());
    }

    fn publish(&self) {
        self.status.send_replace(ViewerStatus {
            mode: self.animator.mode().kind(),
            rotation: self.animator.rotation(),
            refreshing: self.debouncer.is_refreshing(),
            completed_refreshes: self.completed_refreshes,
            failed_refreshes: self.failed_refreshes,
            applied_art: self.applied_art.clone(),
        });
    }

    fn teardown(&mut self) {
        if let Some(flight) = self.in_flight.take() {
            flight.cancel.cancel();
        }
        self.debouncer.cancel();
        self.animator.halt();
        self.publish();
    }
}

async fn sleep_until_deadline(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
