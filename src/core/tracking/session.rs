//! 跟踪会话：持有检测能力、稳定性状态与平滑状态，驱动异步检测循环
//!
//! `start()` warms up both capabilities and spawns the loop; `stop()` cancels it,
//! abandons any in-flight result and hands the source and capabilities back so
//! the session can be started again with fresh state.

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use log::{debug, error, info, warn};
use tokio::sync::{mpsc, watch, Notify};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

use crate::core::tracking::capability::{FaceLocator, FrameSource, LandmarkExtractor};
use crate::core::tracking::config::TrackingConfig;
use crate::core::tracking::error::{
    CapabilityError, ErrorKind, TrackingError, TrackingErrorEvent,
};
use crate::core::tracking::frame::{BoundingBox, Frame, FrameInfo, LandmarkSet};
use crate::core::tracking::pipeline::{Detection, TrackingEvent, TrackingPipeline};
use crate::core::tracking::scheduler::{DetectionScheduler, RetryPolicy, TickDecision};
use crate::core::tracking::shape::{FaceShape, ShapeClassifier};

/// 帧来源和两个检测能力，会话停止后归还
pub struct SessionParts {
    pub source: Box<dyn FrameSource>,
    pub locator: Arc<dyn FaceLocator>,
    pub extractor: Arc<dyn LandmarkExtractor>,
}

impl SessionParts {
    pub fn new(
        source: impl FrameSource + 'static,
        locator: impl FaceLocator + 'static,
        extractor: impl LandmarkExtractor + 'static,
    ) -> Self {
        Self {
            source: Box::new(source),
            locator: Arc::new(locator),
            extractor: Arc::new(extractor),
        }
    }
}

/// 会话统计
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionStats {
    pub ticks: u64,
    pub ticks_busy: u64,
    pub ticks_throttled: u64,
    pub ticks_backing_off: u64,
    pub frames_missing: u64,
    pub frames_rejected: u64,
    pub cycles_issued: u64,
    pub cycles_completed: u64,
    pub cycles_failed: u64,
    pub results_abandoned: u64,
}

pub struct TrackingChannels {
    pub events: mpsc::UnboundedReceiver<TrackingEvent>,
    pub errors: mpsc::UnboundedReceiver<TrackingErrorEvent>,
}

#[derive(Default)]
struct CancelSignal {
    flag: AtomicBool,
    notify: Notify,
}

impl CancelSignal {
    fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
        self.notify.notify_one();
    }

    fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    async fn cancelled(&self) {
        while !self.is_cancelled() {
            self.notify.notified().await;
        }
    }
}

struct WorkerContext {
    cancel: Arc<CancelSignal>,
    shape_request: Arc<AtomicBool>,
    events: mpsc::UnboundedSender<TrackingEvent>,
    errors: mpsc::UnboundedSender<TrackingErrorEvent>,
    latest_box: watch::Sender<Option<BoundingBox>>,
}

impl WorkerContext {
    fn notify_error(&self, kind: ErrorKind, message: String, consecutive_failures: u32, fatal: bool) {
        let sent = self.errors.send(TrackingErrorEvent {
            kind,
            message,
            consecutive_failures,
            fatal,
        });
        if sent.is_err() {
            debug!("error subscriber dropped, {:?} notification discarded", kind);
        }
    }
}

struct WorkerExit {
    parts: SessionParts,
    result: Result<SessionStats, TrackingError>,
}

pub struct TrackingSession {
    config: TrackingConfig,
    parts: Option<SessionParts>,
    cancel: Arc<CancelSignal>,
    shape_request: Arc<AtomicBool>,
    latest_box: Option<watch::Receiver<Option<BoundingBox>>>,
    worker: Option<JoinHandle<WorkerExit>>,
}

impl TrackingSession {
    pub fn new(config: TrackingConfig, parts: SessionParts) -> Result<Self, TrackingError> {
        config.validate()?;
        Ok(Self {
            config,
            parts: Some(parts),
            cancel: Arc::new(CancelSignal::default()),
            shape_request: Arc::new(AtomicBool::new(false)),
            latest_box: None,
            worker: None,
        })
    }

    pub async fn start(&mut self) -> Result<TrackingChannels, TrackingError> {
        if self.worker.is_some() {
            return Err(TrackingError::AlreadyRunning);
        }
        let parts = self.parts.take().ok_or_else(|| {
            TrackingError::Worker("capabilities were lost by a previous worker".to_string())
        })?;

        info!("🔧 TrackingSession: warming up face locator and landmark extractor");
        let warm_up = match parts.locator.warm_up().await {
            Ok(()) => parts.extractor.warm_up().await,
            Err(e) => Err(e),
        };
        if let Err(e) = warm_up {
            error!("❌ TrackingSession: model unavailable: {}", e);
            self.parts = Some(parts);
            return Err(TrackingError::ModelUnavailable(e.to_string()));
        }

        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let (error_tx, error_rx) = mpsc::unbounded_channel();
        let (box_tx, box_rx) = watch::channel(None);

        self.cancel = Arc::new(CancelSignal::default());
        self.shape_request.store(false, Ordering::SeqCst);
        self.latest_box = Some(box_rx);

        let ctx = WorkerContext {
            cancel: Arc::clone(&self.cancel),
            shape_request: Arc::clone(&self.shape_request),
            events: event_tx,
            errors: error_tx,
            latest_box: box_tx,
        };
        self.worker = Some(tokio::spawn(run_worker(self.config.clone(), parts, ctx)));

        info!(
            "✅ TrackingSession: started (interval {}ms, {} centered frames to lock)",
            self.config.detection_interval_ms, self.config.required_centered_frames
        );
        Ok(TrackingChannels {
            events: event_rx,
            errors: error_rx,
        })
    }

    /// Stops the loop and returns its statistics, or the error that ended it.
    pub async fn stop(&mut self) -> Result<SessionStats, TrackingError> {
        let worker = self.worker.take().ok_or(TrackingError::NotRunning)?;
        self.cancel.cancel();
        self.latest_box = None;

        match worker.await {
            Ok(exit) => {
                self.parts = Some(exit.parts);
                info!("🛑 TrackingSession: stopped");
                exit.result
            }
            Err(e) => {
                error!("❌ TrackingSession: worker failed: {}", e);
                Err(TrackingError::Worker(e.to_string()))
            }
        }
    }

    pub fn is_running(&self) -> bool {
        self.worker.as_ref().is_some_and(|w| !w.is_finished())
    }

    /// The next cycle with a face box carries a classified shape in its event.
    pub fn request_shape_analysis(&self) {
        self.shape_request.store(true, Ordering::SeqCst);
    }

    pub fn latest_face_box(&self) -> Option<BoundingBox> {
        self.latest_box.as_ref().and_then(|rx| *rx.borrow())
    }

    pub fn classify_latest(&self) -> Option<FaceShape> {
        self.latest_face_box().as_ref().map(ShapeClassifier::classify)
    }

    pub fn config(&self) -> &TrackingConfig {
        &self.config
    }
}

impl Drop for TrackingSession {
    fn drop(&mut self) {
        if self.worker.is_some() {
            self.cancel.cancel();
            info!("🗑️ TrackingSession: dropped while running, cancelling worker");
        }
    }
}

type CycleFuture = Pin<Box<dyn Future<Output = CycleOutcome> + Send>>;

struct CycleOutcome {
    info: FrameInfo,
    face_box: Result<Option<BoundingBox>, CapabilityError>,
    landmarks: Result<Option<LandmarkSet>, CapabilityError>,
}

async fn run_worker(config: TrackingConfig, mut parts: SessionParts, ctx: WorkerContext) -> WorkerExit {
    let result = drive(&config, &mut parts, &ctx).await;
    if let Err(e) = &result {
        error!("❌ tracking loop ended: {}", e);
    }
    WorkerExit { parts, result }
}

async fn drive(
    config: &TrackingConfig,
    parts: &mut SessionParts,
    ctx: &WorkerContext,
) -> Result<SessionStats, TrackingError> {
    let mut pipeline = TrackingPipeline::with_config(config);
    let mut scheduler = DetectionScheduler::new(
        config.detection_interval(),
        RetryPolicy::fixed(config.retry_backoff()),
    );
    let mut stats = SessionStats::default();
    let mut in_flight: Option<CycleFuture> = None;

    let mut ticker = tokio::time::interval(config.tick_interval());
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        if ctx.cancel.is_cancelled() {
            break;
        }

        tokio::select! {
            biased;

            _ = ctx.cancel.cancelled() => break,

            outcome = poll_cycle(&mut in_flight), if in_flight.is_some() => {
                in_flight = None;
                if ctx.cancel.is_cancelled() {
                    stats.results_abandoned += 1;
                    break;
                }
                apply_outcome(outcome, config, &mut pipeline, &mut scheduler, &mut stats, ctx)?;
            }

            _ = ticker.tick() => {
                stats.ticks += 1;
                let now = Instant::now();
                match scheduler.tick(now) {
                    TickDecision::Busy => stats.ticks_busy += 1,
                    TickDecision::Throttled => stats.ticks_throttled += 1,
                    TickDecision::BackingOff => stats.ticks_backing_off += 1,
                    TickDecision::Ready => {
                        let Some(frame) = parts.source.next_frame() else {
                            stats.frames_missing += 1;
                            continue;
                        };
                        if !frame.has_valid_size() {
                            warn!("frame #{} has zero size, skipping", frame.frame_number);
                            stats.frames_rejected += 1;
                            continue;
                        }
                        if !scheduler.accept_frame(&frame) {
                            stats.frames_rejected += 1;
                            continue;
                        }

                        scheduler.begin_cycle(now);
                        stats.cycles_issued += 1;
                        in_flight = Some(issue_cycle(
                            frame,
                            Arc::clone(&parts.locator),
                            Arc::clone(&parts.extractor),
                            config.detection_timeout(),
                        ));
                    }
                }
            }
        }
    }

    if in_flight.take().is_some() {
        debug!("abandoning in-flight detection cycle");
        stats.results_abandoned += 1;
    }
    info!(
        "📊 tracking loop finished: {} cycles issued, {} completed, {} failed",
        stats.cycles_issued, stats.cycles_completed, stats.cycles_failed
    );
    Ok(stats)
}

async fn poll_cycle(in_flight: &mut Option<CycleFuture>) -> CycleOutcome {
    match in_flight {
        Some(cycle) => cycle.await,
        None => std::future::pending().await,
    }
}

/// The frame moves into the cycle and is dropped when both calls return.
fn issue_cycle(
    frame: Frame,
    locator: Arc<dyn FaceLocator>,
    extractor: Arc<dyn LandmarkExtractor>,
    limit: Duration,
) -> CycleFuture {
    Box::pin(async move {
        let info = frame.info();
        let (face_box, landmarks) = tokio::join!(
            bounded(limit, locator.locate(&frame)),
            bounded(limit, extractor.extract_landmarks(&frame)),
        );
        CycleOutcome {
            info,
            face_box,
            landmarks,
        }
    })
}

async fn bounded<T>(
    limit: Duration,
    call: impl Future<Output = Result<T, CapabilityError>>,
) -> Result<T, CapabilityError> {
    tokio::time::timeout(limit, call)
        .await
        .unwrap_or(Err(CapabilityError::Timeout(limit)))
}

/// Prefers a fatal error when both capabilities failed.
fn worst_error(
    locator: Option<CapabilityError>,
    extractor: Option<CapabilityError>,
) -> Option<CapabilityError> {
    match (locator, extractor) {
        (Some(a), Some(b)) if b.is_fatal() && !a.is_fatal() => Some(b),
        (a, b) => a.or(b),
    }
}

fn apply_outcome(
    outcome: CycleOutcome,
    config: &TrackingConfig,
    pipeline: &mut TrackingPipeline,
    scheduler: &mut DetectionScheduler,
    stats: &mut SessionStats,
    ctx: &WorkerContext,
) -> Result<(), TrackingError> {
    let now = Instant::now();

    match (outcome.face_box, outcome.landmarks) {
        (Ok(face_box), Ok(landmarks)) => {
            scheduler.finish_cycle(true, now);
            stats.cycles_completed += 1;

            if ctx.shape_request.swap(false, Ordering::SeqCst) {
                pipeline.request_shape_analysis();
            }
            let result = pipeline.process_detection(
                &outcome.info,
                Detection {
                    face_box,
                    landmarks,
                },
            );
            ctx.latest_box.send_replace(pipeline.latest_face_box());

            if let Some(e) = result.pose_error {
                ctx.notify_error(ErrorKind::DegeneratePose, e.to_string(), 0, false);
            }
            if ctx.events.send(result.event).is_err() {
                debug!(
                    "event subscriber dropped, frame #{} event discarded",
                    outcome.info.frame_number
                );
            }
            Ok(())
        }
        (face_box, landmarks) => {
            let failures = scheduler.finish_cycle(false, now);
            stats.cycles_failed += 1;
            let Some(error) = worst_error(face_box.err(), landmarks.err()) else {
                return Ok(());
            };

            if error.is_fatal() {
                ctx.notify_error(error.kind(), error.to_string(), failures, true);
                return Err(TrackingError::ModelUnavailable(error.to_string()));
            }

            warn!(
                "⚠️ frame #{}: detection failed ({}/{} in a row), retrying in {}ms: {}",
                outcome.info.frame_number,
                failures,
                config.max_consecutive_failures,
                config.retry_backoff_ms,
                error
            );
            if failures >= config.max_consecutive_failures {
                let fatal = TrackingError::PersistentFailure(failures);
                ctx.notify_error(ErrorKind::PersistentFailure, fatal.to_string(), failures, true);
                return Err(fatal);
            }
            if failures >= config.transient_error_threshold {
                ctx.notify_error(error.kind(), error.to_string(), failures, false);
            }
            Ok(())
        }
    }
}
