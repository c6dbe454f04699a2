use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread;
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, Sender};

use crate::overlay::display_mode::DisplayMode;
use crate::overlay::frame_processor::{DetectionFault, FrameProcessor};
use crate::playback::fps_counter::FpsCounter;
use crate::playback::handoff_queue::{HandoffQueue, HandoffSender, PushOutcome};
use crate::shared::constants::{FALLBACK_FPS, HANDOFF_QUEUE_CAPACITY, MIN_PACING_SLEEP};
use crate::shared::detection::Detection;
use crate::shared::frame::Frame;
use crate::shared::source_info::SourceInfo;
use crate::video::domain::video_source::VideoSource;

/// Out-of-band notifications from the playback thread.
#[derive(Clone, Debug, PartialEq)]
pub enum PlayerEvent {
    /// A finite source reached end-of-stream; position was reset to 0.
    Finished,
    /// The source failed mid-read; playback stopped.
    SourceError(String),
    /// Inference was switched off after repeated failures.
    DetectionDisabled(String),
}

/// A processed frame ready for display.
#[derive(Debug)]
pub struct RenderFrame {
    pub frame: Frame,
    pub detections: Vec<Detection>,
    /// Rolling playback rate at the moment this frame was produced.
    pub fps: f64,
}

#[derive(Clone, Debug, PartialEq)]
pub struct PlaybackState {
    /// Index of the next frame the source will produce.
    pub position: u64,
    pub frame_count: Option<u64>,
    pub playing: bool,
    pub target_fps: f64,
}

pub struct PlayerConfig {
    pub queue_capacity: usize,
    /// Playback rate override; `None` plays at the source's native rate.
    pub target_fps: Option<f64>,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            queue_capacity: HANDOFF_QUEUE_CAPACITY,
            target_fps: None,
        }
    }
}

/// Source handle plus position counter, shared between the playback
/// thread and the seek path under one mutex.
struct SharedSource {
    source: Box<dyn VideoSource>,
    position: u64,
}

/// Drives a background thread that reads, processes and queues frames,
/// and serializes seeks against it.
///
/// The mutex over the source is held for the read/seek critical section
/// only, never across inference, so a seek is not stuck behind a slow
/// model. The handoff queue is the sole data channel to the render loop;
/// control flow arrives separately through [`PlayerEvent`]s.
pub struct Player {
    shared: Arc<Mutex<SharedSource>>,
    processor: Arc<Mutex<FrameProcessor>>,
    /// Most recent unprocessed frame, kept so threshold and mode changes
    /// can re-render while paused.
    last_raw: Arc<Mutex<Option<Frame>>>,
    queue: HandoffQueue<RenderFrame>,
    event_tx: Sender<PlayerEvent>,
    event_rx: Receiver<PlayerEvent>,
    stop: Arc<AtomicBool>,
    handle: Option<thread::JoinHandle<()>>,
    info: SourceInfo,
    target_fps: f64,
}

impl Player {
    pub fn new(
        source: Box<dyn VideoSource>,
        processor: FrameProcessor,
        config: PlayerConfig,
    ) -> Self {
        let info = source.info().clone();
        let target_fps = config
            .target_fps
            .filter(|fps| *fps > 0.0)
            .unwrap_or(if info.fps > 0.0 { info.fps } else { FALLBACK_FPS });
        let position = source.position();
        let (event_tx, event_rx) = crossbeam_channel::unbounded();

        Self {
            shared: Arc::new(Mutex::new(SharedSource { source, position })),
            processor: Arc::new(Mutex::new(processor)),
            last_raw: Arc::new(Mutex::new(None)),
            queue: HandoffQueue::with_capacity(config.queue_capacity.max(1)),
            event_tx,
            event_rx,
            stop: Arc::new(AtomicBool::new(false)),
            handle: None,
            info,
            target_fps,
        }
    }

    pub fn info(&self) -> &SourceInfo {
        &self.info
    }

    pub fn is_playing(&self) -> bool {
        self.handle.as_ref().map_or(false, |h| !h.is_finished())
    }

    /// Starts the background playback thread. No-op while playing.
    pub fn play(&mut self) {
        if self.is_playing() {
            return;
        }
        // Reap a thread that ended on its own (end-of-stream or error)
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
        self.queue.drain();
        self.stop.store(false, Ordering::Relaxed);

        let ctx = LoopContext {
            shared: self.shared.clone(),
            processor: self.processor.clone(),
            last_raw: self.last_raw.clone(),
            sender: self.queue.sender(),
            events: self.event_tx.clone(),
            stop: self.stop.clone(),
            target_interval: Duration::from_secs_f64(1.0 / self.target_fps),
            live: self.info.is_live(),
        };
        self.handle = Some(thread::spawn(move || playback_loop(ctx)));
    }

    /// Stops playback. The background thread is fully joined before this
    /// returns; the queue is drained so stale frames never reach the
    /// render loop after a pause.
    pub fn pause(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
        self.queue.drain();
    }

    /// Repositions to `target`, clamped into range, and returns the frame
    /// there for immediate display. Playback, if it was running, stops for
    /// the duration of the seek and resumes afterwards.
    pub fn seek(&mut self, target: u64) -> Result<RenderFrame, Box<dyn std::error::Error>> {
        let Some(count) = self.info.frame_count else {
            return Err("cannot seek a live source".into());
        };
        if count == 0 {
            return Err("source has no frames".into());
        }
        let target = target.min(count - 1);

        let was_playing = self.is_playing();
        self.pause();

        let frame = {
            let mut shared = lock(&self.shared);
            shared.source.seek(target)?;
            let frame = shared
                .source
                .read()?
                .ok_or("seek landed past end of stream")?;
            shared.position = shared.source.position();
            frame
        };

        *lock(&self.last_raw) = Some(frame.clone());
        let output = lock(&self.processor).process(&frame);
        self.forward_fault(output.fault);

        if was_playing {
            self.play();
        }

        Ok(RenderFrame {
            frame: output.frame,
            detections: output.detections,
            fps: 0.0,
        })
    }

    /// Seeks relative to the current position, clamping at both ends.
    pub fn jump(&mut self, delta: i64) -> Result<RenderFrame, Box<dyn std::error::Error>> {
        let position = lock(&self.shared).position;
        let target = position.saturating_add_signed(delta);
        self.seek(target)
    }

    /// Next processed frame, if one is waiting. Intended to be called from
    /// a fixed-interval render timer.
    pub fn poll_frame(&self) -> Option<RenderFrame> {
        self.queue.try_pop()
    }

    pub fn poll_event(&self) -> Option<PlayerEvent> {
        self.event_rx.try_recv().ok()
    }

    pub fn state(&self) -> PlaybackState {
        PlaybackState {
            position: lock(&self.shared).position,
            frame_count: self.info.frame_count,
            playing: self.is_playing(),
            target_fps: self.target_fps,
        }
    }

    /// Updates inference thresholds; while paused, the current frame is
    /// re-rendered with the new values and returned.
    pub fn set_thresholds(&mut self, confidence: f64, iou: f64) -> Option<RenderFrame> {
        {
            let mut processor = lock(&self.processor);
            let mut options = processor.options();
            options.confidence = confidence;
            options.iou = iou;
            processor.set_options(options);
        }
        self.rerender_if_paused()
    }

    /// Toggles persistent track identities on the returned detections.
    pub fn set_tracking(&mut self, with_track_ids: bool) -> Option<RenderFrame> {
        {
            let mut processor = lock(&self.processor);
            let mut options = processor.options();
            options.with_track_ids = with_track_ids;
            processor.set_options(options);
        }
        self.rerender_if_paused()
    }

    pub fn set_display_mode(&mut self, mode: DisplayMode) -> Option<RenderFrame> {
        lock(&self.processor).set_mode(mode);
        self.rerender_if_paused()
    }

    pub fn set_detection_enabled(&mut self, enabled: bool) -> Option<RenderFrame> {
        lock(&self.processor).set_detection_enabled(enabled);
        self.rerender_if_paused()
    }

    /// Re-processes the most recent raw frame so setting changes take
    /// effect immediately while paused. Returns `None` during playback
    /// (the next frame will reflect the change anyway) or before any
    /// frame was shown.
    fn rerender_if_paused(&mut self) -> Option<RenderFrame> {
        if self.is_playing() {
            return None;
        }
        let raw = lock(&self.last_raw).clone()?;
        let output = lock(&self.processor).process(&raw);
        self.forward_fault(output.fault);
        Some(RenderFrame {
            frame: output.frame,
            detections: output.detections,
            fps: 0.0,
        })
    }

    fn forward_fault(&self, fault: Option<DetectionFault>) {
        if let Some(DetectionFault::Disabled(message)) = fault {
            let _ = self.event_tx.send(PlayerEvent::DetectionDisabled(message));
        }
    }
}

impl Drop for Player {
    fn drop(&mut self) {
        self.pause();
    }
}

/// Everything the playback thread needs, moved in at spawn.
struct LoopContext {
    shared: Arc<Mutex<SharedSource>>,
    processor: Arc<Mutex<FrameProcessor>>,
    last_raw: Arc<Mutex<Option<Frame>>>,
    sender: HandoffSender<RenderFrame>,
    events: Sender<PlayerEvent>,
    stop: Arc<AtomicBool>,
    target_interval: Duration,
    live: bool,
}

fn playback_loop(ctx: LoopContext) {
    let mut fps = FpsCounter::default();

    loop {
        if ctx.stop.load(Ordering::Relaxed) {
            break;
        }
        let started = Instant::now();

        // Read under the lock; the lock is released before inference.
        let frame = {
            let mut shared = lock(&ctx.shared);
            match shared.source.read() {
                Ok(Some(frame)) => {
                    shared.position = shared.source.position();
                    frame
                }
                Ok(None) => {
                    if ctx.live {
                        let _ = ctx.events.send(PlayerEvent::SourceError(
                            "live source stopped producing frames".into(),
                        ));
                    } else {
                        if let Err(e) = shared.source.seek(0) {
                            log::warn!("rewind after end of stream failed: {e}");
                        }
                        shared.position = 0;
                        let _ = ctx.events.send(PlayerEvent::Finished);
                    }
                    break;
                }
                Err(e) => {
                    let _ = ctx.events.send(PlayerEvent::SourceError(e.to_string()));
                    break;
                }
            }
        };

        *lock(&ctx.last_raw) = Some(frame.clone());

        let output = lock(&ctx.processor).process(&frame);
        if let Some(DetectionFault::Disabled(message)) = output.fault {
            let _ = ctx.events.send(PlayerEvent::DetectionDisabled(message));
        }

        fps.record(started.elapsed());

        match ctx.sender.push(RenderFrame {
            frame: output.frame,
            detections: output.detections,
            fps: fps.value(),
        }) {
            PushOutcome::Delivered => {}
            PushOutcome::Dropped => {
                log::debug!("render queue full, dropping frame");
            }
            PushOutcome::Disconnected => break,
        }

        let elapsed = started.elapsed();
        let pause = ctx
            .target_interval
            .saturating_sub(elapsed)
            .max(MIN_PACING_SLEEP);
        thread::sleep(pause);
    }
}

/// A poisoned lock only means the playback thread panicked mid-frame;
/// the protected data is still usable, so recover instead of unwinding.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
