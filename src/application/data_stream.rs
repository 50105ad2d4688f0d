// Live data stream service - one generator feeding a bounded window
use crate::domain::error::ValidationError;
use crate::domain::generator::{Generator, GeneratorState};
use crate::domain::point::Point;
use crate::domain::window::RetainedWindow;
use crate::infrastructure::config::StreamSettings;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

const LIVE_CHANNEL_CAPACITY: usize = 1024;

struct StreamState {
    generator: Generator,
    window: RetainedWindow,
    /// Continuation anchor for the next generated point.
    last_point: Option<Point>,
}

impl StreamState {
    fn append(&mut self, point: Point) {
        self.last_point = Some(point.clone());
        self.window.push(point);
    }
}

#[derive(Clone)]
pub struct DataStreamService {
    state: Arc<Mutex<StreamState>>,
    updates: broadcast::Sender<Point>,
    ticker: Arc<Mutex<Option<JoinHandle<()>>>>,
    interval: Duration,
}

impl DataStreamService {
    /// Seeds the window with `settings.initial_count` points ending now.
    pub fn new(generator_state: GeneratorState, settings: &StreamSettings) -> Result<Self, ValidationError> {
        Self::with_generator(Generator::new(generator_state), settings)
    }

    pub fn with_generator(mut generator: Generator, settings: &StreamSettings) -> Result<Self, ValidationError> {
        let initial = generator.generate_initial_dataset(settings.initial_count)?;
        let mut window = RetainedWindow::new(settings.window_capacity);
        window.replace(initial);
        if window.is_empty() {
            tracing::info!("data stream starting with an empty window");
        }
        let last_point = window.last().cloned();

        let (updates, _) = broadcast::channel(LIVE_CHANNEL_CAPACITY);
        Ok(Self {
            state: Arc::new(Mutex::new(StreamState {
                generator,
                window,
                last_point,
            })),
            updates,
            ticker: Arc::new(Mutex::new(None)),
            interval: settings.interval(),
        })
    }

    fn state(&self) -> MutexGuard<'_, StreamState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn ticker(&self) -> MutexGuard<'_, Option<JoinHandle<()>>> {
        self.ticker.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Generate the next point, retain it and publish it to live subscribers.
    pub fn tick(&self) -> Result<Point, ValidationError> {
        let point = {
            let mut guard = self.state();
            let state = &mut *guard;
            let point = state.generator.generate_next_point(state.last_point.as_ref())?;
            state.append(point.clone());
            point
        };
        // No subscribers is fine.
        let _ = self.updates.send(point.clone());
        Ok(point)
    }

    /// Start ticking every `interval`. No-op while a ticker is still running;
    /// a ticker that stopped on a generation error is replaced.
    pub fn start_streaming(&self) {
        let mut ticker = self.ticker();
        if ticker.as_ref().is_some_and(|h| !h.is_finished()) {
            return;
        }

        let service = self.clone();
        let period = self.interval;
        *ticker = Some(tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.tick().await;
            loop {
                interval.tick().await;
                if let Err(e) = service.tick() {
                    tracing::error!("stopping stream, point generation failed: {}", e);
                    break;
                }
            }
        }));
        tracing::info!(interval_ms = period.as_millis() as u64, "data stream started");
    }

    pub fn stop_streaming(&self) {
        if let Some(handle) = self.ticker().take() {
            handle.abort();
            tracing::info!("data stream stopped");
        }
    }

    pub fn is_streaming(&self) -> bool {
        self.ticker().as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Append an externally supplied point; it becomes the continuation anchor.
    pub fn add_point(&self, point: Point) {
        self.state().append(point.clone());
        let _ = self.updates.send(point);
    }

    /// Empty the window. The next generated point anchors on the wall clock.
    pub fn clear(&self) {
        let mut guard = self.state();
        let state = &mut *guard;
        state.window.clear();
        state.last_point = None;
    }

    /// Replace the window with a freshly generated dataset of `count` points.
    pub fn reset(&self, count: i64) -> Result<usize, ValidationError> {
        let mut guard = self.state();
        let state = &mut *guard;
        let data = state.generator.generate_initial_dataset(count)?;
        state.window.replace(data);
        state.last_point = state.window.last().cloned();
        Ok(state.window.len())
    }

    pub fn snapshot(&self) -> Vec<Point> {
        self.state().window.to_vec()
    }

    pub fn len(&self) -> usize {
        self.state().window.len()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Point> {
        self.updates.subscribe()
    }
}
