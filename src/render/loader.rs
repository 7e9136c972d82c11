use super::{RenderError, RenderedTrack, TrackRenderer};
use futures::future::{BoxFuture, FutureExt, Shared};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{info, warn};

type LoadAttempt = Shared<BoxFuture<'static, Result<(), RenderError>>>;

enum LoadState {
    Idle,
    Loading(LoadAttempt),
    Loaded,
}

/// Wraps a renderer so its one-time `load` runs before the first render.
///
/// Concurrent renders await the same load attempt and share its result,
/// success or failure. A successful load is cached; after a failed or
/// timed-out attempt the next render starts a fresh one.
#[derive(Clone)]
pub struct LazyRenderer {
    inner: Arc<dyn TrackRenderer>,
    state: Arc<Mutex<LoadState>>,
    load_timeout: Duration,
}

impl LazyRenderer {
    pub fn new(inner: Arc<dyn TrackRenderer>, load_timeout: Duration) -> Self {
        Self {
            inner,
            state: Arc::new(Mutex::new(LoadState::Idle)),
            load_timeout,
        }
    }

    pub fn is_loaded(&self) -> bool {
        matches!(*self.state.lock().unwrap(), LoadState::Loaded)
    }

    /// Await the renderer's initialization, bounded by the load timeout
    pub async fn ensure_loaded(&self) -> Result<(), RenderError> {
        let attempt = {
            let mut state = self.state.lock().unwrap();
            match &*state {
                LoadState::Loaded => return Ok(()),
                LoadState::Loading(attempt) => attempt.clone(),
                LoadState::Idle => {
                    let attempt = self.start_load();
                    *state = LoadState::Loading(attempt.clone());
                    attempt
                }
            }
        };

        let result = attempt.clone().await;

        let mut state = self.state.lock().unwrap();
        if let LoadState::Loading(current) = &*state {
            // Only the attempt we awaited may settle the state
            if current.ptr_eq(&attempt) {
                *state = if result.is_ok() {
                    LoadState::Loaded
                } else {
                    LoadState::Idle
                };
            }
        }

        result
    }

    pub async fn render(&self, preview_text: &str) -> Result<RenderedTrack, RenderError> {
        self.ensure_loaded().await?;
        self.inner.render(preview_text).await
    }

    fn start_load(&self) -> LoadAttempt {
        let inner = self.inner.clone();
        let load_timeout = self.load_timeout;

        async move {
            match tokio::time::timeout(load_timeout, inner.load()).await {
                Ok(Ok(())) => {
                    info!("Renderer loaded");
                    Ok(())
                }
                Ok(Err(e)) => {
                    warn!("Renderer load failed: {}", e);
                    Err(e)
                }
                Err(_) => {
                    warn!("Renderer load timed out after {:?}", load_timeout);
                    Err(RenderError::LoadTimedOut(load_timeout))
                }
            }
        }
        .boxed()
        .shared()
    }
}
