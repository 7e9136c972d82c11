// Test support utilities for both unit and integration tests

use crate::convert::{ConversionClient, ConversionError};
use crate::merge::{MergeArtifact, MergeClient, MergeError, MergeMode};
use crate::models::SourceFile;
use crate::render::{GpxRenderer, RenderError, RenderedTrack, TrackRenderer};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::Semaphore;

/// Build a minimal GPX document with one track through `points` (lat, lon)
pub fn gpx_track(name: &str, points: &[(f64, f64)]) -> String {
    let trkpts: String = points
        .iter()
        .map(|(lat, lon)| format!("<trkpt lat=\"{}\" lon=\"{}\"></trkpt>", lat, lon))
        .collect();
    format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n\
         <gpx version=\"1.1\" creator=\"trackmix-tests\">\
         <trk><name>{}</name><trkseg>{}</trkseg></trk></gpx>",
        name, trkpts
    )
}

/// Canned result for one file name
#[derive(Debug, Clone)]
pub enum MockConversion {
    Succeed(String),
    FailStatus(u16),
}

/// Mock conversion service
///
/// Answers from a per-file table; unknown files fail with 404. A gated mock
/// holds every conversion until `release` is called.
pub struct MockConversionClient {
    responses: Mutex<HashMap<String, MockConversion>>,
    gate: Option<Arc<Semaphore>>,
    calls: AtomicUsize,
    finished: AtomicUsize,
}

impl Default for MockConversionClient {
    fn default() -> Self {
        MockConversionClient {
            responses: Mutex::new(HashMap::new()),
            gate: None,
            calls: AtomicUsize::new(0),
            finished: AtomicUsize::new(0),
        }
    }
}

impl MockConversionClient {
    #[allow(unused)] // Used in tests
    pub fn new() -> Self {
        Self::default()
    }

    /// Conversions block until released
    pub fn gated() -> Self {
        Self {
            gate: Some(Arc::new(Semaphore::new(0))),
            ..Self::default()
        }
    }

    pub fn with_response(self, file_name: &str, response: MockConversion) -> Self {
        self.responses
            .lock()
            .unwrap()
            .insert(file_name.to_string(), response);
        self
    }

    /// Let `count` held conversions proceed
    pub fn release(&self, count: usize) {
        if let Some(gate) = &self.gate {
            gate.add_permits(count);
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn finished(&self) -> usize {
        self.finished.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl ConversionClient for MockConversionClient {
    async fn convert(&self, file: &SourceFile) -> Result<String, ConversionError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        if let Some(gate) = &self.gate {
            if let Ok(permit) = gate.acquire().await {
                permit.forget();
            }
        }

        let response = self.responses.lock().unwrap().get(&file.name).cloned();
        self.finished.fetch_add(1, Ordering::SeqCst);

        match response {
            Some(MockConversion::Succeed(text)) => Ok(text),
            Some(MockConversion::FailStatus(status)) => Err(ConversionError::Status(status)),
            None => Err(ConversionError::Status(404)),
        }
    }
}

/// Mock renderer: GPX rendering with a controllable one-time load. A gated
/// mock holds every render until `release` is called.
pub struct MockRenderer {
    fail_load: bool,
    gate: Option<Arc<Semaphore>>,
    loads: AtomicUsize,
    renders: AtomicUsize,
}

impl Default for MockRenderer {
    fn default() -> Self {
        MockRenderer {
            fail_load: false,
            gate: None,
            loads: AtomicUsize::new(0),
            renders: AtomicUsize::new(0),
        }
    }
}

impl MockRenderer {
    #[allow(unused)] // Used in tests
    pub fn new() -> Self {
        Self::default()
    }

    /// Renderer whose load always fails, as when it cannot be fetched
    pub fn unavailable() -> Self {
        Self {
            fail_load: true,
            ..Self::default()
        }
    }

    /// Renders block until released
    pub fn gated() -> Self {
        Self {
            gate: Some(Arc::new(Semaphore::new(0))),
            ..Self::default()
        }
    }

    /// Let `count` held renders proceed
    pub fn release(&self, count: usize) {
        if let Some(gate) = &self.gate {
            gate.add_permits(count);
        }
    }

    pub fn loads(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }

    pub fn renders(&self) -> usize {
        self.renders.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl TrackRenderer for MockRenderer {
    async fn load(&self) -> Result<(), RenderError> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        if self.fail_load {
            Err(RenderError::LoadFailed("renderer unreachable".to_string()))
        } else {
            Ok(())
        }
    }

    async fn render(&self, preview_text: &str) -> Result<RenderedTrack, RenderError> {
        self.renders.fetch_add(1, Ordering::SeqCst);

        if let Some(gate) = &self.gate {
            if let Ok(permit) = gate.acquire().await {
                permit.forget();
            }
        }

        GpxRenderer::parse(preview_text)
    }
}

/// Mock merge service that records every request
pub struct MockMergeClient {
    response: Result<Vec<u8>, String>,
    requests: Mutex<Vec<(Vec<String>, MergeMode)>>,
}

impl MockMergeClient {
    /// Always answers with `bytes`
    pub fn succeeding(bytes: &[u8]) -> Self {
        Self {
            response: Ok(bytes.to_vec()),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Always answers with an error message
    pub fn rejecting(message: &str) -> Self {
        Self {
            response: Err(message.to_string()),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// File names and mode of each request received, in order
    pub fn requests(&self) -> Vec<(Vec<String>, MergeMode)> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl MergeClient for MockMergeClient {
    async fn merge(
        &self,
        files: &[SourceFile],
        mode: MergeMode,
    ) -> Result<MergeArtifact, MergeError> {
        self.requests
            .lock()
            .unwrap()
            .push((files.iter().map(|f| f.name.clone()).collect(), mode));

        match &self.response {
            Ok(bytes) => Ok(MergeArtifact::new(bytes.clone())),
            Err(message) => Err(MergeError::Rejected(message.clone())),
        }
    }
}
