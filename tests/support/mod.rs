#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::UnboundedReceiver;
use trackmix::config::Config;
use trackmix::models::SourceFile;
use trackmix::render::InMemoryMap;
use trackmix::session::{SessionCollaborators, SessionEvent, SessionHandle, SessionService};
use trackmix::test_support::{MockConversionClient, MockMergeClient, MockRenderer};

/// Initialize tracing for tests with proper test output handling
pub fn tracing_init() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

/// Compact GPX track through `points`, padded with trailing newlines to
/// exactly `size` bytes
pub fn native_file(name: &str, points: &[(f64, f64)], size: usize) -> SourceFile {
    let trkpts: String = points
        .iter()
        .map(|(lat, lon)| format!("<trkpt lat=\"{}\" lon=\"{}\"/>", lat, lon))
        .collect();
    let mut text = format!(
        "<gpx version=\"1.1\" creator=\"t\"><trk><trkseg>{}</trkseg></trk></gpx>",
        trkpts
    );
    assert!(
        text.len() <= size,
        "fixture for {} exceeds {} bytes",
        name,
        size
    );
    text.push_str(&"\n".repeat(size - text.len()));
    SourceFile::new(name, text.into_bytes())
}

pub struct TestSession {
    pub handle: SessionHandle,
    pub map: InMemoryMap,
}

pub fn start_session(
    config: &Config,
    converter: Arc<MockConversionClient>,
    renderer: Arc<MockRenderer>,
    merger: Arc<MockMergeClient>,
) -> TestSession {
    tracing_init();

    let map = InMemoryMap::new();
    let collaborators = SessionCollaborators {
        converter,
        renderer,
        merger,
        map: Box::new(map.clone()),
    };
    let handle = SessionService::start(tokio::runtime::Handle::current(), config, collaborators);

    TestSession { handle, map }
}

/// Receive events until one matches, failing the test after a few seconds
pub async fn wait_for_event<F>(
    events: &mut UnboundedReceiver<SessionEvent>,
    mut pred: F,
) -> SessionEvent
where
    F: FnMut(&SessionEvent) -> bool,
{
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            match events.recv().await {
                Some(event) if pred(&event) => return event,
                Some(_) => continue,
                None => panic!("event channel closed"),
            }
        }
    })
    .await
    .expect("timed out waiting for session event")
}
