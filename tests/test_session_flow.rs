#![cfg(feature = "test-utils")]

mod support;
use std::sync::Arc;
use std::time::Duration;

use crate::support::{native_file, start_session, wait_for_event};
use trackmix::config::Config;
use trackmix::models::{Bounds, ConversionState, SourceFile, TrackFormat, Viewport};
use trackmix::session::{Alert, SessionEvent};
use trackmix::test_support::{
    gpx_track, MockConversion, MockConversionClient, MockMergeClient, MockRenderer,
};

fn mocks() -> (
    Arc<MockConversionClient>,
    Arc<MockRenderer>,
    Arc<MockMergeClient>,
) {
    (
        Arc::new(MockConversionClient::new()),
        Arc::new(MockRenderer::new()),
        Arc::new(MockMergeClient::succeeding(b"<gpx/>")),
    )
}

#[tokio::test]
async fn test_two_native_files_fit_union_viewport() {
    let config = Config::default();
    let (converter, renderer, merger) = mocks();
    let session = start_session(&config, converter, renderer, merger);

    let mut selection = vec![
        native_file("a.gpx", &[(45.0, 6.0), (45.5, 6.5)], 200),
        native_file("b.gpx", &[(46.0, 7.0), (46.2, 7.4)], 300),
    ];
    session.handle.add_files(&mut selection).unwrap();
    assert!(selection.is_empty(), "selection is cleared after adding");

    let snapshot = session.handle.wait_until_settled().await.unwrap();

    assert_eq!(snapshot.items.len(), 2);
    assert_eq!(snapshot.items[0].to_string(), "1. a.gpx");
    assert_eq!(snapshot.items[1].to_string(), "2. b.gpx");
    assert_eq!(snapshot.items[0].color, config.palette.color_for(0));
    assert_eq!(snapshot.items[1].color, config.palette.color_for(1));
    assert!(snapshot
        .items
        .iter()
        .all(|item| item.state == Some(ConversionState::Ready) && item.has_preview));

    let union = Bounds::new(45.0, 6.0, 46.2, 7.4);
    assert_eq!(snapshot.viewport, Viewport::Fitted(union));

    let map = session.map.snapshot();
    assert_eq!(map.layers.len(), 2);
    assert_eq!(map.viewport, Viewport::Fitted(union));
}

#[tokio::test]
async fn test_same_name_and_size_is_added_once() {
    let config = Config::default();
    let (converter, renderer, merger) = mocks();
    let session = start_session(&config, converter, renderer, merger);

    let mut first = vec![native_file("a.gpx", &[(1.0, 1.0)], 200)];
    session.handle.add_files(&mut first).unwrap();
    let mut again = vec![native_file("a.gpx", &[(1.0, 1.0)], 200)];
    session.handle.add_files(&mut again).unwrap();

    let snapshot = session.handle.wait_until_settled().await.unwrap();
    assert_eq!(snapshot.items.len(), 1);
    assert_eq!(session.map.snapshot().layers.len(), 1);
}

#[tokio::test]
async fn test_failed_conversion_stays_listed_with_one_alert() {
    let config = Config::default();
    let converter =
        Arc::new(MockConversionClient::new().with_response("c.fit", MockConversion::FailStatus(500)));
    let session = start_session(
        &config,
        converter.clone(),
        Arc::new(MockRenderer::new()),
        Arc::new(MockMergeClient::succeeding(b"")),
    );
    let mut alerts = session.handle.subscribe_alerts();

    let mut selection = vec![SourceFile::new("c.fit", vec![0x0e, 0x10, 0x00, 0x01])];
    session.handle.add_files(&mut selection).unwrap();

    let snapshot = session.handle.wait_until_settled().await.unwrap();
    assert_eq!(snapshot.items.len(), 1);
    assert_eq!(snapshot.items[0].state, Some(ConversionState::Failed));
    assert!(!snapshot.items[0].has_preview);
    assert_eq!(snapshot.viewport, Viewport::default());
    assert!(session.map.snapshot().layers.is_empty());

    let alert = wait_for_event(&mut alerts, |_| true).await;
    match alert {
        SessionEvent::Alert(Alert::ConversionFailed { file_name, .. }) => {
            assert_eq!(file_name, "c.fit")
        }
        other => panic!("unexpected event {:?}", other),
    }
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(alerts.try_recv().is_err(), "exactly one alert is raised");
    assert_eq!(converter.calls(), 1);
}

#[tokio::test]
async fn test_removing_pending_entry_discards_late_conversion() {
    let config = Config::default();
    let converter = Arc::new(MockConversionClient::gated().with_response(
        "c.fit",
        MockConversion::Succeed(gpx_track("late", &[(10.0, 10.0), (11.0, 11.0)])),
    ));
    let session = start_session(
        &config,
        converter.clone(),
        Arc::new(MockRenderer::new()),
        Arc::new(MockMergeClient::succeeding(b"")),
    );
    let mut events = session.handle.subscribe_events();

    let mut selection = vec![SourceFile::new("c.fit", vec![1u8; 64])];
    session.handle.add_files(&mut selection).unwrap();

    // The in-flight item is listed right away
    let listed = wait_for_event(&mut events, |e| {
        matches!(e, SessionEvent::FileListChanged { items } if !items.is_empty())
    })
    .await;
    if let SessionEvent::FileListChanged { items } = listed {
        assert_eq!(items[0].state, Some(ConversionState::Pending));
    }

    assert_eq!(session.handle.remove_file(0).await.unwrap(), "c.fit");
    converter.release(1);

    wait_for_event(&mut events, |e| {
        matches!(e, SessionEvent::IngestDiscarded { .. })
    })
    .await;

    let snapshot = session.handle.snapshot().await.unwrap();
    assert!(snapshot.items.is_empty());
    assert_eq!(snapshot.viewport, Viewport::default());
    assert!(session.map.snapshot().layers.is_empty());
    assert_eq!(converter.finished(), 1);
}

#[tokio::test]
async fn test_removal_reindexes_colors_and_rebuilds_map() {
    let config = Config::default();
    let (converter, renderer, merger) = mocks();
    let session = start_session(&config, converter, renderer, merger);

    let mut selection = vec![
        native_file("a.gpx", &[(0.0, 0.0), (1.0, 1.0)], 200),
        native_file("b.gpx", &[(2.0, 2.0), (3.0, 3.0)], 210),
        native_file("c.gpx", &[(4.0, 4.0), (5.0, 5.0)], 220),
    ];
    session.handle.add_files(&mut selection).unwrap();
    session.handle.wait_until_settled().await.unwrap();
    assert_eq!(session.map.snapshot().layers.len(), 3);

    session.handle.remove_file(0).await.unwrap();
    let snapshot = session.handle.wait_until_settled().await.unwrap();

    assert_eq!(snapshot.items[0].to_string(), "1. b.gpx");
    assert_eq!(snapshot.items[0].color, config.palette.color_for(0));
    assert_eq!(snapshot.items[1].to_string(), "2. c.gpx");
    assert_eq!(snapshot.items[1].color, config.palette.color_for(1));

    let map = session.map.snapshot();
    let mut drawn: Vec<(String, String)> = map
        .layers
        .iter()
        .map(|l| (l.name.clone(), l.color.clone()))
        .collect();
    drawn.sort();
    assert_eq!(
        drawn,
        vec![
            ("b.gpx".to_string(), config.palette.color_for(0).to_string()),
            ("c.gpx".to_string(), config.palette.color_for(1).to_string()),
        ]
    );
    assert_eq!(map.viewport, Viewport::Fitted(Bounds::new(2.0, 2.0, 5.0, 5.0)));
}

#[tokio::test]
async fn test_converted_and_native_tracks_share_viewport() {
    let config = Config::default();
    let converter = Arc::new(MockConversionClient::new().with_response(
        "ride.fit",
        MockConversion::Succeed(gpx_track("ride", &[(-10.0, -20.0), (-9.0, -19.0)])),
    ));
    let session = start_session(
        &config,
        converter,
        Arc::new(MockRenderer::new()),
        Arc::new(MockMergeClient::succeeding(b"")),
    );

    let mut selection = vec![
        native_file("walk.gpx", &[(10.0, 20.0), (11.0, 21.0)], 200),
        SourceFile::new("ride.fit", vec![7u8; 128]),
    ];
    session.handle.add_files(&mut selection).unwrap();

    let snapshot = session.handle.wait_until_settled().await.unwrap();
    assert_eq!(snapshot.items[1].format, TrackFormat::ForeignBinary);
    assert_eq!(snapshot.items[1].state, Some(ConversionState::Ready));
    assert_eq!(
        snapshot.viewport,
        Viewport::Fitted(Bounds::new(-10.0, -20.0, 11.0, 21.0))
    );
}

#[tokio::test]
async fn test_unrecognized_file_is_listed_but_inert() {
    let config = Config::default();
    let (converter, renderer, merger) = mocks();
    let session = start_session(&config, converter.clone(), renderer, merger);

    let mut selection = vec![SourceFile::new("notes.txt", b"hello".to_vec())];
    session.handle.add_files(&mut selection).unwrap();

    let snapshot = session.handle.wait_until_settled().await.unwrap();
    assert_eq!(snapshot.items.len(), 1);
    assert_eq!(snapshot.items[0].state, None);
    assert!(!snapshot.items[0].has_preview);
    assert_eq!(snapshot.in_flight, 0);
    assert_eq!(snapshot.viewport, Viewport::default());
    assert_eq!(converter.calls(), 0);
}

#[tokio::test]
async fn test_unreadable_native_file_has_no_preview_and_no_alert() {
    let config = Config::default();
    let (converter, renderer, merger) = mocks();
    let session = start_session(&config, converter, renderer, merger);
    let mut alerts = session.handle.subscribe_alerts();

    let mut selection = vec![SourceFile::new("empty.gpx", Vec::new())];
    session.handle.add_files(&mut selection).unwrap();

    let snapshot = session.handle.wait_until_settled().await.unwrap();
    assert_eq!(snapshot.items[0].state, Some(ConversionState::Failed));
    assert!(!snapshot.items[0].has_preview);

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(alerts.try_recv().is_err());
}

#[tokio::test]
async fn test_renderer_outage_raises_one_alert_and_keeps_view() {
    let config = Config::default();
    let renderer = Arc::new(MockRenderer::unavailable());
    let session = start_session(
        &config,
        Arc::new(MockConversionClient::new()),
        renderer.clone(),
        Arc::new(MockMergeClient::succeeding(b"")),
    );
    let mut alerts = session.handle.subscribe_alerts();

    // Each finished read rebuilds the view and retries the load
    let mut selection = vec![
        native_file("a.gpx", &[(1.0, 1.0)], 200),
        native_file("b.gpx", &[(2.0, 2.0)], 200),
        native_file("c.gpx", &[(3.0, 3.0)], 200),
        native_file("d.gpx", &[(4.0, 4.0)], 200),
    ];
    session.handle.add_files(&mut selection).unwrap();

    let snapshot = session.handle.wait_until_settled().await.unwrap();
    assert_eq!(snapshot.viewport, Viewport::default());
    assert!(session.map.snapshot().layers.is_empty());
    assert_eq!(renderer.renders(), 0);
    assert!(renderer.loads() >= 1);

    let alert = wait_for_event(&mut alerts, |_| true).await;
    assert!(matches!(
        alert,
        SessionEvent::Alert(Alert::RendererUnavailable { .. })
    ));
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(alerts.try_recv().is_err(), "one alert per outage");
}

#[tokio::test]
async fn test_alert_stream_ends_after_shutdown_with_alerts_delivered() {
    let config = Config::default();
    let converter = Arc::new(
        MockConversionClient::new().with_response("c.fit", MockConversion::FailStatus(502)),
    );
    let session = start_session(
        &config,
        converter,
        Arc::new(MockRenderer::new()),
        Arc::new(MockMergeClient::succeeding(b"")),
    );
    let mut alerts = session.handle.subscribe_alerts();

    let mut selection = vec![SourceFile::new("c.fit", vec![2u8; 16])];
    session.handle.add_files(&mut selection).unwrap();
    session.handle.wait_until_settled().await.unwrap();

    session.handle.shutdown();
    drop(session);

    let received = tokio::time::timeout(Duration::from_secs(5), async move {
        let mut received = Vec::new();
        while let Some(event) = alerts.recv().await {
            received.push(event);
        }
        received
    })
    .await
    .expect("alert stream should end after shutdown");

    assert_eq!(received.len(), 1);
    assert!(matches!(
        &received[0],
        SessionEvent::Alert(Alert::ConversionFailed { file_name, .. }) if file_name == "c.fit"
    ));
}

#[tokio::test]
async fn test_renders_from_superseded_rebuilds_are_ignored() {
    let config = Config::default();
    let renderer = Arc::new(MockRenderer::gated());
    let session = start_session(
        &config,
        Arc::new(MockConversionClient::new()),
        renderer.clone(),
        Arc::new(MockMergeClient::succeeding(b"")),
    );
    let mut events = session.handle.subscribe_events();

    let mut selection = vec![
        native_file("a.gpx", &[(0.0, 0.0), (1.0, 1.0)], 200),
        native_file("b.gpx", &[(20.0, 20.0), (21.0, 21.0)], 200),
    ];
    session.handle.add_files(&mut selection).unwrap();

    // Both reads finished while every render is still held
    wait_for_event(&mut events, |e| {
        matches!(e, SessionEvent::FileListChanged { items }
            if items.len() == 2 && items.iter().all(|i| i.state == Some(ConversionState::Ready)))
    })
    .await;
    assert!(session.map.snapshot().layers.is_empty());

    assert_eq!(session.handle.remove_file(0).await.unwrap(), "a.gpx");
    renderer.release(16);

    let snapshot = session.handle.wait_until_settled().await.unwrap();
    let b_bounds = Bounds::new(20.0, 20.0, 21.0, 21.0);
    assert_eq!(snapshot.viewport, Viewport::Fitted(b_bounds));

    let map = session.map.snapshot();
    assert_eq!(map.layers.len(), 1);
    assert_eq!(map.layers[0].name, "b.gpx");
    assert_eq!(map.layers[0].color, config.palette.color_for(0));
    assert_eq!(map.fit_count, 1);
}

#[tokio::test]
async fn test_replace_files_drops_previous_set() {
    let config = Config::default();
    let (converter, renderer, merger) = mocks();
    let session = start_session(&config, converter, renderer, merger);

    let mut first = vec![native_file("a.gpx", &[(1.0, 1.0), (2.0, 2.0)], 200)];
    session.handle.add_files(&mut first).unwrap();
    session.handle.wait_until_settled().await.unwrap();

    let mut second = vec![native_file("b.gpx", &[(30.0, 30.0), (31.0, 31.0)], 200)];
    session.handle.replace_files(&mut second).unwrap();
    let snapshot = session.handle.wait_until_settled().await.unwrap();

    assert_eq!(snapshot.items.len(), 1);
    assert_eq!(snapshot.items[0].name, "b.gpx");
    assert_eq!(
        snapshot.viewport,
        Viewport::Fitted(Bounds::new(30.0, 30.0, 31.0, 31.0))
    );
    let map = session.map.snapshot();
    assert_eq!(map.layers.len(), 1);
    assert_eq!(map.layers[0].name, "b.gpx");
}

#[tokio::test]
async fn test_remove_out_of_range_is_an_error() {
    let config = Config::default();
    let (converter, renderer, merger) = mocks();
    let session = start_session(&config, converter, renderer, merger);

    assert!(session.handle.remove_file(0).await.is_err());
}
