use super::{RenderError, RenderedTrack, TrackRenderer};
use crate::models::LatLng;
use std::io::Cursor;

/// Renders GPX preview text into polylines: one per track segment and one
/// per route. Standalone waypoints are drawn as single-point lines.
#[derive(Debug, Default, Clone)]
pub struct GpxRenderer;

impl GpxRenderer {
    pub fn new() -> Self {
        Self
    }

    pub fn parse(preview_text: &str) -> Result<RenderedTrack, RenderError> {
        let mut cursor = Cursor::new(preview_text.as_bytes());
        let gpx = gpx::read(&mut cursor).map_err(|e| RenderError::Parse(e.to_string()))?;

        let to_latlng = |wpt: &gpx::Waypoint| {
            let point = wpt.point();
            LatLng {
                lat: point.y(),
                lng: point.x(),
            }
        };

        let mut polylines = Vec::new();

        for track in &gpx.tracks {
            for segment in &track.segments {
                let line: Vec<LatLng> = segment.points.iter().map(to_latlng).collect();
                if !line.is_empty() {
                    polylines.push(line);
                }
            }
        }

        for route in &gpx.routes {
            let line: Vec<LatLng> = route.points.iter().map(to_latlng).collect();
            if !line.is_empty() {
                polylines.push(line);
            }
        }

        for waypoint in &gpx.waypoints {
            polylines.push(vec![to_latlng(waypoint)]);
        }

        Ok(RenderedTrack::from_polylines(polylines))
    }
}

#[async_trait::async_trait]
impl TrackRenderer for GpxRenderer {
    async fn load(&self) -> Result<(), RenderError> {
        Ok(())
    }

    async fn render(&self, preview_text: &str) -> Result<RenderedTrack, RenderError> {
        let text = preview_text.to_string();
        tokio::task::spawn_blocking(move || Self::parse(&text))
            .await
            .map_err(|e| RenderError::Parse(format!("Render task failed: {}", e)))?
    }
}
