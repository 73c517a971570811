//! Annotation behavior through the public `Map` facade, including the
//! synthetic annotation source showing up in rendered frames.

use mapcore::prelude::*;
use mapcore::{EngineOptions, Frame, Painter, StyleFetch, StyleFetchDone, TileFetch};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

const STYLE: &str = r#"{
    "version": 8,
    "sources": {
        "osm": {"type": "raster", "tiles": ["https://tile.example.org/{z}/{x}/{y}.png"]}
    },
    "layers": [{"id": "base", "type": "raster", "source": "osm"}]
}"#;

#[derive(Default)]
struct SourceRecorder {
    last_sources: Mutex<Vec<(String, usize)>>,
}

struct RecordingPainter(Arc<SourceRecorder>);

impl Painter for RecordingPainter {
    fn draw(&mut self, frame: &Frame<'_>) {
        *self.0.last_sources.lock().unwrap() = frame
            .sources
            .iter()
            .map(|source| (source.id.clone(), source.tiles.len()))
            .collect();
    }
}

struct NoStyleFetch;

impl StyleFetch for NoStyleFetch {
    fn fetch(&self, _url: &str, done: StyleFetchDone) {
        done(Err("no network in tests".into()));
    }
}

struct StubTileFetch(AtomicUsize);

impl TileFetch for StubTileFetch {
    fn fetch_tile(&self, _url: &str) -> mapcore::Result<Vec<u8>> {
        self.0.fetch_add(1, Ordering::SeqCst);
        Ok(vec![0u8; 4])
    }
}

fn make_map(recorder: Arc<SourceRecorder>, center: LatLng) -> Map {
    Map::new(
        EngineOptions {
            worker_threads: 2,
            zoom: 3.0,
            center,
            viewport_size: mapcore::Point::new(256.0, 256.0),
            ..Default::default()
        },
        Box::new(RecordingPainter(recorder)),
        Arc::new(NullView),
        Arc::new(NoStyleFetch),
        Arc::new(StubTileFetch(AtomicUsize::new(0))),
    )
}

#[test]
fn test_add_query_remove_roundtrip() {
    let mut map = make_map(Arc::new(SourceRecorder::default()), LatLng::default());
    let point = LatLng::new(37.78, -122.42);
    let ids = map.add_point_annotations(&[point], &["pin".to_string()]);
    assert_eq!(ids.len(), 1);

    let own_bounds = map.bounds_for_annotations(&ids).unwrap();
    assert_eq!(map.annotations_in_bounds(&own_bounds), ids);

    map.remove_annotations(&ids);
    assert!(map.annotations_in_bounds(&own_bounds).is_empty());
    assert!(map.bounds_for_annotations(&ids).is_none());
}

#[test]
fn test_ids_survive_removal_without_reuse() {
    let mut map = make_map(Arc::new(SourceRecorder::default()), LatLng::default());
    let first = map.add_point_annotation(LatLng::new(0.0, 0.0), "pin");
    map.remove_annotation(first);
    let second = map.add_point_annotation(LatLng::new(0.0, 0.0), "pin");
    assert!(second > first);
}

#[test]
fn test_shape_annotations_are_queryable_by_partial_overlap() {
    let mut map = make_map(Arc::new(SourceRecorder::default()), LatLng::default());
    let ring = vec![
        LatLng::new(10.0, 10.0),
        LatLng::new(10.5, 10.0),
        LatLng::new(10.5, 10.5),
        LatLng::new(10.0, 10.5),
        LatLng::new(10.0, 10.0),
    ];
    let ids = map.add_shape_annotations(vec![ring]);
    assert_eq!(ids.len(), 1);

    // A query box overlapping just one corner of the shape still finds it
    let corner = LatLngBounds::from_coords(9.9, 9.9, 10.1, 10.1);
    assert_eq!(map.annotations_in_bounds(&corner), ids);

    let elsewhere = LatLngBounds::from_coords(-10.0, -10.0, -9.0, -9.0);
    assert!(map.annotations_in_bounds(&elsewhere).is_empty());
}

#[test]
fn test_annotation_source_appears_in_static_frames() {
    let center = LatLng::new(40.0, -74.0);
    let recorder = Arc::new(SourceRecorder::default());
    let mut map = make_map(recorder.clone(), center);

    map.set_style_json(STYLE, "");
    map.add_point_annotation(center, "pin");
    map.render_sync().unwrap();

    let sources = recorder.last_sources.lock().unwrap().clone();
    let annotations = sources.iter().find(|(id, _)| id == "annotations");
    assert!(
        matches!(annotations, Some((_, tiles)) if *tiles > 0),
        "annotation source missing from frame: {sources:?}"
    );
}

#[test]
fn test_removing_last_annotation_retires_the_source() {
    let center = LatLng::new(40.0, -74.0);
    let recorder = Arc::new(SourceRecorder::default());
    let mut map = make_map(recorder.clone(), center);

    map.set_style_json(STYLE, "");
    let id = map.add_point_annotation(center, "pin");
    map.render_sync().unwrap();

    map.remove_annotation(id);
    map.render_sync().unwrap();

    let sources = recorder.last_sources.lock().unwrap().clone();
    assert!(
        sources.iter().all(|(id, _)| id != "annotations"),
        "annotation source survived its last annotation: {sources:?}"
    );
}

#[test]
fn test_default_symbol_applies_to_unnamed_points() {
    let mut map = make_map(Arc::new(SourceRecorder::default()), LatLng::default());
    map.set_default_point_annotation_symbol("flag");
    let ids = map.add_point_annotations(&[LatLng::new(1.0, 1.0), LatLng::new(2.0, 2.0)], &[]);
    assert_eq!(ids.len(), 2);
    // The symbols live in the materialized tiles handed to the render side;
    // queries still find both annotations
    let bounds = map.bounds_for_annotations(&ids).unwrap();
    assert_eq!(map.annotations_in_bounds(&bounds), ids);
}
