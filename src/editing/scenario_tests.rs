//! End-to-end runs through the workbench against the in-memory backend.

use super::lock::EditState;
use super::test_fakes::{Call, FakeRegistry, parcel, parts, seeded};
use super::workbench::{EditorWorkbench, ToolKind};
use crate::capture::CaptureMode;
use crate::config::EditorConfig;
use crate::map_surface::MapSurface;
use crate::models::Vertex;
use crate::registry::{ParcelRegistry, ParcelStyle};
use serde_json::json;
use std::sync::Arc;

fn config() -> EditorConfig {
    EditorConfig {
        highlight_retry_delay_ms: 1,
        highlight_max_attempts: 5,
        ..EditorConfig::default()
    }
}

async fn bench(pins: &[&str]) -> (EditorWorkbench<FakeRegistry>, Arc<FakeRegistry>) {
    let map = MapSurface::detached();
    let registry = seeded(pins, map.clone()).await;
    registry.source().forget_calls();
    (EditorWorkbench::new(registry.clone(), map, &config()), registry)
}

#[tokio::test]
async fn subdivide_p1_into_two() {
    let (mut bench, registry) = bench(&["P1", "P2"]).await;
    let backend = registry.source().clone();
    backend.reply_to_preview(Ok(parts(&["P1-A", "P1-B"])));

    bench.open_subdivide(CaptureMode::Freehand);
    assert!(bench.parcel_clicked(parcel("P1")));
    let session = bench.subdivide().unwrap();
    session.lock().unwrap();

    session.primary_click(Vertex::new(121.0, 14.0005));
    session.primary_click(Vertex::new(121.001, 14.0005));
    session.secondary_click();

    session.request_preview(&backend).await.unwrap();
    assert_eq!(session.identifiers(), vec!["P1-A", "P1-B"]);

    session.set_identifier(1, "P1-C").unwrap();
    assert!(session.commit_enabled());
    session.commit(&backend).await.unwrap();

    let saved = backend.calls().into_iter().find_map(|c| match c {
        Call::Save(request) => Some(request),
        _ => None,
    });
    let saved = saved.unwrap();
    assert_eq!(saved.base_identifier, "P1");
    assert_eq!(saved.new_identifiers, vec!["P1-A", "P1-C"]);
    assert_eq!(saved.lines.len(), 1);

    assert_eq!(bench.subdivide().unwrap().state(), EditState::Idle);
    assert!(registry.find("P1").is_none());
    assert!(registry.find("P1-A").is_some());
    assert!(registry.find("P1-C").is_some());
    assert!(registry.find("P2").is_some());
}

#[tokio::test]
async fn consolidate_two_into_the_next_pin() {
    let (mut bench, registry) = bench(&["X-1-1-1-001", "X-1-1-1-002"]).await;
    let backend = registry.source().clone();
    let template = json!({ "pin": "X-1-1-1-001", "owner": null });
    backend.set_attributes("X-1-1-1-001", template.as_object().cloned().unwrap());
    backend.merge_into("X-1-1-1-003", 1);

    bench.open_consolidate();
    bench.parcel_clicked(parcel("X-1-1-1-001"));
    bench.parcel_clicked(parcel("X-1-1-1-002"));

    let session = bench.consolidate().unwrap();
    assert_eq!(session.target_identifier(), "X-1-1-1-003");
    let outcome = session.commit(&backend).await.unwrap();
    assert_eq!(outcome.new_identifier, "X-1-1-1-003");

    let merged = backend.calls().into_iter().find_map(|c| match c {
        Call::Merge(request) => Some(request),
        _ => None,
    });
    let merged = merged.unwrap();
    assert_eq!(
        merged.original_identifiers,
        vec!["X-1-1-1-001", "X-1-1-1-002"]
    );
    assert_eq!(merged.base_attributes["owner"], "");

    assert!(registry.find("X-1-1-1-001").is_none());
    assert!(registry.find("X-1-1-1-002").is_none());
    assert_eq!(registry.style_of("X-1-1-1-003"), ParcelStyle::Highlighted);
}

#[tokio::test]
async fn closing_tools_never_calls_the_backend() {
    let (mut bench, registry) = bench(&["X-1-1-1-001", "X-1-1-1-002"]).await;

    bench.open_subdivide(CaptureMode::PointList);
    bench.parcel_clicked(parcel("X-1-1-1-001"));
    let session = bench.subdivide().unwrap();
    session.lock().unwrap();
    session.paste_points("14.0,121.0\n14.001,121.001").unwrap();

    bench.open_consolidate();
    bench.parcel_clicked(parcel("X-1-1-1-001"));
    bench.parcel_clicked(parcel("X-1-1-1-002"));
    bench.close();
    bench.close();

    assert_eq!(bench.active_tool(), ToolKind::None);
    assert_eq!(registry.source().network_calls(), 0);
    assert_eq!(registry.style_of("X-1-1-1-001"), ParcelStyle::Default);
    assert_eq!(registry.len(), 2);
}
