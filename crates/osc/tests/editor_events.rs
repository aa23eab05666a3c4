use std::sync::Arc;

use gphyx_common::clock::FrameKey;
use gphyx_common::config::{EditorConfig, RenderConfig};
use gphyx_mask_model::{Homography, PathPart, Point2D, SnapshotPublisher};
use gphyx_osc::{encode_active_part, EventResponse, Key, MaskEditor, Modifiers, ViewportConverter};
use gphyx_tracking::{AlignmentRecord, TrackingCache};

fn editor() -> (MaskEditor, Arc<SnapshotPublisher>) {
    let publisher = Arc::new(SnapshotPublisher::default());
    let editor = MaskEditor::new(
        &EditorConfig::default(),
        &RenderConfig::default(),
        publisher.clone(),
    );
    (editor, publisher)
}

fn view() -> ViewportConverter {
    ViewportConverter::new(200.0, 100.0)
}

fn click(editor: &mut MaskEditor, x: f64, y: f64, modifiers: Modifiers) {
    editor
        .mouse_down(Point2D::new(x, y), modifiers, &view())
        .unwrap();
    editor.mouse_up();
}

fn drag(editor: &mut MaskEditor, from: (f64, f64), to: (f64, f64), modifiers: Modifiers) {
    editor
        .mouse_down(Point2D::new(from.0, from.1), modifiers, &view())
        .unwrap();
    editor
        .mouse_dragged(Point2D::new(to.0, to.1), &view())
        .unwrap();
    editor.mouse_up();
}

fn assert_near(actual: Point2D, x: f64, y: f64) {
    assert!(
        (actual.x - x).abs() < 1e-9 && (actual.y - y).abs() < 1e-9,
        "expected ({x}, {y}), got {actual:?}"
    );
}

#[test]
fn test_clicks_on_empty_canvas_append_nodes_and_publish() {
    let (mut editor, publisher) = editor();
    click(&mut editor, 20.0, 80.0, Modifiers::NONE);
    click(&mut editor, 180.0, 80.0, Modifiers::NONE);
    click(&mut editor, 100.0, 10.0, Modifiers::NONE);

    let path = editor.path();
    assert_eq!(path.len(), 3);
    assert_near(path.node(0).unwrap().anchor, 0.1, 0.2);
    assert_near(path.node(2).unwrap().anchor, 0.5, 0.9);
    assert!(path.node(0).unwrap().is_curve);

    let latest = publisher.latest();
    assert_eq!(latest.nodes().len(), 3);
    assert_eq!(latest.version(), path.version());
}

#[test]
fn test_drag_moves_node_and_undoes_in_one_step() {
    let (mut editor, _) = editor();
    click(&mut editor, 20.0, 80.0, Modifiers::NONE);
    click(&mut editor, 180.0, 80.0, Modifiers::NONE);
    click(&mut editor, 100.0, 10.0, Modifiers::NONE);

    editor
        .mouse_down(Point2D::new(21.0, 80.0), Modifiers::NONE, &view())
        .unwrap();
    for x in [25.0, 30.0, 35.0, 40.0] {
        editor.mouse_dragged(Point2D::new(x, 80.0), &view()).unwrap();
    }
    editor.mouse_up();
    assert_eq!(editor.path().len(), 3);
    assert_near(editor.path().node(0).unwrap().anchor, 0.2, 0.2);

    assert!(editor.undo().unwrap());
    assert_near(editor.path().node(0).unwrap().anchor, 0.1, 0.2);
    assert!(editor.undo().unwrap());
    assert_eq!(editor.path().len(), 2);
    assert!(editor.redo().unwrap());
    assert_eq!(editor.path().len(), 3);
}

#[test]
fn test_delete_key_and_shortcuts() {
    let (mut editor, publisher) = editor();
    click(&mut editor, 20.0, 80.0, Modifiers::NONE);
    click(&mut editor, 180.0, 80.0, Modifiers::NONE);
    click(&mut editor, 100.0, 10.0, Modifiers::NONE);

    // Select the second node, then delete it.
    click(&mut editor, 180.0, 80.0, Modifiers::NONE);
    let response = editor.key_down(Key::Delete, Modifiers::NONE).unwrap();
    assert_eq!(response, EventResponse::REDRAW);
    assert_eq!(editor.path().len(), 2);
    assert!(editor.path().selected().is_none());
    assert_eq!(publisher.latest().nodes().len(), 2);

    // Nothing selected: delete is ignored.
    let response = editor.key_down(Key::Backspace, Modifiers::NONE).unwrap();
    assert!(!response.handled);

    editor.key_down(Key::Char('z'), Modifiers::command()).unwrap();
    assert_eq!(editor.path().len(), 3);
    assert_eq!(publisher.latest().nodes().len(), 3);
    editor
        .key_down(Key::Char('Z'), Modifiers::command_shift())
        .unwrap();
    assert_eq!(editor.path().len(), 2);
}

#[test]
fn test_option_click_toggles_curve() {
    let (mut editor, _) = editor();
    click(&mut editor, 100.0, 50.0, Modifiers::NONE);
    click(&mut editor, 100.0, 50.0, Modifiers::option());
    assert_eq!(editor.path().len(), 1);
    assert!(!editor.path().node(0).unwrap().is_curve);
    click(&mut editor, 100.0, 50.0, Modifiers::option());
    assert!(editor.path().node(0).unwrap().is_curve);
}

#[test]
fn test_shift_drag_pulls_out_mirrored_handles() {
    let (mut editor, _) = editor();
    click(&mut editor, 100.0, 50.0, Modifiers::NONE);
    drag(&mut editor, (100.0, 50.0), (120.0, 50.0), Modifiers { shift: true, ..Modifiers::NONE });

    let node = *editor.path().node(0).unwrap();
    assert!((node.out_handle.dx - 0.1).abs() < 1e-9);
    assert!((node.in_handle.dx + 0.1).abs() < 1e-9);

    assert_eq!(editor.hit_test(Point2D::new(100.0, 50.0), &view()), 1);
    assert_eq!(editor.hit_test(Point2D::new(80.0, 50.0), &view()), 2);
    assert_eq!(editor.hit_test(Point2D::new(121.0, 51.0), &view()), 3);
    assert_eq!(editor.hit_test(Point2D::new(150.0, 50.0), &view()), 0);

    let overlay = editor.draw(&view(), 3).unwrap();
    assert_eq!(overlay.anchors.len(), 1);
    assert_eq!(overlay.handles.len(), 2);
    let out = overlay
        .handles
        .iter()
        .find(|h| h.part == PathPart::OutHandle)
        .unwrap();
    assert!(out.active);
    assert_near(out.tip, 120.0, 50.0);

    // Command-click on a handle breaks the link; moving it no longer mirrors.
    click(&mut editor, 120.0, 50.0, Modifiers::command());
    assert!(editor.path().node(0).unwrap().handles_broken);
    drag(&mut editor, (120.0, 50.0), (120.0, 30.0), Modifiers::NONE);
    let node = *editor.path().node(0).unwrap();
    assert!((node.out_handle.dy - 0.2).abs() < 1e-9);
    assert!((node.in_handle.dx + 0.1).abs() < 1e-9);
    assert!(node.in_handle.dy.abs() < 1e-9);
}

#[test]
fn test_hover_updates_only_on_change() {
    let (mut editor, _) = editor();
    click(&mut editor, 100.0, 50.0, Modifiers::NONE);

    let first = editor.mouse_moved(Point2D::new(102.0, 51.0), &view());
    assert!(first.force_redraw);
    assert_eq!(editor.path().hover_index(), Some(0));
    let again = editor.mouse_moved(Point2D::new(101.0, 50.0), &view());
    assert!(!again.force_redraw);
    let away = editor.mouse_moved(Point2D::new(10.0, 10.0), &view());
    assert!(away.force_redraw);
    assert_eq!(editor.path().hover_index(), None);
}

#[test]
fn test_editing_on_a_tracked_frame_maps_back_to_reference() {
    let cache = Arc::new(TrackingCache::new());
    cache.insert(AlignmentRecord::reference(FrameKey(0)));
    cache.insert(AlignmentRecord::tracked(FrameKey(5), Homography::translation(0.1, 0.0)));

    let (editor, _) = editor();
    let mut editor = editor.with_tracking(cache);
    click(&mut editor, 100.0, 50.0, Modifiers::NONE);
    assert_near(editor.path().node(0).unwrap().anchor, 0.5, 0.5);

    editor.set_frame(FrameKey(5));
    assert_eq!(editor.hit_test(Point2D::new(100.0, 50.0), &view()), 0);
    assert_eq!(editor.hit_test(Point2D::new(120.0, 50.0), &view()), 1);
    let overlay = editor.draw(&view(), 0).unwrap();
    assert_near(overlay.anchors[0].position, 120.0, 50.0);

    drag(&mut editor, (120.0, 50.0), (140.0, 50.0), Modifiers::NONE);
    assert_near(editor.path().node(0).unwrap().anchor, 0.6, 0.5);

    // Untracked frames fall back to the reference position.
    editor.set_frame(FrameKey(99));
    assert_eq!(editor.hit_test(Point2D::new(120.0, 50.0), &view()), 1);
}

#[test]
fn test_escape_clears_selection() {
    let (mut editor, _) = editor();
    click(&mut editor, 100.0, 50.0, Modifiers::NONE);
    assert!(editor.path().selected().is_some());
    let response = editor.key_down(Key::Escape, Modifiers::NONE).unwrap();
    assert!(response.force_redraw);
    assert!(editor.path().selected().is_none());
}

#[test]
fn test_document_load_replaces_mask_and_history() {
    let (mut source, _) = editor();
    click(&mut source, 20.0, 80.0, Modifiers::NONE);
    click(&mut source, 180.0, 80.0, Modifiers::NONE);
    click(&mut source, 100.0, 10.0, Modifiers::NONE);
    let document = source.document("instance-7");
    assert_eq!(document.instance_id, "instance-7");

    let (mut target, publisher) = editor();
    click(&mut target, 50.0, 50.0, Modifiers::NONE);
    target.load_document(&document).unwrap();
    assert_eq!(target.path().nodes(), source.path().nodes());
    assert!(!target.history().can_undo());
    assert_eq!(publisher.latest().nodes().len(), 3);

    target.clear();
    assert!(target.path().is_empty());
    assert!(target.undo().unwrap());
    assert_eq!(target.path().len(), 3);
}

#[test]
fn test_active_part_matches_path_hit() {
    let (mut editor, _) = editor();
    click(&mut editor, 20.0, 80.0, Modifiers::NONE);
    click(&mut editor, 180.0, 80.0, Modifiers::NONE);
    let hit = editor.path().selected();
    assert_eq!(editor.hit_test(Point2D::new(180.0, 80.0), &view()), encode_active_part(hit));
}
