use underlay::{
    CompositeMode, EditorSession, ExportFormat, FontLibrary, LayerId, MaskSegmenter, NormPoint,
    Point, Segmenter as _, SurfaceBounds,
};

fn png_rgba(width: u32, height: u32, f: impl Fn(u32, u32) -> [u8; 4]) -> Vec<u8> {
    let img = image::RgbaImage::from_fn(width, height, |x, y| image::Rgba(f(x, y)));
    let mut bytes = std::io::Cursor::new(Vec::new());
    image::DynamicImage::ImageRgba8(img)
        .write_to(&mut bytes, image::ImageFormat::Png)
        .unwrap();
    bytes.into_inner()
}

fn png_luma(width: u32, height: u32, f: impl Fn(u32, u32) -> u8) -> Vec<u8> {
    let img = image::GrayImage::from_fn(width, height, |x, y| image::Luma([f(x, y)]));
    let mut bytes = std::io::Cursor::new(Vec::new());
    image::DynamicImage::ImageLuma8(img)
        .write_to(&mut bytes, image::ImageFormat::Png)
        .unwrap();
    bytes.into_inner()
}

fn photo(width: u32, height: u32) -> Vec<u8> {
    png_rgba(width, height, |x, y| {
        [(x * 7) as u8, (y * 11) as u8, 90, 255]
    })
}

#[test]
fn segmentation_flow_installs_the_cutout_and_renames_the_export() {
    let mut session = EditorSession::new(FontLibrary::new());
    session.load_image(&photo(64, 48)).unwrap();

    // Without a cutout, behind-subject mode refuses but overlay exports.
    assert!(session.render(ExportFormat::Png, None).is_err());
    session.set_mode(CompositeMode::TextOverlay);
    let overlay = session.render(ExportFormat::Png, None).unwrap();
    assert_eq!(overlay.filename, "edited-image.png");
    assert_eq!(overlay.mime, "image/png");
    session.set_mode(CompositeMode::TextBehindSubject);

    // Left half subject, right half background.
    let segmenter =
        MaskSegmenter::from_mask_bytes(&png_luma(64, 48, |x, _| if x < 32 { 255 } else { 0 }))
            .unwrap();
    let handle = session.begin_segmentation();
    let mut last_progress = 0.0f32;
    let cutout = segmenter
        .segment(&photo(64, 48), &mut |f| {
            assert!(f >= last_progress);
            last_progress = f;
        })
        .unwrap();
    assert!(session.commit_cutout(&handle, &cutout).unwrap());
    assert!(session.has_foreground());

    let artifact = session.render(ExportFormat::Png, None).unwrap();
    assert_eq!(artifact.filename, "text-behind-object.png");
    let decoded = image::load_from_memory(&artifact.bytes).unwrap();
    assert_eq!(decoded.width(), 64);
    assert_eq!(decoded.height(), 48);
}

#[test]
fn a_newer_segmentation_run_discards_the_older_result() {
    let mut session = EditorSession::new(FontLibrary::new());
    session.load_image(&photo(32, 32)).unwrap();

    let segmenter = MaskSegmenter::from_mask_bytes(&png_luma(32, 32, |_, _| 255)).unwrap();
    let slow = session.begin_segmentation();
    let slow_result = segmenter.segment(&photo(32, 32), &mut |_| {}).unwrap();

    // A second run starts before the first result lands.
    let fast = session.begin_segmentation();
    let fast_result = segmenter.segment(&photo(32, 32), &mut |_| {}).unwrap();
    assert!(session.commit_cutout(&fast, &fast_result).unwrap());

    // The superseded result must not overwrite the newer one.
    assert!(!session.commit_cutout(&slow, &slow_result).unwrap());
    assert!(session.has_foreground());
}

#[test]
fn undo_redo_walks_edits_and_duplicate_nudges() {
    let mut session = EditorSession::new(FontLibrary::new());
    session.load_image(&photo(32, 32)).unwrap();

    let a = session.add_layer();
    session.update_layer(a, |layer| layer.position = NormPoint::new(0.98, 0.5));
    let b = session.duplicate_layer(a).unwrap();
    assert_ne!(a, b);
    assert_eq!(session.layers().len(), 2);
    assert_eq!(session.layers()[1].position, NormPoint::new(1.0, 0.55));

    assert!(session.undo());
    assert_eq!(session.layers().len(), 1);
    assert!(session.undo());
    assert_eq!(session.layers()[0].position, NormPoint::center());
    assert!(session.redo());
    assert!(session.redo());
    assert_eq!(session.layers().len(), 2);
    assert!(!session.redo());
}

#[test]
fn history_keeps_the_fifty_most_recent_steps() {
    let mut session = EditorSession::new(FontLibrary::new());
    session.load_image(&photo(16, 16)).unwrap();

    for _ in 0..60 {
        session.add_layer();
    }
    assert_eq!(session.layers().len(), 60);

    let mut undone = 0;
    while session.undo() {
        undone += 1;
    }
    assert_eq!(undone, 50);
    // The ten oldest steps fell off the back.
    assert_eq!(session.layers().len(), 10);
}

#[test]
fn pushing_after_undo_clears_the_redo_path() {
    let mut session = EditorSession::new(FontLibrary::new());
    session.load_image(&photo(16, 16)).unwrap();

    session.add_layer();
    session.add_layer();
    assert!(session.undo());
    assert!(session.can_redo());

    session.add_layer();
    assert!(!session.can_redo());
    assert!(!session.redo());
}

#[test]
fn drag_clamps_to_the_canvas_and_commits_one_step() {
    let mut session = EditorSession::new(FontLibrary::new());
    session.load_image(&photo(32, 32)).unwrap();

    let id = session.add_layer();
    session.update_layer(id, |layer| layer.position = NormPoint::new(0.95, 0.95));

    let bounds = SurfaceBounds::new(200.0, 100.0);
    assert!(session.begin_drag(id, Point::new(190.0, 95.0)));
    // Raw target (1.2, 1.3) clamps per axis.
    session.drag_to(Point::new(240.0, 130.0), bounds);
    session.end_drag();
    assert_eq!(session.layers()[0].position, NormPoint::new(1.0, 1.0));

    assert!(session.undo());
    assert_eq!(session.layers()[0].position, NormPoint::new(0.95, 0.95));
    assert!(session.redo());
    assert_eq!(session.layers()[0].position, NormPoint::new(1.0, 1.0));
}

#[test]
fn removing_the_dragged_layer_abandons_the_drag() {
    let mut session = EditorSession::new(FontLibrary::new());
    session.load_image(&photo(32, 32)).unwrap();

    let id = session.add_layer();
    let bounds = SurfaceBounds::new(100.0, 100.0);
    assert!(session.begin_drag(id, Point::new(50.0, 50.0)));
    session.drag_to(Point::new(60.0, 60.0), bounds);

    session.remove_layer(id);
    assert!(session.layers().is_empty());

    // The rest of the gesture is inert.
    session.drag_to(Point::new(90.0, 90.0), bounds);
    session.end_drag();
    assert!(session.layers().is_empty());
    assert_eq!(session.selected(), None);
}

#[test]
fn loading_a_new_image_starts_from_scratch() {
    let mut session = EditorSession::new(FontLibrary::new());
    session.load_image(&photo(64, 48)).unwrap();
    session.add_layer();
    session.add_layer();

    session.load_image(&photo(32, 32)).unwrap();
    assert!(session.layers().is_empty());
    assert!(!session.can_undo());
    assert_eq!(session.selected(), None);
    assert!(!session.has_foreground());

    // Ids keep counting up across loads; they are never reused.
    let next = session.add_layer();
    assert!(next > LayerId(2));
}
