use waste_sorter::domain::{
    counts::ObjectCounts,
    detection::{Detection, WasteClass},
    geometry::{is_in_roi, BBox, Roi},
    session::Session,
    tracker::DedupStrategy,
};

fn roi() -> Roi {
    Roi::new(0.0, 0.0, 100.0, 100.0)
}

fn det(class: WasteClass, x: f32, y: f32) -> Detection {
    Detection::new(class, 0.9, BBox::new(x, y, 20.0, 20.0))
}

#[test]
fn bottle_inside_roi_is_counted_once() {
    let mut session = Session::new(roi(), DedupStrategy::ExactMatch);
    let bottle = det(WasteClass::Bottle, 10.0, 10.0);

    assert!(session.observe(&bottle).counted);
    assert_eq!(session.counts().get(WasteClass::Bottle), 1);

    assert!(!session.observe(&bottle).counted);
    assert_eq!(session.counts().get(WasteClass::Bottle), 1);
}

#[test]
fn bottle_outside_roi_leaves_counts_unchanged() {
    let mut session = Session::new(roi(), DedupStrategy::ExactMatch);
    let far = det(WasteClass::Bottle, 500.0, 500.0);

    assert!(!is_in_roi(&far.bbox, &session.roi()));
    assert!(!session.observe(&far).counted);
    assert_eq!(*session.counts(), ObjectCounts::new());
    assert_eq!(session.tracker().remembered(), 0);
}

#[test]
fn object_counted_after_it_enters_the_roi() {
    let mut session = Session::new(roi(), DedupStrategy::ExactMatch);
    let outside = det(WasteClass::Can, 300.0, 10.0);
    session.apply_frame(&[outside]);
    assert_eq!(session.counts().total(), 0);

    let inside = det(WasteClass::Can, 90.0, 10.0);
    assert_eq!(session.apply_frame(&[inside.clone()]), vec![inside]);
    assert_eq!(session.counts().get(WasteClass::Can), 1);
}

#[test]
fn exact_match_counts_a_jittered_box_again() {
    let mut session = Session::new(roi(), DedupStrategy::ExactMatch);
    session.apply_frame(&[det(WasteClass::Bottle, 10.0, 10.0)]);
    session.apply_frame(&[det(WasteClass::Bottle, 11.0, 10.0)]);
    assert_eq!(session.counts().get(WasteClass::Bottle), 2);
}

#[test]
fn overlap_tracking_follows_a_moving_object() {
    let strategy = DedupStrategy::Overlap { iou_threshold: 0.5, ttl_frames: 3 };
    let mut session = Session::new(roi(), strategy);

    for x in [10.0, 11.0, 12.0, 13.0] {
        session.apply_frame(&[det(WasteClass::Bottle, x, 10.0)]);
    }
    assert_eq!(session.counts().get(WasteClass::Bottle), 1);

    // same place, different class
    session.apply_frame(&[det(WasteClass::Can, 13.0, 10.0)]);
    assert_eq!(session.counts().get(WasteClass::Can), 1);
}

#[test]
fn overlap_track_expires_after_ttl() {
    let strategy = DedupStrategy::Overlap { iou_threshold: 0.5, ttl_frames: 2 };
    let mut session = Session::new(roi(), strategy);
    let bottle = det(WasteClass::Bottle, 10.0, 10.0);

    session.apply_frame(&[bottle.clone()]);
    for _ in 0..3 {
        session.apply_frame(&[]);
    }
    session.apply_frame(&[bottle]);
    assert_eq!(session.counts().get(WasteClass::Bottle), 2);
}

#[test]
fn counts_never_decrease() {
    let mut session = Session::new(roi(), DedupStrategy::ExactMatch);
    let frames = [
        vec![det(WasteClass::Bottle, 10.0, 10.0), det(WasteClass::Can, 40.0, 40.0)],
        vec![det(WasteClass::Bottle, 10.0, 10.0)],
        vec![],
        vec![det(WasteClass::Cardboard, 300.0, 300.0)],
        vec![det(WasteClass::GlassBottle, 60.0, 60.0), det(WasteClass::Can, 40.0, 40.0)],
    ];

    let mut previous = session.counts().clone();
    for frame in &frames {
        session.apply_frame(frame);
        assert!(session.counts().dominates(&previous));
        previous = session.counts().clone();
    }
    assert_eq!(session.counts().total(), 3);
    assert_eq!(session.cycles(), frames.len() as u64);
}
