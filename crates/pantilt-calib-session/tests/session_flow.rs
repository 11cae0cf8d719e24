use approx::assert_abs_diff_eq;
use pantilt_calib_core::{EstimationError, Homography, Point2D};
use pantilt_calib_session::{
    CalibrationConfig, CalibrationSession, Phase, SessionError, SessionEvent, SessionOptions,
};
use std::time::{Duration, Instant};

const TICK: Duration = Duration::from_millis(16);

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn options() -> SessionOptions {
    SessionOptions {
        emission_interval: TICK,
        start_paused: false,
    }
}

fn ground_truths() -> Vec<Homography> {
    vec![
        Homography::from_array([[0.8, 0.05, 120.0], [-0.02, 1.1, 80.0], [0.0009, -0.0004, 1.0]]),
        Homography::from_array([[0.09375, 0.0, 0.0], [0.0, -0.0833, 90.0], [0.0, 0.0, 1.0]]),
        Homography::from_array([[2.0, -1.0, 3.0], [0.5, 1.5, -7.0], [0.001, 0.002, 0.5]]),
    ]
}

fn calibration_sources() -> [Point2D; 4] {
    [
        Point2D::new(40.0, 30.0),
        Point2D::new(600.0, 20.0),
        Point2D::new(620.0, 450.0),
        Point2D::new(25.0, 470.0),
    ]
}

fn calibrate_with(session: &mut CalibrationSession, truth: &Homography) {
    for src in calibration_sources() {
        session.submit(src, truth.map(src).unwrap()).unwrap();
    }
}

fn run_to_end(session: &mut CalibrationSession, start: Instant, max_ticks: usize) -> Vec<usize> {
    let mut emitted = Vec::new();
    let mut t = start;
    for _ in 0..max_ticks {
        if let Some(p) = session.advance(t).unwrap() {
            assert!(p.valid);
            emitted.push(p.index);
        }
        t += TICK;
    }
    emitted
}

#[test]
fn session_recovers_each_ground_truth() {
    init_logging();
    for truth in ground_truths() {
        let mut s = CalibrationSession::new(Vec::new(), options());
        calibrate_with(&mut s, &truth);
        let est = s.homography().copied().expect("calibrated");

        let a = truth.h / truth.h.norm();
        let mut b = est.h / est.h.norm();
        if a.dot(&b) < 0.0 {
            b = -b;
        }
        assert_abs_diff_eq!(a, b, epsilon = 1e-8);

        for c in s.correspondences() {
            let mapped = s.map_point(c.source).unwrap();
            assert_abs_diff_eq!(mapped.x, c.target.x, epsilon = 1e-6);
            assert_abs_diff_eq!(mapped.y, c.target.y, epsilon = 1e-6);
        }
    }
}

#[test]
fn stream_emits_n_minus_skips_then_stays_empty() {
    init_logging();
    // Target (x, y) = (x, y) / (x - 100): the column x == 100 is the horizon.
    let truth = Homography::from_array([[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [1.0, 0.0, -100.0]]);
    let contour: Vec<Point2D> = (0..20)
        .map(|i| Point2D::new(if i % 5 == 0 { 100.0 } else { 200.0 + i as f64 }, 10.0 * i as f64))
        .collect();
    let mut s = CalibrationSession::new(contour.clone(), options());
    let sources = [
        Point2D::new(150.0, 0.0),
        Point2D::new(300.0, 0.0),
        Point2D::new(300.0, 200.0),
        Point2D::new(150.0, 200.0),
    ];
    for src in sources {
        s.submit(src, truth.map(src).unwrap()).unwrap();
    }
    assert_eq!(s.phase(), Phase::Streaming);

    let emitted = run_to_end(&mut s, Instant::now(), 40);
    let skips = contour.iter().filter(|p| p.x == 100.0).count();
    assert_eq!(skips, 4);
    assert_eq!(emitted.len(), contour.len() - skips);
    assert!(emitted.windows(2).all(|w| w[0] < w[1]));

    let state = s.state();
    assert!(state.exhausted);
    assert_eq!(state.skipped, skips);
    assert_eq!(state.emitted, emitted.len());

    let skipped_events = s
        .events()
        .iter()
        .filter(|e| matches!(e, SessionEvent::PointSkipped { .. }))
        .count();
    assert_eq!(skipped_events, skips);

    assert_eq!(s.advance(Instant::now() + Duration::from_secs(60)), Ok(None));
}

#[test]
fn early_advance_does_not_move_the_cursor() {
    let contour: Vec<Point2D> = (0..3).map(|i| Point2D::new(i as f64, i as f64)).collect();
    let mut s = CalibrationSession::new(contour, options());
    calibrate_with(&mut s, &ground_truths()[0]);

    let t0 = Instant::now();
    assert!(s.advance(t0).unwrap().is_some());
    let before = s.state().cursor;
    assert_eq!(s.advance(t0 + TICK / 4), Ok(None));
    assert_eq!(s.advance(t0 + TICK / 2), Ok(None));
    assert_eq!(s.state().cursor, before);
    assert!(s.advance(t0 + TICK).unwrap().is_some());
}

#[test]
fn collinear_fourth_point_keeps_all_four() {
    let mut s = CalibrationSession::new(Vec::new(), options());
    let sources = [(0.0, 0.0), (10.0, 10.0), (20.0, 20.0), (30.0, 30.0)];
    let targets = [(0.0, 0.0), (1.0, 0.0), (1.0, 1.0), (0.0, 1.0)];
    let mut last = None;
    for (s_xy, t_xy) in sources.into_iter().zip(targets) {
        last = Some(s.submit(s_xy.into(), t_xy.into()));
    }
    assert!(matches!(
        last,
        Some(Err(SessionError::Estimation(EstimationError::Degenerate(_))))
    ));
    assert_eq!(s.phase(), Phase::Collecting);
    assert_eq!(s.correspondences().len(), 4);
    assert!(s.homography().is_none());
}

#[test]
fn reset_from_every_phase_behaves_like_a_fresh_session() {
    let contour: Vec<Point2D> = (0..4).map(|i| Point2D::new(10.0 * i as f64, 5.0)).collect();
    let truth = ground_truths()[1];

    let mut collecting = CalibrationSession::new(contour.clone(), options());
    collecting
        .submit(Point2D::new(1.0, 1.0), Point2D::new(2.0, 2.0))
        .unwrap();

    let mut streaming = CalibrationSession::new(contour.clone(), options());
    calibrate_with(&mut streaming, &truth);
    run_to_end(&mut streaming, Instant::now(), 2);

    let mut paused = CalibrationSession::new(contour.clone(), options());
    calibrate_with(&mut paused, &truth);
    paused.pause().unwrap();

    let mut exhausted = CalibrationSession::new(contour.clone(), options());
    calibrate_with(&mut exhausted, &truth);
    run_to_end(&mut exhausted, Instant::now(), 10);

    for mut s in [collecting, streaming, paused, exhausted] {
        let st = s.reset();
        assert_eq!(st.phase, Phase::Collecting);
        assert_eq!(st.correspondences, 0);
        assert_eq!((st.cursor, st.emitted, st.skipped), (0, 0, 0));
        assert!(!st.exhausted);
        assert!(s.homography().is_none());
        assert!(s.trail().is_empty());

        calibrate_with(&mut s, &truth);
        let emitted = run_to_end(&mut s, Instant::now(), 10);
        assert_eq!(emitted, vec![0, 1, 2, 3]);
    }
}

#[test]
fn config_round_trips_through_json_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.json");

    let mut cfg = CalibrationConfig::new("contour.png");
    cfg.emission_interval_ms = 5;
    cfg.start_paused = true;
    cfg.write_json(&path).unwrap();

    let loaded = CalibrationConfig::load_json(&path).unwrap();
    assert_eq!(loaded.image_path, "contour.png");
    assert_eq!(loaded.session_options().emission_interval, Duration::from_millis(5));
    assert!(loaded.session_options().start_paused);

    let model = loaded.gimbal_model();
    let mut s = CalibrationSession::new(Vec::new(), loaded.session_options());
    for p in loaded.calibration_points() {
        let c = model.correspondence(p);
        s.submit(c.source, c.target).unwrap();
    }
    assert_eq!(s.phase(), Phase::Calibrated);
    let center = s.map_point(Point2D::new(960.0, 540.0)).unwrap();
    assert_abs_diff_eq!(center.x, 90.0, epsilon = 1e-6);
    assert_abs_diff_eq!(center.y, 45.0, epsilon = 1e-6);
}

#[test]
fn invalid_config_file_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("bad.json");
    std::fs::write(&path, r#"{ "image_path": "x.png", "pan_range": [5.0, 5.0] }"#).unwrap();
    assert!(CalibrationConfig::load_json(&path).is_err());
}
