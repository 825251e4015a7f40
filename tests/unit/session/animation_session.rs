use super::*;
use crate::present::sink::InMemorySink;
use crate::schedule::scheduler::SchedulerOpts;

const DOC: &[u8] = br#"{"fr":30,"ip":0,"op":50,"w":400,"h":200}"#;

fn session(opts: SessionOpts) -> (AnimationSession, InMemorySink) {
    let scheduler = RenderScheduler::new(SchedulerOpts::default()).unwrap();
    let sink = InMemorySink::new();
    let s = AnimationSession::load(scheduler, DOC, Box::new(sink.clone()), opts).unwrap();
    (s, sink)
}

#[test]
fn opts_validation() {
    assert!(SessionOpts::default().validate().is_ok());
    let bad_density = SessionOpts {
        pixel_density: f64::NAN,
        ..SessionOpts::default()
    };
    assert!(bad_density.validate().is_err());
    let bad_max = SessionOpts {
        max_pixel_dimension: Some(0),
        ..SessionOpts::default()
    };
    assert!(bad_max.validate().is_err());
}

#[test]
fn pixel_size_applies_density_then_clamp() {
    let opts = SessionOpts {
        pixel_density: 3.0,
        max_pixel_dimension: Some(320),
        ..SessionOpts::default()
    };
    assert_eq!(opts.pixel_size(Size::new(80.0, 40.0)), PixelSize::new(240, 120));
    assert_eq!(opts.pixel_size(Size::new(200.0, 100.0)), PixelSize::new(320, 160));

    let unclamped = SessionOpts {
        max_pixel_dimension: None,
        ..opts
    };
    assert_eq!(unclamped.pixel_size(Size::new(200.0, 100.0)), PixelSize::new(600, 300));
}

#[test]
fn display_size_falls_back_to_intrinsic_points() {
    let (s, _) = session(SessionOpts::default());
    assert_eq!(s.display_size(), Size::new(200.0, 100.0));
}

#[test]
fn generation_bumps_per_request() {
    let (mut s, _) = session(SessionOpts::default());
    assert_eq!(s.generation(), 0);
    s.request_frame(FrameIndex(1), Size::new(10.0, 10.0));
    s.request_frame(FrameIndex(2), Size::new(10.0, 10.0));
    assert_eq!(s.generation(), 2);
    assert_eq!(s.last_requested(), Some(FrameIndex(2)));
    assert_eq!(s.stats().superseded, 1);
}

#[test]
fn stale_reply_never_reaches_the_sink() {
    let (mut s, sink) = session(SessionOpts::default());
    let reply = RenderReply {
        id: crate::schedule::request::RequestId(1),
        handle: s.handle_id(),
        frame: FrameIndex(3),
        size: PixelSize::new(1, 1),
        generation: 41,
        buffer: vec![0; 4],
        result: Ok(()),
    };
    assert_eq!(s.accept(reply), None);
    assert!(sink.is_empty());
    assert_eq!(s.stats().stale_dropped, 1);
}

#[test]
fn invalidated_session_refuses_work() {
    let (mut s, sink) = session(SessionOpts::default());
    s.invalidate();
    s.invalidate();
    assert!(!s.is_live());
    assert_eq!(sink.clears(), 1);

    s.request_frame(FrameIndex(0), Size::new(10.0, 10.0));
    assert!(!s.has_in_flight());
    assert_eq!(
        s.render_sync(FrameIndex(0), Size::new(10.0, 10.0)),
        Err(RenderError::Released)
    );
    assert_eq!(s.advance(), TickOutcome::Dead);
}
