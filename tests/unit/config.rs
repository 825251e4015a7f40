use super::*;
use crate::foundation::core::Fps;
use crate::schedule::request::Priority;

#[test]
fn empty_document_uses_defaults() {
    let cfg = RenderConfig::from_json_str("{}").unwrap();
    assert_eq!(cfg, RenderConfig::default());
    assert_eq!(cfg.scheduler.max_pending, 50);
    assert_eq!(cfg.session.priority, Priority::Interactive);
}

#[test]
fn partial_sections_merge_with_defaults() {
    let cfg = RenderConfig::from_json_str(
        r#"{"scheduler":{"max_pending":8},
            "session":{"priority":"background","target_fps":{"num":30,"den":1}}}"#,
    )
    .unwrap();
    assert_eq!(cfg.scheduler.max_pending, 8);
    assert_eq!(cfg.scheduler.worker_name, SchedulerOpts::default().worker_name);
    assert_eq!(cfg.session.priority, Priority::Background);
    assert_eq!(cfg.session.target_fps, Fps::new(30, 1).unwrap());
    assert_eq!(cfg.session.pixel_density, 2.0);
}

#[test]
fn custom_priority_round_trips_through_json() {
    let cfg = RenderConfig::from_json_str(r#"{"session":{"priority":{"custom":7}}}"#).unwrap();
    assert_eq!(cfg.session.priority, Priority::Custom(7));
    assert_eq!(cfg.session.priority.rank(), 7);
}

#[test]
fn invalid_values_are_config_errors() {
    for doc in [
        r#"{"scheduler":{"max_pending":0}}"#,
        r#"{"session":{"pixel_density":0.0}}"#,
        r#"{"session":{"target_fps":{"num":0,"den":1}}}"#,
        r#"{"session":{"max_pixel_dimension":0}}"#,
        r#"{"bogus":1}"#,
        "not json",
    ] {
        let err = RenderConfig::from_json_str(doc).unwrap_err();
        assert!(matches!(err, StickerError::Config(_)), "{doc}: {err}");
    }
}
