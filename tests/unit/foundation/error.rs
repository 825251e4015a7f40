use super::*;

#[test]
fn display_prefixes_are_stable() {
    assert!(
        StickerError::validation("x")
            .to_string()
            .contains("validation error:")
    );
    assert!(StickerError::config("x").to_string().contains("config error:"));
    assert!(
        StickerError::from(DecodeError::EmptyAnimation)
            .to_string()
            .contains("decode error:")
    );
    assert!(
        StickerError::from(RenderError::QueueFull)
            .to_string()
            .contains("render error:")
    );
}

#[test]
fn other_preserves_source() {
    let base = std::io::Error::other("boom");
    let err = StickerError::Other(anyhow::Error::new(base));
    assert!(err.to_string().contains("boom"));
}

#[test]
fn render_error_classes() {
    assert!(RenderError::Evicted.is_backpressure());
    assert!(RenderError::QueueFull.is_backpressure());
    assert!(!RenderError::Released.is_backpressure());
    assert!(
        RenderError::InvalidFrame {
            index: 9,
            frame_count: 3
        }
        .is_caller_error()
    );
    assert!(!RenderError::SchedulerStopped.is_caller_error());
}
