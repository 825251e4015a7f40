use super::*;
use std::sync::mpsc;

fn presented(pixels: &[u8]) -> PresentedFrame<'_> {
    PresentedFrame {
        frame: FrameIndex(4),
        size: PixelSize::new(1, 1),
        generation: 9,
        pixels,
    }
}

#[test]
fn in_memory_clones_share_storage() {
    let sink = InMemorySink::new();
    let mut writer = sink.clone();
    writer.present(presented(&[1, 2, 3, 4])).unwrap();
    writer.clear().unwrap();

    let frames = sink.frames();
    assert_eq!(frames.len(), 1);
    assert_eq!(frames[0].frame, FrameIndex(4));
    assert_eq!(frames[0].generation, 9);
    assert_eq!(frames[0].image.data, vec![1, 2, 3, 4]);
    assert!(frames[0].image.premultiplied);
    assert_eq!(sink.clears(), 1);
}

#[test]
fn channel_sink_skips_when_full_and_errors_when_closed() {
    let (tx, rx) = mpsc::sync_channel(1);
    let mut sink = ChannelSink::new(tx);
    sink.present(presented(&[0; 4])).unwrap();
    sink.present(presented(&[1; 4])).unwrap();
    assert_eq!(rx.recv().unwrap().image.data, vec![0; 4]);
    assert!(rx.try_recv().is_err());

    drop(rx);
    assert!(sink.present(presented(&[2; 4])).is_err());
}

#[test]
fn null_sink_counts() {
    let mut sink = NullSink::default();
    sink.present(presented(&[0; 4])).unwrap();
    assert_eq!(sink.presented, 1);
}
