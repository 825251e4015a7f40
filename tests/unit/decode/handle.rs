use super::*;
use std::sync::Arc;
use std::sync::atomic::AtomicUsize;

struct Probe {
    frames: u64,
    renders: Arc<AtomicUsize>,
    dropped: Arc<AtomicBool>,
}

impl FrameDecoder for Probe {
    fn frame_count(&self) -> u64 {
        self.frames
    }

    fn render_into(&mut self, frame: FrameIndex, _size: PixelSize, dst: &mut [u8]) {
        if frame.0 == 13 {
            panic!("frame 13 is cursed");
        }
        self.renders.fetch_add(1, Ordering::SeqCst);
        dst.fill(frame.0 as u8);
    }
}

impl Drop for Probe {
    fn drop(&mut self) {
        self.dropped.store(true, Ordering::SeqCst);
    }
}

fn probe(frames: u64) -> (Box<Probe>, Arc<AtomicUsize>, Arc<AtomicBool>) {
    let renders = Arc::new(AtomicUsize::new(0));
    let dropped = Arc::new(AtomicBool::new(false));
    (
        Box::new(Probe {
            frames,
            renders: renders.clone(),
            dropped: dropped.clone(),
        }),
        renders,
        dropped,
    )
}

#[test]
fn empty_decoder_is_released_immediately() {
    let (p, _, dropped) = probe(0);
    let err = DecoderHandle::from_decoder(p).unwrap_err();
    assert_eq!(err, DecodeError::EmptyAnimation);
    assert!(dropped.load(Ordering::SeqCst));
}

#[test]
fn render_validates_arguments() {
    let (p, renders, _) = probe(5);
    let h = DecoderHandle::from_decoder(p).unwrap();
    let ex = Exclusive::acquire();
    let size = PixelSize::new(2, 2);
    let mut buf = vec![0u8; size.byte_len()];

    assert_eq!(
        h.render_frame(&ex, FrameIndex(5), size, &mut buf),
        Err(RenderError::InvalidFrame {
            index: 5,
            frame_count: 5
        })
    );
    assert_eq!(
        h.render_frame(&ex, FrameIndex(0), PixelSize::new(0, 2), &mut buf),
        Err(RenderError::InvalidSize {
            width: 0,
            height: 2
        })
    );
    assert!(matches!(
        h.render_frame(&ex, FrameIndex(0), PixelSize::new(4, 4), &mut buf),
        Err(RenderError::BufferTooSmall { .. })
    ));
    assert_eq!(renders.load(Ordering::SeqCst), 0);

    h.render_frame(&ex, FrameIndex(3), size, &mut buf).unwrap();
    assert!(buf.iter().all(|&b| b == 3));
    assert_eq!(renders.load(Ordering::SeqCst), 1);
}

#[test]
fn decoder_panic_is_contained() {
    let (p, _, _) = probe(20);
    let h = DecoderHandle::from_decoder(p).unwrap();
    let ex = Exclusive::acquire();
    let size = PixelSize::new(1, 1);
    let mut buf = vec![0u8; 4];

    let err = h.render_frame(&ex, FrameIndex(13), size, &mut buf).unwrap_err();
    assert!(matches!(err, RenderError::DecoderPanicked(msg) if msg.contains("cursed")));
    h.render_frame(&ex, FrameIndex(1), size, &mut buf).unwrap();
}

#[test]
fn release_is_idempotent_and_blocks_renders() {
    let (p, renders, dropped) = probe(5);
    let h = DecoderHandle::from_decoder(p).unwrap();
    assert!(h.is_live());

    assert!(h.release());
    assert!(!h.release());
    assert!(!h.is_live());
    assert!(dropped.load(Ordering::SeqCst));

    let mut buf = vec![0u8; 4];
    assert_eq!(
        h.render_frame(&Exclusive::acquire(), FrameIndex(0), PixelSize::new(1, 1), &mut buf),
        Err(RenderError::Released)
    );
    assert_eq!(renders.load(Ordering::SeqCst), 0);
}

#[test]
fn load_uses_builtin_lottie_decoder() {
    let payload = br#"{"fr":24,"ip":0,"op":12,"w":100,"h":50}"#;
    let h = DecoderHandle::load(payload).unwrap();
    assert_eq!(h.frame_count(), 12);
    assert_eq!(h.intrinsic_size(), Some(PixelSize::new(100, 50)));

    assert_eq!(
        DecoderHandle::load(br#"{"fr":24,"ip":5,"op":5,"w":1,"h":1}"#).unwrap_err(),
        DecodeError::EmptyAnimation
    );
    assert_ne!(h.id(), DecoderHandle::load(payload).unwrap().id());
}
