use super::*;

#[test]
fn reuses_until_growth() {
    let mut fb = FrameBuffer::new();
    let small = PixelSize::new(10, 10);
    let big = PixelSize::new(20, 20);

    let a = fb.checkout(small);
    assert!(a.capacity() >= small.byte_len());
    fb.checkin(a);

    let b = fb.checkout(small);
    fb.checkin(b);
    assert_eq!(fb.stats().allocations, 1);
    assert_eq!(fb.stats().reuses, 1);

    let c = fb.checkout(big);
    assert_eq!(fb.stats().allocations, 2);
    fb.checkin(c);

    let d = fb.checkout(small);
    assert_eq!(fb.stats().reuses, 2);
    assert!(d.capacity() >= big.byte_len());
}

#[test]
fn checkin_keeps_the_larger_buffer() {
    let mut fb = FrameBuffer::new();
    fb.checkin(Vec::with_capacity(400));
    fb.checkin(Vec::with_capacity(100));
    assert!(fb.retained_capacity() >= 400);

    fb.clear();
    assert_eq!(fb.retained_capacity(), 0);
}

#[test]
fn oversized_checkout_does_not_preallocate() {
    let mut fb = FrameBuffer::new();
    let buf = fb.checkout(PixelSize::new(u32::MAX, u32::MAX));
    assert_eq!(buf.capacity(), 0);
}
