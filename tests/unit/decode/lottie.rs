use super::*;

fn doc(ip: f64, op: f64) -> Vec<u8> {
    format!(r#"{{"v":"5.7.4","fr":30,"ip":{ip},"op":{op},"w":512,"h":512,"layers":[]}}"#)
        .into_bytes()
}

#[test]
fn header_drives_frame_count_and_rate() {
    let d = LottieDecoder::parse(&doc(0.0, 50.0)).unwrap();
    assert_eq!(d.frame_count(), 50);
    assert_eq!(d.frame_rate(), Some(Fps::new(30, 1).unwrap()));
    assert_eq!(d.intrinsic_size(), Some(PixelSize::new(512, 512)));
}

#[test]
fn fractional_out_point_rounds_up() {
    let d = LottieDecoder::parse(&doc(0.0, 59.5)).unwrap();
    assert_eq!(d.frame_count(), 60);
}

#[test]
fn non_positive_span_has_no_frames() {
    let d = LottieDecoder::parse(&doc(10.0, 10.0)).unwrap();
    assert_eq!(d.frame_count(), 0);
}

#[test]
fn rejects_garbage_and_gzip() {
    assert!(matches!(
        LottieDecoder::parse(b"not json"),
        Err(DecodeError::Malformed(_))
    ));
    assert!(matches!(
        LottieDecoder::parse(&[0x1f, 0x8b, 0x08, 0x00]),
        Err(DecodeError::Malformed(_))
    ));
    assert!(matches!(
        LottieDecoder::parse(br#"{"fr":30,"ip":0}"#),
        Err(DecodeError::Malformed(_))
    ));
}

#[test]
fn band_tracks_progress() {
    let mut d = LottieDecoder::parse(&doc(0.0, 4.0)).unwrap();
    let size = PixelSize::new(8, 2);
    let mut buf = vec![0xAA; size.byte_len()];

    d.render_into(FrameIndex(0), size, &mut buf);
    let alpha: Vec<u8> = buf.chunks_exact(4).take(8).map(|px| px[3]).collect();
    assert_eq!(alpha, vec![255, 255, 0, 0, 0, 0, 0, 0]);

    d.render_into(FrameIndex(3), size, &mut buf);
    assert!(buf.chunks_exact(4).all(|px| px[3] == 255));
}
