use super::*;

use crate::foundation::core::{Canvas, Rgba8};
use crate::pipeline::error_channel;
use crate::queue::bounded;

fn frame(i: u64) -> Frame {
    Frame::solid(
        FrameIndex(i),
        Canvas::new(4, 2).unwrap(),
        Rgba8::new(i as u8, 10, 20, 255),
    )
}

/// Fails on odd frame indices.
struct FlakyEncoder;

impl FrameEncoder for FlakyEncoder {
    fn extension(&self) -> &'static str {
        "bin"
    }

    fn encode(&self, frame: &Frame) -> anyhow::Result<Vec<u8>> {
        if frame.index().0 % 2 == 1 {
            anyhow::bail!("odd frame");
        }
        Ok(vec![frame.index().0 as u8])
    }
}

#[test]
fn raw_encoder_is_identity() {
    let f = frame(3);
    assert_eq!(RawRgbaEncoder.encode(&f).unwrap(), f.data());
}

#[test]
fn png_encoder_round_trips_pixels() {
    let f = frame(9);
    let bytes = PngEncoder.encode(&f).unwrap();
    assert_eq!(&bytes[..8], b"\x89PNG\r\n\x1a\n");
    let decoded = image::load_from_memory(&bytes).unwrap().to_rgba8();
    assert_eq!(decoded.dimensions(), (4, 2));
    assert_eq!(decoded.as_raw().as_slice(), f.data());
}

#[test]
fn jpeg_encoder_emits_jfif() {
    let bytes = JpegEncoder::default().encode(&frame(0)).unwrap();
    assert_eq!(&bytes[..2], &[0xFF, 0xD8]);
}

#[test]
fn failed_frames_are_reported_and_dropped() {
    let cancel = CancelToken::new();
    let (in_tx, in_rx) = bounded(8);
    for i in 0..6 {
        in_tx.push(frame(i), &cancel).unwrap();
    }
    in_tx.close();
    let (out_tx, out_rx) = bounded(8);
    let (reporter, errors) = error_channel();

    let stage = EncodeStage::new(Box::new(FlakyEncoder), reporter);
    let status = stage.status();
    stage.run(cancel, in_rx, out_tx);

    let out: Vec<_> = std::iter::from_fn(|| out_rx.pop()).collect();
    let indices: Vec<_> = out.iter().map(|f| f.index.0).collect();
    assert_eq!(indices, vec![0, 2, 4]);
    assert_eq!(out[1].bytes, vec![2]);
    assert_eq!(out[2].file_name(), "frame_000004.bin");
    assert_eq!(status.get(), StageState::Closed);

    let errs: Vec<_> = errors.try_iter().collect();
    assert_eq!(errs.len(), 3);
    assert!(errs.iter().all(|e| !e.is_fatal()));
    assert!(matches!(errs[0], PipelineError::Encode { frame: 1, .. }));
}

#[test]
fn write_frames_stops_at_limit() {
    let dir = std::env::temp_dir().join(format!("colorrun_write_frames_{}", std::process::id()));
    let _ = std::fs::remove_dir_all(&dir);

    let cancel = CancelToken::new();
    let (tx, rx) = bounded(8);
    for i in 0..5 {
        tx.push(
            EncodedFrame {
                index: FrameIndex(i),
                extension: "bin",
                bytes: vec![i as u8; 3],
            },
            &cancel,
        )
        .unwrap();
    }
    drop(tx);

    let paths = write_frames(&dir, rx, Some(2)).unwrap();
    assert_eq!(paths.len(), 2);
    assert_eq!(paths[1], dir.join("frame_000001.bin"));
    assert_eq!(std::fs::read(&paths[1]).unwrap(), vec![1, 1, 1]);
    std::fs::remove_dir_all(&dir).unwrap();
}
