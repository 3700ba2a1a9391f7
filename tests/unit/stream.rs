use super::*;

use std::io::Read as _;

use crate::foundation::core::{Canvas, FrameIndex};

/// Frames whose bytes count up so any duplication or gap shows up as a mismatch.
fn counting_frames(n: usize, canvas: Canvas) -> VecDeque<Frame> {
    let size = canvas.frame_bytes();
    (0..n)
        .map(|i| {
            let data = (0..size).map(|b| ((i * size + b) % 251) as u8).collect();
            Frame::new(FrameIndex(i as u64), canvas, data).unwrap()
        })
        .collect()
}

fn expected_bytes(frames: &VecDeque<Frame>) -> Vec<u8> {
    frames.iter().flat_map(|f| f.data().iter().copied()).collect()
}

#[test]
fn one_big_read_returns_everything_then_ends() {
    let canvas = Canvas::new(4, 2).unwrap();
    let frames = counting_frames(3, canvas);
    let want = expected_bytes(&frames);

    let mut adapter = StreamAdapter::new(frames);
    let mut buf = vec![0u8; 1000];
    let (n, status) = adapter.read_chunk(&mut buf);
    assert_eq!(n, 96);
    assert_eq!(status, ReadStatus::EndOfStream);
    assert_eq!(&buf[..n], want.as_slice());

    assert_eq!(adapter.read_chunk(&mut buf), (0, ReadStatus::EndOfStream));
    assert!(adapter.is_finished());
}

#[test]
fn small_reads_reconstruct_the_same_bytes() {
    let canvas = Canvas::new(3, 3).unwrap();
    let frames = counting_frames(4, canvas);
    let want = expected_bytes(&frames);

    for chunk in [1usize, 3, 7, 36, 37, 50, 143, 144] {
        let mut adapter = StreamAdapter::new(frames.clone());
        let mut got = Vec::new();
        let mut buf = vec![0u8; chunk];
        loop {
            let (n, status) = adapter.read_chunk(&mut buf);
            assert!(n <= chunk);
            got.extend_from_slice(&buf[..n]);
            match status {
                ReadStatus::More => assert_eq!(n, chunk, "short read before end (chunk {chunk})"),
                ReadStatus::EndOfStream => break,
            }
        }
        assert_eq!(got, want, "chunk size {chunk}");
        assert_eq!(adapter.bytes_read(), want.len() as u64);
    }
}

#[test]
fn exact_frame_sized_reads_split_on_boundaries() {
    let canvas = Canvas::new(2, 2).unwrap();
    let frames = counting_frames(2, canvas);
    let mut adapter = StreamAdapter::new(frames.clone());
    let mut buf = vec![0u8; 16];

    assert_eq!(adapter.read_chunk(&mut buf), (16, ReadStatus::More));
    assert_eq!(buf.as_slice(), frames[0].data());
    assert_eq!(adapter.read_chunk(&mut buf), (16, ReadStatus::More));
    assert_eq!(buf.as_slice(), frames[1].data());
    assert_eq!(adapter.read_chunk(&mut buf), (0, ReadStatus::EndOfStream));
}

#[test]
fn empty_buffer_reads_nothing_and_consumes_nothing() {
    let canvas = Canvas::new(1, 1).unwrap();
    let mut adapter = StreamAdapter::new(counting_frames(1, canvas));
    assert_eq!(adapter.read_chunk(&mut []), (0, ReadStatus::More));
    let mut buf = [0u8; 4];
    assert_eq!(adapter.read_chunk(&mut buf), (4, ReadStatus::More));
}

#[test]
fn io_read_reports_short_tail_then_zero() {
    let canvas = Canvas::new(2, 1).unwrap();
    let frames = counting_frames(2, canvas);
    let want = expected_bytes(&frames);
    let mut adapter = StreamAdapter::new(frames);

    let mut buf = [0u8; 12];
    assert_eq!(adapter.read(&mut buf).unwrap(), 12);
    assert_eq!(adapter.read(&mut buf).unwrap(), 4);
    assert_eq!(adapter.read(&mut buf).unwrap(), 0);

    let mut adapter = StreamAdapter::new(counting_frames(2, canvas));
    let mut all = Vec::new();
    adapter.read_to_end(&mut all).unwrap();
    assert_eq!(all, want);
}

#[test]
fn reads_across_a_live_queue() {
    use crate::foundation::cancel::CancelToken;
    use crate::queue::bounded;

    let canvas = Canvas::new(2, 2).unwrap();
    let frames = counting_frames(5, canvas);
    let want = expected_bytes(&frames);

    let (tx, rx) = bounded(1);
    let producer = std::thread::spawn(move || {
        let cancel = CancelToken::new();
        for f in frames {
            tx.push(f, &cancel).unwrap();
        }
    });

    let mut adapter = StreamAdapter::new(rx);
    let mut got = Vec::new();
    let mut buf = [0u8; 10];
    loop {
        let (n, status) = adapter.read_chunk(&mut buf);
        got.extend_from_slice(&buf[..n]);
        if status == ReadStatus::EndOfStream {
            break;
        }
    }
    producer.join().unwrap();
    assert_eq!(got, want);
}
