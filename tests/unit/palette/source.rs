use super::*;

use std::collections::VecDeque;
use std::sync::Mutex;
use std::thread;
use std::time::Instant;

use crate::foundation::error::PaletteError;
use crate::palette::Palette;
use crate::pipeline::error_channel;
use crate::queue::bounded;

/// Replays a fixed list of responses, then parks until `idle` is cancelled.
struct ScriptedApi {
    script: Mutex<VecDeque<Result<Palette, PaletteError>>>,
    seeds: Mutex<Vec<Option<Seed>>>,
    calls: Mutex<Vec<Instant>>,
    idle: CancelToken,
}

impl ScriptedApi {
    fn new(script: Vec<Result<Palette, PaletteError>>, idle: CancelToken) -> Self {
        Self {
            script: Mutex::new(script.into()),
            seeds: Mutex::new(Vec::new()),
            calls: Mutex::new(Vec::new()),
            idle,
        }
    }

    fn seeds(&self) -> Vec<Option<Seed>> {
        self.seeds.lock().unwrap().clone()
    }

    /// Gaps between consecutive fetch calls.
    fn call_gaps(&self) -> Vec<Duration> {
        let calls = self.calls.lock().unwrap();
        calls.windows(2).map(|w| w[1] - w[0]).collect()
    }
}

impl PaletteApi for ScriptedApi {
    fn fetch_palette(
        &self,
        _model: &str,
        seed: Option<&Seed>,
    ) -> Result<Palette, PaletteError> {
        self.seeds.lock().unwrap().push(seed.copied());
        self.calls.lock().unwrap().push(Instant::now());
        let next = self.script.lock().unwrap().pop_front();
        match next {
            Some(r) => r,
            None => {
                self.idle.sleep(Duration::from_secs(60));
                Ok(palette(200))
            }
        }
    }

    fn list_models(&self) -> Result<Vec<String>, PaletteError> {
        Ok(vec!["default".to_string()])
    }
}

fn palette(base: u8) -> Palette {
    Palette(std::array::from_fn(|i| Rgba8::opaque([base + i as u8; 3])))
}

/// Palette whose first two colors echo `prev`'s continuity seed, like the real service does.
fn continuation(prev: &Palette, base: u8) -> Palette {
    let mut p = palette(base);
    p.0[0] = prev.0[3];
    p.0[1] = prev.0[4];
    p
}

fn fast_opts() -> PaletteSourceOpts {
    PaletteSourceOpts {
        pacing_interval: Duration::ZERO,
        pacing_iterations: Some(0),
        ..Default::default()
    }
}

#[test]
fn two_failures_then_success_emits_clean_palette() {
    let cancel = CancelToken::new();
    let good = palette(10);
    let api = Arc::new(ScriptedApi::new(
        vec![
            Err(PaletteError::transport("connection refused")),
            Err(PaletteError::EmptyBody),
            Ok(good),
        ],
        cancel.clone(),
    ));
    let (reporter, errors) = error_channel();
    let (tx, rx) = bounded(15);
    let source = PaletteSource::new(api.clone(), "default", fast_opts(), reporter);
    let status = source.status();

    let c = cancel.clone();
    let h = thread::spawn(move || source.run(c, tx));

    let got: Vec<_> = (0..5).map(|_| rx.pop().unwrap()).collect();
    assert_eq!(got, good.colors().to_vec());

    cancel.cancel();
    h.join().unwrap();
    assert_eq!(rx.pop(), None);
    assert_eq!(status.get(), StageState::Closed);

    let errs: Vec<_> = errors.try_iter().collect();
    assert_eq!(errs.len(), 2);
    assert!(matches!(
        errs[0],
        PipelineError::Palette {
            attempt: 1,
            source: PaletteError::Transport(_)
        }
    ));
    assert!(matches!(
        errs[1],
        PipelineError::Palette {
            attempt: 2,
            source: PaletteError::EmptyBody
        }
    ));
    // Failed attempts never advance the continuity chain.
    assert!(api.seeds()[..3].iter().all(Option::is_none));
}

#[test]
fn consecutive_palettes_are_chained_by_their_seed() {
    let cancel = CancelToken::new();
    let p1 = palette(0);
    let p2 = continuation(&p1, 50);
    let p3 = continuation(&p2, 100);
    let api = Arc::new(ScriptedApi::new(
        vec![Ok(p1), Ok(p2), Ok(p3)],
        cancel.clone(),
    ));
    let (reporter, _errors) = error_channel();
    let (tx, rx) = bounded(15);
    let source = PaletteSource::new(api.clone(), "default", fast_opts(), reporter);

    let c = cancel.clone();
    let h = thread::spawn(move || source.run(c, tx));

    let got: Vec<_> = (0..11).map(|_| rx.pop().unwrap()).collect();
    cancel.cancel();
    h.join().unwrap();

    let mut want = p1.colors().to_vec();
    want.extend_from_slice(&p2.colors()[2..]);
    want.extend_from_slice(&p3.colors()[2..]);
    assert_eq!(got, want);

    let seeds = api.seeds();
    assert_eq!(seeds[0], None);
    assert_eq!(seeds[1], Some(p1.continuity_seed()));
    assert_eq!(seeds[2], Some(p2.continuity_seed()));
    // The echoed seed colors at the front of p2 match the tail of p1 and are not re-emitted.
    assert_eq!(&p2.colors()[..2], &p1.colors()[3..]);
    assert_eq!(got[5], p2.colors()[2]);
}

#[test]
fn cancel_while_queue_is_full_closes_the_queue() {
    let cancel = CancelToken::new();
    let api = Arc::new(ScriptedApi::new(vec![Ok(palette(1))], cancel.clone()));
    let (reporter, _errors) = error_channel();
    let (tx, rx) = bounded(3);
    let source = PaletteSource::new(api, "default", fast_opts(), reporter);
    let status = source.status();

    let c = cancel.clone();
    let h = thread::spawn(move || source.run(c, tx));

    let deadline = Instant::now() + Duration::from_secs(5);
    while rx.len() < 3 && Instant::now() < deadline {
        thread::sleep(Duration::from_millis(5));
    }
    assert_eq!(status.get(), StageState::Running);
    cancel.cancel();
    h.join().unwrap();

    assert_eq!(status.get(), StageState::Closed);
    let drained: Vec<_> = std::iter::from_fn(|| rx.pop()).collect();
    assert_eq!(drained, palette(1).colors()[..3].to_vec());
    assert!(rx.is_finished());
}

#[test]
fn pacing_sleep_is_interrupted_by_cancel() {
    let cancel = CancelToken::new();
    let api = Arc::new(ScriptedApi::new(vec![Ok(palette(1))], cancel.clone()));
    let (reporter, _errors) = error_channel();
    let (tx, rx) = bounded(15);
    let opts = PaletteSourceOpts {
        pacing_interval: Duration::from_secs(30),
        pacing_iterations: None,
        ..Default::default()
    };
    let source = PaletteSource::new(api.clone(), "default", opts, reporter);

    let c = cancel.clone();
    let h = thread::spawn(move || source.run(c, tx));
    for _ in 0..5 {
        rx.pop().unwrap();
    }
    thread::sleep(Duration::from_millis(20));
    // Still sleeping out the first paced interval; no second fetch yet.
    assert_eq!(api.seeds().len(), 1);

    let start = Instant::now();
    cancel.cancel();
    h.join().unwrap();
    assert!(start.elapsed() < Duration::from_secs(5));
    assert_eq!(rx.pop(), None);
}

#[test]
fn pacing_stops_after_a_third_of_the_queue_capacity() {
    let cancel = CancelToken::new();
    let interval = Duration::from_millis(150);
    let api = Arc::new(ScriptedApi::new(
        (0..8).map(|i| Ok(palette(i * 10))).collect(),
        cancel.clone(),
    ));
    let (reporter, _errors) = error_channel();
    // Capacity 9 paces the first 3 fetches.
    let (tx, rx) = bounded(9);
    let opts = PaletteSourceOpts {
        pacing_interval: interval,
        pacing_iterations: None,
        ..Default::default()
    };
    let source = PaletteSource::new(api.clone(), "default", opts, reporter);

    let c = cancel.clone();
    let h = thread::spawn(move || source.run(c, tx));
    // 5 colors from the first palette, 3 from each of the next 7.
    for _ in 0..26 {
        rx.pop().unwrap();
    }
    cancel.cancel();
    h.join().unwrap();

    let gaps = api.call_gaps();
    assert!(gaps.len() >= 7, "{gaps:?}");
    for gap in &gaps[..3] {
        assert!(*gap >= interval, "paced gap too short: {gaps:?}");
    }
    let unpaced: Duration = gaps[3..7].iter().sum();
    assert!(unpaced < interval, "fetches after pacing ended were delayed: {gaps:?}");
}

#[test]
fn failed_fetches_back_off_exponentially() {
    let cancel = CancelToken::new();
    let base = Duration::from_millis(40);
    let good = palette(30);
    let api = Arc::new(ScriptedApi::new(
        vec![
            Err(PaletteError::transport("timeout")),
            Err(PaletteError::transport("timeout")),
            Err(PaletteError::EmptyBody),
            Ok(good),
        ],
        cancel.clone(),
    ));
    let (reporter, errors) = error_channel();
    let (tx, rx) = bounded(15);
    let opts = PaletteSourceOpts {
        retry_backoff_base: base,
        retry_backoff_max: Duration::from_secs(1),
        ..fast_opts()
    };
    let source = PaletteSource::new(api.clone(), "default", opts, reporter);

    let c = cancel.clone();
    let h = thread::spawn(move || source.run(c, tx));
    let got: Vec<_> = (0..5).map(|_| rx.pop().unwrap()).collect();
    cancel.cancel();
    h.join().unwrap();

    assert_eq!(got, good.colors().to_vec());
    assert_eq!(errors.try_iter().count(), 3);
    let gaps = api.call_gaps();
    assert!(gaps[0] >= base, "{gaps:?}");
    assert!(gaps[1] >= base * 2, "{gaps:?}");
    assert!(gaps[2] >= base * 4, "{gaps:?}");
}

#[test]
fn backoff_sleep_is_interrupted_by_cancel() {
    let cancel = CancelToken::new();
    let api = Arc::new(ScriptedApi::new(
        vec![Err(PaletteError::transport("connection refused"))],
        cancel.clone(),
    ));
    let (reporter, errors) = error_channel();
    let (tx, rx) = bounded(15);
    let opts = PaletteSourceOpts {
        retry_backoff_base: Duration::from_secs(30),
        retry_backoff_max: Duration::from_secs(60),
        ..fast_opts()
    };
    let source = PaletteSource::new(api.clone(), "default", opts, reporter);
    let status = source.status();

    let c = cancel.clone();
    let h = thread::spawn(move || source.run(c, tx));
    let first = errors.recv_timeout(Duration::from_secs(5)).unwrap();
    assert!(matches!(first, PipelineError::Palette { attempt: 1, .. }));

    let start = Instant::now();
    cancel.cancel();
    h.join().unwrap();
    assert!(start.elapsed() < Duration::from_secs(5));
    assert_eq!(api.seeds().len(), 1);
    assert_eq!(status.get(), StageState::Closed);
    assert_eq!(rx.pop(), None);
}

#[test]
fn palette_arriving_after_cancel_is_dropped() {
    let cancel = CancelToken::new();
    // The unscripted fetch parks until cancel, then returns a palette anyway.
    let api = Arc::new(ScriptedApi::new(vec![], cancel.clone()));
    let (reporter, _errors) = error_channel();
    let (tx, rx) = bounded(15);
    let source = PaletteSource::new(api.clone(), "default", fast_opts(), reporter);

    let c = cancel.clone();
    let h = thread::spawn(move || source.run(c, tx));
    while api.seeds().is_empty() {
        thread::sleep(Duration::from_millis(2));
    }
    cancel.cancel();
    h.join().unwrap();
    assert_eq!(rx.pop(), None);
}
