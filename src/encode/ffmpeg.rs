use std::io::{BufRead as _, BufReader, Read};
use std::path::Path;
use std::process::{Child, Command, Stdio};
use std::thread::JoinHandle;
use std::time::Duration;

use crate::foundation::cancel::CancelToken;
use crate::foundation::core::Canvas;
use crate::foundation::error::{ColorRunError, ColorRunResult, PipelineError};
use crate::pipeline::ErrorReporter;

const EXIT_POLL: Duration = Duration::from_millis(200);

/// Options for streaming raw frames through `ffmpeg`.
#[derive(Clone, Debug)]
pub struct FfmpegOpts {
    pub canvas: Canvas,
    pub fps: u32,
    /// Output URL or file path (an RTMP ingest, or a local `.flv`).
    pub destination: String,
    pub preset: String,
    /// Container format passed to `-f`.
    pub format: String,
}

impl FfmpegOpts {
    pub fn new(canvas: Canvas, destination: impl Into<String>) -> Self {
        Self {
            canvas,
            fps: 30,
            destination: destination.into(),
            preset: "veryfast".to_string(),
            format: "flv".to_string(),
        }
    }

    pub fn validate(&self) -> ColorRunResult<()> {
        self.canvas.validate()?;
        if self.fps == 0 {
            return Err(ColorRunError::validation("ffmpeg fps must be non-zero"));
        }
        if !self.canvas.width.is_multiple_of(2) || !self.canvas.height.is_multiple_of(2) {
            return Err(ColorRunError::validation(
                "ffmpeg width/height must be even (required for yuv420p output)",
            ));
        }
        if self.destination.trim().is_empty() {
            return Err(ColorRunError::validation(
                "ffmpeg destination must be non-empty",
            ));
        }
        Ok(())
    }

    /// Full argument list, input side first.
    pub fn args(&self) -> Vec<String> {
        let mut args: Vec<String> = [
            "-hide_banner",
            "-loglevel",
            "error",
            "-f",
            "rawvideo",
            "-pix_fmt",
            "rgba",
            "-video_size",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();
        args.push(format!("{}x{}", self.canvas.width, self.canvas.height));
        // For rawvideo input, `-r` before `-i` sets the input framerate.
        args.extend(["-r".to_string(), self.fps.to_string()]);
        args.extend(
            [
                "-i",
                "pipe:0",
                "-an",
                "-c:v",
                "libx264",
                "-preset",
                self.preset.as_str(),
                "-pix_fmt",
                "yuv420p",
                "-f",
                self.format.as_str(),
            ]
            .iter()
            .map(|s| s.to_string()),
        );
        args.push(self.destination.clone());
        args
    }
}

/// Running `ffmpeg` process consuming a raw RGBA8 byte stream on stdin.
///
/// Three helper threads: a pump copying the stream into stdin, a stderr forwarder, and a watcher
/// that reports the process exit. Exits and pump failures are fatal pipeline errors unless the
/// pipeline was already cancelled.
pub struct FfmpegStreamer {
    threads: Vec<JoinHandle<()>>,
}

impl FfmpegStreamer {
    pub fn spawn<R>(
        opts: &FfmpegOpts,
        stream: R,
        cancel: CancelToken,
        errors: ErrorReporter,
    ) -> ColorRunResult<Self>
    where
        R: Read + Send + 'static,
    {
        opts.validate()?;
        if !is_ffmpeg_on_path() {
            return Err(ColorRunError::consumer(
                "ffmpeg is required for streaming, but was not found on PATH",
            ));
        }
        if let Some(dir) = Path::new(&opts.destination).parent()
            && !opts.destination.contains("://")
        {
            ensure_dir(dir)?;
        }

        // We use the system `ffmpeg` binary rather than linking libav.
        let mut cmd = Command::new("ffmpeg");
        cmd.arg("-y")
            .args(opts.args())
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped());
        tracing::info!(fps = opts.fps, format = %opts.format, "starting ffmpeg");

        let mut child = cmd.spawn().map_err(|e| {
            ColorRunError::consumer(format!(
                "failed to spawn ffmpeg (is it installed and on PATH?): {e}"
            ))
        })?;
        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| ColorRunError::consumer("failed to open ffmpeg stdin (unexpected)"))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| ColorRunError::consumer("failed to open ffmpeg stderr (unexpected)"))?;

        let mut threads = Vec::with_capacity(3);
        threads.push(spawn_named("colorrun-ffmpeg-stderr", move || {
            for line in BufReader::new(stderr).lines() {
                match line {
                    Ok(line) if !line.trim().is_empty() => {
                        tracing::warn!(target: "ffmpeg", "{}", line.trim())
                    }
                    Ok(_) => {}
                    Err(_) => break,
                }
            }
        })?);

        let pump_cancel = cancel.clone();
        let pump_errors = errors.clone();
        threads.push(spawn_named("colorrun-ffmpeg-pump", move || {
            pump(stream, stdin, &pump_cancel, &pump_errors)
        })?);

        threads.push(spawn_named("colorrun-ffmpeg-wait", move || {
            watch(child, &cancel, &errors)
        })?);

        Ok(Self { threads })
    }

    /// Wait for the helper threads. Call after the pipeline has been cancelled.
    pub fn join(self) {
        for h in self.threads {
            let _ = h.join();
        }
    }
}

fn spawn_named(
    name: &str,
    f: impl FnOnce() + Send + 'static,
) -> ColorRunResult<JoinHandle<()>> {
    Ok(std::thread::Builder::new()
        .name(name.to_string())
        .spawn(f)?)
}

fn pump<R: Read, W: std::io::Write>(
    mut stream: R,
    mut stdin: W,
    cancel: &CancelToken,
    errors: &ErrorReporter,
) {
    match std::io::copy(&mut stream, &mut stdin) {
        Ok(bytes) => tracing::debug!(bytes, "frame stream exhausted; closing ffmpeg stdin"),
        Err(e) if cancel.is_cancelled() => {
            tracing::debug!(error = %e, "ffmpeg stdin closed during shutdown")
        }
        Err(e) => errors.report(PipelineError::ConsumerFailed(format!(
            "failed to write frames to ffmpeg stdin: {e}"
        ))),
    }
}

fn watch(mut child: Child, cancel: &CancelToken, errors: &ErrorReporter) {
    loop {
        match child.try_wait() {
            Ok(Some(status)) => {
                tracing::info!(exit_code = ?status.code(), "ffmpeg exited");
                if !cancel.is_cancelled() {
                    errors.report(PipelineError::ConsumerExited(format!(
                        "ffmpeg exited with status {status}"
                    )));
                }
                return;
            }
            Ok(None) => {}
            Err(e) => {
                errors.report(PipelineError::ConsumerFailed(format!(
                    "failed to wait for ffmpeg: {e}"
                )));
                return;
            }
        }
        if cancel.sleep(EXIT_POLL) {
            break;
        }
    }

    // Cancelled: give ffmpeg a moment to flush what the pump already sent, then stop it.
    for _ in 0..10 {
        if let Ok(Some(_)) = child.try_wait() {
            return;
        }
        std::thread::sleep(EXIT_POLL);
    }
    let _ = child.kill();
    let _ = child.wait();
    tracing::info!("ffmpeg stopped");
}

fn ensure_dir(dir: &Path) -> ColorRunResult<()> {
    if dir.as_os_str().is_empty() {
        return Ok(());
    }
    use anyhow::Context as _;
    std::fs::create_dir_all(dir)
        .with_context(|| format!("failed to create output directory '{}'", dir.display()))?;
    Ok(())
}

/// Return `true` when `ffmpeg` can be invoked from `PATH`.
pub fn is_ffmpeg_on_path() -> bool {
    Command::new("ffmpeg")
        .arg("-version")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}
