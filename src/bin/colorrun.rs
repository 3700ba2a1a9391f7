use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context as _;
use clap::{Args, Parser, Subcommand, ValueEnum};

use colorrun::encode::{self, JpegEncoder, PngEncoder, RawRgbaEncoder};
use colorrun::ingest::{IngestDirectory, redact_key};
use colorrun::palette::colormind::DEFAULT_BASE_URL;
use colorrun::palette::DEFAULT_MODEL;
use colorrun::{
    CancelToken, Canvas, ColormindClient, EncodeStage, FfmpegOpts, FfmpegStreamer, FrameEncoder,
    ModelChoice, PaletteApi, Pipeline, PipelineOpts, RunOutcome, SynthesisMode,
};

#[derive(Parser, Debug)]
#[command(name = "colorrun", version, about = "Endless palette gradient video")]
struct Cli {
    #[command(flatten)]
    common: CommonArgs,

    #[command(flatten)]
    stream: StreamArgs,

    /// Defaults to `stream`.
    #[command(subcommand)]
    cmd: Option<Command>,
}

#[derive(Args, Debug, Clone)]
struct CommonArgs {
    /// Frame width in pixels.
    #[arg(short = 'w', long, env = "COLORRUN_IMAGEWIDTH", default_value_t = 1280, global = true)]
    width: u32,

    /// Frame height in pixels.
    #[arg(short = 'H', long, env = "COLORRUN_IMAGEHEIGHT", default_value_t = 720, global = true)]
    height: u32,

    /// Frames per color transition.
    #[arg(short = 'f', long, env = "COLORRUN_FRAMECOUNT", default_value_t = 90, global = true)]
    frames: usize,

    /// Pick a random palette model instead of `--model`.
    #[arg(short = 'r', long, env = "COLORRUN_RANDOMMODEL", global = true)]
    random_model: bool,

    /// Palette model name.
    #[arg(long, default_value = DEFAULT_MODEL, global = true)]
    model: String,

    /// How a color transition is drawn.
    #[arg(long, value_enum, default_value_t = ModeChoice::Fill, global = true)]
    mode: ModeChoice,

    /// Palette API base URL.
    #[arg(long, default_value = DEFAULT_BASE_URL, global = true)]
    api_url: String,

    /// Log filter, e.g. `info` or `colorrun=debug,ffmpeg=warn`.
    #[arg(long, env = "COLORRUN_LOGLEVEL", default_value = "info", global = true)]
    log_level: String,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Stream the gradient video through ffmpeg (requires `ffmpeg` on PATH).
    Stream,
    /// Write a fixed number of encoded frames to a directory.
    Frames(FramesArgs),
    /// Fetch one palette and write it as a reference gradient PNG.
    Palette(PaletteArgs),
    /// List the palette models the API offers.
    Models,
}

#[derive(Args, Debug)]
struct StreamArgs {
    /// Stream key; the ingest server is looked up from the ingest directory.
    #[arg(short = 'k', long, env = "COLORRUN_STREAMKEY", global = true)]
    stream_key: Option<String>,

    /// Write `out.flv` into this directory instead of streaming.
    #[arg(short = 'd', long, env = "COLORRUN_DUMPDIR", global = true)]
    dump_dir: Option<PathBuf>,

    /// Output frame rate.
    #[arg(long, default_value_t = 30, global = true)]
    fps: u32,
}

#[derive(Args, Debug)]
struct FramesArgs {
    /// Output directory.
    #[arg(long)]
    out: PathBuf,

    /// Number of frames to write.
    #[arg(long, default_value_t = 90)]
    count: usize,

    #[arg(long, value_enum, default_value_t = FormatChoice::Png)]
    format: FormatChoice,
}

#[derive(Args, Debug)]
struct PaletteArgs {
    /// Output PNG path.
    #[arg(long)]
    out: PathBuf,

    /// Width of one color segment.
    #[arg(long, default_value_t = 256)]
    segment_width: u32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum ModeChoice {
    Fill,
    Sliding,
}

impl From<ModeChoice> for SynthesisMode {
    fn from(m: ModeChoice) -> Self {
        match m {
            ModeChoice::Fill => SynthesisMode::Fill,
            ModeChoice::Sliding => SynthesisMode::Sliding,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum FormatChoice {
    Png,
    Jpeg,
    Raw,
}

impl FormatChoice {
    fn encoder(self) -> Box<dyn FrameEncoder> {
        match self {
            Self::Png => Box::new(PngEncoder),
            Self::Jpeg => Box::new(JpegEncoder::default()),
            Self::Raw => Box::new(RawRgbaEncoder),
        }
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(&cli.common.log_level)?;
    let api: Arc<dyn PaletteApi> = Arc::new(ColormindClient::new(cli.common.api_url.clone()));
    match cli.cmd {
        None | Some(Command::Stream) => cmd_stream(&cli.common, cli.stream, api),
        Some(Command::Frames(args)) => cmd_frames(&cli.common, args, api),
        Some(Command::Palette(args)) => cmd_palette(&cli.common, args, api.as_ref()),
        Some(Command::Models) => cmd_models(api.as_ref()),
    }
}

fn init_logging(filter: &str) -> anyhow::Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_new(filter)
        .with_context(|| format!("invalid log filter '{filter}'"))?;
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
    Ok(())
}

fn pipeline_opts(common: &CommonArgs) -> anyhow::Result<PipelineOpts> {
    let model = if common.random_model {
        ModelChoice::Random
    } else {
        ModelChoice::Fixed(common.model.clone())
    };
    Ok(PipelineOpts {
        canvas: Canvas::new(common.width, common.height)?,
        transition_frames: common.frames,
        mode: common.mode.into(),
        model,
        ..Default::default()
    })
}

fn cancel_on_signal(cancel: CancelToken) -> anyhow::Result<()> {
    ctrlc::set_handler(move || {
        tracing::info!("termination requested");
        cancel.cancel();
    })
    .context("install signal handler")
}

fn cmd_stream(
    common: &CommonArgs,
    args: StreamArgs,
    api: Arc<dyn PaletteApi>,
) -> anyhow::Result<()> {
    let opts = pipeline_opts(common)?;
    let destination = match (&args.dump_dir, &args.stream_key) {
        (Some(dir), _) => dir.join("out.flv").display().to_string(),
        (None, Some(key)) => IngestDirectory::default()
            .ingest_url(key)
            .context("look up ingest server")?,
        (None, None) => anyhow::bail!("either --stream-key or --dump-dir is required"),
    };
    let ffmpeg = FfmpegOpts {
        fps: args.fps,
        ..FfmpegOpts::new(opts.canvas, destination)
    };
    ffmpeg.validate()?;

    let mut pipeline = Pipeline::start(api, opts)?;
    cancel_on_signal(pipeline.cancel_token())?;
    let stream = pipeline
        .take_stream()
        .context("frame stream already taken")?;
    let streamer =
        FfmpegStreamer::spawn(&ffmpeg, stream, pipeline.cancel_token(), pipeline.reporter())?;
    let key = args.stream_key.as_deref().unwrap_or_default();
    tracing::info!(
        destination = %redact_key(&ffmpeg.destination, key),
        model = pipeline.model(),
        "streaming"
    );

    let outcome = pipeline.run();
    pipeline.shutdown()?;
    streamer.join();
    match outcome {
        RunOutcome::Cancelled | RunOutcome::Done => Ok(()),
        RunOutcome::Fatal(err) => Err(anyhow::Error::new(err).context("stream stopped")),
    }
}

fn cmd_frames(
    common: &CommonArgs,
    args: FramesArgs,
    api: Arc<dyn PaletteApi>,
) -> anyhow::Result<()> {
    let opts = pipeline_opts(common)?;
    let capacity = opts.transition_frames;
    let mut pipeline = Pipeline::start(api, opts)?;
    cancel_on_signal(pipeline.cancel_token())?;
    let frames = pipeline
        .take_frames()
        .context("frame queue already taken")?;

    let (tx, rx) = colorrun::queue::bounded(capacity);
    let stage = EncodeStage::new(args.format.encoder(), pipeline.reporter());
    let cancel = pipeline.cancel_token();
    let encoder = std::thread::Builder::new()
        .name("colorrun-encode".to_string())
        .spawn(move || stage.run(cancel, frames, tx))
        .context("spawn encode thread")?;

    let out = args.out.clone();
    let count = args.count;
    let writer = std::thread::Builder::new()
        .name("colorrun-write".to_string())
        .spawn(move || encode::write_frames(&out, rx, Some(count)))
        .context("spawn frame writer thread")?;

    // Palette and encode errors are logged here while the writer works.
    let outcome = pipeline.run_until(|| writer.is_finished());
    pipeline.shutdown()?;
    join_stage(encoder, "encode")?;
    let written = join_stage(writer, "frame writer")??;
    if let RunOutcome::Fatal(err) = outcome {
        return Err(anyhow::Error::new(err).context("frame dump stopped"));
    }

    eprintln!("wrote {} frames to {}", written.len(), args.out.display());
    Ok(())
}

fn join_stage<T>(handle: std::thread::JoinHandle<T>, name: &str) -> anyhow::Result<T> {
    handle
        .join()
        .map_err(|_| anyhow::anyhow!("{name} thread panicked"))
}

fn cmd_palette(
    common: &CommonArgs,
    args: PaletteArgs,
    api: &dyn PaletteApi,
) -> anyhow::Result<()> {
    let model = pipeline_opts(common)?.model.resolve(api)?;
    let palette = api
        .fetch_palette(&model, None)
        .with_context(|| format!("fetch palette (model '{model}')"))?;
    for c in palette.colors() {
        println!("#{:02x}{:02x}{:02x}", c.r, c.g, c.b);
    }
    colorrun::reference::write_strip_png(
        &args.out,
        palette.colors(),
        args.segment_width,
        common.height,
    )?;
    eprintln!("wrote {}", args.out.display());
    Ok(())
}

fn cmd_models(api: &dyn PaletteApi) -> anyhow::Result<()> {
    let models = api.list_models().context("list palette models")?;
    for m in models {
        println!("{m}");
    }
    Ok(())
}
