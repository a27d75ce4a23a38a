use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use piano_waterfall_core::{
    keyboard::{calculate_keyboard_scale, key_position, BASE_PIANO_WIDTH},
    score::midi_from_name,
    timeline::{seconds_to_ticks, ticks_to_seconds},
    waterfall::{bottom_percent, proximity},
    AppConfig, ClockEngine, MemoryStore, Result, Score, Session, SyncSnapshot, Theme, Tick,
    Timeline, WaterfallIndex,
};
use tracing_subscriber::EnvFilter;

/// Seconds of score shown above the impact line by `inspect --at`.
const WATERFALL_WINDOW_SECS: f64 = 3.0;

fn main() -> Result<()> {
    init_tracing();

    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => AppConfig::load(path)?,
        None => AppConfig::default(),
    };

    match cli.command {
        Commands::Inspect { score, at, width } => run_inspect(&score, at, width),
        Commands::Simulate(args) => run_simulate(config, args),
        Commands::Render(args) => run_render(config, args),
    }
}

fn run_inspect(path: &PathBuf, at: Option<Tick>, width: f32) -> Result<()> {
    let score = Score::from_path(path)?;
    let timeline = Timeline::build(&score);
    let end = timeline.end_tick();
    let duration = ticks_to_seconds(end, timeline.ppq(), timeline.bpm());

    println!("title:    {}", if score.title.is_empty() { "-" } else { score.title.as_str() });
    println!("notes:    {}", score.notes.len());
    println!("tracks:   {}", score.track_count());
    println!("ppq:      {}", timeline.ppq());
    println!("tempo:    {} bpm", timeline.bpm());
    println!("end tick: {end}");
    println!("duration: {}", piano_waterfall_core::format_time(duration));
    println!("keyboard: scale {:.2} at {width}px", calculate_keyboard_scale(width, BASE_PIANO_WIDTH));

    let Some(tick) = at else {
        return Ok(());
    };

    let window = seconds_to_ticks(WATERFALL_WINDOW_SECS, timeline.ppq(), timeline.bpm());
    println!();
    println!("at tick {tick}:");
    for note in timeline.active_at(tick).iter() {
        println!("  sounding {:>4} track {} since {}", note.pitch, note.track, note.start_tick);
    }
    for note in timeline.preview_window(tick, window / 6) {
        println!("  upcoming {:>4} track {} at {}", note.pitch, note.track, note.start_tick);
    }

    let index = WaterfallIndex::new(&score.notes);
    for note in index.visible_notes(tick, window) {
        let bottom = bottom_percent(note.start_tick, tick, window);
        let left = midi_from_name(&note.pitch).map(|midi| key_position(midi).left)?;
        println!(
            "  falling  {:>4} x {left:>6.0} bottom {bottom:>6.1}% proximity {:.2}",
            note.pitch,
            proximity(bottom.max(0.0) as f32, 100.0),
        );
    }
    Ok(())
}

fn run_simulate(config: AppConfig, args: SimulateArgs) -> Result<()> {
    let score = Score::from_path(&args.score)?;
    let fps = args.fps.max(1.0);
    let frames = (args.seconds.max(0.0) * fps).ceil() as u64;
    tracing::info!(score = ?args.score, fps, frames, rate = args.rate, "starting simulation");

    let mut session = new_session(config, args.width, args.height);
    session.subscribe({
        let mut last: Option<Vec<String>> = None;
        move |snapshot: &SyncSnapshot| {
            let pitches: Vec<String> = snapshot.active_notes.iter().map(|n| n.pitch.clone()).collect();
            if last.as_ref() != Some(&pitches) {
                tracing::info!(
                    tick = snapshot.tick,
                    time = %piano_waterfall_core::format_time(snapshot.time_secs),
                    active = ?pitches,
                    preview = snapshot.preview_notes.len(),
                    "active notes changed"
                );
                last = Some(pitches);
            }
        }
    });

    session.load_score(&score_id(&args.score), Ok(score));
    session.set_rate(args.rate)?;
    if let (Some(start), Some(end)) = (args.loop_start, args.loop_end) {
        session.set_loop(start, end);
        session.toggle_loop();
    }
    session.start();
    session.play()?;

    let step = 1.0 / fps;
    for frame in 0..frames {
        session.frame(frame as f64 * step * 1000.0);
        session.engine_mut().advance(step);
    }

    let state = session.transport().state();
    tracing::info!(tick = state.tick, particles = session.effects().particles().active_count(), "simulation finished");
    session.teardown();
    Ok(())
}

fn run_render(mut config: AppConfig, args: RenderArgs) -> Result<()> {
    let score = Score::from_path(&args.score)?;
    if let Some(theme) = args.theme {
        config.effects.theme = theme;
    }

    let mut session = new_session(config, args.width, args.height);
    session.load_score(&score_id(&args.score), Ok(score));
    session.start();
    let tick = session.capture(args.tick, args.frames, 1000.0 / 60.0)?;
    session.effects().canvas().save(&args.out)?;
    tracing::info!(tick, out = ?args.out, "frame written");
    session.teardown();
    Ok(())
}

fn new_session(config: AppConfig, width: u32, height: u32) -> Session<ClockEngine> {
    let mut session = Session::new(config, ClockEngine::new(), width, height)
        .with_store(Box::new(MemoryStore::new()));
    session.on_error(|err| tracing::error!(error = %err, "session error"));
    session.effects_mut().set_container_height(height as f32);
    session.effects_mut().set_impact_y(height as f32 - 4.0);
    session
}

fn score_id(path: &std::path::Path) -> String {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| "score".to_string())
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .try_init();
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Falling-note piano visualiser", long_about = None)]
struct Cli {
    /// JSON configuration file.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print a summary of a score.
    Inspect {
        score: PathBuf,
        /// Also list sounding, upcoming and falling notes at this tick.
        #[arg(long)]
        at: Option<Tick>,
        /// Window width used for the keyboard scale.
        #[arg(long, default_value_t = 1296.0)]
        width: f32,
    },
    /// Play a score headlessly and log note changes.
    Simulate(SimulateArgs),
    /// Render one effects frame to an image file (PNG by extension).
    Render(RenderArgs),
}

#[derive(Args, Debug)]
struct SimulateArgs {
    score: PathBuf,
    #[arg(long, default_value_t = 60.0)]
    fps: f64,
    #[arg(long, default_value_t = 1.0)]
    rate: f64,
    #[arg(long, default_value_t = 10.0)]
    seconds: f64,
    #[arg(long)]
    loop_start: Option<Tick>,
    #[arg(long)]
    loop_end: Option<Tick>,
    #[arg(long, default_value_t = 1296)]
    width: u32,
    #[arg(long, default_value_t = 400)]
    height: u32,
}

#[derive(Args, Debug)]
struct RenderArgs {
    score: PathBuf,
    #[arg(long)]
    tick: Tick,
    #[arg(long)]
    out: PathBuf,
    #[arg(long)]
    theme: Option<Theme>,
    #[arg(long, default_value_t = 1296)]
    width: u32,
    #[arg(long, default_value_t = 400)]
    height: u32,
    /// Frames to run at the held tick before capturing, so bursts have time
    /// to spread.
    #[arg(long, default_value_t = 1)]
    frames: u32,
}
