use std::{fs, path::Path, rc::Rc, time::Duration};

use anyhow::{Context, Result};
use glam::Vec3;
use room_formats::{Category, PopupCatalog};
use serde::Serialize;

use crate::audio::{AudioMixer, ChannelId, RecordingAudioSink};
use crate::cli::{Command, InspectArgs, Overrides, WalkArgs};
use crate::config::RoomConfig;
use crate::controller::{FrameReport, LoggedEvent, RoomController};
use crate::popups::RecordingPopupSurface;
use crate::proximity::{self, DEAD_ZONE};
use crate::scenes::{SceneMode, SceneSwitcher};
use crate::walk::{run_walk, WalkPlan};

pub fn execute(command: Command) -> Result<()> {
    match command {
        Command::Walk(args) => walk(args),
        Command::Inspect(args) => inspect(args),
    }
}

fn load_config(path: Option<&Path>, overrides: &Overrides) -> Result<RoomConfig> {
    let mut config = RoomConfig::from_json_file(path).context("loading room config")?;
    if let Some(seed) = overrides.seed {
        config.seed = seed;
    }
    if overrides.compact {
        config.compact = true;
    }
    if let Some(viewport) = overrides.viewport {
        config.viewport = viewport;
    }
    config.validate()?;
    Ok(config)
}

fn walk(args: WalkArgs) -> Result<()> {
    let WalkArgs {
        popups,
        config,
        overrides,
        walk_script,
        fps,
        event_log_json,
        audio_log_json,
        frame_log_json,
    } = args;

    let config = load_config(config.as_deref(), &overrides)?;
    let catalog = PopupCatalog::load(&popups);
    let plan = match walk_script.as_ref() {
        Some(path) => WalkPlan::from_json_file(path)?,
        None => WalkPlan::demo(),
    };
    log::info!(
        "walking {} steps ({} frames at {fps} fps)",
        plan.steps.len(),
        plan.total_frames()
    );

    let surface = RecordingPopupSurface::new();
    let sink = RecordingAudioSink::new();
    let mut controller = RoomController::new(
        config,
        catalog,
        Rc::new(surface.clone()),
        Rc::new(sink.clone()),
    );

    let mut frames: Vec<FrameReport> = Vec::new();
    let keep_frames = frame_log_json.is_some();
    sink.begin_frame(1);
    let summary = run_walk(&mut controller, &plan, fps, |report| {
        sink.begin_frame(report.frame + 1);
        if keep_frames {
            frames.push(report.clone());
        }
        Ok(())
    })?;

    println!(
        "Walked {} frames: {} popups shown, {} scene switches, ended in {} at x={:.2}",
        summary.frames,
        summary.popups_shown,
        summary.scene_switches,
        controller.scene().label(),
        controller.avatar().position.x
    );
    println!(
        "Popups on screen: {} (surface holds {}{})",
        controller.popups().active().len(),
        surface.live_count(),
        if surface.is_visible() { "" } else { ", hidden" }
    );

    if let Some(path) = event_log_json.as_ref() {
        let log = EventLog {
            catalog: controller.catalog().source.clone(),
            events: controller.events(),
        };
        write_json(path, &log, "controller event log")?;
    }

    if let Some(path) = audio_log_json.as_ref() {
        write_json(path, &sink.events(), "audio gain log")?;
    }

    if let Some(path) = frame_log_json.as_ref() {
        write_json(path, &frames, "frame log")?;
    }

    Ok(())
}

#[derive(Serialize)]
struct EventLog<'a> {
    catalog: room_formats::CatalogSource,
    events: &'a [LoggedEvent],
}

fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T, what: &str) -> Result<()> {
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent).with_context(|| format!("creating {}", parent.display()))?;
    }
    let json =
        serde_json::to_string_pretty(value).with_context(|| format!("serializing {what} to JSON"))?;
    fs::write(path, &json).with_context(|| format!("writing {what} to {}", path.display()))?;
    println!("Saved {what} to {}", path.display());
    Ok(())
}

fn inspect(args: InspectArgs) -> Result<()> {
    let config = load_config(args.config.as_deref(), &args.overrides)?;
    let catalog = PopupCatalog::load(&args.popups);

    match &catalog.source {
        room_formats::CatalogSource::File { path } => println!("Popup catalog: {path}"),
        room_formats::CatalogSource::Fallback { reason } => {
            println!("Popup catalog: built-in messages ({reason})")
        }
    }
    for category in [Category::Negative, Category::Positive] {
        println!(
            "  {:<8} {} messages",
            category.label(),
            catalog.messages(category).len()
        );
    }

    println!(
        "\nRoom {}x{} | viewport {}x{}{} | seed {:#x}",
        config.room.width,
        config.room.depth,
        config.viewport.width,
        config.viewport.height,
        if config.compact { " (compact)" } else { "" },
        config.seed
    );

    let sink = RecordingAudioSink::new();
    let mut mixer = AudioMixer::new(&config.audio, &config.room);
    let half = config.room.half_width() - config.room.wall_margin;
    let step = (half / 9.0).max(DEAD_ZONE);

    println!("\n  offset  side      tier  ceiling  fog     tension  ambient");
    let mut offset = -half;
    while offset <= half + f32::EPSILON {
        let zone = proximity::evaluate(offset, config.room.width);
        mixer.tick(
            Duration::ZERO,
            Vec3::new(offset, config.room.eye_height, 0.0),
            SceneMode::Main,
            &sink,
        );
        println!(
            "  {:>6.1}  {:<8}  {:<4}  {:>7}  {:<6}  {:>7.3}  {:>7.3}",
            offset,
            zone.side.map(|side| side.label()).unwrap_or("-"),
            zone.tier.label(),
            zone.tier.ceiling(),
            proximity::fog_density(&zone)
                .map(|fog| format!("{fog:.3}"))
                .unwrap_or_else(|| "-".to_string()),
            mixer.gain(ChannelId::Tension).unwrap_or(0.0),
            mixer.gain(ChannelId::Ambient).unwrap_or(0.0),
        );
        offset += step;
    }

    let scenes = SceneSwitcher::new(&config.room, &config.scenes);
    println!("\nInteraction targets (reach {:.1}):", config.scenes.interaction_reach);
    for target in scenes.targets() {
        println!(
            "  {:<20} in {:<8} at ({:.1}, {:.1}, {:.1}) -> {}",
            target.name,
            target.scene.label(),
            target.center.x,
            target.center.y,
            target.center.z,
            target.destination.label()
        );
    }

    Ok(())
}
