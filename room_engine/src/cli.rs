use std::path::PathBuf;

use anyhow::{bail, Result};
use clap::Parser;

use crate::config::Viewport;

#[derive(Parser, Debug)]
#[command(
    about = "Headless host for the split-room scene controller",
    version
)]
pub struct Args {
    /// Path to the popup catalog text file
    #[arg(long, default_value = "popups.txt")]
    pub popups: PathBuf,

    /// Optional JSON preset overriding room, popup and audio tunables
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Play the built-in walk through both scenes
    #[arg(long)]
    pub walk_demo: bool,

    /// Play a walk script (JSON list of steps) instead of the demo
    #[arg(long)]
    pub walk_script: Option<PathBuf>,

    /// Simulated frames per second
    #[arg(long, default_value_t = 60)]
    pub fps: u32,

    /// Seed for popup placement and decorations (overrides the preset)
    #[arg(long)]
    pub seed: Option<u64>,

    /// Use the stacked popup layout of touch devices
    #[arg(long)]
    pub compact: bool,

    /// Screen size used for popup layout, as WIDTHxHEIGHT
    #[arg(long, value_name = "WxH")]
    pub viewport: Option<String>,

    /// Path to write the controller event log as JSON (requires a walk)
    #[arg(long)]
    pub event_log_json: Option<PathBuf>,

    /// Path to write the audio gain log as JSON (requires a walk)
    #[arg(long)]
    pub audio_log_json: Option<PathBuf>,

    /// Path to write per-frame reports as JSON (requires a walk)
    #[arg(long)]
    pub frame_log_json: Option<PathBuf>,
}

#[derive(Debug)]
pub enum Command {
    Walk(WalkArgs),
    Inspect(InspectArgs),
}

#[derive(Debug)]
pub struct Overrides {
    pub seed: Option<u64>,
    pub compact: bool,
    pub viewport: Option<Viewport>,
}

#[derive(Debug)]
pub struct WalkArgs {
    pub popups: PathBuf,
    pub config: Option<PathBuf>,
    pub overrides: Overrides,
    pub walk_script: Option<PathBuf>,
    pub fps: u32,
    pub event_log_json: Option<PathBuf>,
    pub audio_log_json: Option<PathBuf>,
    pub frame_log_json: Option<PathBuf>,
}

#[derive(Debug)]
pub struct InspectArgs {
    pub popups: PathBuf,
    pub config: Option<PathBuf>,
    pub overrides: Overrides,
}

pub fn parse() -> Result<Command> {
    let args = Args::parse();
    args.into_command()
}

impl Args {
    pub fn into_command(self) -> Result<Command> {
        if self.walk_demo && self.walk_script.is_some() {
            bail!("--walk-demo cannot be combined with --walk-script");
        }
        if self.fps == 0 {
            bail!("--fps must be at least 1");
        }
        let viewport = match self.viewport.as_deref() {
            Some(value) => Some(Viewport::parse(value)?),
            None => None,
        };
        let overrides = Overrides {
            seed: self.seed,
            compact: self.compact,
            viewport,
        };

        let walking = self.walk_demo || self.walk_script.is_some();
        if !walking {
            for (flag, set) in [
                ("--event-log-json", self.event_log_json.is_some()),
                ("--audio-log-json", self.audio_log_json.is_some()),
                ("--frame-log-json", self.frame_log_json.is_some()),
            ] {
                if set {
                    bail!("{flag} requires --walk-demo or --walk-script");
                }
            }
            return Ok(Command::Inspect(InspectArgs {
                popups: self.popups,
                config: self.config,
                overrides,
            }));
        }

        Ok(Command::Walk(WalkArgs {
            popups: self.popups,
            config: self.config,
            overrides,
            walk_script: self.walk_script,
            fps: self.fps,
            event_log_json: self.event_log_json,
            audio_log_json: self.audio_log_json,
            frame_log_json: self.frame_log_json,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_from(args: &[&str]) -> Result<Command> {
        let mut argv = vec!["room_engine"];
        argv.extend_from_slice(args);
        Args::try_parse_from(argv)?.into_command()
    }

    #[test]
    fn plain_invocation_inspects() {
        assert!(matches!(parse_from(&[]), Ok(Command::Inspect(_))));
    }

    #[test]
    fn walk_flags_build_a_walk() {
        let command = parse_from(&[
            "--walk-demo",
            "--viewport",
            "390x844",
            "--compact",
            "--event-log-json",
            "events.json",
        ])
        .expect("walk command");
        let Command::Walk(walk) = command else {
            panic!("expected walk command");
        };
        assert!(walk.overrides.compact);
        assert_eq!(walk.overrides.viewport.map(|v| v.width), Some(390));
        assert!(walk.walk_script.is_none());
    }

    #[test]
    fn conflicting_flags_are_rejected() {
        assert!(parse_from(&["--walk-demo", "--walk-script", "walk.json"]).is_err());
        assert!(parse_from(&["--audio-log-json", "audio.json"]).is_err());
        assert!(parse_from(&["--walk-demo", "--fps", "0"]).is_err());
        assert!(parse_from(&["--walk-demo", "--viewport", "big"]).is_err());
        assert!(parse_from(&["--walk-demo", "--stream-bind", "127.0.0.1:0"]).is_err());
    }
}
