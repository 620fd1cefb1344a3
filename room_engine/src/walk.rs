use std::fs;
use std::path::Path;

use anyhow::{ensure, Context, Result};
use glam::{Vec2, Vec3};
use serde::{Deserialize, Serialize};

use crate::controller::{ControllerEvent, FrameInput, FrameReport, RoomController};
use crate::movement::{joystick_from_drag, MoveKeys};

/// One scripted action. Frame-holding steps tick the controller; the rest
/// are applied between frames.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum WalkStep {
    Start,
    ContinueTutorial,
    Hold {
        frames: u32,
        #[serde(default)]
        keys: MoveKeys,
        #[serde(default)]
        joystick: [f32; 2],
    },
    Look {
        frames: u32,
        delta: [f32; 2],
    },
    /// Touch joystick held at `offset` pixels from its centre.
    Drag {
        frames: u32,
        offset: [f32; 2],
    },
    Face {
        target: [f32; 3],
    },
    Click,
    TogglePopups,
    Idle {
        frames: u32,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WalkPlan {
    pub steps: Vec<WalkStep>,
}

impl WalkPlan {
    /// Start the scene, walk deep into the dark half, take the rooftop
    /// detour and come back to finish on the light half.
    pub fn demo() -> Self {
        let forward = MoveKeys::FORWARD;
        Self {
            steps: vec![
                WalkStep::Start,
                WalkStep::ContinueTutorial,
                WalkStep::Face {
                    target: [-30.0, 1.6, 0.0],
                },
                WalkStep::Hold {
                    frames: 240,
                    keys: forward,
                    joystick: [0.0, 0.0],
                },
                WalkStep::Idle { frames: 600 },
                WalkStep::Face {
                    target: [-19.0, 3.0, 0.0],
                },
                WalkStep::Click,
                WalkStep::Idle { frames: 90 },
                WalkStep::Face {
                    target: [0.0, 102.0, 10.0],
                },
                WalkStep::Click,
                WalkStep::Idle { frames: 60 },
                WalkStep::Face {
                    target: [30.0, 1.6, 0.0],
                },
                WalkStep::Hold {
                    frames: 240,
                    keys: forward,
                    joystick: [0.0, 0.0],
                },
                WalkStep::Idle { frames: 180 },
            ],
        }
    }

    pub fn from_json_file(path: &Path) -> Result<Self> {
        let data = fs::read_to_string(path)
            .with_context(|| format!("reading walk script {}", path.display()))?;
        let plan: WalkPlan = serde_json::from_str(&data)
            .with_context(|| format!("parsing walk script {}", path.display()))?;
        ensure!(
            !plan.steps.is_empty(),
            "walk script {} has no steps",
            path.display()
        );
        Ok(plan)
    }

    pub fn total_frames(&self) -> u32 {
        self.steps
            .iter()
            .map(|step| match step {
                WalkStep::Hold { frames, .. }
                | WalkStep::Look { frames, .. }
                | WalkStep::Drag { frames, .. }
                | WalkStep::Idle { frames } => *frames,
                _ => 0,
            })
            .sum()
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct WalkSummary {
    pub frames: u32,
    pub popups_shown: usize,
    pub scene_switches: usize,
}

/// Plays `plan` against `controller` at a fixed frame rate, handing every
/// frame report to `on_frame`.
pub fn run_walk<F>(
    controller: &mut RoomController,
    plan: &WalkPlan,
    fps: u32,
    mut on_frame: F,
) -> Result<WalkSummary>
where
    F: FnMut(&FrameReport) -> Result<()>,
{
    ensure!(fps > 0, "frame rate must be positive");
    let dt = 1.0 / fps as f32;
    let mut summary = WalkSummary::default();

    let mut tick = |controller: &mut RoomController, input: FrameInput| -> Result<()> {
        let report = controller.tick(input);
        summary.frames += 1;
        for label in &report.events {
            if label.starts_with("popup.show ") {
                summary.popups_shown += 1;
            } else if label.starts_with("scene.switch ") {
                summary.scene_switches += 1;
            }
        }
        on_frame(&report)
    };

    for step in &plan.steps {
        match step {
            WalkStep::Start => controller.handle(ControllerEvent::Start),
            WalkStep::ContinueTutorial => controller.handle(ControllerEvent::ContinueTutorial),
            WalkStep::Click => controller.handle(ControllerEvent::Click),
            WalkStep::TogglePopups => controller.handle(ControllerEvent::TogglePopups),
            WalkStep::Face { target } => controller.face(Vec3::from_array(*target)),
            WalkStep::Hold {
                frames,
                keys,
                joystick,
            } => {
                let input = FrameInput {
                    dt,
                    keys: *keys,
                    joystick: Vec2::from_array(*joystick),
                    ..FrameInput::default()
                };
                for _ in 0..*frames {
                    tick(controller, input)?;
                }
            }
            WalkStep::Look { frames, delta } => {
                let input = FrameInput {
                    dt,
                    look_delta: Vec2::from_array(*delta),
                    ..FrameInput::default()
                };
                for _ in 0..*frames {
                    tick(controller, input)?;
                }
            }
            WalkStep::Drag { frames, offset } => {
                let input = FrameInput {
                    dt,
                    joystick: joystick_from_drag(Vec2::from_array(*offset)),
                    ..FrameInput::default()
                };
                for _ in 0..*frames {
                    tick(controller, input)?;
                }
            }
            WalkStep::Idle { frames } => {
                for _ in 0..*frames {
                    tick(controller, FrameInput::idle(dt))?;
                }
            }
        }
    }

    Ok(summary)
}

#[cfg(test)]
mod tests {
    use std::rc::Rc;

    use room_formats::PopupCatalog;

    use super::*;
    use crate::audio::RecordingAudioSink;
    use crate::config::RoomConfig;
    use crate::popups::RecordingPopupSurface;
    use crate::scenes::SceneMode;

    #[test]
    fn script_steps_parse_from_json() {
        let plan: WalkPlan = serde_json::from_str(
            r#"{ "steps": [
                { "action": "start" },
                { "action": "continue_tutorial" },
                { "action": "hold", "frames": 30, "keys": { "left": true } },
                { "action": "look", "frames": 2, "delta": [10.0, 0.0] },
                { "action": "face", "target": [1.0, 2.0, 3.0] },
                { "action": "toggle_popups" },
                { "action": "idle", "frames": 5 }
            ] }"#,
        )
        .expect("walk script");
        assert_eq!(plan.steps.len(), 7);
        assert_eq!(plan.total_frames(), 37);
        assert_eq!(
            plan.steps[2],
            WalkStep::Hold {
                frames: 30,
                keys: MoveKeys {
                    left: true,
                    ..MoveKeys::default()
                },
                joystick: [0.0, 0.0],
            }
        );
    }

    #[test]
    fn touch_drag_walks_like_the_forward_key() -> Result<()> {
        let mut controller = RoomController::new(
            RoomConfig::default(),
            PopupCatalog::fallback("tests"),
            Rc::new(RecordingPopupSurface::new()),
            Rc::new(RecordingAudioSink::new()),
        );
        let plan: WalkPlan = serde_json::from_str(
            r#"{ "steps": [
                { "action": "start" },
                { "action": "continue_tutorial" },
                { "action": "drag", "frames": 60, "offset": [0.0, -90.0] }
            ] }"#,
        )?;
        assert_eq!(plan.total_frames(), 60);

        let mut last_speed = 0.0;
        run_walk(&mut controller, &plan, 60, |report| {
            last_speed = report.speed;
            Ok(())
        })?;
        let position = controller.avatar().position;
        assert!(position.z < -2.0, "z {}", position.z);
        assert!(position.x.abs() < 1e-3);
        assert!(last_speed > 3.5);
        Ok(())
    }

    #[test]
    fn empty_script_is_rejected() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("walk.json");
        fs::write(&path, r#"{ "steps": [] }"#).expect("write script");
        assert!(WalkPlan::from_json_file(&path).is_err());
    }

    #[test]
    fn demo_walk_visits_both_scenes() -> Result<()> {
        let surface = RecordingPopupSurface::new();
        let mut controller = RoomController::new(
            RoomConfig::default(),
            PopupCatalog::fallback("tests"),
            Rc::new(surface.clone()),
            Rc::new(RecordingAudioSink::new()),
        );
        let plan = WalkPlan::demo();
        let mut scenes = Vec::new();
        let summary = run_walk(&mut controller, &plan, 60, |report| {
            if scenes.last() != Some(&report.scene) {
                scenes.push(report.scene);
            }
            Ok(())
        })?;

        assert_eq!(summary.frames, plan.total_frames());
        assert_eq!(
            scenes,
            vec![SceneMode::Main, SceneMode::Rooftop, SceneMode::Main]
        );
        assert_eq!(summary.scene_switches, 3);
        assert!(summary.popups_shown > 10);
        assert!(controller.avatar().position.x > 10.0);
        assert!(controller
            .popups()
            .active()
            .iter()
            .all(|popup| popup.style.side == crate::proximity::Side::Positive));
        Ok(())
    }
}
