use std::time::Duration;

use glam::Vec3;
use serde::Serialize;

use crate::config::{RoomDimensions, SceneConfig};
use crate::movement::Bounds;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SceneMode {
    Home,
    Main,
    Rooftop,
}

impl SceneMode {
    pub fn label(&self) -> &'static str {
        match self {
            SceneMode::Home => "home",
            SceneMode::Main => "main",
            SceneMode::Rooftop => "rooftop",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HomeStage {
    Title,
    Tutorial,
}

/// Clickable box in the world that sends the player to `destination`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InteractionTarget {
    pub name: &'static str,
    pub scene: SceneMode,
    pub center: Vec3,
    pub half_extents: Vec3,
    pub destination: SceneMode,
}

impl InteractionTarget {
    /// Distance along the ray to the box, if the ray hits it.
    pub fn hit_distance(&self, origin: Vec3, direction: Vec3) -> Option<f32> {
        let min = self.center - self.half_extents;
        let max = self.center + self.half_extents;
        let mut near = f32::NEG_INFINITY;
        let mut far = f32::INFINITY;

        for axis in 0..3 {
            let o = origin[axis];
            let d = direction[axis];
            if d.abs() < f32::EPSILON {
                if o < min[axis] || o > max[axis] {
                    return None;
                }
                continue;
            }
            let t1 = (min[axis] - o) / d;
            let t2 = (max[axis] - o) / d;
            near = near.max(t1.min(t2));
            far = far.min(t1.max(t2));
            if near > far {
                return None;
            }
        }

        if far < 0.0 {
            None
        } else {
            Some(near.max(0.0))
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Spawn {
    pub position: Vec3,
    pub bounds: Bounds,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SceneEvent {
    StartPressed,
    TutorialContinued,
    Interact { eye: Vec3, aim: Vec3 },
}

/// A scene change that has been triggered but whose camera rebind has not
/// happened yet.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Transition {
    pub from: SceneMode,
    pub to: SceneMode,
    #[serde(with = "crate::scheduler::millis")]
    pub settle_at: Duration,
}

/// What `handle` did with an event.
#[derive(Debug, Clone, PartialEq)]
pub enum SceneSignal {
    TutorialShown,
    Began(Transition),
    Ignored(IgnoreReason),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoreReason {
    /// Home screen input that does not advance the title/tutorial flow.
    HomeFlow,
    /// Home screen events arriving after the scene has started.
    AlreadyStarted,
    TransitionPending,
    NoTarget,
}

/// Home → Main ↔ Rooftop state machine. The mode flips as soon as a
/// trigger lands; the spawn is applied once the settle delay has passed.
pub struct SceneSwitcher {
    mode: SceneMode,
    stage: HomeStage,
    pending: Option<Transition>,
    settle: Duration,
    reach: f32,
    targets: Vec<InteractionTarget>,
    main_spawn: Spawn,
    rooftop_spawn: Spawn,
}

impl SceneSwitcher {
    pub fn new(room: &RoomDimensions, scenes: &SceneConfig) -> Self {
        let main_bounds = Bounds::rect(
            room.half_width() - room.wall_margin,
            room.half_depth() - room.wall_margin,
            room.eye_height,
        );
        let rooftop_bounds = Bounds::square(scenes.rooftop_half_extent, scenes.rooftop_eye_height);
        Self {
            mode: SceneMode::Home,
            stage: HomeStage::Title,
            pending: None,
            settle: Duration::from_millis(scenes.settle_ms),
            reach: scenes.interaction_reach,
            targets: vec![
                InteractionTarget {
                    name: "take_me_back",
                    scene: SceneMode::Main,
                    center: Vec3::new(-(room.half_width() - 1.0), 3.0, 0.0),
                    half_extents: Vec3::new(0.15, 0.5, 1.0),
                    destination: SceneMode::Rooftop,
                },
                InteractionTarget {
                    name: "return_to_present",
                    scene: SceneMode::Rooftop,
                    center: Vec3::new(0.0, scenes.rooftop_eye_height + 0.4, 10.0),
                    half_extents: Vec3::new(1.5, 0.5, 0.15),
                    destination: SceneMode::Main,
                },
            ],
            main_spawn: Spawn {
                position: Vec3::new(0.0, room.eye_height, 0.0),
                bounds: main_bounds,
            },
            rooftop_spawn: Spawn {
                position: Vec3::new(0.0, scenes.rooftop_eye_height, 5.0),
                bounds: rooftop_bounds,
            },
        }
    }

    pub fn mode(&self) -> SceneMode {
        self.mode
    }

    #[cfg(test)]
    pub fn stage(&self) -> HomeStage {
        self.stage
    }

    pub fn pending(&self) -> Option<Transition> {
        self.pending
    }

    pub fn targets(&self) -> &[InteractionTarget] {
        &self.targets
    }

    pub fn spawn(&self, mode: SceneMode) -> Spawn {
        match mode {
            SceneMode::Rooftop => self.rooftop_spawn,
            _ => self.main_spawn,
        }
    }

    pub fn handle(&mut self, event: SceneEvent, now: Duration) -> SceneSignal {
        match (self.mode, event) {
            (SceneMode::Home, SceneEvent::StartPressed) if self.stage == HomeStage::Title => {
                self.stage = HomeStage::Tutorial;
                SceneSignal::TutorialShown
            }
            (SceneMode::Home, SceneEvent::TutorialContinued)
                if self.stage == HomeStage::Tutorial =>
            {
                self.begin(SceneMode::Main, now, Duration::ZERO)
            }
            (SceneMode::Home, _) => SceneSignal::Ignored(IgnoreReason::HomeFlow),
            (_, SceneEvent::Interact { eye, aim }) => {
                if self.pending.is_some() {
                    log::debug!("interaction ignored while a scene transition is pending");
                    return SceneSignal::Ignored(IgnoreReason::TransitionPending);
                }
                match self.pick(eye, aim) {
                    Some(destination) => self.begin(destination, now, self.settle),
                    None => SceneSignal::Ignored(IgnoreReason::NoTarget),
                }
            }
            (_, _) => SceneSignal::Ignored(IgnoreReason::AlreadyStarted),
        }
    }

    /// Completes a pending transition once its settle delay has elapsed,
    /// returning the spawn the avatar should be moved to.
    pub fn poll(&mut self, now: Duration) -> Option<(Transition, Spawn)> {
        let transition = self.pending?;
        if now < transition.settle_at {
            return None;
        }
        self.pending = None;
        Some((transition, self.spawn(transition.to)))
    }

    fn pick(&self, eye: Vec3, aim: Vec3) -> Option<SceneMode> {
        let aim = aim.normalize_or_zero();
        if aim == Vec3::ZERO {
            return None;
        }
        self.targets
            .iter()
            .filter(|target| target.scene == self.mode)
            .filter_map(|target| {
                target
                    .hit_distance(eye, aim)
                    .filter(|distance| *distance <= self.reach)
                    .map(|distance| (distance, target))
            })
            .min_by(|a, b| a.0.total_cmp(&b.0))
            .map(|(_, target)| {
                log::info!("interaction hit {}", target.name);
                target.destination
            })
    }

    fn begin(&mut self, to: SceneMode, now: Duration, settle: Duration) -> SceneSignal {
        let transition = Transition {
            from: self.mode,
            to,
            settle_at: now.saturating_add(settle),
        };
        log::info!("scene switch {} -> {}", transition.from.label(), to.label());
        self.mode = to;
        self.pending = Some(transition);
        SceneSignal::Began(transition)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn switcher() -> SceneSwitcher {
        SceneSwitcher::new(&RoomDimensions::default(), &SceneConfig::default())
    }

    fn ms(value: u64) -> Duration {
        Duration::from_millis(value)
    }

    fn enter_main(scenes: &mut SceneSwitcher) {
        assert_eq!(
            scenes.handle(SceneEvent::StartPressed, ms(0)),
            SceneSignal::TutorialShown
        );
        assert!(matches!(
            scenes.handle(SceneEvent::TutorialContinued, ms(0)),
            SceneSignal::Began(_)
        ));
        assert!(scenes.poll(ms(0)).is_some());
    }

    #[test]
    fn ray_box_hits_and_misses() {
        let scenes = switcher();
        let target = &scenes.targets()[0];
        let eye = Vec3::new(-14.0, 1.6, 0.0);
        let aim = (target.center - eye).normalize();
        let distance = target.hit_distance(eye, aim).expect("hit");
        assert!(distance > 4.5 && distance < 5.2);

        assert!(target.hit_distance(eye, Vec3::new(1.0, 0.0, 0.0)).is_none());
        assert!(target.hit_distance(eye, Vec3::new(-1.0, 0.0, 0.0)).is_none());
    }

    #[test]
    fn home_requires_start_then_continue() {
        let mut scenes = switcher();
        assert!(matches!(
            scenes.handle(SceneEvent::TutorialContinued, ms(0)),
            SceneSignal::Ignored(_)
        ));
        enter_main(&mut scenes);
        assert_eq!(scenes.mode(), SceneMode::Main);
        assert!(scenes.pending().is_none());
    }

    #[test]
    fn button_round_trip_with_settle_delay() {
        let mut scenes = switcher();
        enter_main(&mut scenes);

        let eye = Vec3::new(-15.0, 1.6, 0.0);
        let aim = Vec3::new(-19.0, 3.0, 0.0) - eye;
        let signal = scenes.handle(SceneEvent::Interact { eye, aim }, ms(1000));
        assert!(matches!(
            signal,
            SceneSignal::Began(Transition {
                from: SceneMode::Main,
                to: SceneMode::Rooftop,
                ..
            })
        ));
        assert_eq!(scenes.mode(), SceneMode::Rooftop);
        assert!(scenes.poll(ms(1099)).is_none());
        let (_, spawn) = scenes.poll(ms(1100)).expect("settled");
        assert_eq!(spawn.position, Vec3::new(0.0, 101.6, 5.0));

        let eye = spawn.position;
        let aim = Vec3::new(0.0, 102.0, 10.0) - eye;
        scenes.handle(SceneEvent::Interact { eye, aim }, ms(2000));
        assert_eq!(scenes.mode(), SceneMode::Main);
        let (transition, spawn) = scenes.poll(ms(2100)).expect("settled");
        assert_eq!(transition.from, SceneMode::Rooftop);
        assert_eq!(spawn.position, Vec3::new(0.0, 1.6, 0.0));
    }

    #[test]
    fn triggers_are_ignored_while_pending() {
        let mut scenes = switcher();
        enter_main(&mut scenes);

        let eye = Vec3::new(-15.0, 1.6, 0.0);
        let aim = Vec3::new(-19.0, 3.0, 0.0) - eye;
        scenes.handle(SceneEvent::Interact { eye, aim }, ms(1000));

        let roof_eye = Vec3::new(0.0, 101.6, 5.0);
        let roof_aim = Vec3::new(0.0, 102.0, 10.0) - roof_eye;
        assert_eq!(
            scenes.handle(
                SceneEvent::Interact {
                    eye: roof_eye,
                    aim: roof_aim
                },
                ms(1050)
            ),
            SceneSignal::Ignored(IgnoreReason::TransitionPending)
        );
        assert_eq!(scenes.mode(), SceneMode::Rooftop);
    }

    #[test]
    fn out_of_reach_and_wrong_scene_targets_do_not_fire() {
        let mut scenes = switcher();
        enter_main(&mut scenes);

        let eye = Vec3::new(19.0, 1.6, 0.0);
        let aim = Vec3::new(-19.0, 3.0, 0.0) - eye;
        assert_eq!(
            scenes.handle(SceneEvent::Interact { eye, aim }, ms(0)),
            SceneSignal::Ignored(IgnoreReason::NoTarget)
        );

        let eye = Vec3::new(0.0, 1.6, 5.0);
        let aim = Vec3::new(0.0, 102.0, 10.0) - eye;
        assert_eq!(
            scenes.handle(SceneEvent::Interact { eye, aim }, ms(0)),
            SceneSignal::Ignored(IgnoreReason::NoTarget)
        );
    }

    #[test]
    fn settle_deadline_saturates_instead_of_overflowing() {
        let config = SceneConfig {
            settle_ms: u64::MAX,
            ..SceneConfig::default()
        };
        let mut scenes = SceneSwitcher::new(&RoomDimensions::default(), &config);
        enter_main(&mut scenes);
        assert_eq!(
            scenes.handle(SceneEvent::StartPressed, ms(0)),
            SceneSignal::Ignored(IgnoreReason::AlreadyStarted)
        );

        let eye = Vec3::new(-15.0, 1.6, 0.0);
        let aim = Vec3::new(-19.0, 3.0, 0.0) - eye;
        let late = Duration::MAX - ms(5);
        let SceneSignal::Began(transition) = scenes.handle(SceneEvent::Interact { eye, aim }, late)
        else {
            panic!("expected a transition");
        };
        assert_eq!(transition.settle_at, Duration::MAX);
        assert!(scenes.poll(late).is_none());
        assert!(scenes.poll(Duration::MAX).is_some());
    }
}
