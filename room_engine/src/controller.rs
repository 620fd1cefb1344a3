use std::rc::Rc;
use std::time::Duration;

use glam::{Vec2, Vec3};
use room_formats::PopupCatalog;
use serde::Serialize;

use crate::audio::{AudioMixer, AudioSink, ChannelId};
use crate::config::RoomConfig;
use crate::decorations::{DecorationCounts, DecorationRegistry};
use crate::movement::{Avatar, MoveKeys};
use crate::popups::{PopupManager, PopupSurface};
use crate::proximity::{self, Proximity};
use crate::scenes::{IgnoreReason, SceneEvent, SceneMode, SceneSignal, SceneSwitcher, Transition};

/// Longest step a single frame may advance the simulation by; a stalled
/// host catches up in one bounded step.
const MAX_FRAME_DT: f32 = 1.0;

/// Discrete input delivered between frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ControllerEvent {
    Start,
    ContinueTutorial,
    TogglePopups,
    Click,
}

/// Continuous input sampled once per frame.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FrameInput {
    pub dt: f32,
    pub keys: MoveKeys,
    pub joystick: Vec2,
    pub look_delta: Vec2,
}

impl FrameInput {
    pub fn idle(dt: f32) -> Self {
        Self {
            dt,
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ChannelGain {
    pub channel: ChannelId,
    pub gain: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FrameReport {
    pub frame: u32,
    pub time_ms: u64,
    pub scene: SceneMode,
    pub position: [f32; 3],
    pub yaw: f32,
    pub speed: f32,
    pub proximity: Proximity,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fog_density: Option<f32>,
    pub gains: Vec<ChannelGain>,
    pub active_popups: usize,
    pub pending_popups: usize,
    pub popups_hidden: bool,
    pub decorations: DecorationCounts,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub events: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LoggedEvent {
    pub sequence: u32,
    pub frame: u32,
    pub label: String,
}

/// Single owner of the scene state: one tick per frame drives movement,
/// proximity, popups, audio and decorations.
pub struct RoomController {
    config: RoomConfig,
    catalog: PopupCatalog,
    scenes: SceneSwitcher,
    popups: PopupManager,
    audio: AudioMixer,
    avatar: Avatar,
    decorations: DecorationRegistry,
    surface: Rc<dyn PopupSurface>,
    sink: Rc<dyn AudioSink>,
    clock: Duration,
    frame: u32,
    log: Vec<LoggedEvent>,
    pending_labels: Vec<String>,
}

impl RoomController {
    pub fn new(
        config: RoomConfig,
        catalog: PopupCatalog,
        surface: Rc<dyn PopupSurface>,
        sink: Rc<dyn AudioSink>,
    ) -> Self {
        let scenes = SceneSwitcher::new(&config.room, &config.scenes);
        let spawn = scenes.spawn(SceneMode::Main);
        let popups = PopupManager::new(config.popups, config.viewport, config.compact, config.seed);
        let audio = AudioMixer::new(&config.audio, &config.room);
        let decorations = DecorationRegistry::populate(&config);
        if catalog.source.is_fallback() {
            log::info!("popup catalog uses built-in messages");
        }
        Self {
            scenes,
            popups,
            audio,
            avatar: Avatar::new(spawn.position, spawn.bounds),
            decorations,
            catalog,
            config,
            surface,
            sink,
            clock: Duration::ZERO,
            frame: 0,
            log: Vec::new(),
            pending_labels: Vec::new(),
        }
    }

    pub fn scene(&self) -> SceneMode {
        self.scenes.mode()
    }

    #[cfg(test)]
    pub fn home_stage(&self) -> crate::scenes::HomeStage {
        self.scenes.stage()
    }

    #[cfg(test)]
    pub fn transition_pending(&self) -> Option<Transition> {
        self.scenes.pending()
    }

    pub fn avatar(&self) -> &Avatar {
        &self.avatar
    }

    #[cfg(test)]
    pub fn avatar_mut(&mut self) -> &mut Avatar {
        &mut self.avatar
    }

    pub fn popups(&self) -> &PopupManager {
        &self.popups
    }

    pub fn catalog(&self) -> &PopupCatalog {
        &self.catalog
    }

    pub fn events(&self) -> &[LoggedEvent] {
        &self.log
    }

    /// Aims the avatar at a world point (scripted walks use this in place of
    /// mouse look).
    pub fn face(&mut self, target: Vec3) {
        self.avatar.face(target);
    }

    pub fn handle(&mut self, event: ControllerEvent) {
        match event {
            ControllerEvent::Start => self.route(SceneEvent::StartPressed),
            ControllerEvent::ContinueTutorial => self.route(SceneEvent::TutorialContinued),
            ControllerEvent::Click => {
                let eye = self.avatar.position;
                let aim = self.avatar.aim();
                self.route(SceneEvent::Interact { eye, aim });
            }
            ControllerEvent::TogglePopups => {
                if self.scenes.mode() == SceneMode::Home {
                    return;
                }
                self.popups.toggle_hidden(self.surface.as_ref());
                self.collect_popup_events();
            }
        }
    }

    fn route(&mut self, event: SceneEvent) {
        match self.scenes.handle(event, self.clock) {
            SceneSignal::TutorialShown => self.record("home.tutorial".to_string()),
            SceneSignal::Began(transition) => self.begin_transition(transition),
            SceneSignal::Ignored(IgnoreReason::TransitionPending) => {
                self.record("scene.trigger_ignored".to_string());
            }
            SceneSignal::Ignored(reason) => log::debug!("scene event ignored: {reason:?}"),
        }
    }

    fn begin_transition(&mut self, transition: Transition) {
        self.record(format!("scene.switch {}", transition.to.label()));
        self.popups.clear_all(self.surface.as_ref());
        self.collect_popup_events();
        self.audio
            .begin_transition(self.clock, transition.to, self.sink.as_ref());
        self.settle();
    }

    fn settle(&mut self) {
        if let Some((transition, spawn)) = self.scenes.poll(self.clock) {
            self.avatar.reset(spawn.position, spawn.bounds);
            self.record(format!("scene.settle {}", transition.to.label()));
        }
    }

    pub fn tick(&mut self, input: FrameInput) -> FrameReport {
        let dt = if input.dt.is_finite() {
            input.dt.clamp(0.0, MAX_FRAME_DT)
        } else {
            0.0
        };
        self.frame += 1;
        self.clock = self
            .clock
            .saturating_add(Duration::try_from_secs_f32(dt).unwrap_or(Duration::ZERO));
        self.settle();

        let mode = self.scenes.mode();
        let movable = self.scenes.pending().is_none();
        let mut proximity = Proximity::NEUTRAL;
        match mode {
            SceneMode::Home => {}
            SceneMode::Main => {
                if movable {
                    self.avatar.look(input.look_delta);
                    self.avatar.step(dt, input.keys, input.joystick);
                }
                self.decorations
                    .update_main(self.clock.as_secs_f32(), dt);
                proximity = proximity::evaluate(self.avatar.position.x, self.config.room.width);
                let surface = self.surface.as_ref();
                self.popups
                    .update(self.clock, &proximity, &self.catalog, surface);
                self.popups.pump(self.clock, surface);
            }
            SceneMode::Rooftop => {
                if movable {
                    self.avatar.look(input.look_delta);
                    self.avatar.step(dt, input.keys, input.joystick);
                }
                self.decorations.update_rooftop(dt);
            }
        }
        self.collect_popup_events();

        self.audio
            .tick(self.clock, self.avatar.position, mode, self.sink.as_ref());

        FrameReport {
            frame: self.frame,
            time_ms: self.clock.as_millis() as u64,
            scene: mode,
            position: self.avatar.position.to_array(),
            yaw: self.avatar.yaw,
            speed: self.avatar.speed(),
            proximity,
            fog_density: proximity::fog_density(&proximity),
            gains: self
                .audio
                .gains()
                .into_iter()
                .map(|(channel, gain)| ChannelGain { channel, gain })
                .collect(),
            active_popups: self.popups.active().len(),
            pending_popups: self.popups.pending_len(),
            popups_hidden: self.popups.is_hidden(),
            decorations: self.decorations.counts(),
            events: std::mem::take(&mut self.pending_labels),
        }
    }

    fn collect_popup_events(&mut self) {
        for label in self.popups.drain_events() {
            self.record(label);
        }
    }

    fn record(&mut self, label: String) {
        log::debug!("[frame {}] {label}", self.frame);
        self.log.push(LoggedEvent {
            sequence: self.log.len() as u32,
            frame: self.frame,
            label: label.clone(),
        });
        self.pending_labels.push(label);
    }
}
