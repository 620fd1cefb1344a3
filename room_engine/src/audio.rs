use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;
use std::time::Duration;

use glam::Vec3;
use serde::{Serialize, Serializer};

use crate::config::{AudioConfig, RoomDimensions, MAX_FADE_SECS};
use crate::proximity::DEAD_ZONE;
use crate::scenes::SceneMode;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ChannelId {
    /// Static/noise loop on the dark side.
    Tension,
    /// Music loop on the light side.
    Ambient,
    River,
    Fire(u8),
    Rooftop,
}

impl ChannelId {
    pub fn label(&self) -> String {
        self.to_string()
    }

    fn context(&self) -> SceneMode {
        match self {
            ChannelId::Rooftop => SceneMode::Rooftop,
            _ => SceneMode::Main,
        }
    }
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChannelId::Tension => f.write_str("tension"),
            ChannelId::Ambient => f.write_str("ambient"),
            ChannelId::River => f.write_str("river"),
            ChannelId::Fire(index) => write!(f, "fire.{index}"),
            ChannelId::Rooftop => f.write_str("rooftop"),
        }
    }
}

impl Serialize for ChannelId {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_str(self)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RampTarget {
    Silence,
    Live,
}

/// Linear blend from `from` to either silence or the channel's live target.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GainRamp {
    pub from: f32,
    pub start: Duration,
    pub duration: Duration,
    pub target: RampTarget,
}

impl GainRamp {
    fn fraction(&self, now: Duration) -> f32 {
        if self.duration.is_zero() {
            return 1.0;
        }
        let elapsed = now.saturating_sub(self.start).as_secs_f32();
        (elapsed / self.duration.as_secs_f32()).clamp(0.0, 1.0)
    }

    fn value(&self, now: Duration, live: f32) -> f32 {
        let end = match self.target {
            RampTarget::Silence => 0.0,
            RampTarget::Live => live,
        };
        self.from + (end - self.from) * self.fraction(now)
    }
}

/// Receives gain updates; implemented by the audio backend.
pub trait AudioSink {
    fn set_gain(&self, channel: ChannelId, gain: f32);
    fn ramp_started(&self, _channel: ChannelId, _ramp: &GainRamp) {}
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AudioEvent {
    Gain {
        frame: u32,
        channel: ChannelId,
        gain: f32,
    },
    Ramp {
        frame: u32,
        channel: ChannelId,
        from: f32,
        target: RampTarget,
        seconds: f32,
    },
}

/// Sink that keeps an ordered log of gain changes. Repeated identical
/// values are recorded once.
#[derive(Clone, Default)]
pub struct RecordingAudioSink {
    events: Rc<RefCell<Vec<AudioEvent>>>,
    last: Rc<RefCell<BTreeMap<ChannelId, f32>>>,
    frame: Rc<Cell<u32>>,
}

impl RecordingAudioSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn begin_frame(&self, frame: u32) {
        self.frame.set(frame);
    }

    pub fn events(&self) -> Vec<AudioEvent> {
        self.events.borrow().clone()
    }

    #[cfg(test)]
    pub fn gain(&self, channel: ChannelId) -> Option<f32> {
        self.last.borrow().get(&channel).copied()
    }
}

impl AudioSink for RecordingAudioSink {
    fn set_gain(&self, channel: ChannelId, gain: f32) {
        let previous = self.last.borrow_mut().insert(channel, gain);
        if previous == Some(gain) {
            return;
        }
        self.events.borrow_mut().push(AudioEvent::Gain {
            frame: self.frame.get(),
            channel,
            gain,
        });
    }

    fn ramp_started(&self, channel: ChannelId, ramp: &GainRamp) {
        self.events.borrow_mut().push(AudioEvent::Ramp {
            frame: self.frame.get(),
            channel,
            from: ramp.from,
            target: ramp.target,
            seconds: ramp.duration.as_secs_f32(),
        });
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Emitter {
    pub position: Vec3,
    pub falloff: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AudioChannel {
    pub id: ChannelId,
    pub gain: f32,
    pub max_gain: f32,
    pub emitter: Option<Emitter>,
    pub ramp: Option<GainRamp>,
    pub missing: bool,
}

/// Position-driven gain control for the ambient loops, the point emitters
/// and the rooftop music. Channels are created once and live for the whole
/// session.
pub struct AudioMixer {
    channels: Vec<AudioChannel>,
    half_width: f32,
    fade_out: Duration,
    fade_in: Duration,
    rooftop_fade_out: Duration,
}

impl AudioMixer {
    pub fn new(config: &AudioConfig, room: &RoomDimensions) -> Self {
        let mut channels = vec![
            AudioChannel::looped(ChannelId::Tension, config.tension_max),
            AudioChannel::looped(ChannelId::Ambient, config.ambient_max),
            AudioChannel::emitter(
                ChannelId::River,
                config.river.max_gain,
                Vec3::from_array(config.river.position),
                config.river.falloff,
            ),
        ];
        for (index, fire) in config.fires.iter().enumerate() {
            channels.push(AudioChannel::emitter(
                ChannelId::Fire(index as u8),
                fire.max_gain,
                Vec3::from_array(fire.position),
                fire.falloff,
            ));
        }
        channels.push(AudioChannel::looped(ChannelId::Rooftop, config.rooftop_gain));

        let mut mixer = Self {
            channels,
            half_width: room.half_width(),
            fade_out: fade_duration(config.fade_out_secs),
            fade_in: fade_duration(config.fade_in_secs),
            rooftop_fade_out: fade_duration(config.rooftop_fade_out_secs),
        };
        for label in &config.missing_assets {
            mixer.mark_missing(label);
        }
        mixer
    }

    /// Silences the channel whose loop failed to load. Returns false when no
    /// channel carries `label`.
    pub fn mark_missing(&mut self, label: &str) -> bool {
        let Some(channel) = self
            .channels
            .iter_mut()
            .find(|channel| channel.id.label() == label)
        else {
            log::warn!("unknown audio channel '{label}' marked missing");
            return false;
        };
        log::warn!("audio asset for {label} unavailable; channel stays silent");
        channel.missing = true;
        channel.gain = 0.0;
        true
    }

    #[cfg(test)]
    pub fn channels(&self) -> &[AudioChannel] {
        &self.channels
    }

    pub fn gains(&self) -> Vec<(ChannelId, f32)> {
        self.channels
            .iter()
            .map(|channel| (channel.id, channel.gain))
            .collect()
    }

    pub fn gain(&self, id: ChannelId) -> Option<f32> {
        self.channels
            .iter()
            .find(|channel| channel.id == id)
            .map(|channel| channel.gain)
    }

    /// Installs fade ramps for a change of scene context. Channels that
    /// belong to `to` fade in; every other audible channel fades out.
    pub fn begin_transition(&mut self, now: Duration, to: SceneMode, sink: &dyn AudioSink) {
        for channel in &mut self.channels {
            if channel.missing {
                continue;
            }
            let ramp = if channel.id.context() == to {
                GainRamp {
                    from: channel.gain,
                    start: now,
                    duration: self.fade_in,
                    target: RampTarget::Live,
                }
            } else if channel.gain > 0.0 || channel.ramp.is_some() {
                let duration = if channel.id == ChannelId::Rooftop {
                    self.rooftop_fade_out
                } else {
                    self.fade_out
                };
                GainRamp {
                    from: channel.gain,
                    start: now,
                    duration,
                    target: RampTarget::Silence,
                }
            } else {
                continue;
            };
            sink.ramp_started(channel.id, &ramp);
            channel.ramp = Some(ramp);
        }
    }

    /// Recomputes every channel from the player position and scene, applies
    /// running ramps and pushes the result to `sink`.
    pub fn tick(&mut self, now: Duration, position: Vec3, scene: SceneMode, sink: &dyn AudioSink) {
        let half_width = self.half_width;
        for channel in &mut self.channels {
            let live = channel.live_target(position, scene, half_width);
            let gain = match channel.ramp {
                Some(ramp) => {
                    let value = ramp.value(now, live);
                    if ramp.fraction(now) >= 1.0 {
                        channel.ramp = None;
                    }
                    value
                }
                None if channel.id.context() == scene => live,
                None => 0.0,
            };
            channel.gain = if channel.missing { 0.0 } else { gain };
            sink.set_gain(channel.id, channel.gain);
        }
    }
}

/// Out-of-range or NaN fades collapse to an instant switch.
fn fade_duration(secs: f32) -> Duration {
    if !(0.0..=MAX_FADE_SECS).contains(&secs) {
        log::warn!("ignoring audio fade of {secs} seconds");
        return Duration::ZERO;
    }
    Duration::try_from_secs_f32(secs).unwrap_or(Duration::ZERO)
}

impl AudioChannel {
    fn looped(id: ChannelId, max_gain: f32) -> Self {
        Self {
            id,
            gain: 0.0,
            max_gain,
            emitter: None,
            ramp: None,
            missing: false,
        }
    }

    fn emitter(id: ChannelId, max_gain: f32, position: Vec3, falloff: f32) -> Self {
        Self {
            emitter: Some(Emitter { position, falloff }),
            ..Self::looped(id, max_gain)
        }
    }

    fn live_target(&self, position: Vec3, scene: SceneMode, half_width: f32) -> f32 {
        if self.missing || self.id.context() != scene {
            return 0.0;
        }
        let x = position.x;
        match (&self.emitter, self.id) {
            (Some(emitter), _) => {
                if emitter.falloff <= 0.0 {
                    return 0.0;
                }
                let distance = position.distance(emitter.position);
                (1.0 - distance / emitter.falloff).max(0.0) * self.max_gain
            }
            (None, ChannelId::Tension) if x < -DEAD_ZONE => {
                (x.abs() / half_width).min(self.max_gain)
            }
            (None, ChannelId::Ambient) if x > DEAD_ZONE => (x / half_width).min(self.max_gain),
            (None, ChannelId::Rooftop) => self.max_gain,
            _ => 0.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mixer() -> AudioMixer {
        AudioMixer::new(&AudioConfig::default(), &RoomDimensions::default())
    }

    fn secs(value: f32) -> Duration {
        Duration::from_secs_f32(value)
    }

    #[test]
    fn loops_follow_the_side_split() {
        let sink = RecordingAudioSink::new();
        let mut audio = mixer();

        audio.tick(secs(0.0), Vec3::new(-12.0, 1.6, 0.0), SceneMode::Main, &sink);
        assert_eq!(audio.gain(ChannelId::Tension), Some(0.02));
        assert_eq!(audio.gain(ChannelId::Ambient), Some(0.0));

        audio.tick(secs(0.1), Vec3::new(6.0, 1.6, 0.0), SceneMode::Main, &sink);
        assert_eq!(audio.gain(ChannelId::Tension), Some(0.0));
        assert!((audio.gain(ChannelId::Ambient).unwrap() - 0.3).abs() < 1e-6);

        audio.tick(secs(0.2), Vec3::new(0.3, 1.6, 0.0), SceneMode::Main, &sink);
        assert_eq!(audio.gain(ChannelId::Ambient), Some(0.0));
    }

    #[test]
    fn emitters_fall_off_linearly() {
        let sink = RecordingAudioSink::new();
        let mut audio = mixer();

        audio.tick(secs(0.0), Vec3::new(12.0, 0.0, 5.0), SceneMode::Main, &sink);
        assert!((audio.gain(ChannelId::River).unwrap() - 0.2).abs() < 1e-6);

        audio.tick(secs(0.0), Vec3::new(-8.0, 0.5, -5.0), SceneMode::Main, &sink);
        assert!((audio.gain(ChannelId::Fire(0)).unwrap() - 0.5).abs() < 1e-6);
        assert_eq!(audio.gain(ChannelId::River), Some(0.0));
    }

    #[test]
    fn identical_inputs_give_identical_gains() {
        let sink = RecordingAudioSink::new();
        let mut audio = mixer();
        let position = Vec3::new(-10.0, 1.6, 2.0);

        audio.tick(secs(1.0), position, SceneMode::Main, &sink);
        let first = audio.gains();
        audio.tick(secs(1.0), position, SceneMode::Main, &sink);
        assert_eq!(audio.gains(), first);

        let gain_events = sink
            .events()
            .iter()
            .filter(|event| matches!(event, AudioEvent::Gain { .. }))
            .count();
        assert_eq!(gain_events, first.len());
    }

    #[test]
    fn rooftop_transition_ramps_both_contexts() {
        let sink = RecordingAudioSink::new();
        let mut audio = mixer();
        let main_spot = Vec3::new(-12.0, 1.6, 0.0);
        let roof_spot = Vec3::new(0.0, 101.6, 5.0);

        audio.tick(secs(0.0), main_spot, SceneMode::Main, &sink);
        audio.begin_transition(secs(1.0), SceneMode::Rooftop, &sink);

        audio.tick(secs(1.25), roof_spot, SceneMode::Rooftop, &sink);
        assert!((audio.gain(ChannelId::Tension).unwrap() - 0.01).abs() < 1e-6);
        assert!((audio.gain(ChannelId::Rooftop).unwrap() - 0.075).abs() < 1e-6);

        audio.tick(secs(1.5), roof_spot, SceneMode::Rooftop, &sink);
        assert_eq!(audio.gain(ChannelId::Tension), Some(0.0));

        audio.tick(secs(2.0), roof_spot, SceneMode::Rooftop, &sink);
        assert!((audio.gain(ChannelId::Rooftop).unwrap() - 0.3).abs() < 1e-6);
        assert!(audio.channels().iter().all(|channel| channel.ramp.is_none()));

        audio.begin_transition(secs(3.0), SceneMode::Main, &sink);
        audio.tick(secs(3.5), main_spot, SceneMode::Main, &sink);
        assert!((audio.gain(ChannelId::Rooftop).unwrap() - 0.15).abs() < 1e-6);
        assert!((audio.gain(ChannelId::Tension).unwrap() - 0.01).abs() < 1e-6);
        audio.tick(secs(4.0), main_spot, SceneMode::Main, &sink);
        assert_eq!(audio.gain(ChannelId::Rooftop), Some(0.0));
        assert_eq!(audio.gain(ChannelId::Tension), Some(0.02));
    }

    #[test]
    fn missing_assets_stay_silent() {
        let sink = RecordingAudioSink::new();
        let config = AudioConfig {
            missing_assets: vec!["river".to_string()],
            ..AudioConfig::default()
        };
        let mut audio = AudioMixer::new(&config, &RoomDimensions::default());
        assert!(!audio.mark_missing("organ"));

        audio.tick(secs(0.0), Vec3::new(12.0, 0.0, 0.0), SceneMode::Main, &sink);
        assert_eq!(audio.gain(ChannelId::River), Some(0.0));
        assert_eq!(sink.gain(ChannelId::River), Some(0.0));
    }

    #[test]
    fn unusable_fades_switch_instantly() {
        let sink = RecordingAudioSink::new();
        let config = AudioConfig {
            fade_in_secs: 1.0e30,
            fade_out_secs: f32::NAN,
            ..AudioConfig::default()
        };
        let mut audio = AudioMixer::new(&config, &RoomDimensions::default());
        let roof_spot = Vec3::new(0.0, 101.6, 5.0);

        audio.tick(secs(0.0), Vec3::new(-12.0, 1.6, 0.0), SceneMode::Main, &sink);
        audio.begin_transition(secs(1.0), SceneMode::Rooftop, &sink);
        audio.tick(secs(1.0), roof_spot, SceneMode::Rooftop, &sink);
        assert_eq!(audio.gain(ChannelId::Tension), Some(0.0));
        assert!((audio.gain(ChannelId::Rooftop).unwrap() - 0.3).abs() < 1e-6);
    }

    #[test]
    fn home_is_silent() {
        let sink = RecordingAudioSink::new();
        let mut audio = mixer();
        audio.tick(secs(0.0), Vec3::new(-12.0, 1.6, 0.0), SceneMode::Home, &sink);
        assert!(audio.gains().iter().all(|(_, gain)| *gain == 0.0));
        assert_eq!(ChannelId::Fire(1).label(), "fire.1");
    }
}
