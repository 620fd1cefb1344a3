use std::f32::consts::FRAC_PI_2;

use glam::{Vec2, Vec3};
use serde::{Deserialize, Serialize};

const DAMPING: f32 = 10.0;
const ACCELERATION: f32 = 40.0;
const LOOK_SENSITIVITY: f32 = 0.002;
const JOYSTICK_RADIUS: f32 = 30.0;
const JOYSTICK_THRESHOLD: f32 = 0.1;

/// Movement keys held during a frame.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MoveKeys {
    pub forward: bool,
    pub backward: bool,
    pub left: bool,
    pub right: bool,
}

impl MoveKeys {
    pub const FORWARD: MoveKeys = MoveKeys {
        forward: true,
        backward: false,
        left: false,
        right: false,
    };
}

/// Walkable rectangle on the XZ plane plus the fixed eye height.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Bounds {
    pub min: Vec2,
    pub max: Vec2,
    pub eye_height: f32,
}

impl Bounds {
    pub fn square(half_extent: f32, eye_height: f32) -> Self {
        Self::rect(half_extent, half_extent, eye_height)
    }

    pub fn rect(half_x: f32, half_z: f32, eye_height: f32) -> Self {
        Self {
            min: Vec2::new(-half_x, -half_z),
            max: Vec2::new(half_x, half_z),
            eye_height,
        }
    }

    pub fn clamp(&self, position: Vec3) -> Vec3 {
        Vec3::new(
            position.x.clamp(self.min.x, self.max.x),
            self.eye_height,
            position.z.clamp(self.min.y, self.max.y),
        )
    }
}

/// Converts a touch drag (pixels from the joystick centre) into a stick
/// vector of length at most 1.
pub fn joystick_from_drag(delta: Vec2) -> Vec2 {
    let distance = delta.length();
    if distance <= JOYSTICK_RADIUS {
        delta / JOYSTICK_RADIUS
    } else {
        delta / distance
    }
}

/// First-person camera body: position, look angles and damped velocity.
/// Yaw 0 faces -Z; positive yaw turns toward -X.
#[derive(Debug, Clone, PartialEq)]
pub struct Avatar {
    pub position: Vec3,
    pub yaw: f32,
    pub pitch: f32,
    velocity: Vec2,
    bounds: Bounds,
}

impl Avatar {
    pub fn new(position: Vec3, bounds: Bounds) -> Self {
        Self {
            position: bounds.clamp(position),
            yaw: 0.0,
            pitch: 0.0,
            velocity: Vec2::ZERO,
            bounds,
        }
    }

    /// Teleports to a spawn point, zeroing velocity and look angles.
    pub fn reset(&mut self, spawn: Vec3, bounds: Bounds) {
        self.bounds = bounds;
        self.position = bounds.clamp(spawn);
        self.velocity = Vec2::ZERO;
        self.yaw = 0.0;
        self.pitch = 0.0;
    }

    pub fn forward(&self) -> Vec3 {
        Vec3::new(-self.yaw.sin(), 0.0, -self.yaw.cos())
    }

    pub fn right(&self) -> Vec3 {
        Vec3::new(self.yaw.cos(), 0.0, -self.yaw.sin())
    }

    /// Unit view direction including pitch.
    pub fn aim(&self) -> Vec3 {
        let flat = self.pitch.cos();
        Vec3::new(
            -self.yaw.sin() * flat,
            self.pitch.sin(),
            -self.yaw.cos() * flat,
        )
    }

    pub fn look(&mut self, delta: Vec2) {
        self.yaw -= delta.x * LOOK_SENSITIVITY;
        self.pitch = (self.pitch - delta.y * LOOK_SENSITIVITY).clamp(-FRAC_PI_2, FRAC_PI_2);
    }

    /// Points the view at `target`.
    pub fn face(&mut self, target: Vec3) {
        let offset = target - self.position;
        let horizontal = Vec2::new(offset.x, offset.z).length();
        if horizontal > f32::EPSILON {
            self.yaw = (-offset.x).atan2(-offset.z);
        }
        self.pitch = offset.y.atan2(horizontal).clamp(-FRAC_PI_2, FRAC_PI_2);
    }

    /// Advances one frame: damps velocity, applies key and stick intent,
    /// moves and clamps to the walkable area.
    pub fn step(&mut self, dt: f32, keys: MoveKeys, joystick: Vec2) {
        if dt <= 0.0 {
            return;
        }
        let damping = (DAMPING * dt).min(1.0);
        self.velocity -= self.velocity * damping;

        let strafe = keys.right as i32 - keys.left as i32;
        let advance = keys.forward as i32 - keys.backward as i32;
        let intent = Vec2::new(strafe as f32 + joystick.x, advance as f32 - joystick.y);
        let direction = intent.normalize_or_zero();

        if keys.forward || keys.backward || joystick.y.abs() > JOYSTICK_THRESHOLD {
            self.velocity.y += direction.y * ACCELERATION * dt;
        }
        if keys.left || keys.right || joystick.x.abs() > JOYSTICK_THRESHOLD {
            self.velocity.x += direction.x * ACCELERATION * dt;
        }

        let travel = self.right() * self.velocity.x + self.forward() * self.velocity.y;
        self.position = self.bounds.clamp(self.position + travel * dt);
    }

    pub fn speed(&self) -> f32 {
        self.velocity.length()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn room() -> Bounds {
        Bounds::rect(19.7, 9.7, 1.6)
    }

    #[test]
    fn forward_movement_approaches_terminal_speed() {
        let mut avatar = Avatar::new(Vec3::new(0.0, 1.6, 0.0), room());
        for _ in 0..120 {
            avatar.step(1.0 / 60.0, MoveKeys::FORWARD, Vec2::ZERO);
        }
        assert!((avatar.speed() - 4.0).abs() < 0.05, "speed {}", avatar.speed());
        assert!(avatar.position.z < -6.0);
        assert!(avatar.position.x.abs() < 1e-4);
        assert_eq!(avatar.position.y, 1.6);
    }

    #[test]
    fn walls_clamp_position() {
        let mut avatar = Avatar::new(Vec3::new(-19.0, 1.6, 0.0), room());
        avatar.face(Vec3::new(-30.0, 1.6, 0.0));
        for _ in 0..120 {
            avatar.step(1.0 / 60.0, MoveKeys::FORWARD, Vec2::ZERO);
        }
        assert!((avatar.position.x + 19.7).abs() < 1e-5);
    }

    #[test]
    fn facing_sets_yaw_and_pitch() {
        let mut avatar = Avatar::new(Vec3::new(0.0, 1.6, 0.0), room());
        avatar.face(Vec3::new(-5.0, 1.6, 0.0));
        let forward = avatar.forward();
        assert!((forward.x + 1.0).abs() < 1e-5 && forward.z.abs() < 1e-5);

        avatar.face(Vec3::new(0.0, 6.6, -5.0));
        assert!((avatar.pitch - std::f32::consts::FRAC_PI_4).abs() < 1e-5);
        let aim = avatar.aim();
        assert!((aim.length() - 1.0).abs() < 1e-5);
        assert!(aim.y > 0.7 && aim.z < -0.7);
    }

    #[test]
    fn look_clamps_pitch() {
        let mut avatar = Avatar::new(Vec3::ZERO, room());
        avatar.look(Vec2::new(0.0, -5000.0));
        assert_eq!(avatar.pitch, FRAC_PI_2);
        avatar.look(Vec2::new(100.0, 0.0));
        assert!((avatar.yaw + 0.2).abs() < 1e-6);
    }

    #[test]
    fn joystick_saturates_at_radius() {
        assert_eq!(joystick_from_drag(Vec2::new(15.0, 0.0)), Vec2::new(0.5, 0.0));
        let far = joystick_from_drag(Vec2::new(0.0, 90.0));
        assert!((far - Vec2::new(0.0, 1.0)).length() < 1e-6);

        let mut avatar = Avatar::new(Vec3::new(0.0, 1.6, 0.0), room());
        avatar.step(0.1, MoveKeys::default(), Vec2::new(0.05, 0.05));
        assert_eq!(avatar.position, Vec3::new(0.0, 1.6, 0.0));
        avatar.step(0.1, MoveKeys::default(), Vec2::new(0.0, -1.0));
        assert!(avatar.position.z < 0.0);
    }
}
