use room_formats::Category;
use serde::Serialize;

/// Lateral offsets closer than this to the divider belong to neither side.
pub const DEAD_ZONE: f32 = 0.5;

/// Distance kept between the deepest reachable point and the side wall.
const WALL_CLEARANCE: f32 = 2.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    Negative,
    Positive,
}

impl Side {
    pub fn label(&self) -> &'static str {
        match self {
            Side::Negative => "negative",
            Side::Positive => "positive",
        }
    }

    pub fn category(&self) -> Category {
        match self {
            Side::Negative => Category::Negative,
            Side::Positive => Category::Positive,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    None,
    Low,
    Mid,
    High,
}

impl Tier {
    /// Highest message index eligible for display at this tier.
    pub fn ceiling(&self) -> u32 {
        match self {
            Tier::None => 0,
            Tier::Low => 10,
            Tier::Mid => 20,
            Tier::High => 30,
        }
    }

    pub fn from_progress(progress: f32) -> Self {
        if progress > 0.7 {
            Tier::High
        } else if progress > 0.4 {
            Tier::Mid
        } else if progress > 0.1 {
            Tier::Low
        } else {
            Tier::None
        }
    }

    /// Severity class of an individual message, used to style its popup.
    pub fn for_message_index(index: u32) -> Self {
        match index {
            0 => Tier::None,
            1..=10 => Tier::Low,
            11..=20 => Tier::Mid,
            _ => Tier::High,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Tier::None => "none",
            Tier::Low => "low",
            Tier::Mid => "mid",
            Tier::High => "high",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Proximity {
    pub side: Option<Side>,
    pub tier: Tier,
    pub progress: f32,
}

impl Proximity {
    pub const NEUTRAL: Proximity = Proximity {
        side: None,
        tier: Tier::None,
        progress: 0.0,
    };

    pub fn key(&self) -> Option<(Side, Tier)> {
        self.side.map(|side| (side, self.tier))
    }
}

/// Maps the player's signed offset from the divider to a side and tier.
///
/// `room_width` is the full wall-to-wall width; the deepest point counted is
/// `room_width / 2 - 2` from the divider and anything beyond saturates.
pub fn evaluate(lateral_offset: f32, room_width: f32) -> Proximity {
    let distance = lateral_offset.abs();
    if distance < DEAD_ZONE || distance.is_nan() {
        return Proximity::NEUTRAL;
    }

    let side = if lateral_offset < 0.0 {
        Side::Negative
    } else {
        Side::Positive
    };
    let max_distance = room_width / 2.0 - WALL_CLEARANCE;
    let progress = if max_distance > 0.0 {
        (distance / max_distance).min(1.0)
    } else {
        1.0
    };

    Proximity {
        side: Some(side),
        tier: Tier::from_progress(progress),
        progress,
    }
}

/// Fog density the renderer should use for the current position: the dark
/// half thickens with depth, the light half clears.
pub fn fog_density(proximity: &Proximity) -> Option<f32> {
    match proximity.side? {
        Side::Negative => Some(0.02 + proximity.progress * 0.01),
        Side::Positive => Some((0.02 - proximity.progress * 0.01).max(0.01)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dead_zone_is_neutral_for_any_width() {
        for width in [4.0, 20.0, 40.0, 400.0] {
            for offset in [-0.49, -0.2, 0.0, 0.2, 0.49] {
                let result = evaluate(offset, width);
                assert_eq!(result.side, None, "offset {offset} width {width}");
                assert_eq!(result.tier, Tier::None);
            }
        }
    }

    #[test]
    fn dark_side_mid_scenario() {
        let result = evaluate(-12.0, 40.0);
        assert_eq!(result.side, Some(Side::Negative));
        assert!((result.progress - 12.0 / 18.0).abs() < 1e-6);
        assert_eq!(result.tier, Tier::Mid);
    }

    #[test]
    fn dead_zone_scenario() {
        assert_eq!(evaluate(0.2, 40.0).tier, Tier::None);
    }

    #[test]
    fn tier_boundaries_are_exclusive_lower_bounds() {
        assert_eq!(Tier::from_progress(0.0), Tier::None);
        assert_eq!(Tier::from_progress(0.1), Tier::None);
        assert_eq!(Tier::from_progress(0.100_01), Tier::Low);
        assert_eq!(Tier::from_progress(0.4), Tier::Low);
        assert_eq!(Tier::from_progress(0.400_01), Tier::Mid);
        assert_eq!(Tier::from_progress(0.7), Tier::Mid);
        assert_eq!(Tier::from_progress(0.700_01), Tier::High);
        assert_eq!(Tier::from_progress(1.0), Tier::High);
    }

    #[test]
    fn progress_saturates_past_the_clearance() {
        let result = evaluate(19.5, 40.0);
        assert_eq!(result.side, Some(Side::Positive));
        assert_eq!(result.progress, 1.0);
        assert_eq!(result.tier, Tier::High);

        let cramped = evaluate(1.0, 3.0);
        assert_eq!(cramped.progress, 1.0);
    }

    #[test]
    fn ceilings_follow_tiers() {
        let ceilings: Vec<u32> = [Tier::None, Tier::Low, Tier::Mid, Tier::High]
            .iter()
            .map(Tier::ceiling)
            .collect();
        assert_eq!(ceilings, vec![0, 10, 20, 30]);
        assert_eq!(Tier::for_message_index(10), Tier::Low);
        assert_eq!(Tier::for_message_index(11), Tier::Mid);
        assert_eq!(Tier::for_message_index(31), Tier::High);
    }

    #[test]
    fn fog_thickens_on_the_dark_side() {
        let dark = fog_density(&evaluate(-18.0, 40.0)).expect("dark fog");
        let light = fog_density(&evaluate(18.0, 40.0)).expect("light fog");
        assert!((dark - 0.03).abs() < 1e-6);
        assert!((light - 0.01).abs() < 1e-6);
        assert_eq!(fog_density(&Proximity::NEUTRAL), None);
    }
}
