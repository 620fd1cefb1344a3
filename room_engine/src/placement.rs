use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::Serialize;

use crate::config::{PopupConfig, Viewport};

/// Screen-space rectangle of a popup, in pixels from the top-left corner.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PopupRect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl PopupRect {
    pub fn right(&self) -> f32 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f32 {
        self.y + self.height
    }

    /// Axis-aligned overlap test with `margin` pixels of breathing room
    /// around `other`.
    pub fn overlaps(&self, other: &PopupRect, margin: f32) -> bool {
        self.x < other.right() + margin
            && self.right() > other.x - margin
            && self.y < other.bottom() + margin
            && self.bottom() > other.y - margin
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PlacementStrategy {
    Random { attempt: u32 },
    Grid { slot: u32 },
    Stacked { slot: u32 },
}

impl PlacementStrategy {
    pub fn label(&self) -> &'static str {
        match self {
            PlacementStrategy::Random { .. } => "random",
            PlacementStrategy::Grid { .. } => "grid",
            PlacementStrategy::Stacked { .. } => "stacked",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Placement {
    pub rect: PopupRect,
    pub strategy: PlacementStrategy,
}

/// Chooses where the next popup goes. Desktop layouts try random spots and
/// fall back to a grid; compact layouts stack popups top to bottom.
#[derive(Debug, Clone)]
pub struct PopupPlacer {
    viewport: Viewport,
    config: PopupConfig,
    compact: bool,
    rng: ChaCha8Rng,
}

impl PopupPlacer {
    pub fn new(viewport: Viewport, config: PopupConfig, compact: bool, seed: u64) -> Self {
        Self {
            viewport,
            config,
            compact,
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }

    pub fn place(&mut self, existing: &[PopupRect]) -> Placement {
        let slot = existing.len() as u32;
        if self.compact {
            return Placement {
                rect: self.stacked_rect(slot),
                strategy: PlacementStrategy::Stacked { slot },
            };
        }

        for attempt in 1..=self.config.placement_attempts {
            let candidate = self.random_rect();
            if !existing
                .iter()
                .any(|other| candidate.overlaps(other, self.config.overlap_margin))
            {
                return Placement {
                    rect: candidate,
                    strategy: PlacementStrategy::Random { attempt },
                };
            }
        }

        log::debug!("popup placement exhausted; using grid slot {slot}");
        Placement {
            rect: self.grid_rect(slot),
            strategy: PlacementStrategy::Grid { slot },
        }
    }

    fn random_rect(&mut self) -> PopupRect {
        let padding = self.config.screen_padding;
        let span_x =
            (self.viewport.width as f32 - self.config.width - padding * 2.0).max(0.0);
        let span_y =
            (self.viewport.height as f32 - self.config.height - padding * 2.0).max(0.0);
        let x = self.rng.random::<f32>() * span_x + padding;
        let y = self.rng.random::<f32>() * span_y + padding;
        self.sized(x, y)
    }

    fn grid_rect(&self, slot: u32) -> PopupRect {
        let gap = self.config.overlap_margin;
        let cell_w = self.config.width + gap;
        let cell_h = self.config.height + gap;
        let cols = ((self.viewport.width as f32 / cell_w).floor() as u32).max(1);
        let x = (slot % cols) as f32 * cell_w + self.config.screen_padding;
        let y = (slot / cols) as f32 * cell_h + self.config.screen_padding;
        self.sized(x, y)
    }

    fn stacked_rect(&self, slot: u32) -> PopupRect {
        let slice = self.config.compact_slice_height;
        let height = self.viewport.height as f32;
        let mut y = slot as f32 * slice + 10.0;
        if y + self.config.height > height - 100.0 {
            let rows = (((height - 120.0) / slice).floor() as u32).max(1);
            y = 10.0 + (slot % rows) as f32 * slice;
        }
        PopupRect {
            x: 10.0,
            y,
            width: (self.viewport.width as f32 - 20.0).max(0.0),
            height: self.config.height,
        }
    }

    fn sized(&self, x: f32, y: f32) -> PopupRect {
        PopupRect {
            x,
            y,
            width: self.config.width,
            height: self.config.height,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn placer(width: u32, height: u32, compact: bool) -> PopupPlacer {
        PopupPlacer::new(
            Viewport { width, height },
            PopupConfig::default(),
            compact,
            7,
        )
    }

    #[test]
    fn overlap_honours_margin() {
        let a = PopupRect {
            x: 0.0,
            y: 0.0,
            width: 100.0,
            height: 50.0,
        };
        let near = PopupRect { x: 115.0, ..a };
        let far = PopupRect { x: 125.0, ..a };
        assert!(a.overlaps(&near, 20.0));
        assert!(!a.overlaps(&far, 20.0));
        assert!(!a.overlaps(&near, 10.0));
    }

    #[test]
    fn random_placements_do_not_overlap() {
        let mut placer = placer(1920, 1080, false);
        let mut placed: Vec<PopupRect> = Vec::new();
        for _ in 0..6 {
            let placement = placer.place(&placed);
            if let PlacementStrategy::Random { .. } = placement.strategy {
                assert!(placed.iter().all(|other| !placement.rect.overlaps(other, 20.0)));
            }
            let rect = placement.rect;
            assert!(rect.x >= 50.0 && rect.right() <= 1920.0 - 50.0 + 1e-3);
            assert!(rect.y >= 50.0 && rect.bottom() <= 1080.0 - 50.0 + 1e-3);
            placed.push(rect);
        }
    }

    #[test]
    fn exhausted_attempts_fall_back_to_grid() {
        // Only a 10x10 pixel region is available for the top-left corner, so
        // a popup already sitting there blocks every random attempt.
        let mut placer = placer(460, 190, false);
        let blocker = PopupRect {
            x: 50.0,
            y: 50.0,
            width: 350.0,
            height: 80.0,
        };
        let placement = placer.place(&[blocker]);
        assert_eq!(placement.strategy, PlacementStrategy::Grid { slot: 1 });
        assert_eq!(placement.rect.x, 50.0);
        assert_eq!(placement.rect.y, 150.0);
    }

    #[test]
    fn compact_layout_stacks_and_wraps() {
        let mut placer = placer(390, 500, true);
        let mut placed = Vec::new();
        let mut ys = Vec::new();
        for _ in 0..7 {
            let placement = placer.place(&placed);
            assert!(matches!(placement.strategy, PlacementStrategy::Stacked { .. }));
            assert_eq!(placement.rect.x, 10.0);
            ys.push(placement.rect.y);
            placed.push(placement.rect);
        }
        // Rows fit while y + 80 <= 400; slot 5 (y = 360) wraps to row 5 % 5.
        assert_eq!(ys, vec![10.0, 80.0, 150.0, 220.0, 290.0, 10.0, 80.0]);
    }
}
