use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;
use std::time::Duration;

use room_formats::{Message, PopupCatalog};
use serde::Serialize;

use crate::config::{PopupConfig, Viewport};
use crate::placement::{PlacementStrategy, PopupPlacer, PopupRect};
use crate::proximity::{Proximity, Side, Tier};
use crate::scheduler::{CreationQueue, PendingPopup};

/// Opaque reference to a UI element owned by the popup surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct PopupHandle(pub u64);

/// Styling hints handed to the surface with each popup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PopupStyle {
    pub side: Side,
    pub severity: Tier,
}

/// UI layer that actually draws popups. Implementations should tolerate
/// removal of handles they no longer know about.
pub trait PopupSurface {
    fn create(&self, text: &str, style: PopupStyle, rect: PopupRect) -> PopupHandle;
    fn remove(&self, _handle: PopupHandle) {}
    fn set_visible(&self, _visible: bool) {}
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SurfaceEvent {
    Create {
        handle: PopupHandle,
        text: String,
        style: PopupStyle,
        rect: PopupRect,
    },
    Remove {
        handle: PopupHandle,
    },
    Visibility {
        visible: bool,
    },
}

#[derive(Debug, Default)]
struct SurfaceState {
    next_handle: u64,
    live: BTreeMap<PopupHandle, String>,
    events: Vec<SurfaceEvent>,
    visible: bool,
}

/// Headless surface that records every call; used by the CLI host and tests.
#[derive(Clone)]
pub struct RecordingPopupSurface {
    state: Rc<RefCell<SurfaceState>>,
}

impl Default for RecordingPopupSurface {
    fn default() -> Self {
        Self {
            state: Rc::new(RefCell::new(SurfaceState {
                visible: true,
                ..SurfaceState::default()
            })),
        }
    }
}

impl RecordingPopupSurface {
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(test)]
    pub fn events(&self) -> Vec<SurfaceEvent> {
        self.state.borrow().events.clone()
    }

    #[cfg(test)]
    pub fn live_texts(&self) -> Vec<String> {
        self.state.borrow().live.values().cloned().collect()
    }

    pub fn live_count(&self) -> usize {
        self.state.borrow().live.len()
    }

    pub fn is_visible(&self) -> bool {
        self.state.borrow().visible
    }
}

impl PopupSurface for RecordingPopupSurface {
    fn create(&self, text: &str, style: PopupStyle, rect: PopupRect) -> PopupHandle {
        let mut state = self.state.borrow_mut();
        state.next_handle += 1;
        let handle = PopupHandle(state.next_handle);
        state.live.insert(handle, text.to_string());
        state.events.push(SurfaceEvent::Create {
            handle,
            text: text.to_string(),
            style,
            rect,
        });
        handle
    }

    fn remove(&self, handle: PopupHandle) {
        let mut state = self.state.borrow_mut();
        if state.live.remove(&handle).is_some() {
            state.events.push(SurfaceEvent::Remove { handle });
        }
    }

    fn set_visible(&self, visible: bool) {
        let mut state = self.state.borrow_mut();
        state.visible = visible;
        state.events.push(SurfaceEvent::Visibility { visible });
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActivePopup {
    pub message: Message,
    pub style: PopupStyle,
    pub rect: PopupRect,
    pub strategy: PlacementStrategy,
    pub handle: PopupHandle,
}

/// Owns every displayed popup and the queue of staggered creations, and
/// reconciles them against the player's side and tier.
pub struct PopupManager {
    config: PopupConfig,
    placer: PopupPlacer,
    active: Vec<ActivePopup>,
    queue: CreationQueue,
    last_update: Option<Duration>,
    last_key: Option<(Side, Tier)>,
    hidden: bool,
    events: Vec<String>,
}

impl PopupManager {
    pub fn new(config: PopupConfig, viewport: Viewport, compact: bool, seed: u64) -> Self {
        Self {
            config,
            placer: PopupPlacer::new(viewport, config, compact, seed),
            active: Vec::new(),
            queue: CreationQueue::new(),
            last_update: None,
            last_key: None,
            hidden: false,
            events: Vec::new(),
        }
    }

    pub fn active(&self) -> &[ActivePopup] {
        &self.active
    }

    pub fn pending_len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_hidden(&self) -> bool {
        self.hidden
    }

    #[cfg(test)]
    pub fn current_key(&self) -> Option<(Side, Tier)> {
        self.last_key
    }

    pub fn drain_events(&mut self) -> Vec<String> {
        std::mem::take(&mut self.events)
    }

    /// Throttled entry point called from the frame tick. Returns true when
    /// the call fell inside a new throttle window and was evaluated.
    pub fn update(
        &mut self,
        now: Duration,
        proximity: &Proximity,
        catalog: &PopupCatalog,
        surface: &dyn PopupSurface,
    ) -> bool {
        let throttle = Duration::from_millis(self.config.throttle_ms);
        if let Some(last) = self.last_update {
            if now.saturating_sub(last) < throttle {
                return false;
            }
        }
        self.last_update = Some(now);

        match proximity.key() {
            Some((side, tier)) if tier != Tier::None => {
                if self.last_key != Some((side, tier)) || self.active.is_empty() {
                    self.reconcile(now, side, tier, catalog, surface);
                }
            }
            _ => {
                if self.last_key.is_some() || !self.active.is_empty() || !self.queue.is_empty() {
                    self.clear_all(surface);
                }
            }
        }
        true
    }

    /// Brings displayed and pending popups in line with `(side, tier)`.
    /// Calling it again with the same inputs changes nothing.
    pub fn reconcile(
        &mut self,
        now: Duration,
        side: Side,
        tier: Tier,
        catalog: &PopupCatalog,
        surface: &dyn PopupSurface,
    ) {
        let ceiling = tier.ceiling();
        if self.last_key != Some((side, tier)) {
            self.events
                .push(format!("popup.tier {} {}", side.label(), tier.label()));
        }
        self.last_key = Some((side, tier));

        let mut kept = Vec::with_capacity(self.active.len());
        for popup in self.active.drain(..) {
            if popup.style.side == side && popup.message.index <= ceiling {
                kept.push(popup);
            } else {
                surface.remove(popup.handle);
                self.events.push(format!(
                    "popup.hide {} {}",
                    popup.style.side.label(),
                    popup.message.index
                ));
            }
        }
        self.active = kept;

        let dropped = self
            .queue
            .cancel_where(|entry| entry.side != side || entry.message.index > ceiling);
        if dropped > 0 {
            log::debug!("cancelled {dropped} pending popups outside {side:?}/{tier:?}");
        }

        let stagger = Duration::from_millis(self.config.stagger_ms);
        let mut due = match self.queue.last_due() {
            Some(last) => last.saturating_add(stagger).max(now),
            None => now,
        };
        for message in catalog.messages(side.category()) {
            if message.index > ceiling {
                continue;
            }
            if self.is_displayed(side, message.index) || self.queue.contains(side, message.index)
            {
                continue;
            }
            self.queue.push(PendingPopup {
                due,
                side,
                message: message.clone(),
            });
            due = due.saturating_add(stagger);
        }

        self.pump(now, surface);
    }

    /// Creates every scheduled popup whose time has come. Entries that no
    /// longer belong to the current side or tier are dropped.
    pub fn pump(&mut self, now: Duration, surface: &dyn PopupSurface) -> usize {
        let mut created = 0;
        while let Some(entry) = self.queue.pop_due(now) {
            let wanted = matches!(
                self.last_key,
                Some((side, tier)) if side == entry.side && entry.message.index <= tier.ceiling()
            );
            if !wanted || self.is_displayed(entry.side, entry.message.index) {
                log::debug!(
                    "dropping stale popup {} {}",
                    entry.side.label(),
                    entry.message.index
                );
                continue;
            }
            self.show(entry, surface);
            created += 1;
        }
        created
    }

    fn show(&mut self, entry: PendingPopup, surface: &dyn PopupSurface) {
        let existing: Vec<PopupRect> = self.active.iter().map(|popup| popup.rect).collect();
        let placement = self.placer.place(&existing);
        let style = PopupStyle {
            side: entry.side,
            severity: Tier::for_message_index(entry.message.index),
        };
        let handle = surface.create(&entry.message.text, style, placement.rect);
        self.events.push(format!(
            "popup.show {} {} {}",
            entry.side.label(),
            entry.message.index,
            placement.strategy.label()
        ));
        self.active.push(ActivePopup {
            message: entry.message,
            style,
            rect: placement.rect,
            strategy: placement.strategy,
            handle,
        });
    }

    /// Destroys every popup, cancels pending creations and forgets the
    /// remembered tier.
    pub fn clear_all(&mut self, surface: &dyn PopupSurface) {
        let removed = self.active.len();
        for popup in self.active.drain(..) {
            surface.remove(popup.handle);
        }
        let cancelled = self.queue.clear();
        self.last_key = None;
        if removed > 0 || cancelled > 0 {
            self.events
                .push(format!("popup.clear {removed} cancelled={cancelled}"));
        }
    }

    /// Flips the visibility of the popup container. Hidden popups keep
    /// their lifecycle.
    pub fn toggle_hidden(&mut self, surface: &dyn PopupSurface) -> bool {
        self.hidden = !self.hidden;
        surface.set_visible(!self.hidden);
        self.events.push(if self.hidden {
            "popup.hidden".to_string()
        } else {
            "popup.shown".to_string()
        });
        self.hidden
    }

    fn is_displayed(&self, side: Side, index: u32) -> bool {
        self.active
            .iter()
            .any(|popup| popup.style.side == side && popup.message.index == index)
    }
}
