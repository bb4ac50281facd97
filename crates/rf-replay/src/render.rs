//! Rendering boundary
//!
//! The engine only talks to visuals through [`CellRenderer`]. Handles are
//! opaque; a renderer must tolerate operations on handles it no longer knows.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use rf_outcome::Symbol;

use crate::timing::Millis;

/// Opaque reference to one on-screen cell visual
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct VisualHandle(pub u64);

/// Animatable visual property
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnimProperty {
    X,
    Y,
    Scale,
    Alpha,
}

/// One property transition
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Tween {
    pub property: AnimProperty,
    pub from: f64,
    pub to: f64,
}

impl Tween {
    pub fn new(property: AnimProperty, from: f64, to: f64) -> Self {
        Self { property, from, to }
    }

    pub fn x(from: f64, to: f64) -> Self {
        Self::new(AnimProperty::X, from, to)
    }

    pub fn y(from: f64, to: f64) -> Self {
        Self::new(AnimProperty::Y, from, to)
    }

    pub fn scale(from: f64, to: f64) -> Self {
        Self::new(AnimProperty::Scale, from, to)
    }

    pub fn alpha(from: f64, to: f64) -> Self {
        Self::new(AnimProperty::Alpha, from, to)
    }
}

/// Easing curve hint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Easing {
    #[default]
    Linear,
    EaseInQuad,
    EaseOutCubic,
    EaseOutBack,
    EaseOutBounce,
}

/// One-shot effect at a position
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EffectKind {
    /// Removal burst
    Burst,
    /// Bonus trigger highlight
    Highlight,
}

/// Visual factory and animation sink
pub trait CellRenderer {
    /// Create a visual for `symbol` with its top-left corner at (x, y)
    fn create_cell_visual(&mut self, symbol: &Symbol, x: f64, y: f64) -> VisualHandle;

    /// Change the symbol shown by a visual
    fn update_cell_visual(&mut self, handle: VisualHandle, symbol: &Symbol);

    /// Start a transition. Completion is tracked by the caller's timers.
    fn animate(&mut self, handle: VisualHandle, tweens: &[Tween], duration_ms: Millis, easing: Easing);

    fn destroy_visual(&mut self, handle: VisualHandle);

    fn play_effect(&mut self, kind: EffectKind, x: f64, y: f64, color_seed: u32);
}

// ═══════════════════════════════════════════════════════════════════════════════
// HEADLESS RENDERER
// ═══════════════════════════════════════════════════════════════════════════════

/// Live state of one headless visual
#[derive(Debug, Clone, PartialEq)]
pub struct VisualState {
    pub symbol: Symbol,
    pub x: f64,
    pub y: f64,
    pub scale: f64,
    pub alpha: f64,
}

/// Operation counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RenderStats {
    pub created: u64,
    pub updated: u64,
    pub animated: u64,
    pub destroyed: u64,
    pub effects: u64,
    /// Operations addressed to unknown handles
    pub stale_ops: u64,
}

/// Recorded effect
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PlayedEffect {
    pub kind: EffectKind,
    pub x: f64,
    pub y: f64,
    pub color_seed: u32,
}

/// Renderer without a display. Tweens snap to their target values.
#[derive(Debug, Default)]
pub struct HeadlessRenderer {
    next_handle: u64,
    visuals: BTreeMap<VisualHandle, VisualState>,
    effects: Vec<PlayedEffect>,
    stats: RenderStats,
}

impl HeadlessRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn live_count(&self) -> usize {
        self.visuals.len()
    }

    pub fn visual(&self, handle: VisualHandle) -> Option<&VisualState> {
        self.visuals.get(&handle)
    }

    pub fn is_live(&self, handle: VisualHandle) -> bool {
        self.visuals.contains_key(&handle)
    }

    pub fn stats(&self) -> RenderStats {
        self.stats
    }

    pub fn effects(&self) -> &[PlayedEffect] {
        &self.effects
    }

    pub fn effect_count(&self, kind: EffectKind) -> usize {
        self.effects.iter().filter(|e| e.kind == kind).count()
    }

    /// Forget recorded effects and counters, keep live visuals
    pub fn reset_stats(&mut self) {
        self.effects.clear();
        self.stats = RenderStats::default();
    }
}

impl CellRenderer for HeadlessRenderer {
    fn create_cell_visual(&mut self, symbol: &Symbol, x: f64, y: f64) -> VisualHandle {
        self.next_handle += 1;
        let handle = VisualHandle(self.next_handle);
        self.visuals.insert(
            handle,
            VisualState {
                symbol: symbol.clone(),
                x,
                y,
                scale: 1.0,
                alpha: 1.0,
            },
        );
        self.stats.created += 1;
        log::trace!("[Headless] create {:?} '{}' at ({:.1}, {:.1})", handle, symbol, x, y);
        handle
    }

    fn update_cell_visual(&mut self, handle: VisualHandle, symbol: &Symbol) {
        match self.visuals.get_mut(&handle) {
            Some(visual) => {
                visual.symbol = symbol.clone();
                self.stats.updated += 1;
            }
            None => self.stats.stale_ops += 1,
        }
    }

    fn animate(&mut self, handle: VisualHandle, tweens: &[Tween], duration_ms: Millis, easing: Easing) {
        let Some(visual) = self.visuals.get_mut(&handle) else {
            self.stats.stale_ops += 1;
            return;
        };
        for tween in tweens {
            match tween.property {
                AnimProperty::X => visual.x = tween.to,
                AnimProperty::Y => visual.y = tween.to,
                AnimProperty::Scale => visual.scale = tween.to,
                AnimProperty::Alpha => visual.alpha = tween.to,
            }
        }
        self.stats.animated += 1;
        log::trace!("[Headless] animate {:?} {}ms {:?}", handle, duration_ms, easing);
    }

    fn destroy_visual(&mut self, handle: VisualHandle) {
        if self.visuals.remove(&handle).is_some() {
            self.stats.destroyed += 1;
            log::trace!("[Headless] destroy {:?}", handle);
        } else {
            self.stats.stale_ops += 1;
        }
    }

    fn play_effect(&mut self, kind: EffectKind, x: f64, y: f64, color_seed: u32) {
        self.effects.push(PlayedEffect { kind, x, y, color_seed });
        self.stats.effects += 1;
        log::trace!("[Headless] effect {:?} at ({:.1}, {:.1})", kind, x, y);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handles_are_unique() {
        let mut r = HeadlessRenderer::new();
        let a = r.create_cell_visual(&Symbol::new("A"), 0.0, 0.0);
        let b = r.create_cell_visual(&Symbol::new("B"), 10.0, 0.0);
        assert_ne!(a, b);
        assert_eq!(r.live_count(), 2);
    }

    #[test]
    fn test_animate_snaps_to_target() {
        let mut r = HeadlessRenderer::new();
        let h = r.create_cell_visual(&Symbol::new("A"), 0.0, 0.0);
        r.animate(h, &[Tween::y(-50.0, 40.0), Tween::alpha(1.0, 0.0)], 300, Easing::EaseOutBounce);

        let v = r.visual(h).unwrap();
        assert_eq!(v.y, 40.0);
        assert_eq!(v.alpha, 0.0);
        assert_eq!(v.x, 0.0);
    }

    #[test]
    fn test_stale_handles_are_tolerated() {
        let mut r = HeadlessRenderer::new();
        let h = r.create_cell_visual(&Symbol::new("A"), 0.0, 0.0);
        r.destroy_visual(h);
        r.destroy_visual(h);
        r.update_cell_visual(h, &Symbol::new("B"));
        r.animate(h, &[Tween::scale(1.0, 0.0)], 100, Easing::Linear);

        let stats = r.stats();
        assert_eq!(stats.destroyed, 1);
        assert_eq!(stats.stale_ops, 3);
        assert_eq!(r.live_count(), 0);
    }

    #[test]
    fn test_effects_are_recorded() {
        let mut r = HeadlessRenderer::new();
        r.play_effect(EffectKind::Burst, 1.0, 2.0, 7);
        r.play_effect(EffectKind::Highlight, 3.0, 4.0, 9);
        r.play_effect(EffectKind::Burst, 5.0, 6.0, 7);

        assert_eq!(r.effect_count(EffectKind::Burst), 2);
        assert_eq!(r.effect_count(EffectKind::Highlight), 1);
        r.reset_stats();
        assert!(r.effects().is_empty());
    }
}
