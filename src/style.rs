//! Watch face configuration, its derived palette, and the style state manager.
//!
//! This module provides:
//! - `Configuration`, the immutable snapshot every frame is drawn from
//! - `ColorPalette`, derived purely from a `Configuration`
//! - `StyleRepository`, the subscription point configuration batches arrive on
//! - `StyleStateManager`, the sole consumer that folds batches into snapshots
//!
//! A batch that leaves the configuration unchanged produces no palette
//! recompute, no complication push and no redraw.

use std::sync::Arc;

use arc_swap::ArcSwap;
use embedded_graphics::pixelcolor::Rgb888;
use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::error::StyleError;
use crate::geometry::DirtyFlag;
use crate::redraw::RedrawSignal;

pub const COLOR_STYLE_SETTING: &str = "color_style_setting";
pub const DRAW_HOUR_PIPS_STYLE_SETTING: &str = "draw_hour_pips_style_setting";
pub const WATCH_HAND_LENGTH_STYLE_SETTING: &str = "watch_hand_length_style_setting";

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum ColorStyleId {
    Ambient,
    Red,
    Green,
    Blue,
    White,
}

// Colors of one style: primary, secondary, background, outer element
struct StyleColors(Rgb888, Rgb888, Rgb888, Rgb888);

impl ColorStyleId {
    pub const ALL: [ColorStyleId; 5] = [
        ColorStyleId::Ambient,
        ColorStyleId::Red,
        ColorStyleId::Green,
        ColorStyleId::Blue,
        ColorStyleId::White,
    ];

    pub fn id(self) -> &'static str {
        match self {
            ColorStyleId::Ambient => "ambient_style_id",
            ColorStyleId::Red => "red_style_id",
            ColorStyleId::Green => "green_style_id",
            ColorStyleId::Blue => "blue_style_id",
            ColorStyleId::White => "white_style_id",
        }
    }

    pub fn from_id(id: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|style| style.id() == id)
    }

    pub fn complication_style(self) -> ComplicationStyleId {
        match self {
            ColorStyleId::Ambient => ComplicationStyleId("complication_style_ambient"),
            ColorStyleId::Red => ComplicationStyleId("complication_style_red"),
            ColorStyleId::Green => ComplicationStyleId("complication_style_green"),
            ColorStyleId::Blue => ComplicationStyleId("complication_style_blue"),
            ColorStyleId::White => ComplicationStyleId("complication_style_white"),
        }
    }

    fn colors(self) -> StyleColors {
        const BLACK: Rgb888 = Rgb888::new(0x00, 0x00, 0x00);
        const WHITE: Rgb888 = Rgb888::new(0xFF, 0xFF, 0xFF);
        match self {
            ColorStyleId::Ambient => StyleColors(WHITE, WHITE, BLACK, WHITE),
            ColorStyleId::Red => StyleColors(
                Rgb888::new(0xE5, 0x39, 0x35),
                Rgb888::new(0xFF, 0xCD, 0xD2),
                BLACK,
                Rgb888::new(0xEF, 0x9A, 0x9A),
            ),
            ColorStyleId::Green => StyleColors(
                Rgb888::new(0x43, 0xA0, 0x47),
                Rgb888::new(0xC8, 0xE6, 0xC9),
                BLACK,
                Rgb888::new(0xA5, 0xD6, 0xA7),
            ),
            ColorStyleId::Blue => StyleColors(
                Rgb888::new(0x1E, 0x88, 0xE5),
                Rgb888::new(0xBB, 0xDE, 0xFB),
                BLACK,
                Rgb888::new(0x90, 0xCA, 0xF9),
            ),
            ColorStyleId::White => StyleColors(
                WHITE,
                Rgb888::new(0x9E, 0x9E, 0x9E),
                BLACK,
                Rgb888::new(0xE0, 0xE0, 0xE0),
            ),
        }
    }
}

// Drawable style handed to complication slots
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct ComplicationStyleId(pub &'static str);

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct HandDimensions {
    pub length_fraction: f32,
    pub width_fraction: f32,
    // Corner radii in pixels; both zero means square corners
    pub x_radius: f32,
    pub y_radius: f32,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Configuration {
    pub active_color_style: ColorStyleId,
    pub ambient_color_style: ColorStyleId,
    pub draw_hour_pips: bool,
    pub hour_hand: HandDimensions,
    pub minute_hand: HandDimensions,
    pub second_hand: HandDimensions,
    pub number_radius_fraction: f32,
    pub outer_circle_radius_fraction: f32,
    pub outer_circle_gap_fraction: f32,
    pub hand_gap_fraction: f32,
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            active_color_style: ColorStyleId::Red,
            ambient_color_style: ColorStyleId::Ambient,
            draw_hour_pips: true,
            hour_hand: HandDimensions {
                length_fraction: 0.21875,
                width_fraction: 0.04375,
                x_radius: 1.5,
                y_radius: 5.0,
            },
            minute_hand: HandDimensions {
                length_fraction: 0.3783,
                width_fraction: 0.0375,
                x_radius: 1.5,
                y_radius: 5.0,
            },
            second_hand: HandDimensions {
                length_fraction: 0.37,
                width_fraction: 0.009375,
                x_radius: 0.0,
                y_radius: 0.0,
            },
            number_radius_fraction: 0.45,
            outer_circle_radius_fraction: 0.00584,
            outer_circle_gap_fraction: 0.03417,
            hand_gap_fraction: 0.01875,
        }
    }
}

impl Configuration {
    fn hands_differ(&self, other: &Configuration) -> bool {
        self.hour_hand != other.hour_hand
            || self.minute_hand != other.minute_hand
            || self.second_hand != other.second_hand
            || self.hand_gap_fraction != other.hand_gap_fraction
    }
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct ColorPalette {
    pub active_primary: Rgb888,
    pub active_secondary: Rgb888,
    pub active_background: Rgb888,
    pub active_outer_element: Rgb888,
    pub ambient_primary: Rgb888,
    pub ambient_secondary: Rgb888,
    pub ambient_background: Rgb888,
    pub ambient_outer_element: Rgb888,
    pub complication_style: ComplicationStyleId,
}

impl ColorPalette {
    pub fn from_styles(active: ColorStyleId, ambient: ColorStyleId) -> Self {
        let StyleColors(active_primary, active_secondary, active_background, active_outer_element) =
            active.colors();
        let StyleColors(ambient_primary, ambient_secondary, ambient_background, ambient_outer_element) =
            ambient.colors();
        Self {
            active_primary,
            active_secondary,
            active_background,
            active_outer_element,
            ambient_primary,
            ambient_secondary,
            ambient_background,
            ambient_outer_element,
            complication_style: active.complication_style(),
        }
    }
}

impl From<&Configuration> for ColorPalette {
    fn from(config: &Configuration) -> Self {
        Self::from_styles(config.active_color_style, config.ambient_color_style)
    }
}

// Value attached to one setting id in a batch
#[derive(Clone, Debug, PartialEq)]
pub enum SettingValue {
    Text(String),
    Bool(bool),
    Double(f64),
}

impl SettingValue {
    fn kind(&self) -> &'static str {
        match self {
            SettingValue::Text(_) => "text",
            SettingValue::Bool(_) => "bool",
            SettingValue::Double(_) => "double",
        }
    }
}

pub type SettingChange = (String, SettingValue);

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ComplicationId(pub u32);

/// Host-managed complication slot; rendering is delegated and opaque here.
pub trait ComplicationSlot: Send {
    fn id(&self) -> ComplicationId;
    fn is_enabled(&self) -> bool;
    fn set_style(&mut self, style: ComplicationStyleId);
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ApplyOutcome {
    Unchanged,
    Changed,
}

pub struct StyleStateManager {
    snapshot: ArcSwap<Configuration>,
    palette: ArcSwap<ColorPalette>,
    // Also serializes batches so read-modify-write never interleaves
    slots: Mutex<Vec<Box<dyn ComplicationSlot>>>,
    geometry_dirty: DirtyFlag,
    redraw: RedrawSignal,
}

impl StyleStateManager {
    pub fn new(
        initial: Configuration,
        slots: Vec<Box<dyn ComplicationSlot>>,
        geometry_dirty: DirtyFlag,
        redraw: RedrawSignal,
    ) -> Self {
        let palette = ColorPalette::from(&initial);
        Self {
            snapshot: ArcSwap::from_pointee(initial),
            palette: ArcSwap::from_pointee(palette),
            slots: Mutex::new(slots),
            geometry_dirty,
            redraw,
        }
    }

    pub fn configuration(&self) -> Arc<Configuration> {
        self.snapshot.load_full()
    }

    pub fn palette(&self) -> Arc<ColorPalette> {
        self.palette.load_full()
    }

    pub fn enabled_complications(&self) -> Vec<ComplicationId> {
        self.slots
            .lock()
            .iter()
            .filter(|slot| slot.is_enabled())
            .map(|slot| slot.id())
            .collect()
    }

    // Fold one batch into the snapshot.
    pub fn apply_batch(&self, batch: &[SettingChange]) -> ApplyOutcome {
        let mut slots = self.slots.lock();
        let previous = self.snapshot.load_full();
        let mut working = (*previous).clone();

        for (id, value) in batch {
            if let Err(err) = apply_setting(&mut working, id, value) {
                warn!(setting = %id, %err, "skipping malformed style setting");
            }
        }

        if working == *previous {
            debug!("style batch left configuration unchanged");
            return ApplyOutcome::Unchanged;
        }

        debug!(?working, "publishing new configuration");
        let palette = ColorPalette::from(&working);
        if working.hands_differ(&previous) {
            self.geometry_dirty.mark();
        }
        self.snapshot.store(Arc::new(working));
        self.palette.store(Arc::new(palette));

        for slot in slots.iter_mut().filter(|slot| slot.is_enabled()) {
            slot.set_style(palette.complication_style);
        }

        self.redraw.request();
        ApplyOutcome::Changed
    }
}

fn apply_setting(config: &mut Configuration, id: &str, value: &SettingValue) -> Result<(), StyleError> {
    match id {
        COLOR_STYLE_SETTING => {
            let SettingValue::Text(style_id) = value else {
                return Err(wrong_type(COLOR_STYLE_SETTING, "text", value));
            };
            config.active_color_style = ColorStyleId::from_id(style_id)
                .ok_or_else(|| StyleError::UnknownColorStyle(style_id.clone()))?;
        }
        DRAW_HOUR_PIPS_STYLE_SETTING => {
            let SettingValue::Bool(draw) = value else {
                return Err(wrong_type(DRAW_HOUR_PIPS_STYLE_SETTING, "bool", value));
            };
            config.draw_hour_pips = *draw;
        }
        WATCH_HAND_LENGTH_STYLE_SETTING => {
            let SettingValue::Double(length) = value else {
                return Err(wrong_type(WATCH_HAND_LENGTH_STYLE_SETTING, "double", value));
            };
            config.minute_hand.length_fraction = *length as f32;
        }
        _ => {}
    }
    Ok(())
}

fn wrong_type(id: &'static str, expected: &'static str, found: &SettingValue) -> StyleError {
    StyleError::WrongValueType {
        id,
        expected,
        found: found.kind(),
    }
}

type StyleListener = Box<dyn Fn(&[SettingChange]) + Send + Sync>;

/// Delivery point for configuration batches from the host.
#[derive(Default)]
pub struct StyleRepository {
    listeners: Mutex<Vec<StyleListener>>,
}

impl StyleRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, on_change: impl Fn(&[SettingChange]) + Send + Sync + 'static) {
        self.listeners.lock().push(Box::new(on_change));
    }

    pub fn publish(&self, batch: Vec<SettingChange>) {
        for listener in self.listeners.lock().iter() {
            listener(&batch);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct RecordingSlot {
        id: u32,
        enabled: bool,
        pushes: Arc<AtomicUsize>,
    }

    impl ComplicationSlot for RecordingSlot {
        fn id(&self) -> ComplicationId {
            ComplicationId(self.id)
        }
        fn is_enabled(&self) -> bool {
            self.enabled
        }
        fn set_style(&mut self, _style: ComplicationStyleId) {
            self.pushes.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn manager_with_slots() -> (StyleStateManager, Arc<AtomicUsize>, DirtyFlag, RedrawSignal) {
        let pushes = Arc::new(AtomicUsize::new(0));
        let slots: Vec<Box<dyn ComplicationSlot>> = vec![
            Box::new(RecordingSlot {
                id: 1,
                enabled: true,
                pushes: pushes.clone(),
            }),
            Box::new(RecordingSlot {
                id: 2,
                enabled: false,
                pushes: pushes.clone(),
            }),
        ];
        let dirty = DirtyFlag::new();
        let redraw = RedrawSignal::new();
        let manager = StyleStateManager::new(Configuration::default(), slots, dirty.clone(), redraw.clone());
        (manager, pushes, dirty, redraw)
    }

    fn text(id: &str, value: &str) -> SettingChange {
        (id.to_string(), SettingValue::Text(value.to_string()))
    }

    #[test]
    fn unchanged_batch_triggers_nothing() {
        let (manager, pushes, dirty, redraw) = manager_with_slots();
        let before = manager.palette();

        let outcome = manager.apply_batch(&[
            text(COLOR_STYLE_SETTING, "red_style_id"),
            (DRAW_HOUR_PIPS_STYLE_SETTING.to_string(), SettingValue::Bool(true)),
        ]);

        assert_eq!(outcome, ApplyOutcome::Unchanged);
        assert_eq!(pushes.load(Ordering::SeqCst), 0);
        assert!(!dirty.is_set());
        assert!(!redraw.is_pending());
        assert!(Arc::ptr_eq(&before, &manager.palette()));
    }

    #[test]
    fn color_change_recomputes_palette_and_pushes_enabled_slots_only() {
        let (manager, pushes, dirty, redraw) = manager_with_slots();

        let outcome = manager.apply_batch(&[text(COLOR_STYLE_SETTING, "blue_style_id")]);

        assert_eq!(outcome, ApplyOutcome::Changed);
        assert_eq!(manager.configuration().active_color_style, ColorStyleId::Blue);
        assert_eq!(
            manager.palette().complication_style,
            ComplicationStyleId("complication_style_blue")
        );
        assert_eq!(pushes.load(Ordering::SeqCst), 1);
        assert!(!dirty.is_set());
        assert!(redraw.take());
    }

    #[test]
    fn last_write_per_key_wins() {
        let (manager, _, _, _) = manager_with_slots();
        manager.apply_batch(&[
            text(COLOR_STYLE_SETTING, "green_style_id"),
            text(COLOR_STYLE_SETTING, "white_style_id"),
        ]);
        assert_eq!(manager.configuration().active_color_style, ColorStyleId::White);
    }

    #[test]
    fn hand_length_marks_geometry_dirty() {
        let (manager, _, dirty, _) = manager_with_slots();
        manager.apply_batch(&[(
            WATCH_HAND_LENGTH_STYLE_SETTING.to_string(),
            SettingValue::Double(0.25),
        )]);
        assert_eq!(manager.configuration().minute_hand.length_fraction, 0.25);
        assert!(dirty.take());
    }

    #[test]
    fn malformed_and_unknown_keys_are_skipped() {
        let (manager, pushes, _, _) = manager_with_slots();
        let outcome = manager.apply_batch(&[
            (COLOR_STYLE_SETTING.to_string(), SettingValue::Bool(false)),
            text(COLOR_STYLE_SETTING, "purple_style_id"),
            text("some_future_setting", "x"),
            (DRAW_HOUR_PIPS_STYLE_SETTING.to_string(), SettingValue::Bool(false)),
        ]);

        // Only the well-formed pips setting landed
        assert_eq!(outcome, ApplyOutcome::Changed);
        let config = manager.configuration();
        assert_eq!(config.active_color_style, ColorStyleId::Red);
        assert!(!config.draw_hour_pips);
        assert_eq!(pushes.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn repository_delivers_to_subscriber() {
        let (manager, _, _, _) = manager_with_slots();
        let manager = Arc::new(manager);
        let repository = StyleRepository::new();
        let consumer = manager.clone();
        repository.subscribe(move |batch| {
            consumer.apply_batch(batch);
        });

        repository.publish(vec![text(COLOR_STYLE_SETTING, "green_style_id")]);
        assert_eq!(manager.configuration().active_color_style, ColorStyleId::Green);
        assert_eq!(manager.enabled_complications(), vec![ComplicationId(1)]);
    }

    #[test]
    fn style_ids_round_trip() {
        for style in ColorStyleId::ALL {
            assert_eq!(ColorStyleId::from_id(style.id()), Some(style));
        }
        assert_eq!(ColorStyleId::from_id("nope"), None);
    }
}
