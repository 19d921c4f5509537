//! Frame composition: turns one observed instant of face state into an
//! ordered list of draw operations.
//!
//! `render` is pure. It reads no clock and touches no shared state, so the
//! same `FrameInput` always yields the same operations. Rasterizing them is
//! `raster`'s job.

use chrono::{NaiveDateTime, Timelike};
use embedded_graphics::pixelcolor::Rgb888;
use embedded_graphics::text::{Alignment, Baseline};

use crate::geometry::{DrawBounds, HandGeometry, HandPath, Vec2};
use crate::menu::{MenuCache, DEFAULT_MESSAGE, LOADING_TEXT};
use crate::style::{ColorPalette, ComplicationId, Configuration};
use crate::text::{wrap, FontId, TextMetrics};

const HOUR_MARKS: [&str; 4] = ["3", "6", "9", "12"];

const SECONDS_PER_HOUR_ROTATION: u32 = 12 * 60 * 60;
const SECONDS_PER_MINUTE_ROTATION: u32 = 60 * 60;
const SECONDS_PER_SECOND_ROTATION: u32 = 60;

// Ambient hand outline, pixels
const AMBIENT_STROKE_WIDTH: u32 = 2;
// Share of the surface width a status or detail line may use
const MESSAGE_WIDTH_FRACTION: f32 = 0.8;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum DrawMode {
    Interactive,
    Ambient,
}

// Which host layers this frame should paint
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Layers {
    pub base: bool,
    pub hands: bool,
}

impl Default for Layers {
    fn default() -> Self {
        Self { base: true, hands: true }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum PaintStyle {
    Fill,
    Stroke { width: u32 },
}

#[derive(Clone, Debug, PartialEq)]
pub enum DrawOp {
    Fill {
        color: Rgb888,
    },
    // Painted by the host's complication renderer
    Complication {
        slot: ComplicationId,
    },
    // Polygon rotated clockwise by `rotation_deg` about `pivot`
    Path {
        points: HandPath,
        style: PaintStyle,
        color: Rgb888,
        rotation_deg: f32,
        pivot: Vec2,
    },
    Text {
        content: String,
        position: Vec2,
        font: FontId,
        color: Rgb888,
        alignment: Alignment,
        baseline: Baseline,
    },
    // Filled disc with an outline of `stroke_width` in the same color
    Circle {
        center: Vec2,
        radius: f32,
        stroke_width: f32,
        color: Rgb888,
    },
}

pub struct FrameInput<'a> {
    pub time: NaiveDateTime,
    pub bounds: DrawBounds,
    pub mode: DrawMode,
    pub layers: Layers,
    pub configuration: &'a Configuration,
    pub palette: &'a ColorPalette,
    pub geometry: &'a HandGeometry,
    pub complications: &'a [ComplicationId],
    pub overlay_visible: bool,
    pub menu: Option<&'a MenuCache>,
    pub labels: &'a [String],
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct HandRotations {
    pub hour: f32,
    pub minute: f32,
    pub second: f32,
}

pub fn hand_rotations(second_of_day: u32) -> HandRotations {
    let turn = |period: u32| (second_of_day % period) as f32 * 360.0 / period as f32;
    HandRotations {
        hour: turn(SECONDS_PER_HOUR_ROTATION),
        minute: turn(SECONDS_PER_MINUTE_ROTATION),
        second: turn(SECONDS_PER_SECOND_ROTATION),
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum StatusBand {
    Breakfast,
    Lunch,
    Idle,
}

pub fn status_band(hour: u32) -> StatusBand {
    match hour {
        6..=9 => StatusBand::Breakfast,
        10..=12 => StatusBand::Lunch,
        _ => StatusBand::Idle,
    }
}

pub fn render(input: &FrameInput<'_>) -> Vec<DrawOp> {
    let mut ops = Vec::new();
    let palette = input.palette;
    let interactive = input.mode == DrawMode::Interactive;

    ops.push(DrawOp::Fill {
        color: if interactive {
            palette.active_background
        } else {
            palette.ambient_background
        },
    });

    ops.extend(
        input
            .complications
            .iter()
            .map(|&slot| DrawOp::Complication { slot }),
    );

    if input.layers.hands {
        push_hands(&mut ops, input);
    }

    if interactive && input.layers.base && input.configuration.draw_hour_pips {
        push_hour_pips(&mut ops, input);
    }

    push_labels(&mut ops, input);
    push_status(&mut ops, input);
    ops
}

fn push_hands(ops: &mut Vec<DrawOp>, input: &FrameInput<'_>) {
    let pivot = input.bounds.center();
    let rotations = hand_rotations(input.time.time().num_seconds_from_midnight());
    let (style, color) = match input.mode {
        DrawMode::Interactive => (PaintStyle::Fill, input.palette.active_primary),
        DrawMode::Ambient => (
            PaintStyle::Stroke {
                width: AMBIENT_STROKE_WIDTH,
            },
            input.palette.ambient_primary,
        ),
    };

    let hand = |points: &HandPath, rotation_deg: f32, color: Rgb888| DrawOp::Path {
        points: points.clone(),
        style,
        color,
        rotation_deg,
        pivot,
    };
    ops.push(hand(&input.geometry.hour, rotations.hour, color));
    ops.push(hand(&input.geometry.minute, rotations.minute, color));
    if input.mode == DrawMode::Interactive {
        ops.push(hand(
            &input.geometry.second,
            rotations.second,
            input.palette.active_secondary,
        ));
    }
}

fn push_hour_pips(ops: &mut Vec<DrawOp>, input: &FrameInput<'_>) {
    let config = input.configuration;
    let width = input.bounds.width as f32;
    let center = input.bounds.center();
    let color = input.palette.active_outer_element;

    let radius = config.number_radius_fraction * width;
    for (i, mark) in HOUR_MARKS.iter().enumerate() {
        let rotation = 0.5 * (i + 1) as f32 * core::f32::consts::PI;
        let dx = libm::sinf(rotation) * radius;
        let dy = -libm::cosf(rotation) * radius;
        ops.push(DrawOp::Text {
            content: (*mark).to_string(),
            position: Vec2::new(center.x + dx, center.y + dy),
            font: FontId::Marker,
            color,
            alignment: Alignment::Center,
            baseline: Baseline::Middle,
        });
    }

    let circle_radius = config.outer_circle_radius_fraction * width;
    let top_middle = Vec2::new(
        center.x,
        input.bounds.top as f32
            + width * (config.outer_circle_gap_fraction + config.outer_circle_radius_fraction),
    );
    for i in (0..12).filter(|i| i % 3 != 0) {
        ops.push(DrawOp::Circle {
            center: top_middle.rotate_about(center, i as f32 * 30.0),
            radius: circle_radius,
            stroke_width: circle_radius,
            color,
        });
    }
}

fn text_color(input: &FrameInput<'_>) -> Rgb888 {
    match input.mode {
        DrawMode::Interactive => input.palette.active_primary,
        DrawMode::Ambient => input.palette.ambient_primary,
    }
}

fn push_labels(ops: &mut Vec<DrawOp>, input: &FrameInput<'_>) {
    let center = input.bounds.center();
    let quarter = input.bounds.width as f32 / 4.0;
    let rows = [center.y - quarter - 10.0, center.y - quarter + 20.0];
    for (label, y) in input.labels.iter().zip(rows) {
        ops.push(DrawOp::Text {
            content: label.clone(),
            position: Vec2::new(center.x, y),
            font: FontId::Label,
            color: text_color(input),
            alignment: Alignment::Center,
            baseline: Baseline::Alphabetic,
        });
    }
}

fn push_status(ops: &mut Vec<DrawOp>, input: &FrameInput<'_>) {
    let center = input.bounds.center();
    let width = input.bounds.width as f32;
    let status_y = center.y + width / 6.0;
    let detail_y = center.y + width / 4.0;

    let today = input.menu.and_then(|menu| menu.for_date(input.time.date()));
    let Some(day) = today else {
        push_message(ops, input, LOADING_TEXT, status_y);
        return;
    };

    let meal = match status_band(input.time.hour()) {
        StatusBand::Breakfast => &day.breakfast,
        StatusBand::Lunch => &day.lunch,
        StatusBand::Idle => {
            push_message(ops, input, DEFAULT_MESSAGE, status_y);
            return;
        }
    };
    push_message(ops, input, &meal.primary, status_y);
    if input.overlay_visible {
        push_message(ops, input, &meal.detail, detail_y);
    }
}

fn push_message(ops: &mut Vec<DrawOp>, input: &FrameInput<'_>, text: &str, start_y: f32) {
    let font = FontId::Message;
    let max_width = input.bounds.width as f32 * MESSAGE_WIDTH_FRACTION;
    let x = input.bounds.center().x;
    let mut y = start_y;
    for line in wrap(text, max_width, &font) {
        ops.push(DrawOp::Text {
            content: line.to_string(),
            position: Vec2::new(x, y),
            font,
            color: text_color(input),
            alignment: Alignment::Center,
            baseline: Baseline::Alphabetic,
        });
        y += font.line_height();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::menu::{DayMenu, MealEntry, MenuDays, CLOSED_TEXT};
    use chrono::NaiveDate;

    struct Fixture {
        configuration: Configuration,
        palette: ColorPalette,
        geometry: HandGeometry,
        labels: Vec<String>,
        menu: MenuCache,
        bounds: DrawBounds,
    }

    impl Fixture {
        fn new() -> Self {
            let configuration = Configuration::default();
            let bounds = DrawBounds::square(454);
            let mut days = MenuDays::new();
            days.push(DayMenu {
                breakfast: MealEntry::new("Breakfast porridge", "kimchi, seaweed soup"),
                lunch: MealEntry::new("Lunch noodles", "dumplings"),
            })
            .unwrap();
            Self {
                palette: ColorPalette::from(&configuration),
                geometry: HandGeometry::build(&bounds, &configuration),
                configuration,
                labels: vec!["North Campus".into(), "Dining Hall".into()],
                menu: MenuCache::new(date(), days),
                bounds,
            }
        }

        fn input(&self, time: NaiveDateTime) -> FrameInput<'_> {
            FrameInput {
                time,
                bounds: self.bounds,
                mode: DrawMode::Interactive,
                layers: Layers::default(),
                configuration: &self.configuration,
                palette: &self.palette,
                geometry: &self.geometry,
                complications: &[],
                overlay_visible: false,
                menu: Some(&self.menu),
                labels: &self.labels,
            }
        }
    }

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, 14).unwrap()
    }

    fn at(h: u32, m: u32, s: u32) -> NaiveDateTime {
        date().and_hms_opt(h, m, s).unwrap()
    }

    fn texts(ops: &[DrawOp]) -> Vec<&str> {
        ops.iter()
            .filter_map(|op| match op {
                DrawOp::Text { content, .. } => Some(content.as_str()),
                _ => None,
            })
            .collect()
    }

    fn rotations(ops: &[DrawOp]) -> Vec<f32> {
        ops.iter()
            .filter_map(|op| match op {
                DrawOp::Path { rotation_deg, .. } => Some(*rotation_deg),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn rotations_follow_second_of_day() {
        assert_eq!(hand_rotations(0), HandRotations { hour: 0.0, minute: 0.0, second: 0.0 });
        assert_eq!(hand_rotations(1800).minute, 180.0);
        assert_eq!(hand_rotations(21600).hour, 180.0);
        assert_eq!(hand_rotations(45).second, 270.0);
    }

    #[test]
    fn status_bands_cover_meal_hours() {
        assert_eq!(status_band(5), StatusBand::Idle);
        assert_eq!(status_band(6), StatusBand::Breakfast);
        assert_eq!(status_band(9), StatusBand::Breakfast);
        assert_eq!(status_band(10), StatusBand::Lunch);
        assert_eq!(status_band(12), StatusBand::Lunch);
        assert_eq!(status_band(13), StatusBand::Idle);
    }

    #[test]
    fn same_input_renders_same_ops() {
        let f = Fixture::new();
        let input = f.input(at(7, 15, 30));
        assert_eq!(render(&input), render(&input));
    }

    #[test]
    fn interactive_frame_order() {
        let f = Fixture::new();
        let slots = [ComplicationId(100), ComplicationId(101)];
        let input = FrameInput {
            complications: &slots,
            ..f.input(at(0, 0, 0))
        };
        let ops = render(&input);

        assert_eq!(ops[0], DrawOp::Fill { color: f.palette.active_background });
        assert_eq!(ops[1], DrawOp::Complication { slot: ComplicationId(100) });
        assert_eq!(ops[2], DrawOp::Complication { slot: ComplicationId(101) });
        assert_eq!(rotations(&ops), vec![0.0, 0.0, 0.0]);

        let pips = ops.iter().filter(|op| matches!(op, DrawOp::Circle { .. })).count();
        assert_eq!(pips, 8);
        assert_eq!(&texts(&ops)[..4], &["3", "6", "9", "12"]);
    }

    #[test]
    fn ambient_strokes_two_hands_without_pips() {
        let f = Fixture::new();
        let input = FrameInput {
            mode: DrawMode::Ambient,
            ..f.input(at(6, 0, 0))
        };
        let ops = render(&input);

        assert_eq!(ops[0], DrawOp::Fill { color: f.palette.ambient_background });
        assert_eq!(rotations(&ops), vec![180.0, 0.0]);
        assert!(ops.iter().all(|op| !matches!(op, DrawOp::Circle { .. })));
        assert!(ops.iter().any(|op| matches!(
            op,
            DrawOp::Path { style: PaintStyle::Stroke { .. }, .. }
        )));
    }

    #[test]
    fn hidden_layers_skip_hands_and_pips() {
        let f = Fixture::new();
        let input = FrameInput {
            layers: Layers { base: false, hands: false },
            ..f.input(at(8, 0, 0))
        };
        let ops = render(&input);
        assert!(rotations(&ops).is_empty());
        assert!(ops.iter().all(|op| !matches!(op, DrawOp::Circle { .. })));
        assert_eq!(texts(&ops)[0], "North Campus");
    }

    #[test]
    fn pip_circles_sit_on_the_rim() {
        let f = Fixture::new();
        let ops = render(&f.input(at(0, 0, 0)));
        let center = f.bounds.center();
        let width = f.bounds.width as f32;
        let c = &f.configuration;
        let top_middle_y = f.bounds.top as f32 + width * (c.outer_circle_gap_fraction + c.outer_circle_radius_fraction);
        let rim = center.y - top_middle_y;
        let circles: Vec<_> = ops
            .iter()
            .filter_map(|op| match op {
                DrawOp::Circle { center, .. } => Some(*center),
                _ => None,
            })
            .collect();
        for p in circles {
            let d = libm::sqrtf((p.x - center.x).powi(2) + (p.y - center.y).powi(2));
            assert!((d - rim).abs() < 0.01);
        }
    }

    #[test]
    fn status_line_follows_hour() {
        let f = Fixture::new();
        let breakfast = texts(&render(&f.input(at(7, 0, 0)))).join("");
        assert!(breakfast.contains("Breakfast porridge"));
        let lunch = texts(&render(&f.input(at(11, 59, 0)))).join("");
        assert!(lunch.contains("Lunch noodles"));
        let evening = texts(&render(&f.input(at(18, 0, 0)))).join("");
        assert!(evening.contains(DEFAULT_MESSAGE));
    }

    #[test]
    fn missing_day_shows_loading() {
        let f = Fixture::new();
        let tomorrow = (date() + chrono::Days::new(1)).and_hms_opt(7, 0, 0).unwrap();
        assert!(texts(&render(&f.input(tomorrow))).contains(&LOADING_TEXT));
        let no_cache = FrameInput {
            menu: None,
            ..f.input(at(7, 0, 0))
        };
        assert!(texts(&render(&no_cache)).contains(&LOADING_TEXT));
    }

    #[test]
    fn overlay_adds_detail_line_below_status() {
        let f = Fixture::new();
        let plain = render(&f.input(at(10, 30, 0)));
        assert!(!texts(&plain).contains(&"dumplings"));

        let overlay = FrameInput {
            overlay_visible: true,
            ..f.input(at(10, 30, 0))
        };
        let ops = render(&overlay);
        let center = f.bounds.center();
        let detail = ops.iter().find_map(|op| match op {
            DrawOp::Text { content, position, .. } if content == "dumplings" => Some(*position),
            _ => None,
        });
        assert_eq!(detail, Some(Vec2::new(center.x, center.y + 454.0 / 4.0)));

        // no detail outside meal bands
        let evening = FrameInput {
            overlay_visible: true,
            ..f.input(at(20, 0, 0))
        };
        assert!(!texts(&render(&evening)).contains(&"dumplings"));
    }

    #[test]
    fn closed_meal_is_shown_as_is() {
        let mut f = Fixture::new();
        f.menu.days[0] = DayMenu::closed();
        assert!(texts(&render(&f.input(at(8, 0, 0)))).contains(&CLOSED_TEXT));
    }

    #[test]
    fn long_status_wraps_by_line_height() {
        let mut f = Fixture::new();
        let long = "Breakfast rice with grilled mackerel and spinach side dishes and a fried egg";
        f.menu.days[0].breakfast = MealEntry::new(long, "");
        let ops = render(&f.input(at(7, 0, 0)));
        let lines: Vec<_> = ops
            .iter()
            .filter_map(|op| match op {
                DrawOp::Text { content, position, font: FontId::Message, .. } => Some((content.clone(), *position)),
                _ => None,
            })
            .collect();

        assert!(lines.len() > 1);
        let joined: String = lines.iter().map(|(l, _)| l.as_str()).collect();
        assert_eq!(joined, long);
        let max_width = 454.0 * MESSAGE_WIDTH_FRACTION;
        for (i, (line, pos)) in lines.iter().enumerate() {
            assert!(FontId::Message.text_width(line) <= max_width);
            let expected = f.bounds.center().y + 454.0 / 6.0 + i as f32 * FontId::Message.line_height();
            assert!((pos.y - expected).abs() < 1e-3);
        }
    }
}
