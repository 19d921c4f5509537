//! Replays compositor output onto any RGB565 `DrawTarget`, plus an owned
//! framebuffer target for the host simulator and tests.

use core::convert::Infallible;
use std::io::{self, Write};

use embedded_graphics::{
    mono_font::MonoTextStyle,
    pixelcolor::{raw::RawU16, Rgb565, Rgb888},
    prelude::*,
    primitives::{Circle, PointsIter, Polyline, PrimitiveStyle, PrimitiveStyleBuilder, Rectangle, Triangle},
    text::{Text, TextStyleBuilder},
};

use crate::compositor::{DrawOp, PaintStyle};
use crate::geometry::Vec2;
use crate::style::ComplicationId;

/// Paints complication slots; the face only knows their ids.
pub trait ComplicationRenderer<D: DrawTarget<Color = Rgb565>> {
    fn render(&mut self, slot: ComplicationId, target: &mut D) -> Result<(), D::Error>;
}

// Renderer for hosts without complications
pub struct SkipComplications;

impl<D: DrawTarget<Color = Rgb565>> ComplicationRenderer<D> for SkipComplications {
    fn render(&mut self, _slot: ComplicationId, _target: &mut D) -> Result<(), D::Error> {
        Ok(())
    }
}

fn point(v: Vec2) -> Point {
    Point::new(libm::roundf(v.x) as i32, libm::roundf(v.y) as i32)
}

fn color(c: Rgb888) -> Rgb565 {
    Rgb565::from(c)
}

pub fn rasterize<D, C>(ops: &[DrawOp], target: &mut D, complications: &mut C) -> Result<(), D::Error>
where
    D: DrawTarget<Color = Rgb565>,
    C: ComplicationRenderer<D>,
{
    for op in ops {
        match op {
            DrawOp::Fill { color: c } => target.clear(color(*c))?,
            DrawOp::Complication { slot } => complications.render(*slot, target)?,
            DrawOp::Path {
                points,
                style,
                color: c,
                rotation_deg,
                pivot,
            } => {
                let rotated: Vec<Point> = points
                    .iter()
                    .map(|p| point(p.rotate_about(*pivot, *rotation_deg)))
                    .collect();
                draw_path(&rotated, *style, color(*c), target)?;
            }
            DrawOp::Text {
                content,
                position,
                font,
                color: c,
                alignment,
                baseline,
            } => {
                let character_style = MonoTextStyle::new(font.mono_font(), color(*c));
                let text_style = TextStyleBuilder::new()
                    .alignment(*alignment)
                    .baseline(*baseline)
                    .build();
                Text::with_text_style(content, point(*position), character_style, text_style)
                    .draw(target)?;
            }
            DrawOp::Circle {
                center,
                radius,
                stroke_width,
                color: c,
            } => {
                let diameter = libm::roundf(radius * 2.0).max(1.0) as u32;
                let style = PrimitiveStyleBuilder::new()
                    .fill_color(color(*c))
                    .stroke_color(color(*c))
                    .stroke_width(libm::roundf(*stroke_width) as u32)
                    .build();
                Circle::with_center(point(*center), diameter)
                    .into_styled(style)
                    .draw(target)?;
            }
        }
    }
    Ok(())
}

fn draw_path<D>(points: &[Point], style: PaintStyle, c: Rgb565, target: &mut D) -> Result<(), D::Error>
where
    D: DrawTarget<Color = Rgb565>,
{
    let Some((&first, rest)) = points.split_first() else {
        return Ok(());
    };
    match style {
        // Hands are convex, so a fan from the first vertex covers them
        PaintStyle::Fill => {
            let fill = PrimitiveStyle::with_fill(c);
            for pair in rest.windows(2) {
                Triangle::new(first, pair[0], pair[1])
                    .into_styled(fill)
                    .draw(target)?;
            }
        }
        PaintStyle::Stroke { width } => {
            let mut closed = points.to_vec();
            closed.push(first);
            Polyline::new(&closed)
                .into_styled(PrimitiveStyle::with_stroke(c, width))
                .draw(target)?;
        }
    }
    Ok(())
}

/// Owned RGB565 framebuffer, row-major.
#[derive(Clone, Debug)]
pub struct Framebuffer {
    width: u32,
    height: u32,
    pixels: Vec<u16>,
}

impl Framebuffer {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            pixels: vec![0; width as usize * height as usize],
        }
    }

    fn index(&self, p: Point) -> Option<usize> {
        if p.x < 0 || p.y < 0 || p.x as u32 >= self.width || p.y as u32 >= self.height {
            return None;
        }
        Some(p.y as usize * self.width as usize + p.x as usize)
    }

    pub fn pixel(&self, x: i32, y: i32) -> Option<Rgb565> {
        self.index(Point::new(x, y))
            .map(|i| Rgb565::from(RawU16::new(self.pixels[i])))
    }

    // Native-endian RGB565 words, ready to stream to a panel
    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.pixels)
    }

    pub fn count(&self, c: Rgb565) -> usize {
        let raw = c.into_storage();
        self.pixels.iter().filter(|&&p| p == raw).count()
    }

    // Binary PPM (P6) dump
    pub fn write_ppm(&self, mut out: impl Write) -> io::Result<()> {
        write!(out, "P6\n{} {}\n255\n", self.width, self.height)?;
        let mut row = Vec::with_capacity(self.width as usize * 3);
        for line in self.pixels.chunks(self.width.max(1) as usize) {
            row.clear();
            for &raw in line {
                let c = Rgb888::from(Rgb565::from(RawU16::new(raw)));
                row.extend_from_slice(&[c.r(), c.g(), c.b()]);
            }
            out.write_all(&row)?;
        }
        Ok(())
    }
}

impl OriginDimensions for Framebuffer {
    fn size(&self) -> Size {
        Size::new(self.width, self.height)
    }
}

impl DrawTarget for Framebuffer {
    type Color = Rgb565;
    type Error = Infallible;

    fn draw_iter<I>(&mut self, pixels: I) -> Result<(), Self::Error>
    where
        I: IntoIterator<Item = Pixel<Rgb565>>,
    {
        for Pixel(p, c) in pixels {
            if let Some(i) = self.index(p) {
                self.pixels[i] = c.into_storage();
            }
        }
        Ok(())
    }

    // Row-wise fast path for fills and images
    fn fill_contiguous<I>(&mut self, area: &Rectangle, colors: I) -> Result<(), Self::Error>
    where
        I: IntoIterator<Item = Rgb565>,
    {
        let visible = area.intersection(&self.bounding_box());
        if visible.size == area.size && !area.is_zero_sized() {
            let mut colors = colors.into_iter();
            let x0 = area.top_left.x as usize;
            let w = area.size.width as usize;
            for y in 0..area.size.height as usize {
                let base = (area.top_left.y as usize + y) * self.width as usize + x0;
                for dst in &mut self.pixels[base..base + w] {
                    match colors.next() {
                        Some(c) => *dst = c.into_storage(),
                        None => return Ok(()),
                    }
                }
            }
            return Ok(());
        }
        // Clipped: fall back to per-pixel
        self.draw_iter(
            area.points()
                .zip(colors)
                .map(|(p, c)| Pixel(p, c)),
        )
    }

    fn clear(&mut self, color: Rgb565) -> Result<(), Self::Error> {
        self.pixels.fill(color.into_storage());
        Ok(())
    }
}
