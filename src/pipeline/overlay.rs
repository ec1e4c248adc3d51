use std::convert::Infallible;

use embedded_graphics::{
    mono_font::{MonoTextStyle, ascii::FONT_10X20},
    pixelcolor::Rgb888,
    prelude::*,
    primitives::{Circle, Line, PrimitiveStyle, PrimitiveStyleBuilder, Rectangle, StrokeAlignment},
    text::{Baseline, Text},
};

use super::Renderer;
use crate::{
    landmark::{CONNECTIONS, FrameSize},
    types::{Annotation, Frame},
};

const SKELETON_LINE_THICKNESS: u32 = 3;
const POINT_DIAMETER: u32 = 9;
const REGION_STROKE: u32 = 2;
const TEXT_LEFT: i32 = 10;
const TEXT_TOP: i32 = 10;
const LINE_HEIGHT: i32 = 30;

const LINE_COLOR: Rgb888 = Rgb888::new(56, 189, 248);
const POINT_COLOR: Rgb888 = Rgb888::new(248, 113, 113);
const REGION_COLOR: Rgb888 = Rgb888::new(0, 0, 255);
const TEXT_COLOR: Rgb888 = Rgb888::new(0, 255, 0);
const REJECTED_COLOR: Rgb888 = Rgb888::new(255, 165, 0);

/// Draws the region, the hand skeleton and the per-finger text straight
/// into the frame's RGBA buffer.
#[derive(Clone, Copy, Debug, Default)]
pub struct OverlayRenderer;

impl Renderer for OverlayRenderer {
    fn annotate(&mut self, mut frame: Frame, annotation: &Annotation) -> Frame {
        let (width, height) = (frame.width, frame.height);
        let mut target = RgbaTarget {
            buffer: &mut frame.rgba,
            width,
            height,
        };

        if let Some(region) = &annotation.region {
            let rect = Rectangle::new(
                Point::new(region.x, region.y),
                Size::new(region.width.max(0) as u32, region.height.max(0) as u32),
            );
            let style = PrimitiveStyleBuilder::new()
                .stroke_color(REGION_COLOR)
                .stroke_width(REGION_STROKE)
                .stroke_alignment(StrokeAlignment::Inside)
                .build();
            draw_infallible(rect.into_styled(style), &mut target);
        }

        if let Some(hand) = &annotation.hand {
            let points = hand.landmarks.pixel_points(FrameSize::new(width, height));
            draw_skeleton(&mut target, &points);

            let mut lines = hand.text_lines();
            lines.push(hand.summary_line());
            for (row, line) in lines.iter().enumerate() {
                draw_text(&mut target, line, row as i32, TEXT_COLOR);
            }
        } else if annotation.outside_region {
            draw_text(&mut target, "Hand outside region", 0, REJECTED_COLOR);
        }

        frame
    }
}

fn draw_skeleton(target: &mut RgbaTarget<'_>, points: &[(f32, f32)]) {
    let to_point = |&(x, y): &(f32, f32)| Point::new(x as i32, y as i32);

    let line_style = PrimitiveStyle::with_stroke(LINE_COLOR, SKELETON_LINE_THICKNESS);
    for &(a, b) in CONNECTIONS {
        if let (Some(pa), Some(pb)) = (points.get(a), points.get(b)) {
            let line = Line::new(to_point(pa), to_point(pb));
            draw_infallible(line.into_styled(line_style), target);
        }
    }

    let point_style = PrimitiveStyle::with_fill(POINT_COLOR);
    for p in points {
        let circle = Circle::with_center(to_point(p), POINT_DIAMETER);
        draw_infallible(circle.into_styled(point_style), target);
    }
}

fn draw_text(target: &mut RgbaTarget<'_>, line: &str, row: i32, color: Rgb888) {
    let style = MonoTextStyle::new(&FONT_10X20, color);
    let origin = Point::new(TEXT_LEFT, TEXT_TOP + row * LINE_HEIGHT);
    draw_infallible(Text::with_baseline(line, origin, style, Baseline::Top), target);
}

fn draw_infallible<D>(drawable: D, target: &mut RgbaTarget<'_>)
where
    D: Drawable<Color = Rgb888>,
{
    match drawable.draw(target) {
        Ok(_) => {}
        Err(infallible) => match infallible {},
    }
}

struct RgbaTarget<'a> {
    buffer: &'a mut [u8],
    width: u32,
    height: u32,
}

impl Dimensions for RgbaTarget<'_> {
    fn bounding_box(&self) -> Rectangle {
        Rectangle::new(Point::zero(), Size::new(self.width, self.height))
    }
}

impl DrawTarget for RgbaTarget<'_> {
    type Color = Rgb888;
    type Error = Infallible;

    fn draw_iter<I>(&mut self, pixels: I) -> Result<(), Self::Error>
    where
        I: IntoIterator<Item = Pixel<Self::Color>>,
    {
        let (width, height) = (self.width as i32, self.height as i32);
        for Pixel(point, color) in pixels {
            if point.x < 0 || point.y < 0 || point.x >= width || point.y >= height {
                continue;
            }
            let idx = (point.y as usize * self.width as usize + point.x as usize) * 4;
            if let Some(px) = self.buffer.get_mut(idx..idx + 4) {
                px.copy_from_slice(&[color.r(), color.g(), color.b(), 255]);
            }
        }
        Ok(())
    }
}
