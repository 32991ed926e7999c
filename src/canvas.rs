//! Scratch screen used to find which pixels of a frame change anything

use crate::error::*;
use crate::frame::FrameRef;
use imgref::ImgVec;
use rgb::RGB8;

/// Screen-sized RGB buffer where every pixel starts transparent
#[derive(Debug, Clone)]
pub(crate) struct Canvas {
    pixels: ImgVec<Option<RGB8>>,
    transparent: usize,
}

impl Canvas {
    pub fn new(width: u16, height: u16) -> Self {
        let (width, height) = (usize::from(width), usize::from(height));
        Self {
            pixels: ImgVec::new(vec![None; width * height], width, height),
            transparent: width * height,
        }
    }

    /// Outside of the screen counts as transparent
    #[inline]
    pub fn get(&self, x: usize, y: usize) -> Option<RGB8> {
        if x >= self.pixels.width() || y >= self.pixels.height() {
            return None;
        }
        self.pixels[(x, y)]
    }

    #[inline]
    pub fn is_transparent(&self, x: usize, y: usize) -> bool {
        self.get(x, y).is_none()
    }

    /// Writes outside of the screen are dropped
    #[inline]
    pub fn set(&mut self, x: usize, y: usize, color: RGB8) {
        if x >= self.pixels.width() || y >= self.pixels.height() {
            return;
        }
        let px = &mut self.pixels[(x, y)];
        if px.is_none() {
            self.transparent -= 1;
        }
        *px = Some(color);
    }

    #[inline]
    pub fn has_transparent(&self) -> bool {
        self.transparent > 0
    }
}

/// Screen position of a frame's pixel
#[inline]
fn on_screen(frame: &FrameRef<'_>, x: usize, y: usize) -> (usize, usize) {
    let d = frame.descriptor();
    (usize::from(d.left()) + x, usize::from(d.top()) + y)
}

/// Whether drawing this frame pixel would change the canvas.
///
/// Transparent frame pixels never do. Opaque ones always do over transparent canvas.
pub(crate) fn differs(canvas: &Canvas, frame: &FrameRef<'_>, x: usize, y: usize) -> CatResult<bool> {
    let Some(color) = frame.visible_color(x, y)? else {
        return Ok(false);
    };
    let (cx, cy) = on_screen(frame, x, y);
    Ok(canvas.get(cx, cy) != Some(color))
}

/// Draws the frame's opaque pixels onto the canvas
pub(crate) fn blend(canvas: &mut Canvas, frame: &FrameRef<'_>) -> CatResult<()> {
    let (w, h) = (usize::from(frame.descriptor().width()), usize::from(frame.descriptor().height()));
    for y in 0..h {
        for x in 0..w {
            if let Some(color) = frame.visible_color(x, y)? {
                let (cx, cy) = on_screen(frame, x, y);
                canvas.set(cx, cy, color);
            }
        }
    }
    Ok(())
}

/// Blends the frame, unless one of its opaque pixels lands on a transparent canvas pixel
///
/// Returns false at the first such pixel, leaving the canvas partially updated.
pub(crate) fn overlays(canvas: &mut Canvas, frame: &FrameRef<'_>) -> CatResult<bool> {
    let (w, h) = (usize::from(frame.descriptor().width()), usize::from(frame.descriptor().height()));
    for y in 0..h {
        for x in 0..w {
            if let Some(color) = frame.visible_color(x, y)? {
                let (cx, cy) = on_screen(frame, x, y);
                if canvas.is_transparent(cx, cy) {
                    return Ok(false);
                }
                canvas.set(cx, cy, color);
            }
        }
    }
    Ok(true)
}

#[cfg(test)]
use crate::{frame::Frame, descriptor::FrameDescriptor, control::GraphicsControl, palette::PaletteTable};

#[test]
fn canvas_tracks_transparency() {
    let mut c = Canvas::new(2, 2);
    assert!(c.has_transparent());
    for (x, y) in [(0, 0), (1, 0), (0, 1), (1, 1), (1, 1), (5, 5)] {
        c.set(x, y, RGB8::new(1, 2, 3));
    }
    assert!(!c.has_transparent());
    assert!(c.is_transparent(2, 0));
    assert_eq!(c.get(1, 1), Some(RGB8::new(1, 2, 3)));
}

#[test]
fn diff_rules() {
    let global = PaletteTable::from_colors(vec![RGB8::new(0, 0, 0), RGB8::new(255, 0, 0)]).unwrap();
    let mut fd = FrameDescriptor::new(1, 0, 2, 1, 2).unwrap();
    fd.set_pixel(1, 0, 1).unwrap();
    let control = GraphicsControl { transparent: true, transparent_index: 1, ..Default::default() };
    let frame = Frame::new(fd, Some(control));
    let frame = FrameRef { frame: &frame, global: &global };

    let mut canvas = Canvas::new(3, 1);
    assert!(differs(&canvas, &frame, 0, 0).unwrap());
    assert!(!differs(&canvas, &frame, 1, 0).unwrap());
    canvas.set(1, 0, RGB8::new(0, 0, 0));
    assert!(!differs(&canvas, &frame, 0, 0).unwrap());
    canvas.set(1, 0, RGB8::new(0, 0, 1));
    assert!(differs(&canvas, &frame, 0, 0).unwrap());

    assert!(!overlays(&mut Canvas::new(3, 1), &frame).unwrap());
    let mut full = Canvas::new(3, 1);
    full.set(1, 0, RGB8::new(9, 9, 9));
    assert!(overlays(&mut full, &frame).unwrap());
    assert_eq!(full.get(1, 0), Some(RGB8::new(0, 0, 0)));
    assert!(full.is_transparent(2, 0));
}
