//! Shrinks animation frames to the area where they change something

use crate::canvas::*;
use crate::control::DisposalMethod;
use crate::downsize::*;
use crate::error::*;
use crate::palette::{rounded_len, size_to_bpp};

impl Downsizer<'_> {
    /// Whether all the middle frames keep what's under them
    pub(crate) fn keeps_frames(&self) -> bool {
        let n = self.src.frames.len();
        n < 3 || self.src.frames[1..n - 1].iter().all(keeps)
    }

    /// Whether after the first frame nothing new shows through transparent areas
    pub(crate) fn frames_overlay(&self) -> CatResult<bool> {
        let first = self.src_frame(0);
        let d = first.descriptor();
        if first.transparent_index().is_none() && (d.left(), d.top(), d.width(), d.height()) == (0, 0, self.src.width(), self.src.height()) {
            return Ok(true);
        }

        let mut canvas = Canvas::new(self.src.width(), self.src.height());
        blend(&mut canvas, &first)?;
        if !canvas.has_transparent() {
            return Ok(true);
        }
        for i in 1..self.src.frames.len() {
            if !overlays(&mut canvas, &self.src_frame(i))? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Every frame is drawn over what the previous ones left, so only the difference is kept
    ///
    /// Returns whether any frame got smaller or more transparent.
    pub(crate) fn crop_accumulated(&mut self) -> CatResult<bool> {
        let n = self.des.frames.len();
        self.reporter.start("Cropping", n as u64 - 1);
        self.des.frames[0].set_disposal(DisposalMethod::Keep)?;
        let mut canvas = Canvas::new(self.des.width(), self.des.height());
        blend(&mut canvas, &self.des_frame(0))?;

        let mut changed = false;
        for i in 1..n {
            changed |= self.crop_to_changes(i, &canvas)?;
            let before = self.des.frames[i].transparent_pixels();
            self.update(i, &mut canvas)?;
            self.des.frames[i].set_disposal(DisposalMethod::Keep)?;
            changed |= self.des.frames[i].transparent_pixels() > before;
            self.reporter.increase();
        }
        Ok(changed)
    }

    /// Every frame is drawn on a cleared screen, so only its opaque area is kept
    pub(crate) fn crop_independent(&mut self) -> CatResult<bool> {
        let n = self.des.frames.len();
        self.reporter.start("Cropping", n as u64);
        let canvas = Canvas::new(self.des.width(), self.des.height());

        let mut changed = false;
        for i in 0..n {
            changed |= self.crop_to_changes(i, &canvas)?;
            self.des.frames[i].set_disposal(DisposalMethod::Background)?;
            self.reporter.increase();
        }
        Ok(changed)
    }

    /// Crops the frame to the bounding box of pixels that differ from the canvas.
    ///
    /// A frame that changes nothing becomes a single pixel at its origin.
    pub(crate) fn crop_to_changes(&mut self, index: usize, canvas: &Canvas) -> CatResult<bool> {
        let frame = self.des_frame(index);
        let d = frame.descriptor();
        let (w, h) = (usize::from(d.width()), usize::from(d.height()));
        let mut diff = vec![false; w * h];
        for y in 0..h {
            for x in 0..w {
                diff[y * w + x] = differs(canvas, &frame, x, y)?;
            }
        }

        let rows: Vec<bool> = (0..h).map(|y| diff[y * w..(y + 1) * w].iter().any(|&d| d)).collect();
        let (left, top, width, height) = match rows.iter().position(|&r| r) {
            None => (0, 0, 1, 1),
            Some(top) => {
                let bottom = rows.iter().rposition(|&r| r).unwrap_or(top);
                let column = |x: usize| (top..=bottom).any(|y| diff[y * w + x]);
                let left = (0..w).find(|&x| column(x)).unwrap_or(0);
                let right = (0..w).rev().find(|&x| column(x)).unwrap_or(left);
                (left, top, right - left + 1, bottom - top + 1)
            },
        };
        if (left, top, width, height) == (0, 0, w, h) {
            return Ok(false);
        }

        let (x, y) = (d.left() + left as u16, d.top() + top as u16);
        self.des.frames[index].descriptor.crop(x, y, width as u16, height as u16)?;
        Ok(true)
    }

    /// Draws the frame's changes onto the canvas, and turns pixels that change nothing transparent
    fn update(&mut self, index: usize, canvas: &mut Canvas) -> CatResult<()> {
        self.assign_transparent_index(index)?;

        let frame = self.des_frame(index);
        let d = frame.descriptor();
        let (w, h) = (usize::from(d.width()), usize::from(d.height()));
        let (left, top) = (usize::from(d.left()), usize::from(d.top()));
        let transparent = frame.transparent_index();
        let mut indices: Vec<u8> = d.pixels().pixels().collect();
        let mut hidden = 0;
        for y in 0..h {
            for x in 0..w {
                if differs(canvas, &frame, x, y)? {
                    canvas.set(left + x, top + y, frame.pixel_color(x, y)?);
                } else if let Some(t) = transparent {
                    indices[y * w + x] = t;
                    hidden += 1;
                }
            }
        }

        let mut bpp = d.bits_per_pixel();
        if let Some(t) = transparent.filter(|&t| u16::from(t) >= 1 << bpp) {
            bpp = size_to_bpp(rounded_len(usize::from(t) + 1));
        }
        let des = &mut self.des.frames[index];
        des.descriptor.replace_pixels(indices, bpp);
        if hidden == 0 {
            des.clear_transparency();
        }
        Ok(())
    }

    /// Picks the lowest palette entry the frame doesn't draw with
    fn assign_transparent_index(&mut self, index: usize) -> CatResult<()> {
        let frame = self.des_frame(index);
        if frame.transparent_index().is_some() {
            return Ok(());
        }
        let mut hits = [0u32; 256];
        for i in frame.descriptor().pixels().pixels() {
            hits[usize::from(i)] += 1;
        }
        let len = frame.active_table().len();
        if let Some(t) = hits[..len].iter().position(|&h| h == 0) {
            let mut frame = self.des_frame_mut(index);
            frame.ensure_control();
            frame.set_transparent_index(Some(t as u8))?;
        }
        Ok(())
    }
}

#[cfg(test)]
use crate::{gif::Gif, progress::NoProgress};
#[cfg(test)]
use rgb::RGB8;

#[cfg(test)]
fn two_frames() -> Gif {
    let mut gif = Gif::new(2, 10, 10, 2, true).unwrap();
    gif.set_color(1, RGB8::new(255, 0, 0)).unwrap();
    for x in 3..6 {
        for y in 4..7 {
            gif.frame_mut(1).unwrap().set_pixel(x, y, 1).unwrap();
        }
    }
    gif
}

#[test]
fn accumulated_crop() {
    let gif = two_frames();
    let mut reporter = NoProgress {};
    let mut d = Downsizer { src: gif.clone(), des: gif, reporter: &mut reporter };
    assert!(d.keeps_frames());
    assert!(d.frames_overlay().unwrap());
    assert!(d.crop_accumulated().unwrap());

    let f = d.des_frame(1);
    let fd = f.descriptor();
    assert_eq!((fd.left(), fd.top(), fd.width(), fd.height()), (3, 4, 3, 3));
    assert!(fd.pixels().pixels().all(|p| p == 1));
    assert_eq!(f.transparent_index(), None);
    assert_eq!(d.des_frame(0).descriptor().width(), 10);
}

#[test]
fn unchanged_frame_shrinks_to_a_pixel() {
    let gif = Gif::new(2, 4, 4, 2, true).unwrap();
    let mut reporter = NoProgress {};
    let mut d = Downsizer { src: gif.clone(), des: gif, reporter: &mut reporter };
    assert!(d.crop_accumulated().unwrap());
    let f = d.des_frame(1);
    assert_eq!((f.descriptor().width(), f.descriptor().height()), (1, 1));
    assert_eq!(f.transparent_index(), Some(1));
    assert_eq!(f.descriptor().pixel(0, 0).unwrap(), 1);
}

#[test]
fn independent_crop() {
    let mut gif = two_frames();
    for frame in &mut gif.frames {
        frame.ensure_control().transparent = true;
        frame.ensure_control().transparent_index = 0;
    }
    let mut reporter = NoProgress {};
    let mut d = Downsizer { src: gif.clone(), des: gif, reporter: &mut reporter };
    assert!(d.crop_independent().unwrap());
    let f = d.des_frame(1);
    assert_eq!((f.descriptor().left(), f.descriptor().top(), f.descriptor().width()), (3, 4, 3));
    assert_eq!(f.disposal(), DisposalMethod::Background);
    assert_eq!(d.des_frame(0).descriptor().width(), 1);
}

#[test]
fn see_through_first_frame() {
    let mut gif = two_frames();
    gif.frames[0].ensure_control().transparent = true;
    gif.frames[0].ensure_control().transparent_index = 0;
    gif.frames[0].descriptor.set_pixel(0, 0, 1).unwrap();
    let mut reporter = NoProgress {};
    let d = Downsizer { src: gif.clone(), des: gif, reporter: &mut reporter };
    assert!(!d.frames_overlay().unwrap());
}
