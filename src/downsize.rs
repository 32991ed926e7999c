//! Lossless size reduction of a parsed GIF
//!
//! Works on two copies of the image: `src` is what the file looked like after cleanup,
//! and `des` collects the changes. Every pass reads pixel colors from `src` and writes indices into `des`.

use crate::control::DisposalMethod;
use crate::error::*;
use crate::frame::*;
use crate::gif::*;
use crate::palette::*;
use crate::progress::ProgressReporter;
use crate::record::Extension;
use crate::Settings;
use rgb::RGB8;
use std::collections::BTreeSet;

pub(crate) type ColorSet = BTreeSet<RGB8>;

/// Which palette of `des` a pass is rebuilding
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub(crate) enum TableOwner {
    Global,
    Local(usize),
}

pub(crate) struct Downsizer<'r> {
    pub(crate) src: Gif,
    pub(crate) des: Gif,
    pub(crate) reporter: &'r mut dyn ProgressReporter,
}

/// Result of [`downsize`]
#[derive(Debug, Clone)]
pub struct Outcome {
    pub before: Summary,
    pub after: Summary,
    pub original_len: usize,
    pub output_len: usize,
    /// Only set when the new file is strictly smaller
    pub output: Option<Vec<u8>>,
}

impl Outcome {
    #[inline]
    pub fn is_smaller(&self) -> bool {
        self.output.is_some()
    }
}

/// Parses, optimizes and re-encodes a GIF file.
///
/// The output is kept only if it's smaller than the input. Malformed input is an error.
pub fn downsize(data: &[u8], settings: &Settings, reporter: &mut dyn ProgressReporter) -> CatResult<Outcome> {
    let gif = Gif::from_bytes(data)?;
    let before = gif.summary();
    let optimized = optimize(gif, reporter)?;
    let after = optimized.summary();
    let bytes = optimized.to_bytes(settings)?;
    let output_len = bytes.len();
    reporter.done(&format!("{} -> {output_len} bytes", data.len()));

    Ok(Outcome {
        before,
        after,
        original_len: data.len(),
        output_len,
        output: (output_len < data.len()).then_some(bytes),
    })
}

/// Runs all the passes on an in-memory GIF. The result looks the same when played.
pub fn optimize(mut gif: Gif, reporter: &mut dyn ProgressReporter) -> CatResult<Gif> {
    if gif.frames.is_empty() {
        return Ok(gif);
    }
    repair_resolution(&mut gif);
    clamp_to_screen(&mut gif)?;
    drop_unused_transparency(&mut gif);
    if gif.frames.len() > 1 {
        for frame in &mut gif.frames {
            frame.ensure_control();
        }
    }
    remove_single_pixel_frames(&mut gif);
    remove_duplicates(&mut gif, reporter);

    let mut d = Downsizer { des: gif.clone(), src: gif, reporter };
    if !d.src.frames().all(|f| colors_resolve(&f)) {
        // Pixels without a color can't be compared or remapped
        d.reduce_bpp()?;
        return Ok(d.des);
    }
    if d.src.frames.len() == 1 {
        d.downsize_single()?;
    } else {
        d.downsize_multi()?;
    }
    Ok(d.des)
}

/// Makes the declared color resolution and code sizes agree with the palettes
fn repair_resolution(gif: &mut Gif) {
    let global_len = gif.global_table.len();
    if gif.screen.flags.present && global_len != 1 << gif.screen.resolution {
        gif.screen.resolution = size_to_bpp(global_len);
    }

    for frame in &mut gif.frames {
        let len = frame.descriptor.local_table().map_or(global_len, |t| t.len());
        if len == 0 || len == 1 << frame.descriptor.bits_per_pixel() {
            continue;
        }
        let bpp = size_to_bpp(len);
        let fits = frame.descriptor.max_index().map_or(true, |max| u16::from(max) < 1 << bpp);
        if fits {
            frame.descriptor.force_bits_per_pixel(bpp);
        }
    }
}

/// Crops frames that stick out of the screen. Frames entirely off-screen are left alone.
fn clamp_to_screen(gif: &mut Gif) -> CatResult<()> {
    let (width, height) = (gif.screen.width, gif.screen.height);
    for frame in &mut gif.frames {
        let d = &mut frame.descriptor;
        if d.left() >= width || d.top() >= height {
            continue;
        }
        let (left, top) = (d.left(), d.top());
        let (w, h) = (d.width().min(width - left), d.height().min(height - top));
        if (w, h) != (d.width(), d.height()) {
            d.crop(left, top, w, h)?;
        }
    }
    Ok(())
}

fn drop_unused_transparency(gif: &mut Gif) {
    for frame in &mut gif.frames {
        if frame.transparent_index().is_some() && frame.transparent_pixels() == 0 {
            frame.clear_transparency();
        }
    }
}

/// 1×1 frames are usually there only to add delay
fn remove_single_pixel_frames(gif: &mut Gif) {
    let dropped: Vec<bool> = gif.frames.iter().enumerate()
        .map(|(i, f)| i > 0 && f.descriptor.width() == 1 && f.descriptor.height() == 1)
        .collect();
    fold_dropped_frames(gif, &dropped);
}

/// Collapses runs of frames that look the same into the first of the run
fn remove_duplicates(gif: &mut Gif, reporter: &mut dyn ProgressReporter) {
    let n = gif.frames.len();
    let mut dropped = vec![false; n];
    reporter.start("Duplicates", n as u64 - 1);
    let (mut i, mut j) = (0, 1);
    while j < n {
        reporter.increase();
        if gif.frame(i) == gif.frame(j) {
            dropped[j] = true;
            j += 1;
        } else {
            i = j;
            j = i + 1;
        }
    }
    fold_dropped_frames(gif, &dropped);
}

/// Removes the marked frames, adding their delay to the previous kept frame.
///
/// Their extensions move forward to the next kept frame, or the end of the file.
fn fold_dropped_frames(gif: &mut Gif, dropped: &[bool]) {
    if !dropped.iter().any(|&d| d) {
        return;
    }
    let mut carried: Vec<Extension> = Vec::new();
    let old = std::mem::take(&mut gif.frames);
    for (mut frame, &drop) in old.into_iter().zip(dropped) {
        if drop {
            if let Some(control) = gif.frames.last_mut().and_then(|last| last.control.as_mut()) {
                control.delay = control.delay.saturating_add(frame.delay());
            }
            carried.append(&mut frame.extensions);
        } else {
            if !carried.is_empty() {
                carried.append(&mut frame.extensions);
                frame.extensions = std::mem::take(&mut carried);
            }
            gif.frames.push(frame);
        }
    }
    if !carried.is_empty() {
        carried.append(&mut gif.trailing);
        gif.trailing = carried;
    }
}

impl Downsizer<'_> {
    #[inline]
    pub(crate) fn src_frame(&self, index: usize) -> FrameRef<'_> {
        FrameRef { frame: &self.src.frames[index], global: &self.src.global_table }
    }

    #[inline]
    pub(crate) fn des_frame(&self, index: usize) -> FrameRef<'_> {
        FrameRef { frame: &self.des.frames[index], global: &self.des.global_table }
    }

    #[inline]
    pub(crate) fn des_frame_mut(&mut self, index: usize) -> FrameMut<'_> {
        FrameMut { frame: &mut self.des.frames[index], global: &self.des.global_table }
    }

    /// Keeps only the colors the image uses
    fn downsize_single(&mut self) -> CatResult<()> {
        if self.src.frames[0].descriptor.has_local_table() {
            self.des.resize_color_table(0)?;
            self.downsize_local_table(0)?;
            return Ok(());
        }

        let colors = colors_in_use(&self.src_frame(0))?;
        if rounded_len(colors.len()) == self.src.global_table.len() {
            return Ok(());
        }
        self.reset_color_table(TableOwner::Global, &colors)?;
        self.reset_transparency(0, TableOwner::Global, colors.len())?;
        self.reset_image(0, TableOwner::Global)
    }

    fn downsize_multi(&mut self) -> CatResult<()> {
        let cropped = if self.src.width() == 0 || self.src.height() == 0 {
            false
        } else if self.keeps_frames() || self.frames_overlay()? {
            self.crop_accumulated()?
        } else {
            self.crop_independent()?
        };
        if cropped {
            self.src = self.des.clone();
        }

        self.reporter.start("Palettes", self.src.frames.len() as u64);
        if !self.single_color_table()? && !self.common_color_table()? {
            self.downsize_local_tables()?;
        }
        self.reduce_bpp()
    }

    /// Smallest code size that fits the largest index each frame uses
    fn reduce_bpp(&mut self) -> CatResult<()> {
        for frame in &mut self.des.frames {
            let max = usize::from(frame.descriptor.max_index().unwrap_or(0));
            let bpp = size_to_bpp(rounded_len(max + 1));
            if bpp != frame.descriptor.bits_per_pixel() {
                frame.descriptor.set_bits_per_pixel(bpp)?;
            }
        }
        Ok(())
    }
}

/// Whether every opaque pixel's index is inside the palette in effect
fn colors_resolve(frame: &FrameRef<'_>) -> bool {
    let len = frame.active_table().len();
    frame.descriptor().pixels().pixels().all(|i| frame.is_transparent_index(i) || usize::from(i) < len)
}

/// Every color a frame's pixels show, plus its transparent color if it's in the palette
pub(crate) fn colors_in_use(frame: &FrameRef<'_>) -> CatResult<ColorSet> {
    let mut used = [false; 256];
    for index in frame.descriptor().pixels().pixels() {
        used[usize::from(index)] = true;
    }
    let transparent = frame.transparent_index();
    let mut colors = ColorSet::new();
    for (index, _) in used.iter().enumerate().filter(|(_, &u)| u) {
        if transparent != Some(index as u8) {
            colors.insert(frame.color(index as u8)?);
        }
    }
    if let Some(color) = transparent.and_then(|t| frame.color(t).ok()) {
        colors.insert(color);
    }
    Ok(colors)
}

/// Whether every color of `b` is in `a`. Never true for an empty `b`.
pub(crate) fn contains(a: &ColorSet, b: &ColorSet) -> bool {
    !b.is_empty() && a.len() >= b.len() && b.is_subset(a)
}

#[inline]
pub(crate) fn keeps(frame: &Frame) -> bool {
    frame.disposal() == DisposalMethod::Keep
}

#[cfg(test)]
fn set(colors: &[u8]) -> ColorSet {
    colors.iter().map(|&c| RGB8::new(c, c, c)).collect()
}

#[test]
fn containment() {
    let a = set(&[1, 2, 3]);
    assert!(contains(&a, &a));
    assert!(contains(&a, &set(&[3, 1])));
    assert!(!contains(&a, &ColorSet::new()));
    assert!(!contains(&ColorSet::new(), &ColorSet::new()));
    assert!(!contains(&set(&[1]), &a));
    assert!(!contains(&a, &set(&[1, 4])));
}

#[test]
fn folding_frames() {
    let mut gif = Gif::new(2, 4, 4, 4, true).unwrap();
    for (i, frame) in gif.frames.iter_mut().enumerate() {
        frame.set_delay(10 * (i as u16 + 1)).unwrap();
    }
    gif.frames[2].extensions.push(Extension::comment("two"));
    gif.frames[3].extensions.push(Extension::comment("three"));
    fold_dropped_frames(&mut gif, &[false, true, true, false]);
    assert_eq!(gif.frames.len(), 2);
    assert_eq!(gif.frames[0].delay(), 60);
    assert_eq!(gif.frames[1].extensions(), &[Extension::comment("two"), Extension::comment("three")]);

    let mut tail = Gif::new(2, 4, 4, 3, true).unwrap();
    tail.frames[2].extensions.push(Extension::comment("end"));
    tail.frames[1].set_delay(u16::MAX).unwrap();
    tail.frames[2].set_delay(5).unwrap();
    fold_dropped_frames(&mut tail, &[false, false, true]);
    assert_eq!(tail.frames[1].delay(), u16::MAX);
    assert_eq!(tail.trailing, [Extension::comment("end")]);
}

#[test]
fn clamps_frames() {
    let mut gif = Gif::new(2, 4, 4, 2, true).unwrap();
    gif.frames[0].descriptor = crate::descriptor::FrameDescriptor::new(2, 1, 5, 2, 2).unwrap();
    gif.frames[1].descriptor = crate::descriptor::FrameDescriptor::new(9, 0, 5, 2, 2).unwrap();
    clamp_to_screen(&mut gif).unwrap();
    let d = &gif.frames[0].descriptor;
    assert_eq!((d.left(), d.top(), d.width(), d.height()), (2, 1, 2, 2));
    assert_eq!(gif.frames[1].descriptor.width(), 5);
}

#[test]
fn resolution_follows_palette() {
    let mut gif = Gif::new(8, 2, 2, 1, true).unwrap();
    gif.global_table.resize(16, &mut gif.screen.flags).unwrap();
    repair_resolution(&mut gif);
    assert_eq!(gif.screen.resolution, 4);
    assert_eq!(gif.frames[0].descriptor.bits_per_pixel(), 4);
}

#[test]
fn zero_sized_screen_skips_cropping() {
    let mut gif = Gif::new(2, 2, 2, 2, true).unwrap();
    gif.set_color(1, RGB8::new(255, 0, 0)).unwrap();
    gif.frame_mut(1).unwrap().set_pixel(0, 0, 1).unwrap();
    gif.screen.width = 0;
    gif.screen.height = 0;
    let data = gif.to_bytes(&Settings::default()).unwrap();

    let outcome = downsize(&data, &Settings::default(), &mut crate::progress::NoProgress {}).unwrap();
    assert_eq!(outcome.after.frames, 2);
    let out = optimize(gif, &mut crate::progress::NoProgress {}).unwrap();
    assert!(out.frames().all(|f| (f.descriptor().width(), f.descriptor().height()) == (2, 2)));
    assert_eq!(out.global_table().unwrap().len(), 2);
}

#[test]
fn unresolvable_colors_are_left_alone() {
    let mut single = Gif::new(2, 2, 2, 1, true).unwrap();
    single.set_color_table_size(0).unwrap();
    let data = single.to_bytes(&Settings::default()).unwrap();
    let outcome = downsize(&data, &Settings::default(), &mut crate::progress::NoProgress {}).unwrap();
    assert!(!outcome.is_smaller());
    assert_eq!(outcome.before, outcome.after);

    let mut gif = Gif::new(2, 2, 2, 2, true).unwrap();
    gif.set_color_table_size(2).unwrap();
    gif.frames[1].descriptor.set_pixel(0, 0, 3).unwrap();
    let out = optimize(gif.clone(), &mut crate::progress::NoProgress {}).unwrap();
    assert_eq!(out.frame(1).unwrap().descriptor().pixel(0, 0).unwrap(), 3);
    assert_eq!(out.global_table(), gif.global_table());
}
