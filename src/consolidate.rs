//! Rebuilds palettes so they hold only colors that are drawn
//!
//! Pixel colors always come from `src`. The palettes and indices written go to `des`.

use crate::downsize::*;
use crate::error::*;
use crate::palette::*;
use rgb::RGB8;
use std::iter;

impl Downsizer<'_> {
    pub(crate) fn table(&self, owner: TableOwner) -> &PaletteTable {
        match owner {
            TableOwner::Global => &self.des.global_table,
            TableOwner::Local(i) => self.des.frames[i].descriptor.raw_table(),
        }
    }

    fn resize_table(&mut self, owner: TableOwner, len: usize) -> CatResult<bool> {
        match owner {
            TableOwner::Global => self.des.resize_color_table(len),
            TableOwner::Local(i) => self.des.frames[i].descriptor.resize_table(len),
        }
    }

    fn set_table_color(&mut self, owner: TableOwner, index: usize, color: RGB8) -> CatResult<()> {
        match owner {
            TableOwner::Global => self.des.set_color(index, color),
            TableOwner::Local(i) => self.des.frames[i].descriptor.set_color(index, color),
        }
    }

    /// Replaces the palette with the sorted colors, padded with white
    pub(crate) fn reset_color_table(&mut self, owner: TableOwner, colors: &ColorSet) -> CatResult<()> {
        self.resize_table(owner, colors.len())?;
        let len = self.table(owner).len();
        for (index, color) in colors.iter().copied().chain(iter::repeat(WHITE)).take(len).enumerate() {
            self.set_table_color(owner, index, color)?;
        }
        Ok(())
    }

    /// Finds a transparent index in the new palette for a frame that had one.
    ///
    /// Prefers padding past the `used` colors, then an entry no opaque pixel maps to,
    /// and otherwise grows the palette.
    pub(crate) fn reset_transparency(&mut self, index: usize, owner: TableOwner, used: usize) -> CatResult<()> {
        let Some(src_transparent) = self.src.frames[index].transparent_index() else {
            return Ok(());
        };
        let len = self.table(owner).len();
        let transparent = if len > used {
            len - 1
        } else {
            let unused = {
                let table = self.table(owner);
                let src = self.src_frame(index);
                let mut hits = vec![0u32; len];
                for i in src.descriptor().pixels().pixels().filter(|&i| i != src_transparent) {
                    if let Some(pos) = table.position(src.color(i)?) {
                        hits[pos] += 1;
                    }
                }
                hits.iter().rposition(|&h| h == 0)
            };
            match unused {
                Some(pos) => pos,
                None => {
                    self.resize_table(owner, len + 1)?;
                    self.table(owner).len() - 1
                },
            }
        };

        let control = self.des.frames[index].ensure_control();
        control.transparent = true;
        control.transparent_index = transparent as u8;
        Ok(())
    }

    /// Re-maps the frame's pixels to the new palette by color
    pub(crate) fn reset_image(&mut self, index: usize, owner: TableOwner) -> CatResult<()> {
        let table = self.table(owner);
        let src = self.src_frame(index);
        let transparent = self.des.frames[index].transparent_index();
        let indices = src.descriptor().pixels().pixels().map(|i| {
            if src.is_transparent_index(i) {
                return transparent.ok_or_else(|| Error::range("frame lost its transparent index"));
            }
            let color = src.color(i)?;
            table.position(color).map(|pos| pos as u8)
                .ok_or_else(|| Error::range(format!("color {color:?} is missing from the new palette")))
        }).collect::<CatResult<Vec<u8>>>()?;

        let bpp = size_to_bpp(table.len());
        self.des.frames[index].descriptor.replace_pixels(indices, bpp);
        Ok(())
    }

    /// Moves everything to one global palette if all frames together use at most 256 colors
    pub(crate) fn single_color_table(&mut self) -> CatResult<bool> {
        let n = self.src.frames.len();
        let mut all = ColorSet::new();
        for i in 0..n {
            all.extend(colors_in_use(&self.src_frame(i))?);
        }
        if all.len() > MAX_COLORS {
            return Ok(false);
        }
        let has_local = self.src.frames.iter().any(|f| f.descriptor.has_local_table());
        if rounded_len(all.len()) == self.src.global_table.len() && !has_local {
            return Ok(false);
        }

        self.reset_color_table(TableOwner::Global, &all)?;
        for i in 0..n {
            self.des.frames[i].descriptor.resize_table(0)?;
            self.reset_transparency(i, TableOwner::Global, all.len())?;
            self.reset_image(i, TableOwner::Global)?;
            self.reporter.increase();
        }
        Ok(true)
    }

    /// Promotes the local palette that holds the most other local palettes to the global one.
    ///
    /// Frames that used the old global palette get it as a local one, unless that would cost more
    /// than it saves.
    pub(crate) fn common_color_table(&mut self) -> CatResult<bool> {
        let n = self.src.frames.len();
        let sets: Vec<ColorSet> = self.src.frames.iter()
            .map(|f| f.descriptor.local_table().map(|t| t.iter().collect()).unwrap_or_default())
            .collect();

        let mut covered = vec![false; n];
        let mut counts = Vec::new();
        for i in 0..n - 1 {
            if covered[i] {
                continue;
            }
            let mut count = 0;
            for j in i + 1..n {
                if !covered[j] && contains(&sets[i], &sets[j]) {
                    covered[j] = true;
                    count += 1;
                }
            }
            counts.push((i, count));
        }
        counts.sort_by(|a, b| b.1.cmp(&a.1));
        let Some(&(best, count)) = counts.first().filter(|&&(_, count)| count > 0) else {
            return Ok(false);
        };

        let global_users = self.src.frames.iter().filter(|f| !f.descriptor.has_local_table()).count();
        let best_len = self.src.frames[best].descriptor.raw_table().len();
        if self.src.global_table.len() * global_users > best_len * count {
            return Ok(false);
        }

        let common = &sets[best];
        let old_global: ColorSet = self.src.global_table.iter().collect();
        self.reset_color_table(TableOwner::Global, common)?;
        for (i, colors) in sets.iter().enumerate() {
            if self.src.frames[i].descriptor.has_local_table() {
                if contains(common, colors) {
                    self.des.frames[i].descriptor.resize_table(0)?;
                    self.reset_transparency(i, TableOwner::Global, common.len())?;
                    self.reset_image(i, TableOwner::Global)?;
                } else {
                    self.downsize_local_table(i)?;
                }
            } else {
                let owner = TableOwner::Local(i);
                self.reset_color_table(owner, &old_global)?;
                self.reset_transparency(i, owner, old_global.len())?;
                self.reset_image(i, owner)?;
            }
            self.reporter.increase();
        }
        Ok(true)
    }

    /// Shrinks every local palette on its own, and drops a global palette nobody uses
    pub(crate) fn downsize_local_tables(&mut self) -> CatResult<()> {
        for i in 0..self.src.frames.len() {
            if self.src.frames[i].descriptor.has_local_table() {
                self.downsize_local_table(i)?;
            }
            self.reporter.increase();
        }
        if self.src.screen.flags.present && self.src.frames.iter().all(|f| f.descriptor.has_local_table()) {
            self.des.resize_color_table(0)?;
        }
        Ok(())
    }

    pub(crate) fn downsize_local_table(&mut self, index: usize) -> CatResult<()> {
        let colors = colors_in_use(&self.des_frame(index))?;
        if rounded_len(colors.len()) >= self.des.frames[index].descriptor.raw_table().len() {
            return Ok(());
        }
        let owner = TableOwner::Local(index);
        self.reset_color_table(owner, &colors)?;
        self.reset_transparency(index, owner, colors.len())?;
        self.reset_image(index, owner)
    }
}

#[cfg(test)]
use crate::{gif::Gif, progress::NoProgress};

#[cfg(test)]
fn gray(c: u8) -> RGB8 {
    RGB8::new(c, c, c)
}

#[cfg(test)]
fn local_frames(palettes: &[&[u8]]) -> Gif {
    let mut gif = Gif::new(3, 2, 2, palettes.len(), false).unwrap();
    for (frame, palette) in gif.frames.iter_mut().zip(palettes) {
        for (i, &c) in palette.iter().enumerate() {
            frame.descriptor.set_color(i, gray(c)).unwrap();
            frame.descriptor.set_pixel(i % 2, i / 2 % 2, i as u8).unwrap();
        }
    }
    gif
}

#[test]
fn palette_reset_pads_with_white() {
    let gif = local_frames(&[&[9, 8, 7]]);
    let mut reporter = NoProgress {};
    let mut d = Downsizer { src: gif.clone(), des: gif, reporter: &mut reporter };
    let colors: ColorSet = [gray(3), gray(1), gray(2)].into_iter().collect();
    d.reset_color_table(TableOwner::Global, &colors).unwrap();
    assert_eq!(d.table(TableOwner::Global).colors(), &[gray(1), gray(2), gray(3), WHITE]);
    assert_eq!(d.des.bits_per_pixel(), 2);
}

#[test]
fn merges_into_one_palette() {
    let gif = local_frames(&[&[1, 2, 3], &[3, 4]]);
    let mut reporter = NoProgress {};
    let mut d = Downsizer { src: gif.clone(), des: gif, reporter: &mut reporter };
    assert!(d.single_color_table().unwrap());
    assert_eq!(d.des.global_table().unwrap().colors(), &[gray(1), gray(2), gray(3), gray(4)]);
    for i in 0..2 {
        assert!(!d.des_frame(i).descriptor().has_local_table());
        assert_eq!(d.des_frame(i).descriptor().bits_per_pixel(), 2);
    }
    assert_eq!(d.des_frame(1).descriptor().pixel(0, 0).unwrap(), 2);
    assert_eq!(d.des_frame(1).descriptor().pixel(1, 0).unwrap(), 3);
}

#[test]
fn transparency_survives_new_palette() {
    let mut gif = local_frames(&[&[1, 2, 3, 4]]);
    gif.frames[0].ensure_control().transparent = true;
    gif.frames[0].ensure_control().transparent_index = 3;
    let mut reporter = NoProgress {};
    let mut d = Downsizer { src: gif.clone(), des: gif, reporter: &mut reporter };
    d.reset_color_table(TableOwner::Local(0), &[gray(1), gray(2), gray(3)].into_iter().collect()).unwrap();
    d.reset_transparency(0, TableOwner::Local(0), 3).unwrap();
    d.reset_image(0, TableOwner::Local(0)).unwrap();
    let f = d.des_frame(0);
    assert_eq!(f.transparent_index(), Some(3));
    assert_eq!(f.descriptor().pixels().pixels().collect::<Vec<_>>(), [0, 1, 2, 3]);

    d.reset_color_table(TableOwner::Local(0), &[gray(1), gray(2), gray(3), gray(4)].into_iter().collect()).unwrap();
    d.reset_transparency(0, TableOwner::Local(0), 4).unwrap();
    assert_eq!(d.des_frame(0).transparent_index(), Some(3));
}

#[test]
fn shrinks_local_palette() {
    let mut gif = local_frames(&[&[5, 6]]);
    gif.frames[0].descriptor.set_color_table_size(64).unwrap();
    let mut reporter = NoProgress {};
    let mut d = Downsizer { src: gif.clone(), des: gif, reporter: &mut reporter };
    d.downsize_local_table(0).unwrap();
    let f = d.des_frame(0);
    assert_eq!(f.descriptor().local_table().unwrap().colors(), &[gray(5), gray(6)]);
    assert_eq!(f.descriptor().pixels().pixels().collect::<Vec<_>>(), [0, 1, 0, 0]);
}

/// Global palette of 10..40 grays, frames 0..2 with local palettes that frame 0's palette holds, frame 3 on the global one
#[cfg(test)]
fn mixed_frames() -> Gif {
    let mut gif = Gif::new(2, 2, 2, 4, true).unwrap();
    for (i, c) in [10, 20, 30, 40].into_iter().enumerate() {
        gif.set_color(i, gray(c)).unwrap();
    }
    let locals: [&[u8]; 3] = [&[1, 2, 3, 4], &[2, 1], &[3, 1]];
    for (frame, palette) in gif.frames.iter_mut().zip(locals) {
        frame.descriptor.set_color_table_size(palette.len()).unwrap();
        for (i, &c) in palette.iter().enumerate() {
            frame.descriptor.set_color(i, gray(c)).unwrap();
        }
    }
    let pixels: [[u8; 4]; 4] = [[0, 1, 2, 3], [0, 1, 0, 0], [0, 1, 1, 0], [0, 1, 2, 3]];
    for (frame, pixels) in gif.frames.iter_mut().zip(pixels) {
        for (i, p) in pixels.into_iter().enumerate() {
            frame.descriptor.set_pixel(i % 2, i / 2, p).unwrap();
        }
    }
    gif
}

#[cfg(test)]
fn pixels(d: &Downsizer<'_>, index: usize) -> Vec<u8> {
    d.des_frame(index).descriptor().pixels().pixels().collect()
}

#[test]
fn promotes_common_palette() {
    let gif = mixed_frames();
    let mut reporter = NoProgress {};
    let mut d = Downsizer { src: gif.clone(), des: gif, reporter: &mut reporter };
    assert!(d.common_color_table().unwrap());

    assert_eq!(d.des.global_table().unwrap().colors(), &[gray(1), gray(2), gray(3), gray(4)]);
    for i in 0..3 {
        assert!(!d.des_frame(i).descriptor().has_local_table());
    }
    assert_eq!(pixels(&d, 1), [1, 0, 1, 1]);
    assert_eq!(pixels(&d, 2), [2, 0, 0, 2]);

    let old_global = d.des_frame(3);
    assert_eq!(old_global.descriptor().local_table().unwrap().colors(), &[gray(10), gray(20), gray(30), gray(40)]);
    assert_eq!(pixels(&d, 3), [0, 1, 2, 3]);
}

#[test]
fn promotion_must_pay_off() {
    let mut gif = mixed_frames();
    gif.frames[2].descriptor.set_color_table_size(0).unwrap();
    let mut reporter = NoProgress {};
    let mut d = Downsizer { src: gif.clone(), des: gif, reporter: &mut reporter };
    assert!(!d.common_color_table().unwrap());
    assert_eq!(d.des, d.src);
}

#[test]
fn promotion_compares_whole_palettes() {
    let mut gif = local_frames(&[&[1, 2, 3, 4], &[1, 2, 77, 4]]);
    gif.frames[1].descriptor.set_pixel(0, 1, 0).unwrap();
    gif.frames[1].descriptor.set_pixel(1, 1, 0).unwrap();
    let mut reporter = NoProgress {};
    let mut d = Downsizer { src: gif.clone(), des: gif, reporter: &mut reporter };
    assert!(!d.common_color_table().unwrap());
    assert_eq!(d.des, d.src);
}
