use crate::block::*;
use crate::error::*;
use crate::lzw;
use crate::palette::*;
use imgref::*;
use rgb::RGB8;

/// Image descriptor with its optional local palette and decoded pixel indices
#[derive(Debug, Clone, PartialEq)]
pub struct FrameDescriptor {
    left: u16,
    top: u16,
    bpp: u8,
    flags: ColorTableFlags,
    local_table: PaletteTable,
    pixels: ImgVec<u8>,
}

impl FrameDescriptor {
    /// Blank frame of index 0 pixels, without a local palette
    pub fn new(left: u16, top: u16, width: u16, height: u16, bpp: u8) -> CatResult<Self> {
        check_bpp(bpp)?;
        if width == 0 || height == 0 {
            return Err(Error::range(format!("frame size {width}x{height} is empty")));
        }
        let (width, height) = (width.into(), height.into());
        Ok(Self {
            left,
            top,
            bpp,
            flags: ColorTableFlags::default(),
            local_table: PaletteTable::new(),
            pixels: ImgVec::new(vec![0; width * height], width, height),
        })
    }

    #[inline]
    pub fn left(&self) -> u16 {
        self.left
    }

    #[inline]
    pub fn top(&self) -> u16 {
        self.top
    }

    #[inline]
    pub fn width(&self) -> u16 {
        self.pixels.width() as u16
    }

    #[inline]
    pub fn height(&self) -> u16 {
        self.pixels.height() as u16
    }

    pub fn set_position(&mut self, left: u16, top: u16) {
        self.left = left;
        self.top = top;
    }

    /// LZW minimum code size
    #[inline]
    pub fn bits_per_pixel(&self) -> u8 {
        self.bpp
    }

    /// Fails if outside 2..=8, or if a stored pixel would not fit
    pub fn set_bits_per_pixel(&mut self, bpp: u8) -> CatResult<()> {
        check_bpp(bpp)?;
        let max = self.max_index().unwrap_or(0);
        if u16::from(max) >= 1 << bpp {
            return Err(Error::range(format!("pixel index {max} does not fit in {bpp} bits")));
        }
        self.bpp = bpp;
        Ok(())
    }

    /// Skips the pixel check. Callers replace or re-check the pixels afterwards.
    #[inline]
    pub(crate) fn force_bits_per_pixel(&mut self, bpp: u8) {
        self.bpp = bpp;
    }

    #[inline]
    pub fn color_table_flags(&self) -> ColorTableFlags {
        self.flags
    }

    #[inline]
    pub fn has_local_table(&self) -> bool {
        self.flags.present
    }

    pub fn local_table(&self) -> Option<&PaletteTable> {
        self.flags.present.then_some(&self.local_table)
    }

    /// The local palette storage, empty when there's no local palette
    #[inline]
    pub(crate) fn raw_table(&self) -> &PaletteTable {
        &self.local_table
    }

    /// Resizes (or with 0 removes) the local palette.
    ///
    /// When the size changes, bits per pixel follow the new table size.
    /// Fails without changing anything if a stored pixel would not fit.
    pub fn set_color_table_size(&mut self, size: usize) -> CatResult<bool> {
        let (mut table, mut flags) = (self.local_table.clone(), self.flags);
        if !table.resize(size, &mut flags)? {
            return Ok(false);
        }
        let bpp = table_bpp(flags);
        if let Some(max) = self.max_index().filter(|&max| u16::from(max) >= 1 << bpp) {
            return Err(Error::range(format!("pixel index {max} does not fit in {bpp} bits")));
        }
        self.local_table = table;
        self.flags = flags;
        self.bpp = bpp;
        Ok(true)
    }

    /// Like `set_color_table_size`, for callers that remap the pixels afterwards
    pub(crate) fn resize_table(&mut self, size: usize) -> CatResult<bool> {
        let changed = self.local_table.resize(size, &mut self.flags)?;
        if changed {
            self.bpp = table_bpp(self.flags);
        }
        Ok(changed)
    }

    #[inline]
    pub fn color(&self, index: usize) -> CatResult<RGB8> {
        self.local_table.get(index)
    }

    #[inline]
    pub fn set_color(&mut self, index: usize, color: RGB8) -> CatResult<()> {
        self.local_table.set(index, color)
    }

    #[inline]
    pub fn pixels(&self) -> ImgRef<'_, u8> {
        self.pixels.as_ref()
    }

    /// Offset of the pixel in the row-major pixel buffer
    pub fn pixel_index(&self, x: usize, y: usize) -> CatResult<usize> {
        if x >= self.pixels.width() || y >= self.pixels.height() {
            return Err(Error::range(format!("pixel {x},{y} is outside of {}x{}", self.pixels.width(), self.pixels.height())));
        }
        Ok(y * self.pixels.stride() + x)
    }

    pub fn pixel(&self, x: usize, y: usize) -> CatResult<u8> {
        let idx = self.pixel_index(x, y)?;
        Ok(self.pixels.buf()[idx])
    }

    /// Sets a pixel's palette index. The index must fit in the bits per pixel.
    pub fn set_pixel(&mut self, x: usize, y: usize, index: u8) -> CatResult<()> {
        let idx = self.pixel_index(x, y)?;
        if u16::from(index) >= 1 << self.bpp {
            return Err(Error::range(format!("pixel index {index} does not fit in {} bits", self.bpp)));
        }
        self.pixels.buf_mut()[idx] = index;
        Ok(())
    }

    /// Fills the whole frame with one index
    pub fn set_all_pixels(&mut self, index: u8) -> CatResult<()> {
        if u16::from(index) >= 1 << self.bpp {
            return Err(Error::range(format!("pixel index {index} does not fit in {} bits", self.bpp)));
        }
        self.pixels.buf_mut().fill(index);
        Ok(())
    }

    /// Swaps in a same-sized pixel buffer along with a code size that fits it
    pub(crate) fn replace_pixels(&mut self, indices: Vec<u8>, bpp: u8) {
        debug_assert_eq!(indices.len(), self.pixels.width() * self.pixels.height());
        let (width, height) = (self.pixels.width(), self.pixels.height());
        self.pixels = ImgVec::new(indices, width, height);
        self.bpp = bpp;
    }

    /// Largest palette index used by any pixel
    pub fn max_index(&self) -> Option<u8> {
        self.pixels.pixels().max()
    }

    /// Cuts the frame down to a rectangle given in screen coordinates
    ///
    /// The rectangle must lie within the frame. Cropping to the current rectangle does nothing.
    pub fn crop(&mut self, left: u16, top: u16, width: u16, height: u16) -> CatResult<()> {
        let (x, y) = (usize::from(left), usize::from(top));
        let (w, h) = (usize::from(width), usize::from(height));
        let (cur_x, cur_y) = (usize::from(self.left), usize::from(self.top));
        if w == 0 || h == 0 || x < cur_x || y < cur_y
            || x + w > cur_x + self.pixels.width() || y + h > cur_y + self.pixels.height() {
            return Err(Error::range(format!("crop {w}x{h} at {x},{y} is outside of {}x{} at {cur_x},{cur_y}",
                self.pixels.width(), self.pixels.height())));
        }
        if (left, top, w, h) == (self.left, self.top, self.pixels.width(), self.pixels.height()) {
            return Ok(());
        }
        let sub = self.pixels.sub_image(x - cur_x, y - cur_y, w, h);
        self.pixels = ImgVec::new(sub.pixels().collect(), w, h);
        self.left = left;
        self.top = top;
        Ok(())
    }

    /// Reads everything after the `0x2C` separator, including the pixel data
    pub(crate) fn read(reader: &mut ByteReader<'_>) -> CatResult<Self> {
        let left = reader.take_u16_le()?;
        let top = reader.take_u16_le()?;
        let width = reader.take_u16_le()?;
        let height = reader.take_u16_le()?;
        let packed = reader.take_byte()?;
        if packed & 0x40 != 0 {
            return Err(Error::format("interlaced images are not supported"));
        }
        let flags = ColorTableFlags {
            present: packed & 0x80 != 0,
            sorted: packed & 0x20 != 0,
            size_bits: packed & 0b111,
        };
        let local_table = PaletteTable::read(reader, flags)?;

        let bpp = reader.take_byte()?;
        lzw::check_code_size(bpp)?;
        let data = reader.take_sub_blocks()?;
        if width == 0 || height == 0 {
            return Err(Error::format("wrong image data size"));
        }
        let (width, height) = (usize::from(width), usize::from(height));
        let indices = lzw::decode(bpp, &data, width * height)?;

        Ok(Self {
            left,
            top,
            bpp,
            flags,
            local_table,
            pixels: ImgVec::new(indices, width, height),
        })
    }

    pub(crate) fn write(&self, out: &mut Vec<u8>) -> CatResult<()> {
        out.push(IMAGE_SEPARATOR);
        write_u16_le(out, self.left);
        write_u16_le(out, self.top);
        write_u16_le(out, self.width());
        write_u16_le(out, self.height());
        let packed = u8::from(self.flags.present) << 7
            | u8::from(self.flags.sorted) << 5
            | if self.flags.present { self.flags.size_bits & 0b111 } else { 0 };
        out.push(packed);
        self.local_table.write(out, self.flags);

        out.push(self.bpp);
        let indices: Vec<u8> = self.pixels.pixels().collect();
        write_sub_blocks(out, &lzw::encode(self.bpp, &indices)?);
        Ok(())
    }
}

/// Code size that goes with a table, 2 when it's disabled or tiny
fn table_bpp(flags: ColorTableFlags) -> u8 {
    if !flags.present || flags.size_bits == 0 { 2 } else { flags.size_bits + 1 }
}

fn check_bpp(bpp: u8) -> CatResult<()> {
    if !(2..=8).contains(&bpp) {
        return Err(Error::range(format!("{bpp} bits per pixel is not in 2..=8")));
    }
    Ok(())
}

#[cfg(test)]
fn numbered(width: u16, height: u16) -> FrameDescriptor {
    let mut fd = FrameDescriptor::new(3, 4, width, height, 8).unwrap();
    for y in 0..height as usize {
        for x in 0..width as usize {
            fd.set_pixel(x, y, (y * 16 + x) as u8).unwrap();
        }
    }
    fd
}

#[test]
fn crop_reads_shifted() {
    let orig = numbered(8, 6);
    let mut cropped = orig.clone();
    cropped.crop(5, 6, 4, 3).unwrap();
    assert_eq!((cropped.left(), cropped.top(), cropped.width(), cropped.height()), (5, 6, 4, 3));
    for y in 0..3 {
        for x in 0..4 {
            assert_eq!(cropped.pixel(x, y).unwrap(), orig.pixel(x + 2, y + 2).unwrap());
        }
    }
    assert!(cropped.pixel(4, 0).is_err());
    assert!(cropped.pixel(0, 3).is_err());
}

#[test]
fn crop_noop_and_errors() {
    let orig = numbered(8, 6);
    let mut same = orig.clone();
    same.crop(3, 4, 8, 6).unwrap();
    assert_eq!(same, orig);

    let mut bad = orig.clone();
    assert!(bad.crop(2, 4, 2, 2).is_err());
    assert!(bad.crop(3, 3, 2, 2).is_err());
    assert!(bad.crop(4, 4, 8, 6).is_err());
    assert!(bad.crop(3, 4, 8, 7).is_err());
    assert!(bad.crop(3, 4, 0, 1).is_err());
    assert_eq!(bad, orig);
}

#[test]
fn local_table_sets_bpp() {
    let mut fd = FrameDescriptor::new(0, 0, 2, 2, 8).unwrap();
    assert!(fd.local_table().is_none());
    assert!(fd.set_color_table_size(20).unwrap());
    assert_eq!(fd.bits_per_pixel(), 5);
    assert_eq!(fd.local_table().unwrap().len(), 32);
    assert!(!fd.set_color_table_size(17).unwrap());
    assert!(fd.set_color_table_size(2).unwrap());
    assert_eq!(fd.bits_per_pixel(), 2);
    fd.set_color(1, RGB8::new(1, 2, 3)).unwrap();
    assert!(fd.set_color(2, RGB8::new(1, 2, 3)).is_err());
    assert!(fd.set_color_table_size(0).unwrap());
    assert_eq!(fd.bits_per_pixel(), 2);
    assert!(!fd.has_local_table());
}

#[test]
fn table_shrink_keeps_pixels_valid() {
    let mut fd = numbered(4, 2);
    fd.set_color_table_size(32).unwrap();
    assert!(fd.set_color_table_size(8).is_err());
    assert!(fd.set_color_table_size(0).is_err());
    assert_eq!(fd.local_table().unwrap().len(), 32);
    assert_eq!(fd.bits_per_pixel(), 5);

    assert!(fd.resize_table(0).unwrap());
    assert_eq!(fd.bits_per_pixel(), 2);
    assert_eq!(fd.pixel(3, 1).unwrap(), 19);
}

#[test]
fn empty_frames_rejected() {
    assert!(FrameDescriptor::new(0, 0, 0, 1, 2).is_err());
    assert!(FrameDescriptor::new(0, 0, 3, 0, 2).is_err());

    // 0x1 image, local table off, code size 2, one sub-block holding a clear code
    let data = [0, 0, 0, 0, 0, 0, 1, 0, 0, 2, 1, 0x2C, 0];
    let err = FrameDescriptor::read(&mut ByteReader::new(&data)).unwrap_err();
    assert!(err.is_format_error());
}

#[test]
fn bpp_limits() {
    let mut fd = numbered(4, 4);
    assert!(fd.set_bits_per_pixel(5).is_err());
    fd.set_bits_per_pixel(6).unwrap();
    assert!(fd.set_pixel(0, 0, 64).is_err());
    assert!(fd.set_bits_per_pixel(1).is_err());
    assert!(fd.set_bits_per_pixel(9).is_err());
    assert!(fd.set_all_pixels(64).is_err());
    fd.set_all_pixels(63).unwrap();
    assert_eq!(fd.max_index(), Some(63));
    assert!(fd.pixels().pixels().all(|p| p == 63));
}

#[test]
fn descriptor_bytes() {
    let mut fd = numbered(5, 3);
    fd.set_color_table_size(256).unwrap();
    fd.set_color(40, RGB8::new(9, 8, 7)).unwrap();
    let mut out = Vec::new();
    fd.write(&mut out).unwrap();
    assert_eq!(out[0], IMAGE_SEPARATOR);
    assert_eq!(out[9], 0x87);

    let mut r = ByteReader::new(&out[1..]);
    let back = FrameDescriptor::read(&mut r).unwrap();
    assert_eq!(back, fd);
    assert_eq!(back.color(40).unwrap(), RGB8::new(9, 8, 7));
}

#[test]
fn rejects_interlaced() {
    let data = [0, 0, 0, 0, 1, 0, 1, 0, 0x40, 2, 2, 0x44, 0x01, 0];
    let err = FrameDescriptor::read(&mut ByteReader::new(&data)).unwrap_err();
    assert!(err.is_format_error());
}
