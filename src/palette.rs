use crate::block::ByteReader;
use crate::error::*;
use rgb::RGB8;

/// Filler for palette entries that were never set
pub const WHITE: RGB8 = RGB8 { r: 255, g: 255, b: 255 };

pub const MAX_COLORS: usize = 256;

/// Table-related fields of a screen or image descriptor's packed byte
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct ColorTableFlags {
    pub present: bool,
    pub sorted: bool,
    /// Table holds `1 << (size_bits + 1)` entries
    pub size_bits: u8,
}

impl ColorTableFlags {
    /// Number of entries the flags declare
    #[inline]
    pub fn table_len(&self) -> usize {
        if self.present { 1 << (self.size_bits + 1) } else { 0 }
    }
}

/// Size bits of the smallest table holding `n` colors
///
/// Sizes up to 2 share the minimum table.
#[inline]
pub fn roundup_bits(n: usize) -> u8 {
    if n <= 2 { 0 } else { (n - 1).ilog2() as u8 }
}

/// Smallest valid table length for `n` colors, 0 stays 0
#[inline]
pub fn rounded_len(n: usize) -> usize {
    if n == 0 { 0 } else { n.max(2).next_power_of_two() }
}

/// LZW code size needed for a table of this length
#[inline]
pub fn size_to_bpp(table_len: usize) -> u8 {
    table_len.max(4).next_power_of_two().trailing_zeros() as u8
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PaletteTable {
    colors: Vec<RGB8>,
}

impl PaletteTable {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Takes the colors as-is, without rounding the length
    pub fn from_colors(colors: Vec<RGB8>) -> CatResult<Self> {
        if colors.len() > MAX_COLORS {
            return Err(Error::range(format!("{} colors don't fit in a palette", colors.len())));
        }
        Ok(Self { colors })
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.colors.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.colors.is_empty()
    }

    #[inline]
    pub fn colors(&self) -> &[RGB8] {
        &self.colors
    }

    pub fn iter(&self) -> impl Iterator<Item = RGB8> + '_ {
        self.colors.iter().copied()
    }

    /// Sets the exact length, padding with white. Used for tables read from a file.
    pub fn resize_exact(&mut self, len: usize) {
        self.colors.resize(len.min(MAX_COLORS), WHITE);
    }

    /// Resizes to the next valid table length and keeps `flags` in sync.
    ///
    /// Returns `false` when the length did not change, and then `flags` are left as they were.
    /// Surviving entries are kept, new ones are white.
    pub fn resize(&mut self, requested: usize, flags: &mut ColorTableFlags) -> CatResult<bool> {
        if requested > MAX_COLORS {
            return Err(Error::range(format!("palette size {requested} is over {MAX_COLORS}")));
        }
        if requested == 0 {
            flags.present = false;
            flags.size_bits = 0;
            if self.colors.is_empty() {
                return Ok(false);
            }
            self.colors.clear();
            return Ok(true);
        }

        let bits = roundup_bits(requested);
        let len = 1 << (bits + 1);
        if len == self.colors.len() {
            return Ok(false);
        }
        self.colors.resize(len, WHITE);
        flags.present = true;
        flags.size_bits = bits;
        Ok(true)
    }

    #[inline]
    pub fn get(&self, index: usize) -> CatResult<RGB8> {
        self.colors.get(index).copied()
            .ok_or_else(|| Error::range(format!("color index {index} out of range of {}", self.colors.len())))
    }

    #[inline]
    pub fn set(&mut self, index: usize, color: RGB8) -> CatResult<()> {
        let len = self.colors.len();
        let entry = self.colors.get_mut(index)
            .ok_or_else(|| Error::range(format!("color index {index} out of range of {len}")))?;
        *entry = color;
        Ok(())
    }

    /// Index of the first entry with this color
    pub fn position(&self, color: RGB8) -> Option<usize> {
        self.colors.iter().position(|&c| c == color)
    }

    pub(crate) fn read(reader: &mut ByteReader<'_>, flags: ColorTableFlags) -> CatResult<Self> {
        let len = flags.table_len();
        let bytes = reader.take_slice(len * 3)?;
        let mut table = Self::new();
        table.resize_exact(len);
        for (entry, rgb) in table.colors.iter_mut().zip(bytes.chunks_exact(3)) {
            *entry = RGB8::new(rgb[0], rgb[1], rgb[2]);
        }
        Ok(table)
    }

    /// Writes as many entries as `flags` declare
    pub(crate) fn write(&self, out: &mut Vec<u8>, flags: ColorTableFlags) {
        let len = flags.table_len();
        let stored = &self.colors[..len.min(self.colors.len())];
        out.extend_from_slice(rgb::bytemuck::cast_slice(stored));
        for _ in stored.len()..len {
            out.extend_from_slice(&[WHITE.r, WHITE.g, WHITE.b]);
        }
    }
}

#[test]
fn rounding_buckets() {
    let expected = [(1, 2), (2, 2), (3, 4), (4, 4), (5, 8), (8, 8), (9, 16), (16, 16), (17, 32),
        (32, 32), (33, 64), (64, 64), (65, 128), (128, 128), (129, 256), (256, 256)];
    for (n, len) in expected {
        assert_eq!(1usize << (roundup_bits(n) + 1), len, "{n}");
        assert_eq!(rounded_len(n), len, "{n}");
    }
    for n in 1..=256 {
        let len = rounded_len(n);
        assert_eq!(rounded_len(len), len);
        assert_eq!(1usize << (roundup_bits(n) + 1), len);
    }
    assert_eq!(rounded_len(0), 0);
}

#[test]
fn bpp_for_table() {
    assert_eq!(size_to_bpp(2), 2);
    assert_eq!(size_to_bpp(4), 2);
    assert_eq!(size_to_bpp(8), 3);
    assert_eq!(size_to_bpp(128), 7);
    assert_eq!(size_to_bpp(256), 8);
}

#[test]
fn resize_keeps_entries() {
    let mut flags = ColorTableFlags::default();
    let mut pal = PaletteTable::new();
    assert!(pal.resize(7, &mut flags).unwrap());
    assert_eq!(pal.len(), 8);
    assert_eq!(flags, ColorTableFlags { present: true, sorted: false, size_bits: 2 });
    for i in 0..8 {
        pal.set(i, RGB8::new(i as u8, 0, 0)).unwrap();
    }

    assert!(pal.resize(3, &mut flags).unwrap());
    assert_eq!(flags.size_bits, 1);
    assert!(pal.resize(8, &mut flags).unwrap());
    assert_eq!(pal.get(1).unwrap(), RGB8::new(1, 0, 0));
    assert_eq!(pal.get(3).unwrap(), RGB8::new(3, 0, 0));
    assert_eq!(pal.get(4).unwrap(), WHITE);
    assert_eq!(pal.get(7).unwrap(), WHITE);

    let mut touched = flags;
    touched.sorted = true;
    touched.size_bits = 5;
    assert!(!pal.resize(6, &mut touched).unwrap());
    assert_eq!(touched.size_bits, 5);
}

#[test]
fn resize_to_nothing() {
    let mut flags = ColorTableFlags { present: true, sorted: true, size_bits: 1 };
    let mut pal = PaletteTable::from_colors(vec![WHITE; 4]).unwrap();
    assert!(pal.resize(0, &mut flags).unwrap());
    assert_eq!(flags, ColorTableFlags { present: false, sorted: true, size_bits: 0 });
    assert!(!pal.resize(0, &mut flags).unwrap());
    assert!(pal.get(0).is_err());
    assert!(pal.set(0, WHITE).is_err());
    assert!(pal.resize(257, &mut flags).is_err());
}
