use crate::block::*;
use crate::builder::FrameBuilder;
use crate::control::*;
use crate::descriptor::FrameDescriptor;
use crate::error::*;
use crate::frame::*;
use crate::palette::*;
use crate::record::*;
use crate::screen::*;
use crate::Settings;
use rgb::RGB8;
use std::fmt;
use std::fs;
use std::io::Write;
use std::path::Path;

/// A whole GIF file: screen, global palette and frames
#[derive(Debug, Clone, PartialEq)]
pub struct Gif {
    pub(crate) screen: Screen,
    pub(crate) global_table: PaletteTable,
    pub(crate) frames: Vec<Frame>,
    /// Extensions between the last image and the trailer
    pub(crate) trailing: Vec<Extension>,
}

impl Gif {
    /// Blank GIF of full-screen frames filled with index 0
    ///
    /// With `global_table` there's one `1 << bpp` palette for all frames, otherwise every frame gets a local one.
    /// Animations get a looping block and a graphics control block on every frame.
    pub fn new(bpp: u8, width: u16, height: u16, images: usize, global_table: bool) -> CatResult<Self> {
        if !(2..=8).contains(&bpp) {
            return Err(Error::range(format!("{bpp} bits per pixel is not in 2..=8")));
        }
        let table_len = 1usize << bpp;
        let mut screen = Screen {
            version: Version::V89a,
            width,
            height,
            resolution: bpp,
            flags: ColorTableFlags::default(),
            background: 0,
            aspect_ratio: 0,
        };
        let mut global = PaletteTable::new();
        if global_table {
            global.resize(table_len, &mut screen.flags)?;
        }

        let frames = (0..images).map(|n| {
            let mut descriptor = FrameDescriptor::new(0, 0, width, height, bpp)?;
            if !global_table {
                descriptor.set_color_table_size(table_len)?;
            }
            let mut frame = Frame::new(descriptor, (images > 1).then(GraphicsControl::default));
            if n == 0 && images > 1 {
                frame.extensions.push(Extension::Application(Application::looping(0)));
            }
            Ok(frame)
        }).collect::<CatResult<_>>()?;

        Ok(Self {
            screen,
            global_table: global,
            frames,
            trailing: Vec::new(),
        })
    }

    pub fn from_bytes(data: &[u8]) -> CatResult<Self> {
        let mut reader = ByteReader::new(data);
        let screen = Screen::read(&mut reader)?;
        let global_table = PaletteTable::read(&mut reader, screen.flags)?;

        let mut builder = FrameBuilder::new();
        loop {
            if reader.is_empty() {
                return Err(Error::format("not a valid GIF file (missing trailer)"));
            }
            match read_record(&mut reader)? {
                Some(record) => builder.push(record),
                None => break,
            }
        }
        let (frames, trailing) = builder.finish();
        Ok(Self { screen, global_table, frames, trailing })
    }

    pub fn to_bytes(&self, settings: &Settings) -> CatResult<Vec<u8>> {
        let mut out = Vec::new();
        out.try_reserve(self.frames.iter().map(|f| f.descriptor.pixels().buf().len() / 2 + 800).sum())?;

        let needs_89a = settings.stamp || !self.trailing.is_empty()
            || self.frames.iter().any(|f| f.control.is_some() || !f.extensions.is_empty());
        let version = if needs_89a { Version::V89a } else { self.screen.version };
        self.screen.write(&mut out, version);
        self.global_table.write(&mut out, self.screen.flags);

        for frame in &self.frames {
            for ext in &frame.extensions {
                ext.write(&mut out)?;
            }
            if let Some(control) = &frame.control {
                control.write(&mut out);
            }
            frame.descriptor.write(&mut out)?;
        }

        if settings.stamp {
            let stamp = Extension::comment(&format!("Built with {} {}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION")));
            let rest = match self.trailing.last() {
                Some(Extension::Comment(_)) => &self.trailing[..self.trailing.len() - 1],
                _ => &self.trailing[..],
            };
            for ext in rest.iter().chain(Some(&stamp)) {
                ext.write(&mut out)?;
            }
        } else {
            for ext in &self.trailing {
                ext.write(&mut out)?;
            }
        }
        out.push(TRAILER);
        Ok(out)
    }

    /// Reads a file. Failing to open it is an `Io` error, bad content is a `Format` error.
    pub fn import(path: impl AsRef<Path>) -> CatResult<Self> {
        Self::from_bytes(&fs::read(path)?)
    }

    /// Writes to a file, refusing to replace an existing one unless `overwrite` is set
    pub fn export(&self, path: impl AsRef<Path>, settings: &Settings, overwrite: bool) -> CatResult<()> {
        let path = path.as_ref();
        let data = self.to_bytes(settings)?;
        let mut file = if overwrite {
            fs::File::create(path)?
        } else {
            fs::OpenOptions::new().write(true).create_new(true).open(path).map_err(|e| match e.kind() {
                std::io::ErrorKind::AlreadyExists => Error::FileExists(path.to_path_buf()),
                _ => e.into(),
            })?
        };
        file.write_all(&data)?;
        Ok(())
    }

    #[inline]
    pub fn screen(&self) -> &Screen {
        &self.screen
    }

    #[inline]
    pub fn width(&self) -> u16 {
        self.screen.width
    }

    #[inline]
    pub fn height(&self) -> u16 {
        self.screen.height
    }

    /// Declared color resolution
    #[inline]
    pub fn bits_per_pixel(&self) -> u8 {
        self.screen.resolution
    }

    /// Sets the color resolution, the bits per pixel of frames using the global palette,
    /// and the size of the global palette if there is one
    pub fn set_bits_per_pixel(&mut self, bpp: u8) -> CatResult<()> {
        if !(2..=8).contains(&bpp) {
            return Err(Error::range(format!("{bpp} bits per pixel is not in 2..=8")));
        }
        let limit = 1u16 << bpp;
        if let Some(max) = self.frames.iter().filter(|f| !f.descriptor.has_local_table())
            .filter_map(|f| f.descriptor.max_index()).max().filter(|&m| u16::from(m) >= limit) {
            return Err(Error::range(format!("pixel index {max} does not fit in {bpp} bits")));
        }
        self.screen.resolution = bpp;
        for frame in self.frames.iter_mut().filter(|f| !f.descriptor.has_local_table()) {
            frame.descriptor.set_bits_per_pixel(bpp)?;
        }
        if self.screen.flags.present {
            self.global_table.resize(limit.into(), &mut self.screen.flags)?;
        }
        Ok(())
    }

    #[inline]
    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }

    pub fn frames(&self) -> impl Iterator<Item = FrameRef<'_>> {
        self.frames.iter().map(|frame| FrameRef { frame, global: &self.global_table })
    }

    pub fn frame(&self, index: usize) -> Option<FrameRef<'_>> {
        self.frames.get(index).map(|frame| FrameRef { frame, global: &self.global_table })
    }

    pub fn frame_mut(&mut self, index: usize) -> Option<FrameMut<'_>> {
        let global = &self.global_table;
        self.frames.get_mut(index).map(|frame| FrameMut { frame, global })
    }

    pub fn frames_mut(&mut self) -> impl Iterator<Item = FrameMut<'_>> {
        let global = &self.global_table;
        self.frames.iter_mut().map(move |frame| FrameMut { frame, global })
    }

    pub fn global_table(&self) -> Option<&PaletteTable> {
        self.screen.flags.present.then_some(&self.global_table)
    }

    /// Resizes (or with 0 removes) the global palette.
    ///
    /// On change, the color resolution follows the palette, and so do frames without a local palette.
    /// Fails without changing anything if one of those frames has a pixel that would not fit.
    pub fn set_color_table_size(&mut self, size: usize) -> CatResult<bool> {
        let mut flags = self.screen.flags;
        if !self.global_table.clone().resize(size, &mut flags)? {
            return Ok(false);
        }
        let bpp = (flags.size_bits + 1).max(2);
        if let Some(max) = self.frames.iter().filter(|f| !f.descriptor.has_local_table())
            .filter_map(|f| f.descriptor.max_index()).max().filter(|&max| u16::from(max) >= 1 << bpp) {
            return Err(Error::range(format!("pixel index {max} does not fit in {bpp} bits")));
        }
        self.resize_color_table(size)
    }

    /// Like `set_color_table_size`, for callers that remap the pixels afterwards
    pub(crate) fn resize_color_table(&mut self, size: usize) -> CatResult<bool> {
        if !self.global_table.resize(size, &mut self.screen.flags)? {
            return Ok(false);
        }
        self.screen.resolution = self.screen.flags.size_bits + 1;
        if !self.screen.flags.present {
            self.screen.background = 0;
        }
        let bpp = self.screen.resolution.max(2);
        for frame in self.frames.iter_mut().filter(|f| !f.descriptor.has_local_table()) {
            frame.descriptor.force_bits_per_pixel(bpp);
        }
        Ok(true)
    }

    #[inline]
    pub fn color(&self, index: usize) -> CatResult<RGB8> {
        self.global_table.get(index)
    }

    #[inline]
    pub fn set_color(&mut self, index: usize, color: RGB8) -> CatResult<()> {
        self.global_table.set(index, color)
    }

    #[inline]
    pub fn background_color(&self) -> u8 {
        self.screen.background
    }

    pub fn set_background_color(&mut self, index: u8) -> CatResult<()> {
        if usize::from(index) >= self.global_table().map_or(0, |t| t.len()) {
            return Err(Error::range(format!("background index {index} is outside the global palette")));
        }
        self.screen.background = index;
        Ok(())
    }

    /// From the first looping application block
    pub fn loop_count(&self) -> Option<u16> {
        self.extensions().find_map(|ext| match ext {
            Extension::Application(app) => app.loop_count(),
            _ => None,
        })
    }

    /// Updates the looping block, or adds one before the first frame
    pub fn set_loop_count(&mut self, count: u16) {
        let existing = self.frames.iter_mut().flat_map(|f| f.extensions.iter_mut())
            .chain(self.trailing.iter_mut())
            .filter_map(|ext| match ext {
                Extension::Application(app) if app.loop_count().is_some() => Some(app),
                _ => None,
            }).next();
        if let Some(app) = existing {
            app.set_loop_count(count);
            return;
        }
        let ext = Extension::Application(Application::looping(count));
        match self.frames.first_mut() {
            Some(first) => first.extensions.insert(0, ext),
            None => self.trailing.push(ext),
        }
    }

    /// All non-image extensions in file order
    pub fn extensions(&self) -> impl Iterator<Item = &Extension> {
        self.frames.iter().flat_map(|f| f.extensions.iter()).chain(&self.trailing)
    }

    pub fn summary(&self) -> Summary {
        Summary {
            bits_per_pixel: self.bits_per_pixel(),
            width: self.width(),
            height: self.height(),
            color_table_size: self.global_table().map_or(0, |t| t.len()),
            frames: self.frames.len(),
        }
    }
}

/// Basic facts about a GIF, for display
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Summary {
    pub bits_per_pixel: u8,
    pub width: u16,
    pub height: u16,
    pub color_table_size: usize,
    pub frames: usize,
}

impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Bits/pixel: {}", self.bits_per_pixel)?;
        writeln!(f, "Dimension: {} x {}", self.width, self.height)?;
        writeln!(f, "Color table size: {}", self.color_table_size)?;
        write!(f, "Number of images: {}", self.frames)
    }
}

#[test]
fn authoring() {
    let gif = Gif::new(4, 20, 10, 3, true).unwrap();
    assert_eq!(gif.global_table().unwrap().len(), 16);
    assert_eq!(gif.loop_count(), Some(0));
    assert!(gif.frames().all(|f| f.disposal() == DisposalMethod::Keep && f.descriptor().bits_per_pixel() == 4));

    let single = Gif::new(3, 5, 5, 1, false).unwrap();
    assert!(single.global_table().is_none());
    let frame = single.frame(0).unwrap();
    assert_eq!(frame.control(), None);
    assert_eq!(frame.descriptor().local_table().unwrap().len(), 8);
    assert_eq!(single.loop_count(), None);
}

#[test]
fn global_table_size() {
    let mut gif = Gif::new(8, 4, 4, 2, true).unwrap();
    gif.set_background_color(200).unwrap();
    assert!(gif.set_color_table_size(5).unwrap());
    assert_eq!(gif.bits_per_pixel(), 3);
    assert_eq!(gif.frame(1).unwrap().descriptor().bits_per_pixel(), 3);
    assert!(gif.set_background_color(8).is_err());
    assert!(!gif.set_color_table_size(8).unwrap());

    assert!(gif.set_color_table_size(0).unwrap());
    assert_eq!(gif.background_color(), 0);
    assert!(gif.global_table().is_none());
    assert_eq!(gif.frame(0).unwrap().descriptor().bits_per_pixel(), 2);
    assert!(gif.set_color_table_size(300).is_err());
}

#[test]
fn global_shrink_keeps_pixels_valid() {
    let mut gif = Gif::new(4, 2, 2, 2, true).unwrap();
    gif.frame_mut(1).unwrap().set_pixel(1, 1, 9).unwrap();
    assert!(gif.set_color_table_size(8).is_err());
    assert!(gif.set_color_table_size(0).is_err());
    assert_eq!(gif.global_table().unwrap().len(), 16);
    assert_eq!(gif.frame(1).unwrap().descriptor().bits_per_pixel(), 4);

    gif.frames[1].descriptor.set_color_table_size(16).unwrap();
    assert!(gif.set_color_table_size(2).unwrap());
    assert_eq!(gif.frame(0).unwrap().descriptor().bits_per_pixel(), 2);
    assert_eq!(gif.frame(1).unwrap().descriptor().bits_per_pixel(), 4);
}

#[test]
fn file_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("anim.gif");
    let mut gif = Gif::new(2, 3, 3, 2, true).unwrap();
    gif.set_color(1, RGB8::new(0, 128, 255)).unwrap();
    gif.frame_mut(1).unwrap().set_pixel(2, 2, 1).unwrap();

    gif.export(&path, &Settings::default(), false).unwrap();
    assert_eq!(Gif::import(&path).unwrap(), gif);

    let other = Gif::new(2, 1, 1, 1, true).unwrap();
    assert!(matches!(other.export(&path, &Settings::default(), false), Err(Error::FileExists(_))));
    assert_eq!(Gif::import(&path).unwrap(), gif);
    other.export(&path, &Settings::default(), true).unwrap();
    assert_eq!(Gif::import(&path).unwrap(), other);

    assert!(matches!(Gif::import(dir.path().join("missing.gif")), Err(Error::Io(_))));
}

#[test]
fn loop_count_update() {
    let mut gif = Gif::new(2, 1, 1, 2, true).unwrap();
    gif.set_loop_count(3);
    assert_eq!(gif.loop_count(), Some(3));
    assert_eq!(gif.extensions().count(), 1);

    let mut single = Gif::new(2, 1, 1, 1, true).unwrap();
    single.set_loop_count(1);
    assert_eq!(single.loop_count(), Some(1));
}

#[test]
fn stamp_replaces_trailing_comment() {
    let mut gif = Gif::new(2, 2, 2, 1, true).unwrap();
    gif.trailing.push(Extension::comment("old"));
    let stamped = Gif::from_bytes(&gif.to_bytes(&Settings { stamp: true }).unwrap()).unwrap();
    assert_eq!(stamped.trailing.len(), 1);
    let Extension::Comment(text) = &stamped.trailing[0] else { panic!() };
    assert!(text.starts_with(b"Built with gifdownsize"));

    let plain = Gif::from_bytes(&gif.to_bytes(&Settings::default()).unwrap()).unwrap();
    assert_eq!(plain.trailing, [Extension::comment("old")]);
}

#[test]
fn missing_trailer() {
    let gif = Gif::new(2, 2, 2, 2, true).unwrap();
    let mut bytes = gif.to_bytes(&Settings::default()).unwrap();
    assert_eq!(Gif::from_bytes(&bytes).unwrap(), gif);
    bytes.pop();
    assert!(Gif::from_bytes(&bytes).unwrap_err().is_format_error());
    assert!(Gif::from_bytes(b"PNG").unwrap_err().is_format_error());
}
