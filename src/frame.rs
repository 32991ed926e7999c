use crate::control::*;
use crate::descriptor::FrameDescriptor;
use crate::error::*;
use crate::palette::PaletteTable;
use crate::record::Extension;
use rgb::RGB8;
use std::ops::{Deref, DerefMut};

/// One image of a GIF, with the graphics control block that preceded it
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub(crate) descriptor: FrameDescriptor,
    pub(crate) control: Option<GraphicsControl>,
    /// Metadata that was read between the previous frame and this one
    pub(crate) extensions: Vec<Extension>,
}

impl Frame {
    pub fn new(descriptor: FrameDescriptor, control: Option<GraphicsControl>) -> Self {
        Self {
            descriptor,
            control,
            extensions: Vec::new(),
        }
    }

    #[inline]
    pub fn descriptor(&self) -> &FrameDescriptor {
        &self.descriptor
    }

    #[inline]
    pub fn descriptor_mut(&mut self) -> &mut FrameDescriptor {
        &mut self.descriptor
    }

    #[inline]
    pub fn control(&self) -> Option<&GraphicsControl> {
        self.control.as_ref()
    }

    /// Adds a default graphics control block if there isn't one
    pub fn ensure_control(&mut self) -> &mut GraphicsControl {
        self.control.get_or_insert_with(GraphicsControl::default)
    }

    #[inline]
    pub fn extensions(&self) -> &[Extension] {
        &self.extensions
    }

    #[inline]
    pub fn extensions_mut(&mut self) -> &mut Vec<Extension> {
        &mut self.extensions
    }

    /// `Unspecified` when there's no graphics control block
    pub fn disposal(&self) -> DisposalMethod {
        self.control.map_or(DisposalMethod::Unspecified, |c| c.disposal)
    }

    pub fn set_disposal(&mut self, disposal: DisposalMethod) -> CatResult<()> {
        self.control_mut()?.disposal = disposal;
        Ok(())
    }

    /// In 1/100ths of a second
    pub fn delay(&self) -> u16 {
        self.control.map_or(0, |c| c.delay)
    }

    pub fn set_delay(&mut self, delay: u16) -> CatResult<()> {
        self.control_mut()?.delay = delay;
        Ok(())
    }

    pub fn user_input(&self) -> bool {
        self.control.is_some_and(|c| c.user_input)
    }

    pub fn set_user_input(&mut self, user_input: bool) -> CatResult<()> {
        self.control_mut()?.user_input = user_input;
        Ok(())
    }

    pub fn transparent_index(&self) -> Option<u8> {
        self.control.and_then(|c| c.transparent_index())
    }

    /// Turns transparency off without touching the index
    pub fn clear_transparency(&mut self) {
        if let Some(c) = &mut self.control {
            c.transparent = false;
        }
    }

    #[inline]
    pub fn is_transparent_index(&self, index: u8) -> bool {
        self.transparent_index() == Some(index)
    }

    /// Number of pixels drawn with the transparent index
    pub fn transparent_pixels(&self) -> usize {
        match self.transparent_index() {
            Some(t) => self.descriptor.pixels().pixels().filter(|&p| p == t).count(),
            None => 0,
        }
    }

    fn control_mut(&mut self) -> CatResult<&mut GraphicsControl> {
        self.control.as_mut().ok_or_else(|| Error::range("frame has no graphics control block"))
    }
}

/// A frame together with the global palette it falls back to
#[derive(Copy, Clone, Debug)]
pub struct FrameRef<'a> {
    pub(crate) frame: &'a Frame,
    pub(crate) global: &'a PaletteTable,
}

impl<'a> FrameRef<'a> {
    /// Local palette if the frame has one, otherwise the global one
    pub fn active_table(&self) -> &'a PaletteTable {
        self.frame.descriptor.local_table().unwrap_or(self.global)
    }

    pub fn color(&self, index: u8) -> CatResult<RGB8> {
        self.active_table().get(index.into())
    }

    #[inline]
    pub fn is_transparent(&self, x: usize, y: usize) -> CatResult<bool> {
        Ok(self.frame.is_transparent_index(self.frame.descriptor.pixel(x, y)?))
    }

    /// Color of a pixel, ignoring transparency
    pub fn pixel_color(&self, x: usize, y: usize) -> CatResult<RGB8> {
        self.color(self.frame.descriptor.pixel(x, y)?)
    }

    /// `None` for transparent pixels
    pub fn visible_color(&self, x: usize, y: usize) -> CatResult<Option<RGB8>> {
        let index = self.frame.descriptor.pixel(x, y)?;
        if self.frame.is_transparent_index(index) {
            return Ok(None);
        }
        self.color(index).map(Some)
    }
}

impl Deref for FrameRef<'_> {
    type Target = Frame;

    fn deref(&self) -> &Frame {
        self.frame
    }
}

/// Same placement, and each pixel is either transparent in both or the same color
impl PartialEq for FrameRef<'_> {
    fn eq(&self, other: &Self) -> bool {
        let (a, b) = (&self.frame.descriptor, &other.frame.descriptor);
        if (a.left(), a.top(), a.width(), a.height()) != (b.left(), b.top(), b.width(), b.height()) {
            return false;
        }
        a.pixels().pixels().zip(b.pixels().pixels()).all(|(pa, pb)| {
            match (self.frame.is_transparent_index(pa), other.frame.is_transparent_index(pb)) {
                (true, true) => true,
                (false, false) => match (self.color(pa), other.color(pb)) {
                    (Ok(ca), Ok(cb)) => ca == cb,
                    (Err(_), Err(_)) => pa == pb,
                    _ => false,
                },
                _ => false,
            }
        })
    }
}

/// Mutable frame that checks indices against the palette in effect
#[derive(Debug)]
pub struct FrameMut<'a> {
    pub(crate) frame: &'a mut Frame,
    pub(crate) global: &'a PaletteTable,
}

impl<'a> FrameMut<'a> {
    #[inline]
    pub fn as_frame_ref(&self) -> FrameRef<'_> {
        FrameRef { frame: self.frame, global: self.global }
    }

    fn table_len(&self) -> usize {
        self.as_frame_ref().active_table().len()
    }

    fn check_index(&self, index: u8) -> CatResult<()> {
        let len = self.table_len();
        if usize::from(index) >= len {
            return Err(Error::range(format!("color index {index} is outside the palette of {len}")));
        }
        Ok(())
    }

    pub fn set_pixel(&mut self, x: usize, y: usize, index: u8) -> CatResult<()> {
        self.check_index(index)?;
        self.frame.descriptor.set_pixel(x, y, index)
    }

    /// `None` turns transparency off. Fails without a graphics control block.
    pub fn set_transparent_index(&mut self, index: Option<u8>) -> CatResult<()> {
        if let Some(index) = index {
            self.check_index(index)?;
        }
        let control = self.frame.control_mut()?;
        match index {
            Some(index) => {
                control.transparent = true;
                control.transparent_index = index;
            },
            None => control.transparent = false,
        }
        Ok(())
    }
}

impl Deref for FrameMut<'_> {
    type Target = Frame;

    fn deref(&self) -> &Frame {
        self.frame
    }
}

impl DerefMut for FrameMut<'_> {
    fn deref_mut(&mut self) -> &mut Frame {
        self.frame
    }
}

#[cfg(test)]
fn two_color_frame(left: u16, indices: &[u8]) -> Frame {
    let mut fd = FrameDescriptor::new(left, 0, indices.len() as u16, 1, 2).unwrap();
    for (x, &i) in indices.iter().enumerate() {
        fd.set_pixel(x, 0, i).unwrap();
    }
    Frame::new(fd, Some(GraphicsControl::default()))
}

#[test]
fn equality_by_color() {
    let global = PaletteTable::from_colors(vec![RGB8::new(1, 1, 1), RGB8::new(9, 9, 9), RGB8::new(1, 1, 1), RGB8::new(5, 5, 5)]).unwrap();
    let a = two_color_frame(0, &[0, 1, 3]);
    let b = two_color_frame(0, &[2, 1, 3]);
    let (ra, rb) = (FrameRef { frame: &a, global: &global }, FrameRef { frame: &b, global: &global });
    assert!(ra == ra);
    assert!(ra == rb);
    assert!(rb == ra);

    let mut c = b.clone();
    c.ensure_control().transparent = true;
    c.ensure_control().transparent_index = 3;
    let mut d = two_color_frame(0, &[0, 1, 0]);
    d.ensure_control().transparent = true;
    d.ensure_control().transparent_index = 0;
    let rc = FrameRef { frame: &c, global: &global };
    assert!(rc != ra);
    assert!(rc != FrameRef { frame: &d, global: &global });
    d.descriptor.set_pixel(0, 0, 2).unwrap();
    assert!(rc == FrameRef { frame: &d, global: &global });

    let moved = two_color_frame(1, &[0, 1, 3]);
    assert!(ra != FrameRef { frame: &moved, global: &global });
}

#[test]
fn no_control_block() {
    let mut f = Frame::new(FrameDescriptor::new(0, 0, 1, 1, 2).unwrap(), None);
    assert_eq!(f.disposal(), DisposalMethod::Unspecified);
    assert_eq!(f.delay(), 0);
    assert_eq!(f.transparent_index(), None);
    assert!(f.set_delay(5).is_err());
    assert!(f.set_disposal(DisposalMethod::Keep).is_err());
    assert_eq!(f.control(), None);

    let global = PaletteTable::from_colors(vec![RGB8::new(0, 0, 0); 2]).unwrap();
    let mut fm = FrameMut { frame: &mut f, global: &global };
    assert!(fm.set_transparent_index(Some(1)).is_err());
    fm.ensure_control();
    fm.set_transparent_index(Some(1)).unwrap();
    assert!(fm.set_transparent_index(Some(2)).is_err());
    assert!(fm.set_pixel(0, 0, 2).is_err());
    fm.set_pixel(0, 0, 1).unwrap();
    assert_eq!(fm.transparent_pixels(), 1);
}
