use crate::block::*;
use crate::error::*;

pub(crate) const LABEL: u8 = 0xF9;

/// What happens to a frame's area before the next frame is drawn
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub enum DisposalMethod {
    Unspecified,
    /// Leave the frame in place
    #[default]
    Keep,
    /// Clear to the background
    Background,
    /// Restore to what was there before
    Previous,
    Reserved(u8),
}

impl From<u8> for DisposalMethod {
    fn from(n: u8) -> Self {
        match n & 0b111 {
            0 => Self::Unspecified,
            1 => Self::Keep,
            2 => Self::Background,
            3 => Self::Previous,
            n => Self::Reserved(n),
        }
    }
}

impl From<DisposalMethod> for u8 {
    fn from(d: DisposalMethod) -> Self {
        match d {
            DisposalMethod::Unspecified => 0,
            DisposalMethod::Keep => 1,
            DisposalMethod::Background => 2,
            DisposalMethod::Previous => 3,
            DisposalMethod::Reserved(n) => n & 0b111,
        }
    }
}

/// Graphics control extension: timing, disposal and transparency of the next frame
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct GraphicsControl {
    pub disposal: DisposalMethod,
    /// In 1/100ths of a second
    pub delay: u16,
    pub user_input: bool,
    pub transparent: bool,
    pub transparent_index: u8,
}

impl GraphicsControl {
    /// Index of the transparent color, if transparency is on
    #[inline]
    pub fn transparent_index(&self) -> Option<u8> {
        self.transparent.then_some(self.transparent_index)
    }

    pub(crate) fn from_packed(data: [u8; 4]) -> Self {
        let [packed, delay_lo, delay_hi, transparent_index] = data;
        Self {
            disposal: (packed >> 2).into(),
            delay: u16::from_le_bytes([delay_lo, delay_hi]),
            user_input: packed & 0b10 != 0,
            transparent: packed & 0b1 != 0,
            transparent_index,
        }
    }

    pub(crate) fn packed(&self) -> [u8; 4] {
        let packed = u8::from(self.disposal) << 2 | u8::from(self.user_input) << 1 | u8::from(self.transparent);
        let [delay_lo, delay_hi] = self.delay.to_le_bytes();
        [packed, delay_lo, delay_hi, self.transparent_index]
    }

    /// Reads the body that follows the `0x21 0xF9` introducer
    pub(crate) fn read(reader: &mut ByteReader<'_>) -> CatResult<Self> {
        let data = reader.take_sub_blocks()?;
        let data: [u8; 4] = data.as_slice().try_into()
            .map_err(|_| Error::format(format!("graphics control block has {} bytes instead of 4", data.len())))?;
        Ok(Self::from_packed(data))
    }

    pub(crate) fn write(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&[EXTENSION_INTRODUCER, LABEL]);
        write_sub_blocks(out, &self.packed());
    }
}

#[test]
fn packed_fields() {
    let gc = GraphicsControl::from_packed([0b000_010_1_1, 0x2C, 0x01, 7]);
    assert_eq!(gc.disposal, DisposalMethod::Background);
    assert_eq!(gc.delay, 300);
    assert!(gc.user_input);
    assert_eq!(gc.transparent_index(), Some(7));
    assert_eq!(gc.packed(), [0b000_010_1_1, 0x2C, 0x01, 7]);

    let reserved = GraphicsControl::from_packed([0b000_110_0_0, 0, 0, 0]);
    assert_eq!(reserved.disposal, DisposalMethod::Reserved(6));
    assert_eq!(reserved.transparent_index(), None);
}

#[test]
fn payload_length() {
    let mut ok = ByteReader::new(&[4, 0b100, 10, 0, 3, 0]);
    assert_eq!(GraphicsControl::read(&mut ok).unwrap().disposal, DisposalMethod::Keep);

    let mut short = ByteReader::new(&[3, 0, 10, 0, 0]);
    assert!(GraphicsControl::read(&mut short).unwrap_err().is_format_error());
    let mut long = ByteReader::new(&[4, 0, 10, 0, 3, 1, 9, 0]);
    assert!(GraphicsControl::read(&mut long).unwrap_err().is_format_error());
}
