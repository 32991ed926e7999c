use crate::block::*;
use crate::error::*;
use crate::palette::*;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Version {
    V87a,
    V89a,
}

/// Logical screen descriptor, without the global palette itself
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Screen {
    pub version: Version,
    pub width: u16,
    pub height: u16,
    /// Color resolution in bits, 1..=8
    pub resolution: u8,
    pub flags: ColorTableFlags,
    pub background: u8,
    pub aspect_ratio: u8,
}

impl Screen {
    pub(crate) fn read(reader: &mut ByteReader<'_>) -> CatResult<Self> {
        let version = match &reader.take_arr::<6>().map_err(|_| not_a_gif())? {
            b"GIF87a" => Version::V87a,
            b"GIF89a" => Version::V89a,
            _ => return Err(not_a_gif()),
        };
        let width = reader.take_u16_le()?;
        let height = reader.take_u16_le()?;
        let packed = reader.take_byte()?;
        let background = reader.take_byte()?;
        let aspect_ratio = reader.take_byte()?;
        Ok(Self {
            version,
            width,
            height,
            resolution: ((packed >> 4) & 0b111) + 1,
            flags: ColorTableFlags {
                present: packed & 0x80 != 0,
                sorted: packed & 0x08 != 0,
                size_bits: packed & 0b111,
            },
            background,
            aspect_ratio,
        })
    }

    pub(crate) fn write(&self, out: &mut Vec<u8>, version: Version) {
        out.extend_from_slice(match version {
            Version::V87a => b"GIF87a",
            Version::V89a => b"GIF89a",
        });
        write_u16_le(out, self.width);
        write_u16_le(out, self.height);
        let packed = u8::from(self.flags.present) << 7
            | (self.resolution.clamp(1, 8) - 1) << 4
            | u8::from(self.flags.sorted) << 3
            | if self.flags.present { self.flags.size_bits & 0b111 } else { 0 };
        out.push(packed);
        out.push(self.background);
        out.push(self.aspect_ratio);
    }
}

#[cold]
fn not_a_gif() -> Error {
    Error::format("not a GIF file")
}

#[test]
fn screen_fields() {
    let bytes = b"GIF89a\x0A\x00\x14\x00\xF2\x03\x00";
    let screen = Screen::read(&mut ByteReader::new(bytes)).unwrap();
    assert_eq!(screen.version, Version::V89a);
    assert_eq!((screen.width, screen.height), (10, 20));
    assert_eq!(screen.resolution, 8);
    assert_eq!(screen.flags, ColorTableFlags { present: true, sorted: false, size_bits: 2 });
    assert_eq!(screen.background, 3);

    let mut out = Vec::new();
    screen.write(&mut out, Version::V89a);
    assert_eq!(&out, bytes);
}

#[test]
fn bad_signature() {
    assert!(Screen::read(&mut ByteReader::new(b"GIF90a\0\0\0\0\0\0\0")).unwrap_err().is_format_error());
    assert!(Screen::read(&mut ByteReader::new(b"GI")).unwrap_err().is_format_error());
}
