//! Tagged records of a GIF stream, between the screen descriptor and the trailer

use crate::block::*;
use crate::control::{self, GraphicsControl};
use crate::descriptor::FrameDescriptor;
use crate::error::*;

const APPLICATION_LABEL: u8 = 0xFF;
const COMMENT_LABEL: u8 = 0xFE;
const PLAIN_TEXT_LABEL: u8 = 0x01;

/// Application extension, e.g. the `NETSCAPE2.0` looping block
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Application {
    pub identifier: [u8; 8],
    pub auth_code: [u8; 3],
    pub data: Vec<u8>,
}

impl Application {
    /// `NETSCAPE2.0` block. 0 loops forever.
    pub fn looping(count: u16) -> Self {
        let [lo, hi] = count.to_le_bytes();
        Self {
            identifier: *b"NETSCAPE",
            auth_code: *b"2.0",
            data: vec![1, lo, hi],
        }
    }

    fn is_looping(&self) -> bool {
        (&self.identifier == b"NETSCAPE" || &self.identifier == b"ANIMEXTS") && &self.auth_code == b"2.0"
    }

    /// Number of repetitions declared by a looping block
    pub fn loop_count(&self) -> Option<u16> {
        match self.data[..] {
            [1, lo, hi] if self.is_looping() => Some(u16::from_le_bytes([lo, hi])),
            _ => None,
        }
    }

    /// Returns false if this is not a looping block
    pub fn set_loop_count(&mut self, count: u16) -> bool {
        if !self.is_looping() {
            return false;
        }
        let [lo, hi] = count.to_le_bytes();
        self.data = vec![1, lo, hi];
        true
    }
}

/// Extensions that don't affect how pixels are drawn
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Extension {
    Application(Application),
    Comment(Vec<u8>),
    PlainText {
        /// Text grid position, cell size and colors
        header: Vec<u8>,
        text: Vec<u8>,
    },
    /// Any other label, kept so it can be written back
    Unknown {
        label: u8,
        data: Vec<u8>,
    },
}

impl Extension {
    pub fn comment(text: &str) -> Self {
        Self::Comment(text.as_bytes().to_vec())
    }

    pub(crate) fn write(&self, out: &mut Vec<u8>) -> CatResult<()> {
        out.push(EXTENSION_INTRODUCER);
        match self {
            Self::Application(app) => {
                out.push(APPLICATION_LABEL);
                let mut info = [0; 11];
                info[..8].copy_from_slice(&app.identifier);
                info[8..].copy_from_slice(&app.auth_code);
                write_block(out, &info)?;
                write_sub_blocks(out, &app.data);
            },
            Self::Comment(text) => {
                out.push(COMMENT_LABEL);
                write_sub_blocks(out, text);
            },
            Self::PlainText { header, text } => {
                out.push(PLAIN_TEXT_LABEL);
                write_block(out, header)?;
                write_sub_blocks(out, text);
            },
            Self::Unknown { label, data } => {
                out.push(*label);
                write_sub_blocks(out, data);
            },
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Record {
    Extension(Extension),
    GraphicsControl(GraphicsControl),
    Image(FrameDescriptor),
}

/// Which record an extension label introduces
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub(crate) enum RecordKind {
    Application,
    Comment,
    GraphicsControl,
    PlainText,
    Unknown(u8),
}

impl RecordKind {
    /// Never fails: unrecognized labels are `Unknown`
    pub fn from_label(label: u8) -> Self {
        match label {
            APPLICATION_LABEL => Self::Application,
            COMMENT_LABEL => Self::Comment,
            control::LABEL => Self::GraphicsControl,
            PLAIN_TEXT_LABEL => Self::PlainText,
            other => Self::Unknown(other),
        }
    }
}

/// Reads the next record. `None` at the trailer.
pub(crate) fn read_record(reader: &mut ByteReader<'_>) -> CatResult<Option<Record>> {
    let record = match reader.take_byte()? {
        TRAILER => return Ok(None),
        IMAGE_SEPARATOR => Record::Image(FrameDescriptor::read(reader)?),
        EXTENSION_INTRODUCER => match RecordKind::from_label(reader.take_byte()?) {
            RecordKind::GraphicsControl => Record::GraphicsControl(GraphicsControl::read(reader)?),
            RecordKind::Application => {
                let info = reader.take_block()?;
                if info.len() != 11 {
                    return Err(Error::format(format!("application extension header has {} bytes", info.len())));
                }
                let mut identifier = [0; 8];
                let mut auth_code = [0; 3];
                identifier.copy_from_slice(&info[..8]);
                auth_code.copy_from_slice(&info[8..]);
                Record::Extension(Extension::Application(Application {
                    identifier,
                    auth_code,
                    data: reader.take_sub_blocks()?,
                }))
            },
            RecordKind::Comment => Record::Extension(Extension::Comment(reader.take_sub_blocks()?)),
            RecordKind::PlainText => {
                let header = reader.take_block()?.to_vec();
                Record::Extension(Extension::PlainText { header, text: reader.take_sub_blocks()? })
            },
            RecordKind::Unknown(label) => Record::Extension(Extension::Unknown { label, data: reader.take_sub_blocks()? }),
        },
        other => return Err(Error::format(format!("not a valid GIF file (unexpected block 0x{other:02X})"))),
    };
    Ok(Some(record))
}

#[test]
fn label_factory() {
    assert_eq!(RecordKind::from_label(0xF9), RecordKind::GraphicsControl);
    assert_eq!(RecordKind::from_label(0xFE), RecordKind::Comment);
    assert_eq!(RecordKind::from_label(0x01), RecordKind::PlainText);
    assert_eq!(RecordKind::from_label(0x42), RecordKind::Unknown(0x42));
}

#[test]
fn extension_records() {
    let mut app = Application::looping(3);
    assert_eq!(app.loop_count(), Some(3));
    assert!(app.set_loop_count(0));
    let exts = [
        Extension::Application(app),
        Extension::comment("hello"),
        Extension::PlainText { header: vec![0; 12], text: b"hi".to_vec() },
        Extension::Unknown { label: 0x42, data: vec![7; 300] },
    ];
    let mut out = Vec::new();
    for e in &exts {
        e.write(&mut out).unwrap();
    }
    out.push(TRAILER);

    let mut r = ByteReader::new(&out);
    for e in &exts {
        assert_eq!(read_record(&mut r).unwrap(), Some(Record::Extension(e.clone())));
    }
    assert_eq!(read_record(&mut r).unwrap(), None);
}

#[test]
fn other_apps_dont_loop() {
    let mut app = Application { identifier: *b"XMP Data", auth_code: *b"XMP", data: vec![1, 2, 3] };
    assert_eq!(app.loop_count(), None);
    assert!(!app.set_loop_count(1));
    assert!(read_record(&mut ByteReader::new(&[0x00])).is_err());
}
