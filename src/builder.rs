//! Groups the flat record stream into frames

use crate::control::GraphicsControl;
use crate::frame::Frame;
use crate::record::{Extension, Record};

#[derive(Debug, Clone, Copy, PartialEq)]
enum State {
    AwaitingFrame,
    HaveGraphicsControl(GraphicsControl),
}

/// A graphics control block belongs to the image that follows it.
///
/// A second control block before an image replaces the first, and one left at the end is dropped.
/// Other extensions are attached to the next image.
pub(crate) struct FrameBuilder {
    state: State,
    pending: Vec<Extension>,
    frames: Vec<Frame>,
}

impl FrameBuilder {
    pub fn new() -> Self {
        Self {
            state: State::AwaitingFrame,
            pending: Vec::new(),
            frames: Vec::new(),
        }
    }

    pub fn push(&mut self, record: Record) {
        match record {
            Record::GraphicsControl(control) => {
                self.state = State::HaveGraphicsControl(control);
            },
            Record::Image(descriptor) => {
                let control = match std::mem::replace(&mut self.state, State::AwaitingFrame) {
                    State::HaveGraphicsControl(control) => Some(control),
                    State::AwaitingFrame => None,
                };
                let mut frame = Frame::new(descriptor, control);
                frame.extensions = std::mem::take(&mut self.pending);
                self.frames.push(frame);
            },
            Record::Extension(ext) => {
                self.pending.push(ext);
            },
        }
    }

    /// Frames, and extensions that came after the last image
    pub fn finish(self) -> (Vec<Frame>, Vec<Extension>) {
        (self.frames, self.pending)
    }
}

#[cfg(test)]
use crate::descriptor::FrameDescriptor;

#[cfg(test)]
fn image(width: u16) -> Record {
    Record::Image(FrameDescriptor::new(0, 0, width, 1, 2).unwrap())
}

#[cfg(test)]
fn delay(delay: u16) -> Record {
    Record::GraphicsControl(GraphicsControl { delay, ..Default::default() })
}

#[test]
fn pairs_control_with_image() {
    let mut b = FrameBuilder::new();
    b.push(Record::Extension(Extension::comment("lead")));
    b.push(image(1));
    b.push(delay(5));
    b.push(image(2));
    let (frames, trailing) = b.finish();
    assert_eq!(frames.len(), 2);
    assert_eq!(frames[0].control(), None);
    assert_eq!(frames[0].extensions(), &[Extension::comment("lead")]);
    assert_eq!(frames[1].delay(), 5);
    assert_eq!(frames[1].descriptor().width(), 2);
    assert!(trailing.is_empty());
}

#[test]
fn second_control_wins() {
    let mut b = FrameBuilder::new();
    b.push(delay(1));
    b.push(Record::Extension(Extension::comment("between")));
    b.push(delay(2));
    b.push(image(1));
    let (frames, _) = b.finish();
    assert_eq!(frames.len(), 1);
    assert_eq!(frames[0].delay(), 2);
    assert_eq!(frames[0].extensions().len(), 1);
}

#[test]
fn dangling_control_dropped() {
    let mut b = FrameBuilder::new();
    b.push(image(1));
    b.push(delay(7));
    b.push(Record::Extension(Extension::comment("end")));
    let (frames, trailing) = b.finish();
    assert_eq!(frames.len(), 1);
    assert_eq!(frames[0].delay(), 0);
    assert_eq!(trailing, [Extension::comment("end")]);
}
