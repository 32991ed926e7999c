/*
 gifdownsize lossless GIF optimizer
 © 2017 Kornel Lesiński

 This program is free software: you can redistribute it and/or modify
 it under the terms of the GNU Affero General Public License as
 published by the Free Software Foundation, either version 3 of the
 License, or (at your option) any later version.

 This program is distributed in the hope that it will be useful,
 but WITHOUT ANY WARRANTY; without even the implied warranty of
 MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 GNU Affero General Public License for more details.

 You should have received a copy of the GNU Affero General Public License
 along with this program.  If not, see <https://www.gnu.org/licenses/>.
*/
//! Reads GIF89a files into an editable model, and shrinks them without changing how they look.
//!
//! ```rust,no_run
//! # fn main() -> gifdownsize::CatResult<()> {
//! let data = std::fs::read("anim.gif")?;
//! let outcome = gifdownsize::downsize(&data, &Default::default(), &mut gifdownsize::progress::NoProgress {})?;
//! if let Some(smaller) = outcome.output {
//!     std::fs::write("anim-downsized.gif", smaller)?;
//! }
//! # Ok(()) }
//! ```

mod block;
mod builder;
mod canvas;
mod consolidate;
mod control;
mod crop;
mod descriptor;
mod downsize;
mod error;
mod frame;
mod gif;
mod lzw;
mod palette;
mod record;
mod screen;
pub mod progress;

pub use crate::control::{DisposalMethod, GraphicsControl};
pub use crate::descriptor::FrameDescriptor;
pub use crate::downsize::{downsize, optimize, Outcome};
pub use crate::error::*;
pub use crate::frame::{Frame, FrameMut, FrameRef};
pub use crate::gif::{Gif, Summary};
pub use crate::lzw::{decode as lzw_decode, encode as lzw_encode};
pub use crate::palette::{rounded_len, roundup_bits, size_to_bpp, ColorTableFlags, PaletteTable, MAX_COLORS, WHITE};
pub use crate::record::{Application, Extension, Record};
pub use crate::screen::{Screen, Version};

#[derive(Copy, Clone, Default, Debug)]
pub struct Settings {
    /// Append a comment naming this library, replacing a comment at the end of the file
    pub stamp: bool,
}
