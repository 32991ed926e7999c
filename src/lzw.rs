//! Pixel data codec, a thin layer over weezl's LSB-first GIF variant

use crate::error::*;
use weezl::{BitOrder, LzwStatus};

/// GIF allows minimum code sizes 2..=8
pub(crate) fn check_code_size(code_size: u8) -> CatResult<()> {
    if !(2..=8).contains(&code_size) {
        return Err(Error::format(format!("unsupported LZW code size {code_size}")));
    }
    Ok(())
}

pub fn encode(code_size: u8, indices: &[u8]) -> CatResult<Vec<u8>> {
    check_code_size(code_size)?;
    let limit = 1u16 << code_size;
    if let Some(&bad) = indices.iter().find(|&&i| u16::from(i) >= limit) {
        return Err(Error::range(format!("pixel index {bad} does not fit in {code_size} bits")));
    }
    Ok(weezl::encode::Encoder::new(BitOrder::Lsb, code_size).encode(indices)?)
}

/// Decodes exactly `count` indices. Extra data is ignored, missing data is an error.
///
/// Running out of data counts as the end of the stream, so a missing end code is fine.
pub fn decode(code_size: u8, data: &[u8], count: usize) -> CatResult<Vec<u8>> {
    check_code_size(code_size)?;
    let mut decoder = weezl::decode::Decoder::new(BitOrder::Lsb, code_size);
    let mut indices = vec![0; count];
    let (mut input, mut filled) = (data, 0);
    while filled < count {
        let res = decoder.decode_bytes(input, &mut indices[filled..]);
        input = &input[res.consumed_in..];
        filled += res.consumed_out;
        match res.status? {
            LzwStatus::Ok if res.consumed_in > 0 || res.consumed_out > 0 => {},
            LzwStatus::Ok | LzwStatus::NoProgress | LzwStatus::Done => break,
        }
    }
    if filled < count {
        return Err(Error::format("wrong image data size"));
    }
    Ok(indices)
}

#[test]
fn codec_pair() {
    let pixels: Vec<u8> = (0..200u32).map(|n| (n * 7 % 13) as u8).collect();
    let packed = encode(4, &pixels).unwrap();
    assert!(packed.len() < pixels.len());
    assert_eq!(decode(4, &packed, 200).unwrap(), pixels);
    assert_eq!(decode(4, &packed, 150).unwrap(), &pixels[..150]);
    assert!(decode(4, &packed, 201).unwrap_err().is_format_error());
}

#[test]
fn stream_without_end_code() {
    // clear code, then index 1, then the data runs out
    assert_eq!(decode(2, &[0x0C], 1).unwrap(), [1]);
    assert!(decode(2, &[0x0C], 2).unwrap_err().is_format_error());
    assert!(decode(2, &[], 1).unwrap_err().is_format_error());
}

#[test]
fn bad_code_size() {
    assert!(encode(9, &[0]).is_err());
    assert!(decode(1, &[], 0).is_err());
    assert!(encode(2, &[4]).is_err());
}
