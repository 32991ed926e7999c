use gifdownsize::*;
use imgref::ImgRef;
use rgb::{RGB8, RGBA8};
use std::borrow::Cow;

fn gray_palette(n: usize) -> Vec<u8> {
    (0..n).flat_map(|i| {
        let c = (i * 255 / n.max(2)) as u8;
        [c, c / 2, 255 - c]
    }).collect()
}

fn gif_frame(width: u16, height: u16, buffer: Vec<u8>, delay: u16) -> gif::Frame<'static> {
    gif::Frame {
        width,
        height,
        buffer: Cow::Owned(buffer),
        delay,
        dispose: gif::DisposalMethod::Keep,
        ..gif::Frame::default()
    }
}

fn encode(width: u16, height: u16, global_palette: &[u8], frames: &[gif::Frame<'_>]) -> Vec<u8> {
    let mut out = Vec::new();
    {
        let mut enc = gif::Encoder::new(&mut out, width, height, global_palette).unwrap();
        enc.set_repeat(gif::Repeat::Infinite).unwrap();
        for frame in frames {
            enc.write_frame(frame).unwrap();
        }
    }
    out
}

fn optimized(data: &[u8]) -> Vec<u8> {
    let outcome = downsize(data, &Settings::default(), &mut progress::NoProgress {}).unwrap();
    assert!(outcome.output_len < outcome.original_len);
    outcome.output.unwrap()
}

#[test]
fn duplicate_frame_collapses() {
    let pixels: Vec<u8> = (0..16).map(|i| if i % 3 == 0 { 2 } else { 0 }).collect();
    let input = encode(4, 4, &gray_palette(4), &[
        gif_frame(4, 4, pixels.clone(), 10),
        gif_frame(4, 4, pixels, 20),
    ]);
    let out = optimized(&input);
    assert_same_animation(&input, &out);

    let mut delays = vec![];
    for_each_frame(&out, |frame, _| delays.push(frame.delay));
    assert_eq!(delays, [30]);

    let gif = Gif::from_bytes(&out).unwrap();
    assert_eq!(gif.global_table().unwrap().len(), 2);
    assert_eq!(gif.frame(0).unwrap().descriptor().bits_per_pixel(), 2);
}

#[test]
fn crops_to_changed_area() {
    let mut pixels = vec![0u8; 100];
    let mut frames = vec![gif_frame(10, 10, pixels.clone(), 10)];
    for (n, (left, top)) in [(2, 2), (6, 5)].into_iter().enumerate() {
        for y in top..top + 3 {
            for x in left..left + 3 {
                pixels[y * 10 + x] = n as u8 + 1;
            }
        }
        frames.push(gif_frame(10, 10, pixels.clone(), 10));
    }
    let input = encode(10, 10, &gray_palette(4), &frames);
    let out = optimized(&input);
    assert_same_animation(&input, &out);

    let mut rects = vec![];
    for_each_frame(&out, |frame, _| {
        assert_eq!(frame.dispose, gif::DisposalMethod::Keep);
        rects.push((frame.left, frame.top, frame.width, frame.height));
    });
    assert_eq!(rects, [(0, 0, 10, 10), (2, 2, 3, 3), (6, 5, 3, 3)]);
}

#[test]
fn local_palettes_become_global() {
    let palette = gray_palette(16);
    let reversed: Vec<u8> = palette.chunks(3).rev().flatten().copied().collect();
    let mut frames = Vec::new();
    for n in 0..3usize {
        let pixels = (0..64).map(|i| if n == 0 { (i % 16) as u8 } else { ((i / 8 + n) % 8) as u8 }).collect();
        let mut frame = gif_frame(8, 8, pixels, 10);
        frame.palette = Some(if n == 0 { palette.clone() } else { reversed.clone() });
        frames.push(frame);
    }
    let input = encode(8, 8, &gray_palette(256), &frames);
    let out = optimized(&input);
    assert_same_animation(&input, &out);

    let gif = Gif::from_bytes(&out).unwrap();
    assert_eq!(gif.global_table().unwrap().len(), 16);
    assert!(gif.frames().all(|f| !f.descriptor().has_local_table()));
}

#[test]
fn shared_local_palette_is_promoted() {
    let red: Vec<u8> = (0..=255u8).flat_map(|i| [i, 0, 0]).collect();
    let reversed: Vec<u8> = red.chunks(3).rev().flatten().copied().collect();
    let green: Vec<u8> = (0..=255u8).flat_map(|i| [i, 255, 0]).collect();
    let pixels: Vec<u8> = (0..=255u8).collect();
    let frames: Vec<_> = [red, reversed, green].into_iter().map(|palette| {
        let mut frame = gif_frame(16, 16, pixels.clone(), 10);
        frame.palette = Some(palette);
        frame
    }).collect();
    let input = encode(16, 16, &gray_palette(2), &frames);
    let out = optimized(&input);
    assert_same_animation(&input, &out);

    let gif = Gif::from_bytes(&out).unwrap();
    assert_eq!(gif.global_table().unwrap().len(), 256);
    let locals: Vec<bool> = gif.frames().map(|f| f.descriptor().has_local_table()).collect();
    assert_eq!(locals, [false, false, true]);
}

#[test]
fn single_pixel_frames_removed() {
    let input = encode(4, 4, &gray_palette(4), &[
        gif_frame(4, 4, vec![1; 16], 10),
        gif_frame(1, 1, vec![1], 50),
        gif_frame(4, 4, vec![2; 16], 20),
    ]);
    let out = optimized(&input);
    assert_same_animation(&input, &out);

    let mut delays = vec![];
    for_each_frame(&out, |frame, _| delays.push(frame.delay));
    assert_eq!(delays, [60, 20]);
}

#[test]
fn not_smaller_is_not_a_success() {
    let mut gif = Gif::new(2, 1, 1, 1, true).unwrap();
    gif.set_color_table_size(2).unwrap();
    let input = gif.to_bytes(&Settings::default()).unwrap();

    let outcome = downsize(&input, &Settings { stamp: true }, &mut progress::NoProgress {}).unwrap();
    assert!(!outcome.is_smaller());
    assert!(outcome.output.is_none());
    assert!(outcome.output_len >= outcome.original_len);
    assert_eq!(outcome.before, outcome.after);
}

#[test]
fn metadata_survives() {
    let mut gif = Gif::new(8, 6, 6, 2, true).unwrap();
    gif.set_loop_count(3);
    gif.set_color(7, RGB8::new(255, 0, 0)).unwrap();
    for (n, mut frame) in gif.frames_mut().enumerate() {
        frame.set_pixel(n, n, 7).unwrap();
        frame.set_delay(5).unwrap();
        frame.extensions_mut().push(Extension::comment("kept"));
    }
    let input = gif.to_bytes(&Settings::default()).unwrap();
    let out = optimized(&input);
    assert_same_animation(&input, &out);

    let gif = Gif::from_bytes(&out).unwrap();
    assert_eq!(gif.loop_count(), Some(3));
    assert_eq!(gif.extensions().filter(|e| **e == Extension::comment("kept")).count(), 2);
    assert!(gif.global_table().unwrap().len() < 256);
}

#[test]
fn rejects_malformed_input() {
    let mut reporter = progress::NoProgress {};
    assert!(downsize(b"GIF89a", &Settings::default(), &mut reporter).unwrap_err().is_format_error());
    assert!(downsize(b"\x89PNG\r\n\x1a\n", &Settings::default(), &mut reporter).unwrap_err().is_format_error());
}

/// Composited frames, with consecutive identical screens merged and their delays summed
fn render(data: &[u8]) -> Vec<(Vec<RGBA8>, u16)> {
    let mut screens: Vec<(Vec<RGBA8>, u16)> = Vec::new();
    for_each_frame(data, |frame, pixels| {
        let pixels: Vec<RGBA8> = pixels.pixels().map(|px| if px.a == 0 { RGBA8::default() } else { px }).collect();
        match screens.last_mut() {
            Some(last) if last.0 == pixels => last.1 += frame.delay,
            _ => screens.push((pixels, frame.delay)),
        }
    });
    screens
}

#[track_caller]
fn assert_same_animation(a: &[u8], b: &[u8]) {
    let (a, b) = (render(a), render(b));
    assert_eq!(a.len(), b.len());
    for (n, (a, b)) in a.iter().zip(&b).enumerate() {
        assert_eq!(a.1, b.1, "delay of screen {n}");
        assert!(a.0 == b.0, "pixels of screen {n} differ");
    }
}

fn for_each_frame(mut gif_data: &[u8], mut cb: impl FnMut(&gif::Frame, ImgRef<RGBA8>)) {
    let mut gif_opts = gif::DecodeOptions::new();
    gif_opts.set_color_output(gif::ColorOutput::Indexed);
    let mut decoder = gif_opts.read_info(&mut gif_data).unwrap();
    let mut screen = gif_dispose::Screen::new_decoder(&decoder);

    while let Some(frame) = decoder.read_next_frame().unwrap() {
        screen.blit_frame(frame).unwrap();
        cb(frame, screen.pixels_rgba());
    }
}
