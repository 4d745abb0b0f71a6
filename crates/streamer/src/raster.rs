//! Binary PGM (`P5`) writer for decoded luma planes.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

use streamer_core::{DecodedFrame, StreamerError};

pub const MAX_SAMPLE: u8 = 255;

/// Write `frame` as `P5\n<w> <h>\n255\n` followed by `w` bytes per row.
pub fn write_pgm<W: Write>(out: &mut W, frame: &DecodedFrame) -> io::Result<()> {
    let width = frame.width as usize;
    let height = frame.height as usize;
    let needed = match height {
        0 => 0,
        h => frame.stride * (h - 1) + width,
    };
    if frame.stride < width || frame.data.len() < needed {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!(
                "luma plane holds {} bytes, {}x{} with stride {} needs {}",
                frame.data.len(), frame.width, frame.height, frame.stride, needed
            ),
        ));
    }

    write!(out, "P5\n{} {}\n{}\n", frame.width, frame.height, MAX_SAMPLE)?;
    for row in 0..height {
        let start = row * frame.stride;
        out.write_all(&frame.data[start..start + width])?;
    }
    Ok(())
}

pub fn save_pgm(path: &Path, frame: &DecodedFrame) -> Result<(), StreamerError> {
    let file = File::create(path)
        .map_err(|source| StreamerError::OpenFile { path: path.to_path_buf(), source })?;
    let mut out = BufWriter::new(file);
    write_pgm(&mut out, frame)?;
    out.flush()?;
    Ok(())
}
