use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use thiserror::Error;

use crate::host::FrameCapture;

#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Encode(#[from] png::EncodingError),

    #[error("no frame was published")]
    NoFrame,
}

/// Write `frame` as an 8-bit RGB PNG.
pub fn write_png(path: &Path, frame: &FrameCapture) -> Result<(), SnapshotError> {
    if frame.width == 0 || frame.height == 0 {
        return Err(SnapshotError::NoFrame);
    }
    let file = File::create(path)?;
    let mut encoder = png::Encoder::new(BufWriter::new(file), frame.width, frame.height);
    encoder.set_color(png::ColorType::Rgb);
    encoder.set_depth(png::BitDepth::Eight);
    let mut writer = encoder.write_header()?;
    writer.write_image_data(&frame.rgb)?;
    writer.finish()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writes_a_decodable_png() {
        let path = std::env::temp_dir().join("marquee_snapshot_test.png");
        let frame = FrameCapture {
            width: 2,
            height: 1,
            rgb: vec![255, 0, 0, 0, 0, 255],
        };
        write_png(&path, &frame).unwrap();

        let decoder = png::Decoder::new(File::open(&path).unwrap());
        let mut reader = decoder.read_info().unwrap();
        let mut buf = vec![0; reader.output_buffer_size()];
        let info = reader.next_frame(&mut buf).unwrap();
        assert_eq!((info.width, info.height), (2, 1));
        assert_eq!(&buf[..6], &frame.rgb[..]);

        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn empty_frame_is_refused() {
        let frame = FrameCapture {
            width: 0,
            height: 0,
            rgb: Vec::new(),
        };
        let path = std::env::temp_dir().join("marquee_snapshot_empty.png");
        assert!(matches!(write_png(&path, &frame), Err(SnapshotError::NoFrame)));
    }
}
