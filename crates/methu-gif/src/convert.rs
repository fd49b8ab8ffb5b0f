use std::{
    collections::HashSet,
    fs::File,
    io::{BufReader, Cursor, ErrorKind},
    path::Path,
};

use image::{
    codecs::gif::{GifDecoder, GifEncoder},
    io::Reader,
    AnimationDecoder, DynamicImage, Frame, ImageError, RgbaImage,
};
use methu_types::ConvertError;

/// Colours a GIF frame can carry in its local palette.
pub const MAX_PALETTE_COLORS: usize = 256;

/// A stored frame normalised to the GIF colour budget.
#[derive(Debug, Clone)]
pub struct DecodedFrame {
    image: RgbaImage,
}

impl DecodedFrame {
    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn image(&self) -> &RgbaImage {
        &self.image
    }

    pub fn into_image(self) -> RgbaImage {
        self.image
    }
}

/// Decode the file at `path`, sniffing its format from the content, and
/// normalise it into a palette-bounded frame.
///
/// A stream that ends early decodes as corrupt data, not as an I/O failure.
pub fn load_frame(path: &Path) -> Result<DecodedFrame, ConvertError> {
    let unreadable = |source| ConvertError::Unreadable {
        path: path.to_path_buf(),
        source,
    };

    let file = File::open(path).map_err(unreadable)?;
    let reader = Reader::new(BufReader::new(file))
        .with_guessed_format()
        .map_err(unreadable)?;
    if reader.format().is_none() {
        return Err(ConvertError::UnsupportedFormat {
            path: path.to_path_buf(),
        });
    }

    let decoded = reader.decode().map_err(|err| match err {
        ImageError::Unsupported(_) => ConvertError::UnsupportedFormat {
            path: path.to_path_buf(),
        },
        ImageError::IoError(source) if source.kind() != ErrorKind::UnexpectedEof => {
            unreadable(source)
        }
        other => ConvertError::CorruptData {
            path: path.to_path_buf(),
            message: other.to_string(),
        },
    })?;

    normalize(path, decoded)
}

/// Round-trip `image` through the single-frame GIF encoder so that the
/// result carries exactly the colours the animation will use.
pub fn normalize(path: &Path, image: DynamicImage) -> Result<DecodedFrame, ConvertError> {
    let not_paletted = |message: String| ConvertError::NotPaletted {
        path: path.to_path_buf(),
        message,
    };

    let mut encoded = Vec::new();
    {
        let mut encoder = GifEncoder::new(&mut encoded);
        encoder
            .encode_frame(Frame::new(image.to_rgba8()))
            .map_err(|err| not_paletted(format!("gif encode failed: {err}")))?;
    }

    let decoder = GifDecoder::new(Cursor::new(encoded))
        .map_err(|err| not_paletted(format!("gif decode failed: {err}")))?;
    let mut frames = decoder
        .into_frames()
        .collect_frames()
        .map_err(|err| not_paletted(format!("gif decode failed: {err}")))?;
    if frames.len() != 1 {
        return Err(not_paletted(format!(
            "expected one frame, found {}",
            frames.len()
        )));
    }
    let image = frames.remove(0).into_buffer();

    let colors = distinct_colors(&image);
    if colors > MAX_PALETTE_COLORS {
        return Err(not_paletted(format!("{colors} colours exceed the palette")));
    }
    Ok(DecodedFrame { image })
}

fn distinct_colors(image: &RgbaImage) -> usize {
    image
        .pixels()
        .map(|pixel| pixel.0)
        .collect::<HashSet<[u8; 4]>>()
        .len()
}
