//! Timelapse assembly from locally stored forecast frames.

use std::{
    collections::HashSet,
    fs::File,
    io::{BufWriter, Write},
    path::{Path, PathBuf},
};

use image::{
    codecs::gif::{GifEncoder, Repeat},
    Delay, Frame,
};
use methu_store::{commit_staged, list_image_files, staging_path, ARTIFACT_STAGING_SUFFIX};
use methu_types::{
    config::FrameSelection, naming::FrameIdentifier, report::AssemblyReport, AssemblyError,
};
use tracing::{info, warn};

mod convert;

pub use convert::{load_frame, normalize, DecodedFrame, MAX_PALETTE_COLORS};

/// Builds one looping animation out of whatever frames load cleanly.
#[derive(Debug, Clone, Copy)]
pub struct GifAssembler {
    /// Uniform delay between frames, in hundredths of a second.
    frame_delay: u16,
}

impl GifAssembler {
    pub fn new(frame_delay: u16) -> Self {
        Self { frame_delay }
    }

    pub fn frame_delay(&self) -> u16 {
        self.frame_delay
    }

    /// Assemble every stored frame of `images_dir` into `output`.
    pub fn create_gif(
        &self,
        images_dir: &Path,
        output: &Path,
    ) -> Result<AssemblyReport, AssemblyError> {
        let frames = select_frames(images_dir, FrameSelection::AllFiles, &[])?;
        self.assemble(images_dir, &frames, output)
    }

    /// Convert `frames` in the given order, skipping those that fail, and
    /// publish the animation at `output`. With no usable frame the previous
    /// artifact is left untouched.
    pub fn assemble(
        &self,
        images_dir: &Path,
        frames: &[PathBuf],
        output: &Path,
    ) -> Result<AssemblyReport, AssemblyError> {
        let mut decoded = Vec::with_capacity(frames.len());
        let mut skipped = Vec::new();
        for path in frames {
            match load_frame(path) {
                Ok(frame) => decoded.push(frame),
                Err(err) => {
                    warn!("Failed to load image '{}': {}", path.display(), err);
                    skipped.push(display_name(path));
                }
            }
        }

        if decoded.is_empty() {
            return Err(AssemblyError::NoUsableFrames {
                dir: images_dir.to_path_buf(),
            });
        }

        let count = decoded.len();
        self.publish(decoded, output)?;
        info!(
            "Wrote {} with {} frames ({} skipped)",
            output.display(),
            count,
            skipped.len()
        );
        Ok(AssemblyReport {
            output: output.to_path_buf(),
            frames: count,
            skipped,
        })
    }

    fn publish(&self, frames: Vec<DecodedFrame>, output: &Path) -> Result<(), AssemblyError> {
        let staged = staging_path(output, ARTIFACT_STAGING_SUFFIX);
        if let Err(err) = self.encode_to(&staged, frames) {
            let _ = std::fs::remove_file(&staged);
            return Err(err);
        }
        commit_staged(&staged, output).map_err(|source| AssemblyError::Publish {
            path: output.to_path_buf(),
            source,
        })
    }

    fn encode_to(&self, staged: &Path, frames: Vec<DecodedFrame>) -> Result<(), AssemblyError> {
        let publish_error = |source| AssemblyError::Publish {
            path: staged.to_path_buf(),
            source,
        };
        let encode_error = |err: image::ImageError| AssemblyError::Encode(err.to_string());

        let file = File::create(staged).map_err(publish_error)?;
        let mut writer = BufWriter::new(file);
        {
            let mut encoder = GifEncoder::new(&mut writer);
            encoder.set_repeat(Repeat::Infinite).map_err(encode_error)?;
            let delay = Delay::from_numer_denom_ms(u32::from(self.frame_delay) * 10, 1);
            for frame in frames {
                encoder
                    .encode_frame(Frame::from_parts(frame.into_image(), 0, 0, delay))
                    .map_err(encode_error)?;
            }
        }
        writer.flush().map_err(publish_error)?;
        let file = writer
            .into_inner()
            .map_err(|err| publish_error(err.into_error()))?;
        file.sync_all().map_err(publish_error)
    }
}

/// Frames of `images_dir` chosen by `selection`, in file-name order.
///
/// `AnchorSet` keeps only files named in `expected`; `AllFiles` ignores it.
pub fn select_frames(
    images_dir: &Path,
    selection: FrameSelection,
    expected: &[FrameIdentifier],
) -> Result<Vec<PathBuf>, AssemblyError> {
    let files = list_image_files(images_dir).map_err(|err| AssemblyError::ListFailed {
        dir: images_dir.to_path_buf(),
        message: err.to_string(),
    })?;

    match selection {
        FrameSelection::AllFiles => Ok(files),
        FrameSelection::AnchorSet => {
            let wanted: HashSet<&str> = expected.iter().map(|id| id.as_str()).collect();
            Ok(files
                .into_iter()
                .filter(|path| {
                    path.file_name()
                        .and_then(|name| name.to_str())
                        .is_some_and(|name| wanted.contains(name))
                })
                .collect())
        }
    }
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
