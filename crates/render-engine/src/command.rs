//! Engine argument assembly.

use std::path::Path;

use vidmark_common::error::{VidmarkError, VidmarkResult};
use vidmark_overlay_model::OverlayPosition;

/// Encoder preset passed with every render; overlays favour turnaround over size.
pub const ENCODE_PRESET: &str = "ultrafast";

/// Build the ordered engine arguments compositing `overlay_image` onto `input_video`.
///
/// Produces `-i <video> -i <image> -filter_complex <expr> -preset ultrafast <output>`.
pub fn build_overlay_args(
    input_video: &Path,
    overlay_image: &Path,
    output: &Path,
    position: OverlayPosition,
) -> VidmarkResult<Vec<String>> {
    let input_video = non_empty(input_video, "Source video path")?;
    let overlay_image = non_empty(overlay_image, "Overlay image path")?;
    let output = non_empty(output, "Output video path")?;

    Ok(vec![
        "-i".to_string(),
        input_video,
        "-i".to_string(),
        overlay_image,
        "-filter_complex".to_string(),
        position.filter_expression().to_string(),
        "-preset".to_string(),
        ENCODE_PRESET.to_string(),
        output,
    ])
}

fn non_empty(path: &Path, what: &str) -> VidmarkResult<String> {
    let text = path.to_string_lossy();
    if text.trim().is_empty() {
        return Err(VidmarkError::invalid_argument(format!("{what} is mandatory")));
    }
    Ok(text.into_owned())
}
