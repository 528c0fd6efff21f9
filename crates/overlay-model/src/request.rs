//! Render requests and the handles that flow in and out of a render.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use vidmark_common::error::{VidmarkError, VidmarkResult};

use crate::position::OverlayPosition;

/// Opaque reference to a caller resource that lives in storage rather than at a known path.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResourceHandle(String);

impl ResourceHandle {
    pub fn new(handle: impl Into<String>) -> Self {
        Self(handle.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ResourceHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Handle to a finished render committed to durable storage.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DurableArtifactHandle(String);

impl DurableArtifactHandle {
    pub fn new(handle: impl Into<String>) -> Self {
        Self(handle.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DurableArtifactHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Where the source video comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MediaSource {
    Path(PathBuf),
    Resource(ResourceHandle),
}

impl MediaSource {
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Path(path) => path.as_os_str().is_empty(),
            Self::Resource(handle) => handle.as_str().trim().is_empty(),
        }
    }
}

/// An encoded image produced by an [`OverlayView`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedImage {
    /// Encoded image bytes.
    pub bytes: Vec<u8>,

    /// File extension matching the encoding (`png`, `webp`, ...).
    pub extension: String,
}

/// Something that can be drawn into an image on demand (a UI view, a canvas, ...).
pub trait OverlayView: Send + Sync {
    /// Render the current state into an encoded image.
    fn render(&self) -> VidmarkResult<RenderedImage>;
}

/// A view whose image is already encoded.
#[derive(Debug, Clone)]
pub struct StaticImageView {
    image: RenderedImage,
}

impl StaticImageView {
    pub fn new(bytes: Vec<u8>, extension: impl Into<String>) -> Self {
        Self {
            image: RenderedImage {
                bytes,
                extension: extension.into(),
            },
        }
    }

    /// Read an encoded image from disk, keeping its extension.
    pub fn from_file(path: &Path) -> VidmarkResult<Self> {
        let bytes = std::fs::read(path).map_err(|e| VidmarkError::from_io(path, e))?;
        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .unwrap_or("png")
            .to_string();
        Ok(Self::new(bytes, extension))
    }
}

impl OverlayView for StaticImageView {
    fn render(&self) -> VidmarkResult<RenderedImage> {
        if self.image.bytes.is_empty() {
            return Err(VidmarkError::invalid_argument("Overlay view rendered no bytes"));
        }
        Ok(self.image.clone())
    }
}

/// Where the overlay image comes from.
#[derive(Clone)]
pub enum OverlaySource {
    /// An image file on disk.
    Path(PathBuf),
    /// A stored image, left in place after the render.
    Resource(ResourceHandle),
    /// A stored image that is deleted from storage once the render ends.
    TransientResource(ResourceHandle),
    /// A view rendered into a temporary image for the duration of the render.
    View(Arc<dyn OverlayView>),
}

impl OverlaySource {
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Path(path) => path.as_os_str().is_empty(),
            Self::Resource(handle) | Self::TransientResource(handle) => {
                handle.as_str().trim().is_empty()
            }
            Self::View(_) => false,
        }
    }
}

impl fmt::Debug for OverlaySource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Path(path) => f.debug_tuple("Path").field(path).finish(),
            Self::Resource(handle) => f.debug_tuple("Resource").field(handle).finish(),
            Self::TransientResource(handle) => {
                f.debug_tuple("TransientResource").field(handle).finish()
            }
            Self::View(_) => f.write_str("View(..)"),
        }
    }
}

/// Everything needed to run one render.
#[derive(Debug, Clone)]
pub struct RenderRequest {
    pub source_video: MediaSource,
    pub overlay: OverlaySource,
    pub position: OverlayPosition,

    /// Suggested name of the durable output (without extension).
    pub output_naming_hint: Option<String>,
}

impl RenderRequest {
    pub fn builder() -> RenderRequestBuilder {
        RenderRequestBuilder::default()
    }

    /// Check the required sources are present.
    pub fn validate(&self) -> VidmarkResult<()> {
        if self.source_video.is_empty() {
            return Err(VidmarkError::invalid_argument(
                "Source video path is mandatory",
            ));
        }
        if self.overlay.is_empty() {
            return Err(VidmarkError::invalid_argument(
                "Overlay image path is mandatory",
            ));
        }
        Ok(())
    }
}

/// Step-by-step construction of a [`RenderRequest`], validated on `build`.
#[derive(Debug, Default, Clone)]
pub struct RenderRequestBuilder {
    source_video: Option<MediaSource>,
    overlay: Option<OverlaySource>,
    position: OverlayPosition,
    output_naming_hint: Option<String>,
}

impl RenderRequestBuilder {
    pub fn source_video_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.source_video = Some(MediaSource::Path(path.into()));
        self
    }

    pub fn source_video_resource(mut self, handle: ResourceHandle) -> Self {
        self.source_video = Some(MediaSource::Resource(handle));
        self
    }

    pub fn overlay_image_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.overlay = Some(OverlaySource::Path(path.into()));
        self
    }

    pub fn overlay_source(mut self, source: OverlaySource) -> Self {
        self.overlay = Some(source);
        self
    }

    pub fn overlay_view(mut self, view: Arc<dyn OverlayView>) -> Self {
        self.overlay = Some(OverlaySource::View(view));
        self
    }

    pub fn position(mut self, position: OverlayPosition) -> Self {
        self.position = position;
        self
    }

    pub fn output_naming_hint(mut self, hint: impl Into<String>) -> Self {
        let hint = hint.into();
        self.output_naming_hint = if hint.trim().is_empty() {
            None
        } else {
            Some(hint)
        };
        self
    }

    pub fn build(self) -> VidmarkResult<RenderRequest> {
        let source_video = self
            .source_video
            .ok_or_else(|| VidmarkError::invalid_argument("Source video path is mandatory"))?;
        let overlay = self
            .overlay
            .ok_or_else(|| VidmarkError::invalid_argument("Overlay image path is mandatory"))?;

        let request = RenderRequest {
            source_video,
            overlay,
            position: self.position,
            output_naming_hint: self.output_naming_hint,
        };
        request.validate()?;
        Ok(request)
    }
}
