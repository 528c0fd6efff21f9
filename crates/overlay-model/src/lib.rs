//! Vidmark Overlay Model
//!
//! The value types shared between the render engine and its callers:
//! - [`OverlayPosition`]: where the image lands on the frame
//! - [`RenderRequest`]: a validated description of one render
//! - [`ProgressStatistics`] / [`ExecutionLog`]: what a running render reports back

pub mod position;
pub mod request;
pub mod stats;

pub use position::OverlayPosition;
pub use request::{
    DurableArtifactHandle, MediaSource, OverlaySource, OverlayView, RenderRequest,
    RenderRequestBuilder, RenderedImage, ResourceHandle, StaticImageView,
};
pub use stats::{ExecutionId, ExecutionLog, ProgressStatistics};
