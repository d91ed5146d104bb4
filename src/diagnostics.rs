//! Optional observation of bitmap lifetimes.
//!
//! Nothing in the crate depends on a sink for correctness. A sink is attached per bitmap with
//! [`Bitmap::set_diagnostic_sink`](crate::Bitmap::set_diagnostic_sink) and is carried along by
//! clones.
use crate::bitmap::Bitmap;

/// Receives notifications about bitmaps, for debugging and operational tooling.
pub trait DiagnosticSink: Send + Sync {
    /// A descriptor that still refers to a pixel store is being dropped.
    fn bitmap_released(&self, bitmap: &Bitmap);
}

/// A sink that emits a `tracing` event for every released bitmap.
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingSink;

impl DiagnosticSink for TracingSink {
    fn bitmap_released(&self, bitmap: &Bitmap) {
        tracing::debug!(
            width = bitmap.width(),
            height = bitmap.height(),
            format = %bitmap.format(),
            generation = bitmap.generation_id(),
            "Released {bitmap}"
        );
    }
}
