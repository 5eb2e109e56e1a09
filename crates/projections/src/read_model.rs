//! Query-side views.

/// A denormalized view kept current by a [`crate::Projection`].
pub trait ReadModel: Send + Sync {
    fn name(&self) -> &'static str;

    /// Entries currently held; `0` while the view is being written.
    fn count(&self) -> usize;
}
