//! Stream collaborators: frames, capability negotiation, sources, and sinks.

/// Capability agreement between the two inputs.
pub(crate) mod caps;
/// Input and visualization frame buffers.
pub(crate) mod frame;
/// Visualization sinks.
pub(crate) mod sink;
/// Input sources.
pub(crate) mod source;
