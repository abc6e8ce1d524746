/// Pure computation helpers for the relay.
///
/// Nothing in here performs I/O or holds state.
///
/// Submodules:
/// - `geo`: great-circle distance, initial bearing, and octant quantization.

pub mod geo;
