// Grid layout engine
// Implements: row descriptors, cell addressing, rectangle/multi selection, merges, target geometry.
// Pure data structures; nothing here performs IO or touches the runtime.

pub mod address;
pub mod geometry;
pub mod merge;
pub mod rows;
pub mod selection;

// Re-export the public API consumed by the manager, scheduler, and document codec.
pub use address::CellAddress;
pub use geometry::{closest_aspect_ratio, target_size, TargetSize};
pub use merge::{MergeMap, MergeSpan};
pub use rows::{ConfigUpdate, LayoutConfig, LayoutModel, RowDescriptor, RowKind, RowUpdate};
pub use selection::{Bounds, MultiSelect, RectSelection, SelectionMode};
