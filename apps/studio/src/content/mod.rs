// Cell content: generation state per cell and the dataset items bound to cells.

pub mod store;

pub use store::{CellContent, CellContentStore, CellStatus, ItemValue, SourceItem, UPLOAD_ITEM_NAME};
