// Project documents
// Implements: JSON snapshot encode/decode with validation, asset resolution, staggered replay.

pub mod codec;
pub mod replay;
pub mod resolver;

pub use codec::{ProjectDocument, DOCUMENT_VERSION};
pub use replay::{ReplayStep, StaggeredReplay, IMPORT_DELAY_MS};
pub use resolver::{resolve_content, AssetResolver, PassthroughResolver, RetrievalEndpointResolver};
