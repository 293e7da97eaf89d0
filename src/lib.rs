//! Searchable encrypted index hiding the volume of posting lists
//!
//! Documents are normalized into keywords, and the posting list of each
//! keyword is cut into chunks placed at random into fixed-capacity buckets
//! ([index]). The buckets are cut into size-bounded blobs for an untrusted
//! store ([storage]); uploaded indices can be merged ([merge]) and searched
//! ([search]).

pub mod base;
pub mod blob;
pub mod builder;
pub mod error;
pub mod index;
pub mod level;
pub mod location;
pub mod merge;
pub mod normalizer;
pub mod search;
pub mod storage;
pub mod store;
pub mod utils;

pub use blob::BlobContent;
pub use error::{Error, Result};
pub use index::{EncryptedIndex, IndexOptions};
pub use location::Location;
pub use merge::IndexMerge;
pub use search::EncryptedSearch;
pub use storage::IndexStorage;
pub use store::BlobStore;
