pub mod flat;
pub mod local;
pub mod qdrant;

pub use flat::FlatIndex;
pub use local::{IdentityLocks, LocalStoreProvider};
pub use qdrant::{QdrantClient, QdrantStoreProvider};
