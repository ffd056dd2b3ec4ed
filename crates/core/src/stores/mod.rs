pub mod jsonfile;
pub mod memory;
pub mod qdrant;

pub use jsonfile::{JsonAnswerStore, JsonDocumentStore};
pub use memory::{MemoryAnswerStore, MemoryDocumentStore, MemoryVectorIndex};
pub use qdrant::QdrantVectorIndex;
