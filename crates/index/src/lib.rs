pub mod cache;
pub mod embeddings;
pub mod label_index;

pub use cache::CachedEncoder;
pub use embeddings::{EmbeddingClient, Encoder, cosine_similarity};
pub use label_index::{LabelIndex, LabelIndexError, LabelMatch};
