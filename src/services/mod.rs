pub mod conversation;
pub mod embedding;
pub mod generation;
pub mod pipeline;
pub mod records;
pub mod splitter;
pub mod vector_store;

pub use conversation::{assemble, join_fragments};
pub use embedding::{EmbeddingBackend, EmbeddingService, pad_to_dimension};
pub use generation::{GenerationBackend, GenerationService};
pub use pipeline::{IngestRequest, Pipeline, QuestionRequest};
pub use records::{DocumentRecord, PgRecordStore, QaRecord, RecordStore};
pub use splitter::{DocumentSplitter, check_format};
pub use vector_store::{InMemoryStore, PgVectorBackend, QdrantBackend, VectorStore};
