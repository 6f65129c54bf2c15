//! `lexitrie`: an in-process full-text search engine over a character
//! trie. Indexes structured documents field by field, answers prefix,
//! fuzzy, and regex queries, ranks results, and persists its state through a
//! pluggable byte-addressable storage contract with an in-memory fallback.
//!
//! The facade is [`SearchEngine`]; it owns an [`IndexManager`] (document
//! table plus [`index_mapper::IndexMapper`]), a [`cache::Cache`] of recent
//! query results, a [`storage::Storage`] handle, and a parallel trie used
//! only for regex traversal.

pub mod cache;
pub mod config;
pub mod data_mapper;
pub mod document;
pub mod engine;
pub mod error;
pub mod events;
pub mod index_manager;
pub mod index_mapper;
pub mod query_processor;
pub mod shared;
pub mod storage;
pub mod trie;

pub use cache::{Cache, EvictionStrategy};
pub use config::{IndexConfig, IndexOptions, SearchOptions, SortOrder, StorageConfig};
pub use document::Document;
pub use engine::{EngineState, MatchSpan, SearchEngine, SearchResult};
pub use error::{Error, ErrorKind, Result};
pub use events::{Event, EventType};
pub use index_manager::IndexManager;
pub use index_mapper::IndexMapper;
pub use query_processor::QueryProcessor;
pub use storage::{MemoryStorage, Storage};
pub use trie::Trie;
