//! Archive access layer.
//!
//! An archive is the packaged book being served: a fixed set of named entries
//! that can be opened by exact path. The HTTP layer never touches the archive
//! directly; it goes through the [`BookService`](crate::content::BookService).
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │              BookService                │
//! └────────────────────┬────────────────────┘
//!                      │
//!                      ▼
//! ┌─────────────────────────────────────────┐
//! │          ArchiveSource Trait            │
//! │   (entries, contains, open by path)     │
//! └────────────────────┬────────────────────┘
//!                      │
//!          ┌───────────┴───────────┐
//!          ▼                       ▼
//! ┌─────────────────┐    ┌─────────────────────┐
//! │   EpubArchive   │    │   MemoryArchive     │
//! │  (zip on disk)  │    │  (tests, embedding) │
//! └─────────────────┘    └─────────────────────┘
//! ```
//!
//! Lookups are exact string matches against the archive's own naming; no
//! case folding or prefix normalization happens here.

mod epub;
mod source;

pub use epub::EpubArchive;
pub use source::{ArchiveSource, MemoryArchive};
