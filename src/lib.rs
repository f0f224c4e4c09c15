//! Tfscope – query construction and analytics over transcription factor datasets.
//!
//! Every dataset lives as a named view inside one shared query engine, next
//! to a `<dataset>_meta` view describing its samples. Tfscope builds safe SQL
//! against those views: identifiers are validated, filter values quoted, and
//! the regulator and sample columns resolved from fixed priority lists so
//! that heterogeneous schemas can be compared.
//!
//! ## Modules
//! * [`identifier`] – Identifier validation and regulator / sample column resolution.
//! * [`filter`] – Per-dataset categorical and numeric filters rendered as WHERE clauses.
//! * [`schema`] – Column types and the filter options derived from them.
//! * [`intersection`] – Pairwise regulator overlap between datasets.
//! * [`correlation`] – Pairwise correlation of a value column across frequent groups.
//! * [`guard`] – The single lock-guarded engine handle all of the above run under.
//! * [`engine`] – The [`engine::QueryEngine`] seam and its SQLite implementation.
//! * [`catalog`] – The curated, immutable dataset catalog.
//! * [`hub`] – Bounded caches over remote repository metadata.
//! * [`analysis`] – Summaries, paginated listings and value lookups.
//! * [`server`] – The HTTP routes.
//!
//! ## Quick Start
//! ```
//! use tfscope::engine::{QueryEngine, SqliteEngine};
//! use tfscope::guard::SharedEngine;
//! let engine = SqliteEngine::open_in_memory().unwrap();
//! engine
//!     .execute_batch("create table harbison_meta (sample_id integer, regulator text);")
//!     .unwrap();
//! let shared = SharedEngine::new(engine);
//! let tables = shared.run(|engine| engine.tables()).unwrap();
//! assert_eq!(tables, vec!["harbison_meta".to_string()]);
//! ```

use seahash::SeaHasher;
use std::hash::BuildHasherDefault;

pub type OtherHasher = BuildHasherDefault<SeaHasher>;

pub mod analysis;
pub mod catalog;
pub mod correlation;
pub mod engine;
pub mod error;
pub mod filter;
pub mod guard;
pub mod hub;
pub mod identifier;
pub mod intersection;
pub mod model;
pub mod schema;
pub mod server;
pub mod settings;

pub use error::{Result, TfscopeError};
