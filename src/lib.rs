#![deny(clippy::all, clippy::pedantic)]
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
#![cfg_attr(
    test,
    allow(
        clippy::useless_vec,
        clippy::uninlined_format_args,
        clippy::cast_possible_truncation
    )
)]
#![allow(clippy::module_name_repetitions)]
//
// Strategic lint exceptions - these are allowed project-wide for pragmatic reasons:
//
// Documentation lints: Many internal/self-documenting functions don't need extensive docs.
// Public APIs should still have proper documentation.
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::doc_markdown)]
//
// Cast safety: record ids, ranks and row indices are u64 throughout and bounded
// by the in-memory store size, so usize <-> u64 casts cannot truncate in practice.
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_possible_wrap)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::cast_lossless)]
//
// Style/complexity: trie maintenance naturally needs a few long functions.
#![allow(clippy::too_many_lines)]
#![allow(clippy::items_after_statements)]
#![allow(clippy::similar_names)]
// e.g., ancestor_id, search_ancestor_id, data_id are intentionally similar
//
// Pattern matching: These pedantic lints often suggest changes that reduce clarity.
#![allow(clippy::manual_let_else)]
#![allow(clippy::match_same_arms)]
//
// Performance/ergonomics trade-offs that are acceptable for this codebase:
#![allow(clippy::needless_pass_by_value)]
#![allow(clippy::return_self_not_must_use)] // Builder patterns don't need must_use on every method
#![allow(clippy::struct_excessive_bools)] // Option structs naturally have many flags
#![allow(clippy::implicit_hasher)]
#![allow(clippy::unnecessary_wraps)]

/// The hstrat-trie crate version (matches `Cargo.toml`).
pub const HSTRAT_TRIE_VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod constants;
pub mod error;
pub mod frame;
pub mod io;
pub mod pipeline;
pub mod trie;
pub mod types;
pub mod unpack;

pub use constants::*;
pub use error::{ReconstructError, Result};
pub use io::{TableFormat, read_table, write_table};
pub use pipeline::{
    phylogeny_schema, reconstruct, reconstruct_stream, reconstruct_stream_with_stats,
    reconstruct_unpacked, reconstruct_unpacked_with_stats, reconstruct_with_stats,
    reconstruct_with_unpacker,
};
pub use trie::{CollapseMode, RecordStore, SearchTable, collapse_unifurcations, count_root_children};
pub use types::{
    Allele, Artifact, ReconstructOptions, ReconstructOptionsBuilder, ReconstructStats, SurfaceMeta,
};
pub use unpack::{
    CircularAlgo, PackedUnpacker, RetentionAlgorithm, Unpacker, long_schema, lookup_algorithm,
    surface_meta,
};
