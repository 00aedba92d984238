//! Shared constants: placeholders, defaults and dataframe column names.

/// Marks an absent id, differentium or data id in every record column.
pub const PLACEHOLDER: u64 = u64::MAX;

/// Id of the implicit root record.
pub const ROOT_ID: u64 = 0;

pub const DEFAULT_CHUNK_SIZE: usize = 1_000_000;
pub const DEFAULT_COLLAPSE_EVERY: usize = 1;

/// Prefix given to chunk files written by the producer worker.
pub const CHUNK_FILE_PREFIX: &str = "hstrat-chunk-";
pub const CHUNK_FILE_SUFFIX: &str = ".arrow";

// Packed input columns
pub const COL_DATA_HEX: &str = "data_hex";
pub const COL_ALGO: &str = "dstream_algo";
pub const COL_STORAGE_BITOFFSET: &str = "dstream_storage_bitoffset";
pub const COL_STORAGE_BITWIDTH: &str = "dstream_storage_bitwidth";
pub const COL_T_BITOFFSET: &str = "dstream_T_bitoffset";
pub const COL_T_BITWIDTH: &str = "dstream_T_bitwidth";
pub const COL_S: &str = "dstream_S";
pub const COL_EXCLUDE_UNPACKED: &str = "downstream_exclude_unpacked";
pub const COL_EXCLUDE_EXPLODED: &str = "downstream_exclude_exploded";

// Unpacked long-table columns
pub const COL_DATA_ID: &str = "dstream_data_id";
pub const COL_T: &str = "dstream_T";
pub const COL_TBAR: &str = "dstream_Tbar";
pub const COL_VALUE: &str = "dstream_value";
pub const COL_TBAR_ARGV: &str = "dstream_Tbar_argv";

// Output columns
pub const COL_ID: &str = "id";
pub const COL_ANCESTOR_ID: &str = "ancestor_id";
pub const COL_HSTRAT_RANK: &str = "hstrat_rank";
pub const COL_DIFFERENTIA_BITWIDTH: &str = "hstrat_differentia_bitwidth";

/// Column prefixes never forwarded to the output.
pub const RESERVED_PREFIXES: [&str; 2] = ["dstream_", "downstream_"];
