//! File I/O: producer/consumer chunk hand-off files and dataframe tables.

pub mod chunk_file;
pub mod table;

pub use chunk_file::{read_chunk, write_chunk};
pub use table::{TableFormat, read_table, write_table};
