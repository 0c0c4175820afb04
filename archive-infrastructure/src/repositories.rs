pub mod clickhouse_sink;
pub mod parquet_sink;

pub use clickhouse_sink::*;
pub use parquet_sink::*;
