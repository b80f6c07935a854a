pub mod rollup_row;

pub use rollup_row::RollupRow;
