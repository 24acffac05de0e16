/// Data layer: core types, loading, filtering and persisting.
///
/// Architecture:
/// ```text
///  .parquet / .json / .csv
///        │
///        ▼
///   ┌──────────┐
///   │  loader   │  parse file → ObservationTable
///   └──────────┘
///        │
///        ▼
///   ┌──────────┐
///   │  filter   │  region/parameter predicate → matching rows
///   └──────────┘
///        │
///        ▼   (crate::prepare: derive, group, mean)
///   ┌──────────┐
///   │  writer   │  Vec<SummaryRecord> → .parquet / .json / .csv
///   └──────────┘
/// ```

pub mod filter;
pub mod loader;
pub mod model;
pub mod writer;
