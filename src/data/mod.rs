/// Data layer: core types, loading, caching, filtering and aggregation.
///
/// Architecture:
/// ```text
///  Airline_Delay_Cause.csv + airports.csv      merged .csv / .parquet
///              │                                       │
///              └───────────────────┬───────────────────┘
///                                  ▼
///                            ┌──────────┐
///                            │  loader   │  validate columns, join, Total_Delay
///                            └──────────┘
///                                  │
///                                  ▼
///                            ┌──────────┐
///                            │  cache    │  Arc<BaseTable>, reload on input change
///                            └──────────┘
///                                  │
///                                  ▼
///                            ┌──────────┐
///                            │  filter   │  FilterSpec → row indices, Selected_Delay
///                            └──────────┘
///                                  │
///                                  ▼
///                           ┌────────────┐
///                           │ aggregate   │  KPIs, breakdowns, trend, rankings, geo
///                           └────────────┘
///                                  │
///                                  ▼
///                            ┌──────────┐
///                            │  export   │  filtered CSV, summary JSON
///                            └──────────┘
/// ```

pub mod aggregate;
pub mod cache;
pub mod export;
pub mod filter;
pub mod loader;
pub mod model;
