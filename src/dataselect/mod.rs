//! Generic filter, sort and paginate pipeline over resource cells.
//!
//! Each resource kind adapts its native objects to [`DataCell`]; the engine
//! then applies a [`DataSelectQuery`] without knowing the concrete kind.

mod cache;
mod cell;
mod engine;
mod property;
mod query;

pub use cache::CachedResources;
pub use cell::{DataCell, object_property, object_selector};
pub use engine::{DataSelection, filter, paginate, select, select_with_metrics, sort};
pub use property::{ComparableValue, PropertyName};
pub use query::{
    DataSelectQuery, FilterQuery, FilterTerm, MetricQuery, PaginationQuery, QueryParseError,
    SortKey, SortQuery,
};
