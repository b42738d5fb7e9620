use std::ops::Range;
use std::str::FromStr;

use super::property::{ComparableValue, PropertyName};
use crate::config::DEFAULT_ITEMS_PER_PAGE;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum QueryParseError {
    #[error("filter `{0}` must be property,value pairs")]
    UnpairedFilter(String),
    #[error("sort `{0}` must be direction,property pairs")]
    UnpairedSort(String),
    #[error("unknown sort direction `{0}`, expected `a` or `d`")]
    SortDirection(String),
    #[error("unknown metric query `{0}`, expected none, items, cumulative or both")]
    MetricQuery(String),
}

/// One `property contains needle` condition
#[derive(Debug, Clone, PartialEq)]
pub struct FilterTerm {
    pub property: PropertyName,
    pub value: ComparableValue,
}

/// Conjunction of filter terms; empty keeps every cell
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilterQuery {
    pub terms: Vec<FilterTerm>,
}

impl FilterQuery {
    #[must_use]
    pub fn new<I, P, V>(terms: I) -> Self
    where
        I: IntoIterator<Item = (P, V)>,
        P: Into<PropertyName>,
        V: Into<ComparableValue>,
    {
        Self {
            terms: terms
                .into_iter()
                .map(|(property, value)| FilterTerm {
                    property: property.into(),
                    value: value.into(),
                })
                .collect(),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }
}

impl FromStr for FilterQuery {
    type Err = QueryParseError;

    /// `prop1,needle1,prop2,needle2`
    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let parts = split_params(raw);
        if parts.len() % 2 != 0 {
            return Err(QueryParseError::UnpairedFilter(raw.to_string()));
        }
        Ok(Self::new(
            parts
                .chunks_exact(2)
                .map(|pair| (pair[0], pair[1].to_string())),
        ))
    }
}

/// One sort key with its own direction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortKey {
    pub property: PropertyName,
    pub ascending: bool,
}

/// Sort keys, primary first
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SortQuery {
    pub keys: Vec<SortKey>,
}

impl SortQuery {
    #[must_use]
    pub fn new<I, P>(keys: I) -> Self
    where
        I: IntoIterator<Item = (P, bool)>,
        P: Into<PropertyName>,
    {
        Self {
            keys: keys
                .into_iter()
                .map(|(property, ascending)| SortKey {
                    property: property.into(),
                    ascending,
                })
                .collect(),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

impl FromStr for SortQuery {
    type Err = QueryParseError;

    /// `a,name,d,creationTimestamp`
    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let parts = split_params(raw);
        if parts.len() % 2 != 0 {
            return Err(QueryParseError::UnpairedSort(raw.to_string()));
        }
        let mut keys = Vec::with_capacity(parts.len() / 2);
        for pair in parts.chunks_exact(2) {
            let ascending = match pair[0] {
                "a" => true,
                "d" => false,
                other => return Err(QueryParseError::SortDirection(other.to_string())),
            };
            keys.push(SortKey {
                property: pair[1].into(),
                ascending,
            });
        }
        Ok(Self { keys })
    }
}

/// Page of the filtered sequence, 1-indexed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PaginationQuery {
    #[default]
    NoPagination,
    Page { items_per_page: usize, page: usize },
}

impl PaginationQuery {
    #[must_use]
    pub const fn new(items_per_page: usize, page: usize) -> Self {
        Self::Page {
            items_per_page,
            page,
        }
    }

    /// Build from raw request parameters.
    ///
    /// No page size means no pagination; no page number means the first page.
    /// A page size without a page number uses the given size; a page number
    /// without a size uses the default size. Values that do not parse fall back
    /// to no pagination.
    #[must_use]
    pub fn from_params(items_per_page: Option<&str>, page: Option<&str>) -> Self {
        let size = match items_per_page.map(|raw| raw.trim().parse::<usize>()) {
            None if page.is_some() => Ok(DEFAULT_ITEMS_PER_PAGE),
            None => return Self::NoPagination,
            Some(parsed) => parsed,
        };
        let page = page.map_or(Ok(1), |raw| raw.trim().parse::<usize>());
        match (size, page) {
            (Ok(items_per_page), Ok(page)) => Self::new(items_per_page, page),
            _ => Self::NoPagination,
        }
    }

    /// Index range of the page over `total` items.
    ///
    /// `None` means the whole sequence: no pagination, a zero size or page,
    /// or a page that starts past the end.
    #[must_use]
    pub fn bounds(&self, total: usize) -> Option<Range<usize>> {
        let Self::Page {
            items_per_page,
            page,
        } = *self
        else {
            return None;
        };
        if items_per_page == 0 || page == 0 {
            return None;
        }
        let start = (page - 1).checked_mul(items_per_page)?;
        if start >= total {
            return None;
        }
        Some(start..start.saturating_add(items_per_page).min(total))
    }
}

/// Which metrics the aggregator attaches
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum MetricQuery {
    #[default]
    None,
    PerItem,
    Cumulative,
    Both,
}

impl MetricQuery {
    #[must_use]
    pub const fn per_item(self) -> bool {
        matches!(self, Self::PerItem | Self::Both)
    }

    #[must_use]
    pub const fn cumulative(self) -> bool {
        matches!(self, Self::Cumulative | Self::Both)
    }

    #[must_use]
    pub const fn is_none(self) -> bool {
        matches!(self, Self::None)
    }
}

impl FromStr for MetricQuery {
    type Err = QueryParseError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim() {
            "" | "none" => Ok(Self::None),
            "items" | "per-item" => Ok(Self::PerItem),
            "cumulative" => Ok(Self::Cumulative),
            "both" | "all" => Ok(Self::Both),
            other => Err(QueryParseError::MetricQuery(other.to_string())),
        }
    }
}

/// Declarative description of what to do with a cell sequence
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DataSelectQuery {
    pub filter: FilterQuery,
    pub sort: SortQuery,
    pub pagination: PaginationQuery,
    pub metric: MetricQuery,
}

impl DataSelectQuery {
    /// Everything, unsorted, with both per-item and cumulative metrics
    #[must_use]
    pub fn standard_metrics() -> Self {
        Self {
            metric: MetricQuery::Both,
            ..Self::default()
        }
    }

    /// Parse the dashboard's query parameters; each one is optional
    ///
    /// # Errors
    ///
    /// Returns [`QueryParseError`] for malformed filter, sort or metric strings.
    /// Malformed pagination is not an error.
    pub fn from_params(
        filter: Option<&str>,
        sort: Option<&str>,
        items_per_page: Option<&str>,
        page: Option<&str>,
        metric: Option<&str>,
    ) -> Result<Self, QueryParseError> {
        Ok(Self {
            filter: filter.map(str::parse::<FilterQuery>).transpose()?.unwrap_or_default(),
            sort: sort.map(str::parse::<SortQuery>).transpose()?.unwrap_or_default(),
            pagination: PaginationQuery::from_params(items_per_page, page),
            metric: metric.map(str::parse::<MetricQuery>).transpose()?.unwrap_or_default(),
        })
    }

    #[must_use]
    pub fn with_filter(mut self, filter: FilterQuery) -> Self {
        self.filter = filter;
        self
    }

    #[must_use]
    pub fn with_sort(mut self, sort: SortQuery) -> Self {
        self.sort = sort;
        self
    }

    #[must_use]
    pub const fn with_pagination(mut self, pagination: PaginationQuery) -> Self {
        self.pagination = pagination;
        self
    }

    #[must_use]
    pub const fn with_metrics(mut self, metric: MetricQuery) -> Self {
        self.metric = metric;
        self
    }
}

fn split_params(raw: &str) -> Vec<&str> {
    if raw.trim().is_empty() {
        return Vec::new();
    }
    raw.split(',').map(str::trim).collect()
}
