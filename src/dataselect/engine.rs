use std::cmp::Ordering;
use std::sync::Arc;
use tracing::debug;

use super::cache::CachedResources;
use super::cell::DataCell;
use super::property::ComparableValue;
use super::query::{DataSelectQuery, FilterQuery, PaginationQuery, SortKey, SortQuery};
use crate::metric::{MetricPromises, MetricSource, ResourceSelector};

/// Cells left after a data select, with the filtered count
#[derive(Debug, Clone, PartialEq)]
pub struct DataSelection<C> {
    pub cells: Vec<C>,
    /// Length of the filtered sequence before pagination
    pub total_items: usize,
}

/// Keep cells matching every term, in source order. A missing property fails the term.
#[must_use]
pub fn filter<C: DataCell>(cells: Vec<C>, query: &FilterQuery) -> Vec<C> {
    if query.is_empty() {
        return cells;
    }
    cells
        .into_iter()
        .filter(|cell| {
            query.terms.iter().all(|term| {
                cell.property(&term.property)
                    .is_some_and(|value| value.contains(&term.value))
            })
        })
        .collect()
}

/// Stable multi-key sort.
///
/// The first key whose values compare unequal decides the order. A cell
/// lacking a key goes after every cell that has it; keys missing on both
/// sides or holding incomparable values are skipped.
#[must_use]
pub fn sort<C: DataCell>(cells: Vec<C>, query: &SortQuery) -> Vec<C> {
    if query.is_empty() || cells.len() < 2 {
        return cells;
    }
    let keyed: Vec<(Vec<Option<ComparableValue>>, C)> = cells
        .into_iter()
        .map(|cell| {
            let values = query
                .keys
                .iter()
                .map(|key| cell.property(&key.property))
                .collect();
            (values, cell)
        })
        .collect();

    merge_sort(keyed, &|a, b| compare_keys(&query.keys, &a.0, &b.0))
        .into_iter()
        .map(|(_, cell)| cell)
        .collect()
}

fn compare_keys(
    keys: &[SortKey],
    a: &[Option<ComparableValue>],
    b: &[Option<ComparableValue>],
) -> Ordering {
    for ((key, a), b) in keys.iter().zip(a).zip(b) {
        // Present values sort before absent ones in either direction
        let (a, b) = match (a, b) {
            (Some(a), Some(b)) => (a, b),
            (Some(_), None) => return Ordering::Less,
            (None, Some(_)) => return Ordering::Greater,
            (None, None) => continue,
        };
        match a.compare(b) {
            None | Some(Ordering::Equal) => {}
            Some(order) if key.ascending => return order,
            Some(order) => return order.reverse(),
        }
    }
    Ordering::Equal
}

/// Stable top-down merge sort.
///
/// Skipping incomparable keys does not give a total order, which the std sorts
/// are allowed to panic on; this one only ever asks "is right strictly less".
fn merge_sort<T, F>(mut items: Vec<T>, cmp: &F) -> Vec<T>
where
    F: Fn(&T, &T) -> Ordering,
{
    if items.len() < 2 {
        return items;
    }
    let right = items.split_off(items.len() / 2);
    let left = merge_sort(items, cmp);
    let right = merge_sort(right, cmp);

    let mut merged = Vec::with_capacity(left.len() + right.len());
    let mut left = left.into_iter().peekable();
    let mut right = right.into_iter().peekable();
    loop {
        match (left.peek(), right.peek()) {
            (Some(l), Some(r)) => {
                if cmp(r, l) == Ordering::Less {
                    merged.extend(right.next());
                } else {
                    merged.extend(left.next());
                }
            }
            (Some(_), None) => merged.extend(left.by_ref()),
            (None, Some(_)) => merged.extend(right.by_ref()),
            (None, None) => break,
        }
    }
    merged
}

/// Cut the page out of `cells`; out-of-range or malformed pages keep everything
#[must_use]
pub fn paginate<C>(mut cells: Vec<C>, query: &PaginationQuery) -> Vec<C> {
    match query.bounds(cells.len()) {
        Some(range) => {
            cells.truncate(range.end);
            cells.split_off(range.start)
        }
        None => cells,
    }
}

/// Filter, sort and paginate `cells`
#[must_use]
pub fn select<C: DataCell>(cells: Vec<C>, query: &DataSelectQuery) -> DataSelection<C> {
    let sorted = sort(filter(cells, &query.filter), &query.sort);
    let total_items = sorted.len();
    DataSelection {
        cells: paginate(sorted, &query.pagination),
        total_items,
    }
}

/// [`select`], then start fetching metrics: cumulative over the filtered
/// sequence, per-item over the returned page
#[must_use]
pub fn select_with_metrics<C: DataCell>(
    cells: Vec<C>,
    query: &DataSelectQuery,
    metrics: Option<Arc<dyn MetricSource>>,
    cache: &CachedResources,
) -> (DataSelection<C>, MetricPromises) {
    let sorted = sort(filter(cells, &query.filter), &query.sort);
    let total_items = sorted.len();

    let wants_metrics = metrics.is_some() && !query.metric.is_none();
    let filtered: Vec<ResourceSelector> = if wants_metrics && query.metric.cumulative() {
        sorted.iter().map(DataCell::resource_selector).collect()
    } else {
        Vec::new()
    };

    let page = paginate(sorted, &query.pagination);
    let page_selectors: Vec<ResourceSelector> = if wants_metrics {
        page.iter().map(DataCell::resource_selector).collect()
    } else {
        Vec::new()
    };
    debug!(
        "Selected {} of {} items ({:?})",
        page.len(),
        total_items,
        query.pagination
    );

    let promises = MetricPromises::start(
        page_selectors,
        filtered,
        query.metric,
        metrics,
        cache.clone(),
    );
    (
        DataSelection {
            cells: page,
            total_items,
        },
        promises,
    )
}
