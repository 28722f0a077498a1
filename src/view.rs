use std::cmp::Ordering;
use std::collections::HashMap;

use rayon::prelude::*;

use crate::columns::WorkingSet;
use crate::filter::contains_ignore_case;
use crate::state::{SortOrder, ViewState};
use crate::value::{Row, Value};

#[derive(Debug, Clone, PartialEq)]
pub enum DisplayRow {
    Group {
        depth: usize,
        column: String,
        label: String,
        count: usize,
    },
    Record {
        depth: usize,
        row: usize,
    },
}

/// What the table renders: visible columns and the rows in display order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Projection {
    /// Indices into `WorkingSet::columns`.
    pub columns: Vec<usize>,
    pub rows: Vec<DisplayRow>,
    /// Records that passed filters and search.
    pub matched: usize,
}

pub fn project(ws: &WorkingSet, state: &ViewState) -> Projection {
    if ws.is_empty() {
        return Projection::default();
    }

    let mut indices: Vec<usize> = (0..ws.rows.len())
        .into_par_iter()
        .filter(|&ridx| {
            let row = &ws.rows[ridx];
            state.filters.matches(row) && matches_search(row, &state.search)
        })
        .collect();

    if let Some(sort) = &state.sorting {
        sort_rows(ws, sort, &mut indices);
    }

    let matched = indices.len();
    let mut rows = Vec::with_capacity(matched + state.grouping.len());
    group_rows(ws, &state.grouping, 0, &indices, &mut rows);

    Projection {
        columns: visible_columns(ws, state),
        rows,
        matched,
    }
}

fn matches_search(row: &Row, term: &str) -> bool {
    term.is_empty() || row.iter().any(|(_, v)| contains_ignore_case(&v.to_string(), term))
}

fn visible_columns(ws: &WorkingSet, state: &ViewState) -> Vec<usize> {
    let ordered = state.ordered_columns(ws);
    let grouped = state
        .grouping
        .iter()
        .map(String::as_str)
        .filter(|c| ordered.contains(c));
    let rest = ordered.iter().copied().filter(|c| !state.is_grouped(c));

    grouped
        .chain(rest)
        .filter(|c| state.is_visible(c))
        .filter_map(|c| ws.column_index(c))
        .collect()
}

fn sort_rows(ws: &WorkingSet, sort: &SortOrder, indices: &mut [usize]) {
    let numeric = ws.is_numeric(&sort.column);
    let rows: &[Row] = &ws.rows;
    let column = sort.column.as_str();

    indices.sort_by(|a, b| {
        compare_cells(
            rows[*a].get(column),
            rows[*b].get(column),
            numeric,
            sort.ascending,
        )
    });
}

/// Numbers come before text in numeric columns in both directions, text
/// columns compare their string form.
fn compare_cells(
    a: Option<&Value>,
    b: Option<&Value>,
    numeric: bool,
    ascending: bool,
) -> Ordering {
    let directed = |ordering: Ordering| {
        if ascending {
            ordering
        } else {
            ordering.reverse()
        }
    };
    let as_text = |v: Option<&Value>| v.map(Value::to_string).unwrap_or_default();
    if !numeric {
        return directed(as_text(a).cmp(&as_text(b)));
    }
    match (a.and_then(Value::as_number), b.and_then(Value::as_number)) {
        (Some(x), Some(y)) => directed(x.partial_cmp(&y).unwrap_or(Ordering::Equal)),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => directed(as_text(a).cmp(&as_text(b))),
    }
}

fn group_rows(
    ws: &WorkingSet,
    grouping: &[String],
    depth: usize,
    indices: &[usize],
    out: &mut Vec<DisplayRow>,
) {
    let Some((column, nested)) = grouping.split_first() else {
        out.extend(indices.iter().map(|&row| DisplayRow::Record { depth, row }));
        return;
    };

    // Buckets keep the order in which their first row appears.
    let mut buckets: Vec<(String, Vec<usize>)> = Vec::new();
    let mut positions: HashMap<String, usize> = HashMap::new();
    for &ridx in indices {
        let label = ws.rows[ridx]
            .get(column)
            .map(Value::to_string)
            .unwrap_or_default();
        match positions.get(&label) {
            Some(&pos) => buckets[pos].1.push(ridx),
            None => {
                positions.insert(label.clone(), buckets.len());
                buckets.push((label, vec![ridx]));
            }
        }
    }

    for (label, members) in buckets {
        out.push(DisplayRow::Group {
            depth,
            column: column.clone(),
            label,
            count: members.len(),
        });
        group_rows(ws, nested, depth + 1, &members, out);
    }
}
