//! Bus split/join synthesis.
//!
//! Works on the canonical `","+csv+","` form of each port vector, so that
//! substring search on the comma-delimited text is exactly subsequence
//! search on the bit vectors. For every consumer vector not matched by a
//! declared driver, the search finds the longest prefix producible from a
//! driver (whole or sub-range) or from another consumer solved first, then
//! recurses on the remainder. Sub-ranges of drivers become `$_split_`
//! cells keyed on the source; assembled consumers become `$_join_` cells
//! keyed on the target.

use indexmap::IndexMap;
use tracing::{debug, trace};

use crate::flatten::{FlatCell, FlatModule, FlatPort, TYPE_JOIN, TYPE_SPLIT};
use crate::netlist::Signal;

pub fn add_splits_joins(module: &mut FlatModule) {
    let consumers: Vec<String> =
        module.nodes.iter().flat_map(|n| n.inputs.iter().map(FlatPort::net_key)).collect();
    let mut drivers: Vec<String> =
        module.nodes.iter().flat_map(|n| n.outputs.iter().map(FlatPort::net_key)).collect();
    let mut open = consumers.clone();

    let mut splits: IndexMap<String, Vec<String>> = IndexMap::new();
    let mut joins: IndexMap<String, Vec<String>> = IndexMap::new();
    for target in &consumers {
        gather(&mut drivers, &mut open, target, 0, target.len(), &mut splits, &mut joins);
    }
    if !splits.is_empty() || !joins.is_empty() {
        debug!(joins = joins.len(), splits = splits.len(), "synthesized bus conversions");
    }
    for (target, ranges) in &joins {
        module.nodes.push(join_cell(target, ranges));
    }
    for (source, ranges) in &splits {
        module.nodes.push(split_cell(source, ranges));
    }
}

/// Solve the segment `target[start..end]`, scheduling splits and joins.
///
/// `drivers` holds every vector the net can already produce, and grows as
/// sub-ranges are exposed. `consumers` holds the not-yet-visited consumer
/// vectors; a consumer found covering the query is solved on the spot and
/// promoted to a driver.
fn gather(
    drivers: &mut Vec<String>,
    consumers: &mut Vec<String>,
    target: &str,
    start: usize,
    end: usize,
    splits: &mut IndexMap<String, Vec<String>>,
    joins: &mut IndexMap<String, Vec<String>>,
) {
    // a vector never satisfies itself
    if let Some(i) = consumers.iter().position(|c| c == target) {
        consumers.remove(i);
    }
    if start >= target.len() || end - start < 2 {
        return;
    }
    let query = &target[start..end];
    trace!(vector = target, segment = query, "matching bus segment");

    // whole match against an available driver
    if drivers.iter().any(|d| d == query) {
        if query != target {
            schedule(joins, target, range_of(target, query, start));
        }
        gather(drivers, consumers, target, end - 1, target.len(), splits, joins);
        return;
    }
    // sub-range of a driver: expose it with a split
    if let Some(i) = drivers.iter().position(|d| d.contains(query)) {
        if query != target {
            schedule(joins, target, range_of(target, query, start));
        }
        let source = drivers[i].clone();
        schedule(splits, &source, range_of(&source, query, 0));
        drivers.push(query.to_string());
        gather(drivers, consumers, target, end - 1, target.len(), splits, joins);
        return;
    }
    // covered by another consumer: solve that one first, then reuse it
    if consumers.iter().any(|c| c.contains(query)) {
        if query != target {
            schedule(joins, target, range_of(target, query, start));
        }
        let sub = query.to_string();
        gather(drivers, &mut Vec::new(), &sub, 0, sub.len(), splits, joins);
        drivers.push(sub);
        gather(drivers, consumers, target, end - 1, target.len(), splits, joins);
        return;
    }
    // a single unmatched element: skip past it and solve the rest
    if !query[1..query.len() - 1].contains(',') {
        gather(drivers, consumers, target, end - 1, target.len(), splits, joins);
        return;
    }
    // drop the last element and retry
    let shortened = target[..end - 1].rfind(',').map_or(start, |i| i + 1);
    gather(drivers, consumers, target, start, shortened, splits, joins);
}

fn schedule(map: &mut IndexMap<String, Vec<String>>, key: &str, range: String) {
    let ranges = map.entry(key.to_string()).or_default();
    if !ranges.contains(&range) {
        ranges.push(range);
    }
}

/// Bit-range of `query` within `vector`, as `"i"` or `"i:j"` (inclusive),
/// computed by counting commas before the match.
fn range_of(vector: &str, query: &str, start: usize) -> String {
    let split_start = vector.find(query).unwrap_or(0).max(start);
    let start_index = vector[..split_start].matches(',').count();
    let end_index = start_index + query.matches(',').count().saturating_sub(2);
    if start_index == end_index {
        format!("{start_index}")
    } else {
        format!("{start_index}:{end_index}")
    }
}

fn key_signals(key: &str) -> Vec<Signal> {
    key.trim_matches(',')
        .split(',')
        .filter(|s| !s.is_empty())
        .map(|s| s.parse().map(Signal::Net).unwrap_or(Signal::Zero))
        .collect()
}

fn range_signals(signals: &[Signal], range: &str) -> Vec<Signal> {
    let (lo, hi) = match range.split_once(':') {
        Some((a, b)) => (a.parse().unwrap_or(0), b.parse().unwrap_or(0)),
        None => {
            let i: usize = range.parse().unwrap_or(0);
            (i, i)
        }
    };
    signals.get(lo..=hi).map(<[Signal]>::to_vec).unwrap_or_default()
}

fn join_cell(target: &str, ranges: &[String]) -> FlatCell {
    let signals = key_signals(target);
    let mut cell = FlatCell::new(format!("$join${target}"), TYPE_JOIN);
    for range in ranges {
        cell.inputs.push(FlatPort::new(range.clone(), range_signals(&signals, range)));
    }
    cell.outputs.push(FlatPort::new("Y", signals));
    cell
}

fn split_cell(source: &str, ranges: &[String]) -> FlatCell {
    let signals = key_signals(source);
    let mut cell = FlatCell::new(format!("$split${source}"), TYPE_SPLIT);
    cell.inputs.push(FlatPort::new("A", signals.clone()));
    for range in ranges {
        cell.outputs.push(FlatPort::new(range.clone(), range_signals(&signals, range)));
    }
    cell
}
