//! Post-layout reconciliation of dummy fan-out nodes.
//!
//! The router sees each dummy as an ordinary child, so the edges around it
//! meet at the dummy's ports rather than at the electrical fan-out point.
//! For every dummy this pass picks the incident edge whose junction
//! geometry marks the true fan-out, collapses all termini onto that point,
//! and drops junctions that turn out to be plain bends.

use tracing::debug;

use crate::error::{RenderError, Result};
use crate::layout::{LayoutEdge, LayoutGraph, Point};

/// Safety cap on the dummy-processing loop.
pub const DUMMY_LIMIT: usize = 10_000;

const NO_JUNCTION_SENTINEL: i64 = 10_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    Up,
    Down,
    Left,
    Right,
}

fn step_direction(start: Point, end: Point) -> Result<Direction> {
    if start.x == end.x && start.y == end.y {
        return Err(RenderError::ZeroLengthStep);
    }
    if start.x != end.x && start.y != end.y {
        return Err(RenderError::DiagonalStep);
    }
    Ok(if end.x > start.x {
        Direction::Right
    } else if end.x < start.x {
        Direction::Left
    } else if end.y > start.y {
        Direction::Down
    } else {
        Direction::Up
    })
}

/// Anchor preference when the dummy drives the group: the edge whose first
/// junction sits at the earliest bend.
fn source_anchor_score(edge: &LayoutEdge) -> i64 {
    let Some(first) = edge.junction_points.first() else {
        return NO_JUNCTION_SENTINEL;
    };
    edge.sections
        .first()
        .and_then(|s| s.bend_points.iter().position(|b| b == first))
        .map_or(-1, |i| i as i64)
}

/// Anchor preference when the dummy terminates the group: the edge whose
/// last junction sits at the latest bend.
fn target_anchor_score(edge: &LayoutEdge) -> i64 {
    let Some(last) = edge.junction_points.last() else {
        return -NO_JUNCTION_SENTINEL;
    };
    edge.sections
        .first()
        .and_then(|s| s.bend_points.iter().rposition(|b| b == last))
        .map_or(-1, |i| i as i64)
}

pub fn remove_dummies(graph: &mut LayoutGraph) -> Result<()> {
    let mut processed = 0usize;
    for dummy_num in 0..DUMMY_LIMIT {
        let dummy_id = format!("$d_{dummy_num}");
        let group: Vec<usize> = graph
            .edges
            .iter()
            .enumerate()
            .filter(|(_, e)| e.source == dummy_id || e.target == dummy_id)
            .map(|(i, _)| i)
            .collect();
        if group.is_empty() {
            break;
        }
        processed += 1;
        let dummy_is_source = graph.edges[group[0]].source == dummy_id;

        let anchor = if dummy_is_source {
            group.iter().copied().min_by_key(|&i| source_anchor_score(&graph.edges[i]))
        } else {
            group
                .iter()
                .copied()
                .min_by_key(|&i| std::cmp::Reverse(target_anchor_score(&graph.edges[i])))
        }
        .unwrap_or(group[0]);

        let anchor_edge = &graph.edges[anchor];
        let junction = match anchor_edge.junction_points.first() {
            Some(point) => *point,
            // no junction anywhere: collapse onto the anchor's own terminus
            None => anchor_edge
                .sections
                .first()
                .map(|s| if dummy_is_source { s.start_point } else { s.end_point })
                .unwrap_or_default(),
        };

        for &i in &group {
            let dummy_at_source = graph.edges[i].source == dummy_id;
            let Some(section) = graph.edges[i].sections.first_mut() else {
                continue;
            };
            if dummy_at_source {
                section.start_point = junction;
            } else {
                section.end_point = junction;
            }
            section.bend_points.retain(|b| *b != junction);
        }

        let mut directions: Vec<Direction> = Vec::new();
        for &i in &group {
            let edge = &graph.edges[i];
            let Some(section) = edge.sections.first() else {
                continue;
            };
            let toward = if edge.source == dummy_id {
                section.bend_points.first().copied().unwrap_or(section.end_point)
            } else {
                section.bend_points.last().copied().unwrap_or(section.start_point)
            };
            let dir = step_direction(junction, toward)?;
            if !directions.contains(&dir) {
                directions.push(dir);
            }
        }
        // two departure directions mean the "junction" is just a turn
        if directions.len() == 2 {
            graph.edges[anchor].junction_points.retain(|j| *j != junction);
        }
    }
    graph.children.retain(|child| !child.id.starts_with("$d_"));
    if processed > 0 {
        debug!(dummies = processed, "reconciled dummy fan-outs");
    }
    Ok(())
}
