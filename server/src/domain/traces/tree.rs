//! Trace tree reconstruction
//!
//! Rebuilds the parent/child structure of a trace from its flat span rows
//! and computes the trace-level aggregates.

use std::collections::{HashMap, VecDeque};

use crate::core::constants::TRACE_MAX_DEPTH;
use crate::data::types::{SpanNode, SpanRow, SpanStatus, TraceDetail};

/// Assemble a trace from its spans (expected in start-time order).
///
/// Returns `None` when there are no spans. A span whose parent is not among
/// `rows` becomes an additional root.
pub fn build_trace(trace_id: &str, rows: Vec<SpanRow>) -> Option<TraceDetail> {
    let start_time = rows.iter().map(|r| r.start_time).min()?;
    let end_time = rows.iter().map(|r| r.end_time).max()?;
    let span_count = rows.len() as u64;
    let error_count = rows
        .iter()
        .filter(|r| r.status == SpanStatus::Error)
        .count() as u64;

    let spans = build_forest(rows);
    let (service_name, environment) = spans
        .first()
        .map(|root| (root.service_name.clone(), root.environment.clone()))
        .unwrap_or_default();
    let roots = spans.into_iter().map(|root| root.node).collect();

    let duration_ms = (end_time - start_time)
        .num_microseconds()
        .map(|us| us as f64 / 1000.0)
        .unwrap_or_default();

    Some(TraceDetail {
        trace_id: trace_id.to_string(),
        start_time,
        end_time,
        duration_ms,
        service_name,
        environment,
        span_count,
        error_count,
        spans: roots,
    })
}

/// A root node together with the labels of the span it came from
struct Root {
    node: SpanNode,
    service_name: String,
    environment: String,
}

/// Placement of every span: tree roots in output order, the preorder of
/// the whole forest and each placed span's parent within it
struct Layout {
    roots: Vec<usize>,
    preorder: Vec<usize>,
    parent: Vec<Option<usize>>,
}

fn build_forest(rows: Vec<SpanRow>) -> Vec<Root> {
    let layout = layout(&rows);

    let labels: Vec<(String, String)> = layout
        .roots
        .iter()
        .map(|&i| (rows[i].service_name.clone(), rows[i].environment.clone()))
        .collect();

    // Attach bottom-up: every child comes after its parent in preorder
    let mut nodes: Vec<Option<SpanNode>> = rows
        .into_iter()
        .map(|row| Some(SpanNode::from(row)))
        .collect();
    for &i in layout.preorder.iter().rev() {
        if let Some(node) = nodes[i].as_mut() {
            node.children.reverse();
        }
        if let Some(p) = layout.parent[i]
            && let Some(node) = nodes[i].take()
            && let Some(parent) = nodes[p].as_mut()
        {
            parent.children.push(node);
        }
    }

    layout
        .roots
        .iter()
        .zip(labels)
        .filter_map(|(&i, (service_name, environment))| {
            nodes[i].take().map(|node| Root {
                node,
                service_name,
                environment,
            })
        })
        .collect()
}

fn layout(rows: &[SpanRow]) -> Layout {
    // First occurrence wins when a span id repeats
    let mut index: HashMap<&str, usize> = HashMap::with_capacity(rows.len());
    for (i, row) in rows.iter().enumerate() {
        index.entry(row.span_id.as_str()).or_insert(i);
    }

    let mut children: Vec<Vec<usize>> = vec![Vec::new(); rows.len()];
    let mut natural_roots = Vec::new();
    for (i, row) in rows.iter().enumerate() {
        match row
            .parent_span_id
            .as_deref()
            .and_then(|p| index.get(p).copied())
        {
            Some(parent) if parent != i => children[parent].push(i),
            _ => natural_roots.push(i),
        }
    }

    let mut layout = Layout {
        roots: Vec::new(),
        preorder: Vec::with_capacity(rows.len()),
        parent: vec![None; rows.len()],
    };
    let mut placed = vec![false; rows.len()];

    // Spans left over after the natural roots sit on a parent cycle
    for start in natural_roots.into_iter().chain(0..rows.len()) {
        place_tree(start, &children, &mut placed, &mut layout);
    }

    layout
}

/// Walk the tree under `start` depth-first without recursion. Spans that
/// would nest deeper than `TRACE_MAX_DEPTH` begin trees of their own,
/// placed right after the one they were cut from.
fn place_tree(start: usize, children: &[Vec<usize>], placed: &mut [bool], layout: &mut Layout) {
    let mut pending = VecDeque::from([start]);

    while let Some(root) = pending.pop_front() {
        if placed[root] {
            continue;
        }
        layout.roots.push(root);

        let mut stack = vec![(root, 0usize)];
        let mut cut = Vec::new();
        while let Some((i, depth)) = stack.pop() {
            if placed[i] {
                continue;
            }
            placed[i] = true;
            layout.preorder.push(i);

            let unplaced = children[i].iter().copied().filter(|&c| !placed[c]);
            if depth + 1 >= TRACE_MAX_DEPTH {
                cut.extend(unplaced);
            } else {
                for child in unplaced.rev() {
                    layout.parent[child] = Some(i);
                    stack.push((child, depth + 1));
                }
            }
        }

        for child in cut.into_iter().rev() {
            pending.push_front(child);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Duration, Utc};

    fn base() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2024-05-01T12:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    fn row(id: &str, parent: Option<&str>, start_ms: i64, end_ms: i64) -> SpanRow {
        SpanRow {
            span_id: id.to_string(),
            parent_span_id: parent.map(str::to_string),
            name: format!("op-{id}"),
            service_name: "llm-api".to_string(),
            environment: "prod".to_string(),
            start_time: base() + Duration::milliseconds(start_ms),
            end_time: base() + Duration::milliseconds(end_ms),
            duration_ms: (end_ms - start_ms) as f64,
            status: SpanStatus::Ok,
            error_message: None,
            attributes: HashMap::new(),
        }
    }

    #[test]
    fn test_empty_trace_is_none() {
        assert!(build_trace("t", vec![]).is_none());
    }

    #[test]
    fn test_orphan_becomes_root() {
        let rows = vec![
            row("1", None, 0, 100),
            row("2", Some("1"), 10, 50),
            row("3", Some("99"), 20, 30),
        ];

        let trace = build_trace("abc", rows).unwrap();
        let root_ids: Vec<&str> = trace.spans.iter().map(|n| n.span_id.as_str()).collect();
        assert_eq!(root_ids, vec!["1", "3"]);
        assert_eq!(trace.spans[0].children.len(), 1);
        assert_eq!(trace.spans[0].children[0].span_id, "2");
        assert!(trace.spans[1].children.is_empty());
        assert_eq!(trace.span_count, 3);
    }

    #[test]
    fn test_nested_children_keep_start_order() {
        let rows = vec![
            row("root", None, 0, 500),
            row("a", Some("root"), 10, 100),
            row("a1", Some("a"), 20, 40),
            row("b", Some("root"), 200, 300),
        ];

        let trace = build_trace("abc", rows).unwrap();
        assert_eq!(trace.spans.len(), 1);
        let root = &trace.spans[0];
        let children: Vec<&str> = root.children.iter().map(|n| n.span_id.as_str()).collect();
        assert_eq!(children, vec!["a", "b"]);
        assert_eq!(root.children[0].children[0].span_id, "a1");
    }

    #[test]
    fn test_aggregates_use_min_start_and_max_end() {
        // The latest-ending span is not the earliest-starting one
        let rows = vec![row("1", None, 0, 100), row("2", Some("1"), 50, 400)];

        let trace = build_trace("abc", rows).unwrap();
        assert_eq!(trace.start_time, base());
        assert_eq!(trace.end_time, base() + Duration::milliseconds(400));
        assert_eq!(trace.duration_ms, 400.0);
        assert_eq!(trace.service_name, "llm-api");
        assert_eq!(trace.environment, "prod");
    }

    #[test]
    fn test_error_count_independent_of_structure() {
        let mut failing_orphan = row("3", Some("missing"), 5, 6);
        failing_orphan.status = SpanStatus::Error;
        let mut failing_child = row("2", Some("1"), 1, 2);
        failing_child.status = SpanStatus::Error;
        let mut unset = row("4", Some("1"), 3, 4);
        unset.status = SpanStatus::Unset;

        let trace = build_trace(
            "abc",
            vec![row("1", None, 0, 10), failing_child, failing_orphan, unset],
        )
        .unwrap();
        assert_eq!(trace.error_count, 2);
        assert_eq!(trace.span_count, 4);
    }

    #[test]
    fn test_deep_parent_chain_is_split_into_bounded_trees() {
        let depth: usize = 20_000;
        let ids: Vec<String> = (0..depth).map(|i| i.to_string()).collect();
        let rows: Vec<SpanRow> = (0..depth)
            .map(|i| {
                let parent = i.checked_sub(1).map(|p| ids[p].as_str());
                row(&ids[i], parent, i as i64, i as i64 + 1)
            })
            .collect();

        let trace = build_trace("deep", rows).unwrap();
        assert_eq!(trace.span_count, depth as u64);
        assert_eq!(trace.spans.len(), depth.div_ceil(TRACE_MAX_DEPTH));
        assert_eq!(trace.spans[0].span_id, "0");
        assert_eq!(trace.spans[1].span_id, TRACE_MAX_DEPTH.to_string());
        assert_eq!(
            trace.spans[1].parent_span_id.as_deref(),
            Some((TRACE_MAX_DEPTH - 1).to_string().as_str())
        );

        let mut total = 0;
        let mut deepest = 0;
        let mut stack: Vec<(&SpanNode, usize)> = trace.spans.iter().map(|n| (n, 1)).collect();
        while let Some((node, level)) = stack.pop() {
            total += 1;
            deepest = deepest.max(level);
            stack.extend(node.children.iter().map(|c| (c, level + 1)));
        }
        assert_eq!(total, depth);
        assert_eq!(deepest, TRACE_MAX_DEPTH);

        let json = serde_json::to_string(&trace).unwrap();
        assert!(json.contains(r#""trace_id":"deep""#));
    }

    #[test]
    fn test_parent_cycle_does_not_drop_spans() {
        let rows = vec![
            row("1", None, 0, 10),
            row("a", Some("b"), 1, 2),
            row("b", Some("a"), 3, 4),
            row("self", Some("self"), 5, 6),
        ];

        let trace = build_trace("abc", rows).unwrap();
        let mut total = 0;
        fn count(node: &SpanNode, total: &mut usize) {
            *total += 1;
            node.children.iter().for_each(|c| count(c, total));
        }
        trace.spans.iter().for_each(|n| count(n, &mut total));
        assert_eq!(total, 4);
    }
}
