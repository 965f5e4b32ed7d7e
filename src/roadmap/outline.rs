//! Pipe-outline parsing.
//!
//! An outline is LLM text where each meaningful line starts with one or more
//! `|` markers giving its depth, followed by a label:
//!
//! ```text
//! | Main topic
//! || Subtopic
//! ||| Detail
//! ```
//!
//! [`parse_outline`] turns it into a positioned [`RoadmapGraph`].

use crate::models::roadmap::{
    NodeData,
    NodeStyle,
    Position,
    RoadmapEdge,
    RoadmapGraph,
    RoadmapNode,
};

const DEPTH_MARKER: char = '|';
const ID_LABEL_CHARS: usize = 8;
const ROW_HEIGHT: f64 = 70.0;
const MAIN_ROW_HEIGHT: f64 = 120.0;
const MAIN_INDENT: f64 = 100.0;

#[derive(Debug, Clone, PartialEq)]
pub struct LayoutOptions {
    pub start_x: f64,
    pub start_y: f64,
    pub level_gap: f64,
    pub id_prefix: String,
    /// Lay depth-1 nodes out as a vertical chain linked to each other.
    pub chain_top_level: bool,
}

impl LayoutOptions {
    pub fn main_roadmap() -> Self {
        Self {
            start_x: 50.0,
            start_y: 50.0,
            level_gap: 200.0,
            id_prefix: "root".to_string(),
            chain_top_level: true,
        }
    }

    pub fn subtree(id_prefix: impl Into<String>) -> Self {
        Self {
            start_x: 50.0,
            start_y: 50.0,
            level_gap: 180.0,
            id_prefix: id_prefix.into(),
            chain_top_level: false,
        }
    }
}

/// Drops everything that is not an outline line. A single leading `-` is
/// tolerated since models sometimes bullet the tree anyway.
pub fn clean_outline(text: &str) -> String {
    text.lines()
        .map(|line| {
            let line = line.trim();
            line.strip_prefix('-').unwrap_or(line).trim()
        })
        .filter(|line| line.starts_with(DEPTH_MARKER))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Splits a line into `(depth, label)`. Lines without a marker or without a
/// label are not outline lines.
fn split_line(line: &str) -> Option<(usize, &str)> {
    let line = line.trim_start();
    let label = line.trim_start_matches(DEPTH_MARKER);
    let depth = line.len() - label.len();
    let label = label.trim();
    if depth == 0 || label.is_empty() {
        return None;
    }
    Some((depth, label))
}

fn node_id(prefix: &str, index: usize, label: &str) -> String {
    let short: String = label
        .chars()
        .take(ID_LABEL_CHARS)
        .filter(|c| !c.is_whitespace())
        .collect();
    format!("{}-{}-{}", prefix, index, short)
}

pub fn parse_outline(text: &str, layout: &LayoutOptions) -> RoadmapGraph {
    let mut graph = RoadmapGraph::default();
    // stack[d] holds the most recent node at depth d on the current branch.
    let mut stack: Vec<Option<String>> = Vec::new();
    let mut main_nodes: Vec<String> = Vec::new();

    for (index, line) in text.lines().filter(|l| !l.is_empty()).enumerate() {
        let Some((depth, label)) = split_line(line) else {
            continue;
        };
        let id = node_id(&layout.id_prefix, index, label);
        let chained = layout.chain_top_level && depth == 1;

        let position = if chained {
            Position {
                x: layout.start_x + MAIN_INDENT,
                y: layout.start_y + (main_nodes.len() as f64) * MAIN_ROW_HEIGHT,
            }
        } else {
            Position {
                x: layout.start_x + (depth as f64) * layout.level_gap,
                y: layout.start_y + (index as f64) * ROW_HEIGHT,
            }
        };

        if chained {
            if let Some(prev) = main_nodes.last() {
                graph.edges.push(RoadmapEdge::chain(prev, &id));
            }
            main_nodes.push(id.clone());
        } else {
            let parent = stack
                .iter()
                .take(depth)
                .rev()
                .find_map(|slot| slot.as_deref());
            if let Some(parent) = parent {
                graph.edges.push(RoadmapEdge::child(parent, &id));
            }
        }

        stack.truncate(depth);
        stack.resize(depth + 1, None);
        stack[depth] = Some(id.clone());

        graph.nodes.push(RoadmapNode {
            id,
            data: NodeData { label: label.to_string(), level: depth },
            position,
            style: NodeStyle::for_level(depth),
        });
    }

    graph
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn labels(graph: &RoadmapGraph, id: &str) -> String {
        graph.node(id).map(|n| n.data.label.clone()).unwrap_or_default()
    }

    #[test]
    fn siblings_share_their_parent() {
        let graph = parse_outline("| A\n|| B\n|| C", &LayoutOptions::subtree("subtree"));
        assert_eq!(graph.nodes.len(), 3);
        assert_eq!(graph.edges.len(), 2);
        for edge in &graph.edges {
            assert_eq!(labels(&graph, &edge.source), "A");
        }
    }

    #[test]
    fn same_outline_in_main_mode_also_hangs_off_a() {
        let graph = parse_outline("| A\n|| B\n|| C", &LayoutOptions::main_roadmap());
        assert_eq!(graph.edges.len(), 2);
        assert!(graph.edges.iter().all(|e| labels(&graph, &e.source) == "A"));
    }

    #[test]
    fn lines_without_marker_are_dropped() {
        let text = "Here is your roadmap:\n| A\nnot a node\n|| B\n||\n";
        let graph = parse_outline(text, &LayoutOptions::subtree("s"));
        let names: Vec<_> = graph.nodes.iter().map(|n| n.data.label.as_str()).collect();
        assert_eq!(names, vec!["A", "B"]);
        assert_eq!(graph.edges.len(), 1);
        assert!(graph.edges.iter().all(|e| graph.node(&e.source).is_some() && graph.node(&e.target).is_some()));
    }

    #[test]
    fn main_topics_are_chained_in_order() {
        let text = "| Basics\n|| HTML\n| Styling\n|| CSS\n| Scripting";
        let graph = parse_outline(text, &LayoutOptions::main_roadmap());
        let chain: Vec<_> = graph.edges
            .iter()
            .filter(|e| e.edge_type.as_deref() == Some("smoothstep"))
            .map(|e| (labels(&graph, &e.source), labels(&graph, &e.target)))
            .collect();
        assert_eq!(chain, vec![
            ("Basics".to_string(), "Styling".to_string()),
            ("Styling".to_string(), "Scripting".to_string()),
        ]);

        let mains: Vec<_> = graph.nodes.iter().filter(|n| n.data.level == 1).collect();
        assert_eq!(mains[0].position, Position { x: 150.0, y: 50.0 });
        assert_eq!(mains[1].position, Position { x: 150.0, y: 170.0 });
        assert_eq!(mains[2].position, Position { x: 150.0, y: 290.0 });
    }

    #[test]
    fn top_level_nodes_are_roots_in_subtree_mode() {
        let graph = parse_outline("| A\n|| B\n| C\n|| D", &LayoutOptions::subtree("subtree"));
        assert_eq!(graph.edges.len(), 2);
        assert_eq!(labels(&graph, &graph.edges[1].source), "C");
        assert!(graph.edges.iter().all(|e| e.edge_type.is_none()));
    }

    #[test]
    fn one_edge_per_non_top_level_node() {
        let text = "| A\n|| B\n||| C\n||| D\n|| E\n| F\n|| G\n||| H";
        let graph = parse_outline(text, &LayoutOptions::subtree("s"));
        let deep = graph.nodes.iter().filter(|n| n.data.level > 1).count();
        assert_eq!(graph.edges.len(), deep);

        for edge in &graph.edges {
            let source = graph.node(&edge.source).unwrap();
            let target = graph.node(&edge.target).unwrap();
            assert!(source.data.level < target.data.level);
        }
    }

    #[test]
    fn skipped_depth_attaches_to_nearest_live_ancestor() {
        let text = "| A\n|| B\n| C\n||| D";
        let graph = parse_outline(text, &LayoutOptions::subtree("s"));
        let d_edge = graph.edges
            .iter()
            .find(|e| labels(&graph, &e.target) == "D")
            .unwrap();
        assert_eq!(labels(&graph, &d_edge.source), "C");
    }

    #[test]
    fn orphan_without_shallower_node_has_no_edge() {
        let graph = parse_outline("|| Orphan\n| A", &LayoutOptions::subtree("s"));
        assert_eq!(graph.nodes.len(), 2);
        assert!(graph.edges.is_empty());
    }

    #[test]
    fn ids_are_unique_even_for_repeated_labels() {
        let text = "| Practice\n|| Practice\n|| Practice\n| Practice";
        let graph = parse_outline(text, &LayoutOptions::main_roadmap());
        let ids: HashSet<_> = graph.nodes.iter().map(|n| n.id.as_str()).collect();
        assert_eq!(ids.len(), 4);
        assert_eq!(graph.nodes[0].id, "root-0-Practice");
    }

    #[test]
    fn id_uses_first_eight_chars_without_spaces() {
        let graph = parse_outline("| Web Development Basics", &LayoutOptions::subtree("subtree"));
        assert_eq!(graph.nodes[0].id, "subtree-0-WebDeve");
    }

    #[test]
    fn deeper_nodes_use_level_gap_and_line_index() {
        let graph = parse_outline("| A\n|| B", &LayoutOptions::subtree("s"));
        assert_eq!(graph.nodes[0].position, Position { x: 230.0, y: 50.0 });
        assert_eq!(graph.nodes[1].position, Position { x: 410.0, y: 120.0 });
        assert_eq!(graph.nodes[1].style.background, "#06b6d4");
    }

    #[test]
    fn clean_strips_bullets_and_prose() {
        let raw = "Sure! Here's the roadmap:\n\n- | Basics\n  || Variables\n* not outline\n|| Loops\n";
        assert_eq!(clean_outline(raw), "| Basics\n|| Variables\n|| Loops");
    }

    #[test]
    fn empty_input_yields_empty_graph() {
        assert!(parse_outline("", &LayoutOptions::main_roadmap()).is_empty());
        assert!(parse_outline(&clean_outline("no tree here"), &LayoutOptions::main_roadmap()).is_empty());
    }
}
