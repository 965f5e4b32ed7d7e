use serde::{ Serialize, Deserialize };

/// Payload a graph-layout library reads off each node.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NodeData {
    pub label: String,
    pub level: usize,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeStyle {
    pub border_radius: u32,
    pub padding: u32,
    pub background: String,
    pub color: String,
    pub font_size: String,
    pub font_weight: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_width: Option<String>,
}

impl NodeStyle {
    pub fn for_level(level: usize) -> Self {
        let top = level == 1;
        let background = match level {
            1 => "#4f46e5",
            2 => "#06b6d4",
            _ => "#10b981",
        };
        Self {
            border_radius: if top { 12 } else { 8 },
            padding: if top { 16 } else { 10 },
            background: background.to_string(),
            color: "white".to_string(),
            font_size: if top { "14px" } else { "12px" }.to_string(),
            font_weight: if top { "600" } else { "500" }.to_string(),
            min_width: top.then(|| "160px".to_string()),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RoadmapNode {
    pub id: String,
    pub data: NodeData,
    pub position: Position,
    pub style: NodeStyle,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EdgeStyle {
    pub stroke: String,
    pub stroke_width: u32,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RoadmapEdge {
    pub id: String,
    pub source: String,
    pub target: String,
    pub style: EdgeStyle,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub edge_type: Option<String>,
}

impl RoadmapEdge {
    pub fn chain(source: &str, target: &str) -> Self {
        Self {
            id: format!("e-{}-{}", source, target),
            source: source.to_string(),
            target: target.to_string(),
            style: EdgeStyle { stroke: "#4f46e5".to_string(), stroke_width: 3 },
            edge_type: Some("smoothstep".to_string()),
        }
    }

    pub fn child(parent: &str, child: &str) -> Self {
        Self {
            id: format!("e-{}-{}", parent, child),
            source: parent.to_string(),
            target: child.to_string(),
            style: EdgeStyle { stroke: "#64748b".to_string(), stroke_width: 2 },
            edge_type: None,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RoadmapGraph {
    pub nodes: Vec<RoadmapNode>,
    pub edges: Vec<RoadmapEdge>,
}

impl RoadmapGraph {
    pub fn node(&self, id: &str) -> Option<&RoadmapNode> {
        self.nodes.iter().find(|n| n.id == id)
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

/// A generated outline together with its raw LLM text, kept as context for
/// later expansion calls.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Roadmap {
    pub title: String,
    pub outline: String,
    pub graph: RoadmapGraph,
}
