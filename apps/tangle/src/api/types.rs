//! # API Request/Response Types
//!
//! This module defines the JSON structures for the HTTP API.

use serde::{Deserialize, Serialize};
use tangle_core::{Checkpoint, ConsistencyReport, ConsistencyStatus, Node, PropagationWarning};

// =============================================================================
// HEALTH RESPONSE
// =============================================================================

/// Health check response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

impl Default for HealthResponse {
    fn default() -> Self {
        Self {
            status: "ok".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

// =============================================================================
// STATUS RESPONSE
// =============================================================================

/// Graph status response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusResponse {
    pub backend: String,
    pub node_count: usize,
    pub tip_count: usize,
    pub latest_checkpoint: Option<String>,
}

// =============================================================================
// NODES
// =============================================================================

/// Record JSON representation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeJson {
    pub id: String,
    pub parents: Vec<String>,
    pub weight: u32,
    pub cumulative_weight: i64,
    pub created_at: i64,
}

impl From<&Node> for NodeJson {
    fn from(node: &Node) -> Self {
        Self {
            id: node.id.to_string(),
            parents: node.parents.iter().map(ToString::to_string).collect(),
            weight: node.weight,
            cumulative_weight: node.cumulative_weight,
            created_at: node.created_at,
        }
    }
}

/// Plain admission request. Unknown fields (such as an empty `parents`
/// list) are ignored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AddNodeRequest {
    #[serde(default)]
    pub id: String,
}

/// Approval request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApproveRequest {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub parents: Vec<String>,
}

/// Response carrying a single record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeResponse {
    pub success: bool,
    pub node: Option<NodeJson>,
    /// Non-fatal weight propagation problems (approvals only).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
    pub error: Option<String>,
}

impl NodeResponse {
    pub fn success(node: &Node) -> Self {
        Self {
            success: true,
            node: Some(NodeJson::from(node)),
            warnings: vec![],
            error: None,
        }
    }

    pub fn with_warnings(node: &Node, warnings: &[PropagationWarning]) -> Self {
        Self {
            warnings: warnings.iter().map(ToString::to_string).collect(),
            ..Self::success(node)
        }
    }

    pub fn error(msg: impl Into<String>) -> Self {
        Self {
            success: false,
            node: None,
            warnings: vec![],
            error: Some(msg.into()),
        }
    }
}

/// Response listing records.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeListResponse {
    pub success: bool,
    pub count: usize,
    pub nodes: Vec<NodeJson>,
    pub error: Option<String>,
}

impl NodeListResponse {
    pub fn success(nodes: &[Node]) -> Self {
        Self {
            success: true,
            count: nodes.len(),
            nodes: nodes.iter().map(NodeJson::from).collect(),
            error: None,
        }
    }

    pub fn error(msg: impl Into<String>) -> Self {
        Self {
            success: false,
            count: 0,
            nodes: vec![],
            error: Some(msg.into()),
        }
    }
}

/// Response listing tip ids.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TipsResponse {
    pub success: bool,
    pub tips: Vec<String>,
    pub error: Option<String>,
}

// =============================================================================
// TIP SELECTION
// =============================================================================

/// Query string of `GET /nodes/tip-selection`. Missing values fall back to
/// the configured walk defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TipSelectionQuery {
    pub alpha: Option<f64>,
    pub max_steps: Option<usize>,
}

// =============================================================================
// CONSISTENCY
// =============================================================================

/// One drifted record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InconsistencyJson {
    pub node_id: String,
    pub expected_cumulative: i64,
    pub actual_cumulative: i64,
    pub difference: i64,
}

/// Consistency validation response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationResponse {
    pub status: String,
    pub total_nodes: u64,
    pub valid_nodes: u64,
    pub inconsistent_nodes: usize,
    pub inconsistencies: Vec<InconsistencyJson>,
    /// Share of valid nodes in millionths.
    pub consistency_millionths: u64,
    /// Milliseconds since the UNIX epoch when validation started.
    pub validation_time: i64,
    pub duration_micros: u64,
}

impl ValidationResponse {
    pub fn from_report(report: &ConsistencyReport, validation_time: i64, duration_micros: u64) -> Self {
        let status = match report.status {
            ConsistencyStatus::Consistent => "consistent",
            ConsistencyStatus::Inconsistent => "inconsistent",
        };
        Self {
            status: status.to_string(),
            total_nodes: report.total_nodes,
            valid_nodes: report.valid_nodes,
            inconsistent_nodes: report.mismatches.len(),
            inconsistencies: report
                .mismatches
                .iter()
                .map(|m| InconsistencyJson {
                    node_id: m.node_id.to_string(),
                    expected_cumulative: m.expected,
                    actual_cumulative: m.actual,
                    difference: m.difference,
                })
                .collect(),
            consistency_millionths: report.consistency_millionths,
            validation_time,
            duration_micros,
        }
    }
}

// =============================================================================
// CHECKPOINTS
// =============================================================================

/// Checkpoint creation request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckpointRequest {
    #[serde(default)]
    pub id: String,
}

/// Response carrying a checkpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckpointResponse {
    pub success: bool,
    pub checkpoint: Option<Checkpoint>,
    pub error: Option<String>,
}

impl CheckpointResponse {
    pub fn success(checkpoint: Checkpoint) -> Self {
        Self {
            success: true,
            checkpoint: Some(checkpoint),
            error: None,
        }
    }

    pub fn error(msg: impl Into<String>) -> Self {
        Self {
            success: false,
            checkpoint: None,
            error: Some(msg.into()),
        }
    }
}
