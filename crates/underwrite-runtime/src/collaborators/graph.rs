//! Linked-requirement context.
//!
//! A graph backend can tell an agent which other requirements relate to
//! the one it is judging. The text is extra context for the model only.

use async_trait::async_trait;
use std::collections::BTreeMap;
use thiserror::Error;

use underwrite_core::Check;

#[derive(Error, Debug)]
pub enum GraphError {
    #[error("Graph backend unavailable: {0}")]
    Unavailable(String),

    #[error("Graph query failed: {0}")]
    Query(String),
}

#[async_trait]
pub trait GraphContext: Send + Sync {
    /// Requirement texts linked to `check`.
    async fn linked_requirements(&self, check: &Check) -> Result<Vec<String>, GraphError>;
}

/// No graph configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoGraph;

#[async_trait]
impl GraphContext for NoGraph {
    async fn linked_requirements(&self, _check: &Check) -> Result<Vec<String>, GraphError> {
        Ok(Vec::new())
    }
}

/// In-memory links keyed by check id.
#[derive(Debug, Clone, Default)]
pub struct StaticGraph {
    links: BTreeMap<String, Vec<String>>,
}

impl StaticGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn link(mut self, check_id: impl Into<String>, requirement: impl Into<String>) -> Self {
        self.links
            .entry(check_id.into())
            .or_default()
            .push(requirement.into());
        self
    }

    /// Link every pair of checks that share a data field.
    pub fn from_shared_fields(checks: &[Check]) -> Self {
        let mut graph = Self::new();
        for check in checks {
            for other in checks {
                if other.id != check.id
                    && other
                        .data_fields
                        .iter()
                        .any(|f| check.data_fields.contains(f))
                {
                    graph = graph.link(check.id.clone(), other.requirement.clone());
                }
            }
        }
        graph
    }
}

#[async_trait]
impl GraphContext for StaticGraph {
    async fn linked_requirements(&self, check: &Check) -> Result<Vec<String>, GraphError> {
        Ok(self.links.get(&check.id).cloned().unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use underwrite_core::CheckKind;

    #[tokio::test]
    async fn test_no_graph_is_empty() {
        let check = Check::new("TH01", CheckKind::Threshold, "LTV below 80%");
        assert!(NoGraph.linked_requirements(&check).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_shared_fields_link_checks() {
        let checks = vec![
            Check::new("TH01", CheckKind::Threshold, "LTV below 80%").with_fields(["ltv_ratio"]),
            Check::new("CR01", CheckKind::Criteria, "PMI required when LTV above 80%")
                .with_fields(["ltv_ratio", "pmi_certificate"]),
            Check::new("TH02", CheckKind::Threshold, "FICO at least 620").with_fields(["credit_score"]),
        ];
        let graph = StaticGraph::from_shared_fields(&checks);

        let linked = graph.linked_requirements(&checks[0]).await.unwrap();
        assert_eq!(linked, vec!["PMI required when LTV above 80%".to_string()]);
        assert!(graph.linked_requirements(&checks[2]).await.unwrap().is_empty());
    }
}
