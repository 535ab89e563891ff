//! Scenario loading and configuration.
//!
//! Scenarios define the initial grid for headless runs: node placements,
//! energy sources feeding the grid each step, and sinks draining it.

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use grid_core::config::GridConfig;
use grid_core::space::Position;
use grid_core::tier::Tier;

/// Error type for scenario operations.
#[derive(Error, Debug)]
pub enum ScenarioError {
    /// File not found.
    #[error("Scenario file not found: {0}")]
    FileNotFound(String),
    /// Failed to read file.
    #[error("Failed to read scenario file: {0}")]
    ReadError(#[from] std::io::Error),
    /// Failed to parse RON.
    #[error("Failed to parse scenario: {0}")]
    ParseError(#[from] ron::error::SpannedError),
}

/// A node placement in the scenario grid.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodePlacement {
    /// Where the node sits.
    pub position: Position,
    /// Its tier.
    pub tier: Tier,
}

/// An energy source: emits a fixed amount into the network at the given
/// position every step. Amounts are decimal strings so scenarios can use
/// values beyond `u64`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceSetup {
    /// Network position the source feeds.
    pub position: Position,
    /// Amount emitted per step.
    pub per_step: String,
}

/// An energy sink: an acceptor placed in the world next to the grid.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SinkSetup {
    /// World position of the sink.
    pub position: Position,
    /// Storage ceiling of the sink.
    pub max: String,
    /// Per-step intake limit; unlimited when absent.
    #[serde(default)]
    pub rate: Option<String>,
}

/// A complete scenario configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scenario {
    /// Scenario name.
    pub name: String,
    /// Human-readable description.
    pub description: String,
    /// Simulation parameters; defaults apply when omitted.
    #[serde(default)]
    pub config: GridConfig,
    /// Node placements.
    pub nodes: Vec<NodePlacement>,
    /// Energy sources.
    #[serde(default)]
    pub sources: Vec<SourceSetup>,
    /// Energy sinks.
    #[serde(default)]
    pub sinks: Vec<SinkSetup>,
}

impl Scenario {
    /// Load a scenario from a RON file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ScenarioError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ScenarioError::FileNotFound(path.display().to_string()));
        }
        let contents = std::fs::read_to_string(path)?;
        let scenario: Scenario = ron::from_str(&contents)?;
        Ok(scenario)
    }

    /// Load from a RON string (useful for embedded scenarios).
    pub fn from_ron_str(ron: &str) -> Result<Self, ScenarioError> {
        let scenario: Scenario = ron::from_str(ron)?;
        Ok(scenario)
    }

    /// A built-in demo: a line of nodes with one source on the west end
    /// and two competing sinks on the east end.
    #[must_use]
    pub fn demo_line() -> Self {
        Self {
            name: "Demo Line".to_string(),
            description: "One source feeding two sinks across a five-node line".to_string(),
            config: GridConfig::default(),
            nodes: (0..5)
                .map(|x| NodePlacement {
                    position: Position::new(x, 0, 0),
                    tier: Tier::Basic,
                })
                .collect(),
            sources: vec![SourceSetup {
                position: Position::new(0, 0, 0),
                per_step: "1000000000000".to_string(),
            }],
            sinks: vec![
                SinkSetup {
                    position: Position::new(5, 0, 0),
                    max: "900000000000000".to_string(),
                    rate: None,
                },
                SinkSetup {
                    position: Position::new(4, 1, 0),
                    max: "300000000000000".to_string(),
                    rate: Some("200000000000".to_string()),
                },
            ],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_demo_line_is_well_formed() {
        let scenario = Scenario::demo_line();
        assert_eq!(scenario.nodes.len(), 5);
        assert!(scenario.config.validate().is_ok());
    }

    #[test]
    fn test_ron_round_trip() {
        let scenario = Scenario::demo_line();
        let text = ron::to_string(&scenario).unwrap();
        let restored = Scenario::from_ron_str(&text).unwrap();
        assert_eq!(restored.nodes.len(), scenario.nodes.len());
        assert_eq!(restored.sources[0].per_step, scenario.sources[0].per_step);
    }

    #[test]
    fn test_minimal_ron_uses_defaults() {
        let text = r#"(
            name: "tiny",
            description: "one node, nothing else",
            nodes: [(position: (x: 0, y: 0, z: 0), tier: Basic)],
        )"#;
        let scenario = Scenario::from_ron_str(text).unwrap();
        assert!(scenario.sources.is_empty());
        assert!(scenario.sinks.is_empty());
        assert_eq!(scenario.config.acceptor_scan_interval, 20);
    }

    #[test]
    fn test_load_missing_file() {
        let err = Scenario::load("/nonexistent/scenario.ron").unwrap_err();
        assert!(matches!(err, ScenarioError::FileNotFound(_)));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("demo.ron");
        std::fs::write(&path, ron::to_string(&Scenario::demo_line()).unwrap()).unwrap();
        let scenario = Scenario::load(&path).unwrap();
        assert_eq!(scenario.name, "Demo Line");
    }
}
