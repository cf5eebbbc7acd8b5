use serde::{Deserialize, Serialize};
use std::fmt;

/// Execution context handed to external collaborators (predictor, aligner).
///
/// The pipeline never chooses a device on its own: whatever the caller puts
/// here is forwarded verbatim, and collaborators decide how to honor it.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Device {
    /// Host CPU (system RAM).
    #[default]
    Cpu,
    /// CUDA accelerator with the given ordinal.
    Cuda(usize),
    /// Backend-specific identifier (e.g. `"metal"`, `"vulkan:1"`).
    Named(String),
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Device::Cpu => write!(f, "cpu"),
            Device::Cuda(ordinal) => write!(f, "cuda:{ordinal}"),
            Device::Named(name) => write!(f, "{name}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_matches_backend_naming() {
        assert_eq!(Device::Cpu.to_string(), "cpu");
        assert_eq!(Device::Cuda(1).to_string(), "cuda:1");
        assert_eq!(Device::Named("metal".into()).to_string(), "metal");
    }

    #[test]
    fn device_json_roundtrip() {
        let json = serde_json::to_string(&Device::Cuda(2)).unwrap();
        assert_eq!(json, r#"{"cuda":2}"#);
        let de: Device = serde_json::from_str(&json).unwrap();
        assert_eq!(de, Device::Cuda(2));
        let cpu: Device = serde_json::from_str(r#""cpu""#).unwrap();
        assert_eq!(cpu, Device::Cpu);
    }
}
