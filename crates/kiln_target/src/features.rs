//! CPU model and feature sets, and their LLVM back-end encodings.

use crate::triple::Arch;
use serde::{Deserialize, Serialize};

/// A single CPU feature and whether it is enabled for the build.
///
/// Features without an LLVM name exist only on the Kiln side (for example
/// pseudo-features the standard library keys off) and are skipped when
/// talking to the back-end.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CpuFeature {
    /// The Kiln-side feature name.
    pub name: String,
    /// The LLVM spelling, if the back-end knows this feature.
    pub llvm_name: Option<String>,
    /// Whether the feature is enabled for this compilation.
    pub enabled: bool,
}

impl CpuFeature {
    /// Convenience constructor for a feature the back-end knows.
    pub fn llvm(name: &str, enabled: bool) -> Self {
        Self {
            name: name.to_string(),
            llvm_name: Some(name.to_string()),
            enabled,
        }
    }
}

/// The CPU model a compilation targets.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CpuModel {
    /// The Kiln-side model name (e.g. `baseline`, `skylake`).
    pub name: String,
    /// The LLVM model name, if the model maps onto one.
    pub llvm_name: Option<String>,
}

impl CpuModel {
    /// The baseline model for an architecture.
    pub fn baseline(arch: Arch) -> Self {
        Self {
            name: "baseline".to_string(),
            llvm_name: Some(arch.baseline_llvm_cpu().to_string()),
        }
    }
}

/// The resolved CPU feature set for a compilation.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CpuFeatures {
    features: Vec<CpuFeature>,
}

impl CpuFeatures {
    /// Creates an empty feature set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a feature set from a list of features.
    pub fn from_features(features: Vec<CpuFeature>) -> Self {
        Self { features }
    }

    /// Returns the features in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = &CpuFeature> {
        self.features.iter()
    }

    /// True if a feature with the given Kiln-side name is enabled.
    pub fn is_enabled(&self, name: &str) -> bool {
        self.features.iter().any(|f| f.name == name && f.enabled)
    }

    /// Builds the feature string the LLVM C API expects.
    ///
    /// Each feature with an LLVM name is emitted as `+name` or `-name`,
    /// comma separated. The buffer is NUL terminated: it is handed to the
    /// back-end as a C string.
    pub fn llvm_feature_string(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        for feature in &self.features {
            let Some(llvm_name) = &feature.llvm_name else {
                continue;
            };
            if !buf.is_empty() {
                buf.push(b',');
            }
            buf.push(if feature.enabled { b'+' } else { b'-' });
            buf.extend_from_slice(llvm_name.as_bytes());
        }
        buf.push(0);
        buf
    }
}
