use serde::{Deserialize, Serialize};

use crate::error::Result;

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct FhirRecordsConfig {
    pub compiler: CompilerConfig,
    pub model: ModelConfig,
}

/// Controls which raw StructureDefinitions survive compilation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct CompilerConfig {
    pub accepted_statuses: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct ModelConfig {
    pub backbone_rule: BackboneRule,
}

/// Which type codes declare an inline nested structure.
///
/// Schema revisions disagree on whether `Element` typed elements (e.g.
/// `Timing.repeat` in R4) are nested structures. Treating both codes as
/// backbone is the default.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum BackboneRule {
    #[default]
    #[serde(rename = "backbone-and-element")]
    BackboneAndElement,
    #[serde(rename = "backbone-element-only")]
    BackboneElementOnly,
}

impl Default for CompilerConfig {
    fn default() -> Self {
        Self {
            accepted_statuses: vec!["active".to_string(), "draft".to_string()],
        }
    }
}

impl CompilerConfig {
    pub fn accepts_status(&self, status: Option<&str>) -> bool {
        status.is_some_and(|status| self.accepted_statuses.iter().any(|s| s == status))
    }

    pub fn with_accepted_statuses<I, S>(mut self, statuses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.accepted_statuses = statuses.into_iter().map(Into::into).collect();
        self
    }
}

impl BackboneRule {
    pub fn is_backbone(&self, code: &str) -> bool {
        match self {
            BackboneRule::BackboneAndElement => code == "BackboneElement" || code == "Element",
            BackboneRule::BackboneElementOnly => code == "BackboneElement",
        }
    }
}

impl FhirRecordsConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn with_compiler_config(mut self, compiler: CompilerConfig) -> Self {
        self.compiler = compiler;
        self
    }

    pub fn with_backbone_rule(mut self, rule: BackboneRule) -> Self {
        self.model.backbone_rule = rule;
        self
    }
}
