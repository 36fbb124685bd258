// ABOUTME: Type-tag registry mapping a saved tool's "type" field back to a constructor
// ABOUTME: Mirrors the original's BACKEND_REGISTRY/ALL_TOOLS lookup used by M3.load
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.

use std::collections::HashMap;

use serde_json::Value;

use crate::errors::{M3Error, M3Result};

use super::mimic::MimicTool;
use super::traits::Tool;

/// A constructor restoring a tool from its serialized `params` object.
pub type ToolFactory = fn(&Value) -> M3Result<Box<dyn Tool>>;

/// Registry used by [`crate::pipeline::Pipeline::load`] to reconstruct
/// tools from a saved pipeline's `{"type": ..., "params": ...}` entries.
pub struct ToolRegistry {
    factories: HashMap<&'static str, ToolFactory>,
}

impl Default for ToolRegistry {
    fn default() -> Self {
        let mut registry = Self {
            factories: HashMap::new(),
        };
        registry.register(MimicTool::TYPE_TAG, MimicTool::from_params);
        registry
    }
}

impl ToolRegistry {
    /// Register a type tag -> factory mapping.
    pub fn register(&mut self, type_tag: &'static str, factory: ToolFactory) {
        self.factories.insert(type_tag, factory);
    }

    /// Build a tool instance from its saved `type`/`params` pair.
    ///
    /// # Errors
    ///
    /// Returns `M3Error::Validation` if `type_tag` isn't registered, or
    /// whatever error the factory returns while parsing `params`.
    pub fn build(&self, type_tag: &str, params: &Value) -> M3Result<Box<dyn Tool>> {
        let factory = self.factories.get(type_tag).ok_or_else(|| {
            M3Error::Validation(format!(
                "unknown tool type '{type_tag}'; registered types: {}",
                self.factories.keys().copied().collect::<Vec<_>>().join(", ")
            ))
        })?;
        factory(params)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_type_tag_errors_with_suggestion() {
        let registry = ToolRegistry::default();
        let err = registry.build("not-a-tool", &Value::Null).unwrap_err();
        assert!(matches!(err, M3Error::Validation(_)));
    }

    #[test]
    fn mimic_type_tag_is_registered() {
        let registry = ToolRegistry::default();
        assert!(registry.factories.contains_key(MimicTool::TYPE_TAG));
    }
}
