//! Block state and model resolution.
//!
//! This module handles resolving block states to concrete model variants
//! and resolving model inheritance chains.

pub mod model_resolver;
pub mod state_resolver;

pub use model_resolver::ModelMerger;
pub use state_resolver::{parse_variant_key, variant_key_matches, StateDefaults, StateResolver, VariantSelector};

pub use crate::resource_pack::model::resolve_texture_chain;
