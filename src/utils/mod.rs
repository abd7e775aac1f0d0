//! Shared utility functions.
//!
//! Currently only JSON extraction from LLM responses, used by both the
//! generation orchestrator and dataset export.

pub mod json_extraction;

pub use json_extraction::{
    extract_json_array, extract_json_value, find_matching_brace, find_matching_bracket,
    strip_code_fences,
};
