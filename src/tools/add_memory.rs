use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::memory::types::Metadata;

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct AddMemoryParams {
    #[schemars(description = "The content of the memory")]
    pub content: String,

    #[schemars(description = "Optional JSON object of additional fields stored with the memory")]
    pub metadata: Option<Metadata>,
}
