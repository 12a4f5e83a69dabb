use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct SearchParams {
    #[schemars(description = "Natural language search query")]
    pub query: String,

    #[schemars(description = "Maximum number of results to return (default 5)")]
    pub limit: Option<i64>,
}
