use serde::{Deserialize, Serialize};

/// Release-gating state for one external resource definition
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceSignatureState {
    pub name: String,
    pub is_dirty: bool,
    /// Content hash of the last synced definition, empty before the first sync
    #[serde(default)]
    pub signature: String,
}

impl ResourceSignatureState {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            is_dirty: false,
            signature: String::new(),
        }
    }
}
