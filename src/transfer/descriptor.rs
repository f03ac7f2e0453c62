use serde::{Deserialize, Serialize};

/// Immutable description of what to download.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferDescriptor {
    url: String,
    filename: String,
    display_name: String,
    size: i64,
}

impl TransferDescriptor {
    /// Creates a descriptor. A `size` of 0 or less means unknown.
    pub fn new(
        url: impl Into<String>,
        filename: impl Into<String>,
        display_name: impl Into<String>,
        size: i64,
    ) -> Self {
        Self {
            url: url.into(),
            filename: filename.into(),
            display_name: display_name.into(),
            size,
        }
    }

    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    #[must_use]
    pub fn filename(&self) -> &str {
        &self.filename
    }

    #[must_use]
    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    #[must_use]
    pub fn size(&self) -> i64 {
        self.size
    }
}
