use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Store is closed")]
    Closed,

    #[error("Storage I/O error on {name}: {source}")]
    Io {
        name: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to decode {name}: {source}")]
    Decode {
        name: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to encode {name}: {source}")]
    Encode {
        name: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Storage backend failure: {0}")]
    Backend(String),
}

impl StoreError {
    pub(crate) fn io(name: &str, source: std::io::Error) -> Self {
        StoreError::Io {
            name: name.to_string(),
            source,
        }
    }
}
