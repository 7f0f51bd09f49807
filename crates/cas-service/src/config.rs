use serde::{Deserialize, Serialize};

/// Tuning for streamed service responses.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Largest `data` payload in one read chunk, in bytes.
    pub read_chunk_size: usize,
    /// Most blob records per list batch.
    pub list_batch_size: usize,
    /// Items a response stream buffers ahead of its consumer.
    pub stream_buffer: usize,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            read_chunk_size: 1024 * 1024,
            list_batch_size: 100,
            stream_buffer: 16,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_config_fills_defaults() {
        let c: ServiceConfig = serde_json::from_str(r#"{"read_chunk_size": 4}"#).unwrap();
        assert_eq!(c.read_chunk_size, 4);
        assert_eq!(c.list_batch_size, 100);
        assert_eq!(c.stream_buffer, 16);
    }
}
