use bytes::Bytes;

pub const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

/// An upload as received from a client, before it becomes a `FileRecord`.
pub struct NewUpload {
    pub data: Bytes,
    pub display_name: String,
    pub original_name: String,
    pub content_type: String,
    pub owner_id: String,
}

impl NewUpload {
    pub fn size_mb(&self) -> f64 {
        self.data.len() as f64 / BYTES_PER_MB
    }
}
