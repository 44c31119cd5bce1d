use crate::error::PortalResult;
use crate::models::FileRecord;
use chrono::Utc;
use rand::Rng;
use tracing::{error, info};

use super::{FileStore, NewUpload};

const ID_SUFFIX_LEN: usize = 9;
const BASE36: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// `<unix millis>_<9 random base36 chars>`
pub fn generate_file_id() -> String {
    let mut rng = rand::thread_rng();
    let suffix: String = (0..ID_SUFFIX_LEN)
        .map(|_| BASE36[rng.gen_range(0..BASE36.len())] as char)
        .collect();
    format!("{}_{}", Utc::now().timestamp_millis(), suffix)
}

impl FileStore {
    /// Writes the bytes, then appends the metadata. If the metadata write fails
    /// the bytes are removed again so no blob is left without a record.
    pub async fn upload(&self, upload: NewUpload) -> PortalResult<FileRecord> {
        let id = generate_file_id();
        let size_mb = upload.size_mb();

        self.blobs
            .put(&id, &upload.content_type, upload.data)
            .await?;

        let record = FileRecord {
            file_name: format!("{}_{}", id, upload.original_name),
            display_name: upload.display_name,
            file_size_mb: size_mb,
            uploaded_at: Utc::now(),
            user_id: upload.owner_id,
            file_url: format!("stored:{id}"),
            file_type: upload.content_type,
            original_name: upload.original_name,
            id,
        };

        let appended = record.clone();
        if let Err(e) = self.records.modify(move |records| {
            records.push(appended);
            Ok::<_, anyhow::Error>(())
        }) {
            error!("Failed to record metadata for {}: {:#}", record.id, e);
            if let Err(e) = self.blobs.delete(&record.id).await {
                error!("Failed to remove blob {} after failed upload: {:#}", record.id, e);
            }
            return Err(e.into());
        }

        info!(
            "📤 Stored {} ({:.2} MB) for owner {}",
            record.file_name, record.file_size_mb, record.user_id
        );
        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_id_shape() {
        let id = generate_file_id();
        let (millis, suffix) = id.split_once('_').unwrap();
        assert!(millis.parse::<i64>().is_ok());
        assert_eq!(suffix.len(), ID_SUFFIX_LEN);
        assert!(suffix.bytes().all(|b| BASE36.contains(&b)));
    }

    #[test]
    fn test_file_ids_differ() {
        assert_ne!(generate_file_id(), generate_file_id());
    }
}
