//! High-level scene asset operations.

use std::path::Path;

use roar_models::{ExpressionFrame, SceneId};

use crate::client::BlobClient;
use crate::error::StorageResult;

/// Blob key of a scene's audience recording.
pub fn scene_audience_key(scene_id: &SceneId) -> String {
    format!("scenes/{}/audience.mp4", scene_id)
}

/// Blob key of a scene's expression measurement results.
pub fn scene_results_key(scene_id: &SceneId) -> String {
    format!("scenes/{}/results.json", scene_id)
}

impl BlobClient {
    /// Download a scene's audience recording to a local path.
    pub async fn download_audience(
        &self,
        scene_id: &SceneId,
        path: impl AsRef<Path>,
    ) -> StorageResult<String> {
        let key = scene_audience_key(scene_id);
        self.download_file(&key, path).await?;
        Ok(key)
    }

    /// Upload a scene's results file. Returns the blob key written.
    pub async fn upload_results(
        &self,
        scene_id: &SceneId,
        path: impl AsRef<Path>,
    ) -> StorageResult<String> {
        let key = scene_results_key(scene_id);
        self.upload_file(path, &key, "application/json").await?;
        Ok(key)
    }

    /// Load a scene's results back as rows.
    pub async fn load_results(&self, scene_id: &SceneId) -> StorageResult<Vec<ExpressionFrame>> {
        let key = scene_results_key(scene_id);
        let bytes = self.download_bytes(&key).await?;
        let frames: Vec<ExpressionFrame> = serde_json::from_slice(&bytes)?;
        Ok(frames)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scene_keys() {
        let scene = SceneId::from_string("scene-42");
        assert_eq!(scene_audience_key(&scene), "scenes/scene-42/audience.mp4");
        assert_eq!(scene_results_key(&scene), "scenes/scene-42/results.json");
    }
}
