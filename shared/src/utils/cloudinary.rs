use reqwest::multipart;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::env;

#[derive(Debug, Clone, Copy)]
pub enum ResourceType {
    Image,
    Raw,
}

impl ResourceType {
    fn as_str(&self) -> &str {
        match self {
            ResourceType::Image => "image",
            ResourceType::Raw => "raw",
        }
    }

    // Pilih resource type berdasarkan MIME type file
    pub fn from_content_type(content_type: &str) -> Self {
        if content_type.starts_with("image/") {
            ResourceType::Image
        } else {
            ResourceType::Raw
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UploadResponse {
    pub secure_url: String,
    pub public_id: String,
    pub format: String,
    pub resource_type: String,
    pub bytes: i64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DeleteResponse {
    pub result: String,
}

pub struct CloudinaryClient {
    cloud_name: String,
    api_key: String,
    api_secret: String,
}

impl CloudinaryClient {
    // Buat client dari environment variables
    pub fn new() -> Result<Self, Box<dyn std::error::Error>> {
        let cloud_name = env::var("CLOUDINARY_CLOUD_NAME")?;
        let api_key = env::var("CLOUDINARY_API_KEY")?;
        let api_secret = env::var("CLOUDINARY_API_SECRET")?;

        Ok(Self {
            cloud_name,
            api_key,
            api_secret,
        })
    }

    // Upload file ke Cloudinary
    pub async fn upload(
        &self,
        bytes: Vec<u8>,
        resource_type: ResourceType,
        folder: &str,
        filename: Option<String>,
    ) -> Result<UploadResponse, Box<dyn std::error::Error>> {
        let url = self.build_upload_url(resource_type);
        let file_id = filename.unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

        let form = multipart::Form::new()
            .text("api_key", self.api_key.clone())
            .text("folder", folder.to_string())
            .text("public_id", file_id)
            .part("file", multipart::Part::bytes(bytes).file_name("upload"));

        let response = reqwest::Client::new()
            .post(&url)
            .multipart(form)
            .send()
            .await?;

        if !response.status().is_success() {
            let err = response.text().await?;
            return Err(format!("Upload failed: {}", err).into());
        }

        Ok(response.json().await?)
    }

    // Upload refund receipt (image atau PDF) ke folder receipts
    pub async fn upload_receipt(
        &self,
        bytes: Vec<u8>,
        content_type: &str,
        filename: Option<String>,
    ) -> Result<UploadResponse, Box<dyn std::error::Error>> {
        let resource_type = ResourceType::from_content_type(content_type);
        self.upload(bytes, resource_type, "refunds/receipts", filename)
            .await
    }

    // Hapus file dari Cloudinary
    pub async fn delete(
        &self,
        public_id: &str,
        resource_type: ResourceType,
    ) -> Result<DeleteResponse, Box<dyn std::error::Error>> {
        let url = self.build_delete_url(resource_type);
        let timestamp = chrono::Utc::now().timestamp();
        let signature = self.generate_signature(public_id, timestamp);

        let form = multipart::Form::new()
            .text("api_key", self.api_key.clone())
            .text("public_id", public_id.to_string())
            .text("timestamp", timestamp.to_string())
            .text("signature", signature);

        let response = reqwest::Client::new()
            .post(&url)
            .multipart(form)
            .send()
            .await?;

        if !response.status().is_success() {
            let err = response.text().await?;
            return Err(format!("Delete failed: {}", err).into());
        }

        Ok(response.json().await?)
    }

    // Extract public_id dari Cloudinary URL
    pub fn extract_public_id(url: &str) -> Option<String> {
        if !url.contains("cloudinary.com") {
            return None;
        }

        let parts: Vec<&str> = url.split("/upload/").collect();
        if parts.len() != 2 {
            return None;
        }

        let after_upload = parts[1];
        let without_version = if after_upload.starts_with('v') {
            after_upload.split('/').skip(1).collect::<Vec<_>>().join("/")
        } else {
            after_upload.to_string()
        };

        without_version
            .rfind('.')
            .map(|idx| without_version[..idx].to_string())
    }

    // Build upload URL berdasarkan resource type
    fn build_upload_url(&self, resource_type: ResourceType) -> String {
        format!(
            "https://api.cloudinary.com/v1_1/{}/{}/upload",
            self.cloud_name,
            resource_type.as_str()
        )
    }

    // Build delete URL berdasarkan resource type
    fn build_delete_url(&self, resource_type: ResourceType) -> String {
        format!(
            "https://api.cloudinary.com/v1_1/{}/{}/destroy",
            self.cloud_name,
            resource_type.as_str()
        )
    }

    // Generate signature untuk authenticated requests
    fn generate_signature(&self, public_id: &str, timestamp: i64) -> String {
        let data = format!("public_id={}&timestamp={}{}", public_id, timestamp, self.api_secret);
        let mut hasher = Sha256::new();
        hasher.update(data.as_bytes());
        format!("{:x}", hasher.finalize())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_public_id() {
        let url = "https://res.cloudinary.com/test/raw/upload/v123/refunds/receipts/refund-7.pdf";
        assert_eq!(
            CloudinaryClient::extract_public_id(url),
            Some("refunds/receipts/refund-7".to_string())
        );

        let url2 = "https://res.cloudinary.com/test/image/upload/refunds/receipts/refund-8.png";
        assert_eq!(
            CloudinaryClient::extract_public_id(url2),
            Some("refunds/receipts/refund-8".to_string())
        );
    }

    #[test]
    fn test_resource_type_from_content_type() {
        assert!(matches!(
            ResourceType::from_content_type("image/png"),
            ResourceType::Image
        ));
        assert!(matches!(
            ResourceType::from_content_type("application/pdf"),
            ResourceType::Raw
        ));
    }
}
