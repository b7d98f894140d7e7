// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Cloud KMS service for encrypting/decrypting Strava credentials.
//!
//! Uses direct KMS encryption with the user id as additional authenticated
//! data, so a ciphertext copied onto another user's document fails to decrypt.

use crate::error::AppError;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};

/// KMS encryption service.
#[derive(Clone)]
pub struct KmsService {
    /// Full resource path to the KMS key
    /// Format: projects/{project}/locations/{location}/keyRings/{ring}/cryptoKeys/{key}
    key_path: String,

    /// GCP KMS client (None in mock mode)
    client: Option<std::sync::Arc<google_cloud_kms::client::Client>>,
}

impl KmsService {
    /// KMS Key Ring Name
    const KEY_RING_NAME: &str = "district-miles";

    /// Connect to GCP KMS.
    pub async fn new(project_id: &str, location: &str, key_name: &str) -> Result<Self, AppError> {
        let key_path = format!(
            "projects/{}/locations/{}/keyRings/{}/cryptoKeys/{}",
            project_id,
            location,
            Self::KEY_RING_NAME,
            key_name
        );

        let config = google_cloud_kms::client::ClientConfig::default()
            .with_auth()
            .await
            .map_err(|e| {
                AppError::Internal(anyhow::anyhow!("Failed to create KMS auth config: {}", e))
            })?;

        let client = google_cloud_kms::client::Client::new(config)
            .await
            .map_err(|e| {
                AppError::Internal(anyhow::anyhow!("Failed to create KMS client: {}", e))
            })?;

        Ok(Self {
            key_path,
            client: Some(std::sync::Arc::new(client)),
        })
    }

    /// Create a mock KMS service for testing (offline mode).
    /// Only available in debug/test builds.
    #[cfg(debug_assertions)]
    pub fn new_mock() -> Self {
        Self {
            key_path: "projects/mock/locations/mock/keyRings/mock/cryptoKeys/mock".to_string(),
            client: None,
        }
    }

    /// Encrypt plaintext bound to `aad`. Returns base64-encoded ciphertext.
    pub async fn encrypt(&self, plaintext: &str, aad: &[u8]) -> Result<String, AppError> {
        use google_cloud_googleapis::cloud::kms::v1::EncryptRequest;

        // Mock mode (Debug builds only): base64 of "aad:plaintext"
        #[cfg(debug_assertions)]
        {
            if self.client.is_none() {
                let mut framed = aad.to_vec();
                framed.push(b':');
                framed.extend_from_slice(plaintext.as_bytes());
                return Ok(BASE64.encode(framed));
            }
        }

        let client = self
            .client
            .as_ref()
            .ok_or_else(|| AppError::Internal(anyhow::anyhow!("KMS client not connected")))?;

        let req = EncryptRequest {
            name: self.key_path.clone(),
            plaintext: plaintext.as_bytes().to_vec(),
            additional_authenticated_data: aad.to_vec(),
            ..Default::default()
        };

        let response = client
            .encrypt(req, None)
            .await
            .map_err(|e| AppError::Internal(anyhow::anyhow!("KMS encrypt failed: {}", e)))?;

        Ok(BASE64.encode(response.ciphertext))
    }

    /// Decrypt base64-encoded ciphertext that was bound to `aad`.
    pub async fn decrypt(&self, ciphertext_b64: &str, aad: &[u8]) -> Result<String, AppError> {
        use google_cloud_googleapis::cloud::kms::v1::DecryptRequest;

        let ciphertext = BASE64.decode(ciphertext_b64).map_err(|e| {
            AppError::Internal(anyhow::anyhow!("Base64 ciphertext decode failed: {}", e))
        })?;

        #[cfg(debug_assertions)]
        {
            if self.client.is_none() {
                let prefix_len = aad.len() + 1;
                if ciphertext.len() < prefix_len
                    || &ciphertext[..aad.len()] != aad
                    || ciphertext[aad.len()] != b':'
                {
                    return Err(AppError::Internal(anyhow::anyhow!(
                        "KMS decrypt failed (mock): AAD mismatch"
                    )));
                }
                return String::from_utf8(ciphertext[prefix_len..].to_vec()).map_err(|e| {
                    AppError::Internal(anyhow::anyhow!("UTF-8 decode failed (mock): {}", e))
                });
            }
        }

        let client = self
            .client
            .as_ref()
            .ok_or_else(|| AppError::Internal(anyhow::anyhow!("KMS client not connected")))?;

        let req = DecryptRequest {
            name: self.key_path.clone(),
            ciphertext,
            additional_authenticated_data: aad.to_vec(),
            ..Default::default()
        };

        let response = client
            .decrypt(req, None)
            .await
            .map_err(|e| AppError::Internal(anyhow::anyhow!("KMS decrypt failed: {}", e)))?;

        String::from_utf8(response.plaintext)
            .map_err(|e| AppError::Internal(anyhow::anyhow!("UTF-8 decode failed: {}", e)))
    }
}

/// Encrypt an access/refresh pair for one user.
pub async fn encrypt_tokens(
    kms: &KmsService,
    access_token: &str,
    refresh_token: &str,
    user_id: &str,
) -> Result<(String, String), AppError> {
    let aad = user_id.as_bytes();
    let encrypted_access = kms.encrypt(access_token, aad).await?;
    let encrypted_refresh = kms.encrypt(refresh_token, aad).await?;
    Ok((encrypted_access, encrypted_refresh))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_round_trip_with_matching_aad() {
        let kms = KmsService::new_mock();
        let ciphertext = kms.encrypt("secret-token", b"user-1").await.unwrap();
        assert_ne!(ciphertext, "secret-token");
        assert_eq!(
            kms.decrypt(&ciphertext, b"user-1").await.unwrap(),
            "secret-token"
        );
    }

    #[tokio::test]
    async fn test_mock_rejects_other_users_aad() {
        let kms = KmsService::new_mock();
        let ciphertext = kms.encrypt("secret-token", b"user-1").await.unwrap();
        assert!(kms.decrypt(&ciphertext, b"user-2").await.is_err());
    }
}
