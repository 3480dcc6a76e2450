// Cloud Servers Trait
//
// Abstracts the provider API the provisioning command talks to.

use async_trait::async_trait;
use anyhow::Result;
use serde::{Deserialize, Serialize};

/// Status a server reports once it can be used
pub const STATUS_ACTIVE: &str = "ACTIVE";

/// Status a server reports when the build has failed for good
pub const STATUS_ERROR: &str = "ERROR";

/// Request to create a new server
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServerRequest {
    pub name: String,
    #[serde(rename = "imageId")]
    pub image_id: u32,
    #[serde(rename = "flavorId")]
    pub flavor_id: u32,
}

/// Public and private address lists of a server
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Addresses {
    #[serde(default)]
    pub public: Vec<String>,
    #[serde(default)]
    pub private: Vec<String>,
}

/// A server as reported by the provider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Server {
    pub id: u64,
    pub name: String,
    #[serde(rename = "flavorId")]
    pub flavor_id: u32,
    #[serde(rename = "imageId")]
    pub image_id: u32,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub progress: u32,
    #[serde(rename = "hostId", default)]
    pub host_id: Option<String>,
    #[serde(default)]
    pub addresses: Addresses,
    // Only present in the create response
    #[serde(rename = "adminPass", default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
}

impl Server {
    pub fn is_ready(&self) -> bool {
        self.status == STATUS_ACTIVE
    }

    pub fn is_failed(&self) -> bool {
        self.status == STATUS_ERROR
    }

    /// First public address, the one bootstrap connects to
    pub fn public_ip(&self) -> Option<&str> {
        self.addresses.public.first().map(String::as_str)
    }
}

#[async_trait]
pub trait CloudServers: Send + Sync {
    /// Create a new server
    async fn create_server(&self, request: &ServerRequest) -> Result<Server>;

    /// Fetch the current state of a server
    async fn get_server(&self, id: u64) -> Result<Server>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_server_from_create_response() {
        let body = r#"{
            "id": 1234,
            "name": "web-1",
            "imageId": 49,
            "flavorId": 1,
            "hostId": "e4d909c290d0fb1ca068ffaddf22cbd0",
            "progress": 0,
            "status": "BUILD",
            "adminPass": "webT0ps3cret",
            "metadata": {},
            "addresses": {
                "public": ["67.23.10.132", "67.23.10.131"],
                "private": ["10.176.42.16"]
            }
        }"#;

        let server: Server = serde_json::from_str(body).unwrap();
        assert_eq!(server.id, 1234);
        assert_eq!(server.password.as_deref(), Some("webT0ps3cret"));
        assert_eq!(server.public_ip(), Some("67.23.10.132"));
        assert_eq!(server.addresses.private, vec!["10.176.42.16"]);
        assert!(!server.is_ready());
    }

    #[test]
    fn test_server_without_addresses() {
        let body = r#"{"id": 1, "name": "x", "imageId": 49, "flavorId": 1, "status": "ACTIVE"}"#;

        let server: Server = serde_json::from_str(body).unwrap();
        assert!(server.is_ready());
        assert_eq!(server.public_ip(), None);
        assert_eq!(server.password, None);
    }

    #[test]
    fn test_request_uses_provider_field_names() {
        let request = ServerRequest {
            name: "my-server".to_string(),
            image_id: 49,
            flavor_id: 1,
        };

        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json, serde_json::json!({"name": "my-server", "imageId": 49, "flavorId": 1}));
    }
}
