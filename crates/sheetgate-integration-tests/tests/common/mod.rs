//! Common test utilities for sheetgate integration tests
//!
//! This module provides:
//! - A service-account key file pointing at a mock token endpoint
//! - Mock token endpoint and API mounting helpers
//! - A client configuration wired to the mock server

use sheetgate_core::GateConfig;
use std::io::Write;
use tempfile::NamedTempFile;
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const TEST_PRIVATE_KEY_PEM: &str =
    include_str!("../../../sheetgate-core/testdata/service_account_key.pem");

#[allow(dead_code)]
pub const TEST_ACCESS_TOKEN: &str = "ya29.integration-token";

#[allow(dead_code)]
pub const TEST_CLIENT_EMAIL: &str = "robot@sheetgate-test.iam.gserviceaccount.com";

// ============================================================================
// Fixtures
// ============================================================================

/// Write a service-account key file whose token endpoint is the mock server.
#[allow(dead_code)]
pub fn write_key_file(server: &MockServer) -> NamedTempFile {
    let key = serde_json::json!({
        "type": "service_account",
        "project_id": "sheetgate-test",
        "private_key_id": "integration-key",
        "private_key": TEST_PRIVATE_KEY_PEM,
        "client_email": TEST_CLIENT_EMAIL,
        "token_uri": format!("{}/token", server.uri()),
    });

    let mut file = NamedTempFile::new().expect("Failed to create key file");
    file.write_all(key.to_string().as_bytes())
        .expect("Failed to write key file");
    file
}

/// Configuration pointing every remote endpoint at the mock server, with no
/// retry delay and a short inter-item pause.
#[allow(dead_code)]
pub fn test_config(server: &MockServer, key_file: &NamedTempFile) -> GateConfig {
    let mut config = GateConfig::default();
    config.credentials_path = key_file.path().to_path_buf();
    config.remote.api_base_url = format!("{}/v4", server.uri());
    config.retry.max_attempts = 3;
    config.retry.delay_seconds = 0;
    config.queue.inter_item_delay_ms = 10;
    config.remote.request_timeout_seconds = 5;
    config
}

// ============================================================================
// Mock Endpoints
// ============================================================================

/// Mount a token endpoint that must be called exactly `expected_calls` times.
#[allow(dead_code)]
pub async fn mount_token_endpoint(server: &MockServer, expected_calls: u64) {
    Mock::given(method("POST"))
        .and(path("/token"))
        .and(body_string_contains("grant_type=urn"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "access_token": TEST_ACCESS_TOKEN,
            "expires_in": 3599,
            "token_type": "Bearer"
        })))
        .expect(expected_calls)
        .mount(server)
        .await;
}

/// Mount a values endpoint for `range` answering with a single-cell body.
#[allow(dead_code)]
pub async fn mount_values(server: &MockServer, range: &str, value: &str) {
    Mock::given(method("GET"))
        .and(path(format!("/v4/spreadsheets/test-sheet/values/{}", range)))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "range": range,
            "values": [[value]]
        })))
        .mount(server)
        .await;
}

/// Extract the single cell of a values response.
#[allow(dead_code)]
pub fn first_cell(body: &serde_json::Value) -> String {
    body["values"][0][0]
        .as_str()
        .expect("Response should contain a cell")
        .to_string()
}
