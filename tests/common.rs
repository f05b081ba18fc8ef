//! Common test utilities and helpers
#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::Arc;
use swagent_openapi::ApiContract;

/// Path of the shared contract fixture.
pub fn fixture_path() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/openapi.yaml")
}

/// Path of the Swagger 2.0 variant of the fixture.
pub fn swagger2_fixture_path() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/swagger2.yaml")
}

/// Load the shared contract fixture.
pub fn load_fixture() -> Arc<ApiContract> {
    Arc::new(ApiContract::from_file(fixture_path()).expect("fixture contract should load"))
}
