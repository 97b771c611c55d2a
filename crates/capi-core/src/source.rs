//! # Source Definitions
//!
//! Static, read-only description of a backend: where it lives, how to log
//! on, how its vocabulary maps onto C-API and the dialect-specific knobs.
//! Also the [`DataBody`] handed to an adapter for one request.

use crate::capability::{CapabilitySet, DataCategory};
use crate::condition::Condition;
use crate::translate::Map;
use serde::{Deserialize, Serialize};

/// A registered adapter implementation.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Plugin {
    pub code: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub url: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ApiKey {
    pub key: String,
    pub header: String,
}

/// OAuth2 token-endpoint request. Which fields matter depends on the grant.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct TokenRequest {
    pub address: String,
    pub client_id: String,
    pub client_secret: Option<String>,
    pub scope: Option<String>,
    pub user_name: Option<String>,
    pub password: Option<String>,
    pub device_code: Option<String>,
    pub code: Option<String>,
    pub redirect_uri: Option<String>,
    pub code_verifier: Option<String>,
}

/// How the hub logs on to a source.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "authenticationType", rename_all = "camelCase")]
pub enum AuthenticationData {
    #[default]
    None,
    ApiKey(ApiKey),
    OAuthPasswordTokenRequest(TokenRequest),
    OAuthClientCredentialsTokenRequest(TokenRequest),
    OAuthDeviceTokenRequest(TokenRequest),
    OAuthAuthorizationTokenRequest(TokenRequest),
}

// =============================================================================
// Dialect sections
// =============================================================================

fn default_page_size() -> usize {
    1000
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DdApiConfigurationSection {
    /// Native filter names the backend accepts, e.g. `locationCode`.
    #[serde(default)]
    pub supported_query_parameters: Vec<String>,
    #[serde(default = "default_page_size")]
    pub page_size: usize,
}

impl Default for DdApiConfigurationSection {
    fn default() -> Self {
        Self {
            supported_query_parameters: Vec::new(),
            page_size: default_page_size(),
        }
    }
}

/// Declares which generic category a backend property carries.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct FieldDefinition {
    pub field_name: String,
    #[serde(default)]
    pub data_category: DataCategory,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DdEcoApiConfigurationSection {
    #[serde(default)]
    pub field_definitions: Vec<FieldDefinition>,
    #[serde(default = "default_page_size")]
    pub page_size: usize,
    /// Ask the backend which (field, operator) pairs it can filter on.
    #[serde(default)]
    pub use_capabilities: bool,
}

impl Default for DdEcoApiConfigurationSection {
    fn default() -> Self {
        Self {
            field_definitions: Vec::new(),
            page_size: default_page_size(),
            use_capabilities: false,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct InputParameterMapEntry {
    pub capi_name: String,
    #[serde(default)]
    pub data_category: DataCategory,
    #[serde(default)]
    pub z_info_name: Vec<String>,
}

/// A list endpoint: which `SPCID` to call and which response keys hold the
/// code and the human-readable name.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct EndPointFieldNameDescriptionName {
    pub end_point: String,
    pub field_name: String,
    pub description_name: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct ZInfoConfigurationSection {
    pub z_info_required_query_parameters: Vec<String>,
    pub start_date_parameter: String,
    pub end_date_parameter: String,
    pub input_parameter_map: Vec<InputParameterMapEntry>,
    pub compartment_request: Option<EndPointFieldNameDescriptionName>,
    pub parameter_request: Option<EndPointFieldNameDescriptionName>,
    pub unit_request: Option<EndPointFieldNameDescriptionName>,
    pub quantity_request: Option<EndPointFieldNameDescriptionName>,
    pub measurement_object_request: Option<EndPointFieldNameDescriptionName>,
    pub measurement_request: Option<String>,
}

impl ZInfoConfigurationSection {
    /// Native parameter names for a generic name, e.g. `ist`, `dps`.
    pub fn native_names(&self, capi_name: &str) -> &[String] {
        self.input_parameter_map
            .iter()
            .find(|e| e.capi_name == capi_name)
            .map(|e| e.z_info_name.as_slice())
            .unwrap_or(&[])
    }
}

// =============================================================================
// SourceDefinition / DataBody
// =============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct SourceDefinition {
    pub name: String,
    pub code: String,
    /// Code of the [`Plugin`] that serves this source.
    pub plugin: String,
    pub url: String,
    pub authentication_data: AuthenticationData,
    pub map_data: Vec<Map>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dd_api_configuration_section: Option<DdApiConfigurationSection>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dd_eco_api_configuration_section: Option<DdEcoApiConfigurationSection>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub z_info_configuration_section: Option<ZInfoConfigurationSection>,
}

impl SourceDefinition {
    pub fn new(code: &str, plugin: &str, url: &str) -> Self {
        Self {
            name: code.to_string(),
            code: code.to_string(),
            plugin: plugin.to_string(),
            url: url.trim_end_matches('/').to_string(),
            ..Default::default()
        }
    }

    /// URL without a trailing slash, ready for path concatenation.
    pub fn base_url(&self) -> &str {
        self.url.trim_end_matches('/')
    }
}

/// Input of one adapter invocation.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct DataBody {
    pub source_definition: SourceDefinition,
    pub conditions: Vec<Condition>,
    pub response_id: String,
    pub connector_capabilities: CapabilitySet,
}

impl DataBody {
    pub fn new(
        source_definition: SourceDefinition,
        conditions: Vec<Condition>,
        response_id: &str,
        connector_capabilities: CapabilitySet,
    ) -> Self {
        Self {
            source_definition,
            conditions,
            response_id: response_id.to_string(),
            connector_capabilities,
        }
    }

    pub fn source_code(&self) -> &str {
        &self.source_definition.code
    }

    pub fn maps(&self) -> &[Map] {
        &self.source_definition.map_data
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_authentication_is_tagged() {
        let raw = r#"{"authenticationType":"apiKey","key":"secret","header":"X-Api-Key"}"#;
        let auth: AuthenticationData = serde_json::from_str(raw).unwrap();
        assert_eq!(
            auth,
            AuthenticationData::ApiKey(ApiKey {
                key: "secret".into(),
                header: "X-Api-Key".into()
            })
        );

        let raw = r#"{"authenticationType":"oAuthClientCredentialsTokenRequest","address":"http://idp/token","clientId":"c"}"#;
        match serde_json::from_str::<AuthenticationData>(raw).unwrap() {
            AuthenticationData::OAuthClientCredentialsTokenRequest(req) => {
                assert_eq!(req.client_id, "c");
                assert!(req.client_secret.is_none());
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_source_definition_defaults() {
        let raw = r#"{
            "code": "DDL",
            "plugin": "ddapi",
            "url": "http://ddl/api/",
            "ddApiConfigurationSection": { "supportedQueryParameters": ["locationCode"] }
        }"#;
        let def: SourceDefinition = serde_json::from_str(raw).unwrap();
        assert_eq!(def.authentication_data, AuthenticationData::None);
        assert_eq!(def.base_url(), "http://ddl/api");
        let section = def.dd_api_configuration_section.unwrap();
        assert_eq!(section.page_size, 1000);
        assert!(def.map_data.is_empty());
    }

    #[test]
    fn test_z_info_native_names() {
        let section = ZInfoConfigurationSection {
            input_parameter_map: vec![InputParameterMapEntry {
                capi_name: "parameter".into(),
                data_category: DataCategory::Parameter,
                z_info_name: vec!["par".into()],
            }],
            ..Default::default()
        };
        assert_eq!(section.native_names("parameter"), ["par".to_string()]);
        assert!(section.native_names("unit").is_empty());
    }
}
