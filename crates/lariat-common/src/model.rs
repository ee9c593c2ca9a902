use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Service version used when the caller does not pin one.
pub const DEFAULT_SERVICE_VERSION: &str = "1.0";

/// Identity and address of one live service instance.
///
/// Providers create one of these at startup and register it; consumers get
/// them back from discovery. Two derived keys matter:
///
/// - `service_key` (`name:version`) identifies the logical service and is
///   what consumers look up
/// - `service_node_key` (`name:version/host:port`) identifies this exact
///   instance and is what the registry stores under
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceMetaInfo {
    pub service_name: String,
    pub service_version: String,
    pub service_host: String,
    pub service_port: u16,
}

impl ServiceMetaInfo {
    pub fn new(
        name: impl Into<String>,
        version: impl Into<String>,
        host: impl Into<String>,
        port: u16,
    ) -> Self {
        Self {
            service_name: name.into(),
            service_version: version.into(),
            service_host: host.into(),
            service_port: port,
        }
    }

    /// Logical service identity, independent of the serving instance.
    pub fn service_key(&self) -> String {
        format!("{}:{}", self.service_name, self.service_version)
    }

    /// Identity of this exact instance, used as the registry storage key.
    pub fn service_node_key(&self) -> String {
        format!(
            "{}/{}:{}",
            self.service_key(),
            self.service_host,
            self.service_port
        )
    }

    /// `host:port` form accepted by the TCP transport.
    pub fn service_address(&self) -> String {
        format!("{}:{}", self.service_host, self.service_port)
    }
}

/// One remote invocation. Built once per call and immutable afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcRequest {
    pub service_name: String,
    pub method_name: String,
    /// Type descriptors for the parameters, positionally matched.
    pub parameter_types: Vec<String>,
    pub parameters: Vec<Value>,
    pub service_version: String,
}

impl RpcRequest {
    pub fn new(service_name: impl Into<String>, method_name: impl Into<String>) -> Self {
        Self {
            service_name: service_name.into(),
            method_name: method_name.into(),
            parameter_types: Vec::new(),
            parameters: Vec::new(),
            service_version: DEFAULT_SERVICE_VERSION.to_string(),
        }
    }

    pub fn with_parameters(mut self, types: Vec<String>, values: Vec<Value>) -> Self {
        self.parameter_types = types;
        self.parameters = values;
        self
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.service_version = version.into();
        self
    }

    /// The logical service this request targets.
    pub fn service_key(&self) -> String {
        format!("{}:{}", self.service_name, self.service_version)
    }
}

/// Outcome of one remote invocation, produced by the serving side.
///
/// `exception` set means the remote method (or its dispatch) failed; the
/// caller must surface that rather than treat it as a transport problem.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RpcResponse {
    pub result: Option<Value>,
    pub exception: Option<String>,
    pub result_type: Option<String>,
    pub message: String,
}

impl RpcResponse {
    pub fn success(result: Value) -> Self {
        let result_type = json_type_name(&result).to_string();
        Self {
            result: Some(result),
            exception: None,
            result_type: Some(result_type),
            message: "ok".to_string(),
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        let message = message.into();
        Self {
            result: None,
            exception: Some(message.clone()),
            result_type: None,
            message,
        }
    }

    pub fn is_success(&self) -> bool {
        self.exception.is_none()
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
