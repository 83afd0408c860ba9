pub mod get_student_info;
pub mod get_student_list;
pub mod health;

use serde::de::DeserializeOwned;

use crate::config::{SERVER_NAME, SERVER_VERSION};
use crate::protocol::{
    GetStudentInfoParams, GetStudentListParams, InitializeParams, JsonRpcError, JsonRpcRequest,
    JsonRpcResponse, ToolCallParams, ToolResult,
};
use crate::roster::Roster;
use crate::schema::{CompiledSchema, SchemaValidationError};

/// Protocol revisions this server can speak, newest first.
pub const SUPPORTED_PROTOCOL_VERSIONS: &[&str] = &["2025-03-26", "2024-11-05"];

/// Dispatch a JSON-RPC request to the appropriate handler.
///
/// Returns `None` for notifications (no response required).
pub async fn dispatch(req: &JsonRpcRequest, roster: &Roster) -> Option<JsonRpcResponse> {
    if req.is_notification() {
        tracing::debug!(method = %req.method, "Notification received");
        return None;
    }

    match req.method.as_str() {
        "initialize" => {
            let requested = req
                .params
                .clone()
                .and_then(|v| serde_json::from_value::<InitializeParams>(v).ok())
                .and_then(|p| {
                    if let Some(client) = &p.client_info {
                        tracing::info!(
                            client = client.name.as_deref().unwrap_or("unknown"),
                            version = client.version.as_deref().unwrap_or("unknown"),
                            "Client initializing"
                        );
                    }
                    p.protocol_version
                });
            let result = serde_json::json!({
                "protocolVersion": negotiate_protocol_version(requested.as_deref()),
                "capabilities": {
                    "tools": { "listChanged": false }
                },
                "serverInfo": {
                    "name": SERVER_NAME,
                    "version": SERVER_VERSION
                }
            });
            Some(JsonRpcResponse::success(req.id.clone(), result))
        }

        "ping" => Some(JsonRpcResponse::success(req.id.clone(), serde_json::json!({}))),

        "tools/list" => Some(JsonRpcResponse::success(req.id.clone(), tool_definitions())),

        "tools/call" => {
            let params: ToolCallParams = match &req.params {
                Some(v) => match serde_json::from_value(v.clone()) {
                    Ok(p) => p,
                    Err(e) => {
                        return Some(JsonRpcResponse::error(
                            req.id.clone(),
                            JsonRpcError::invalid_params(format!(
                                "Invalid tools/call params: {e}"
                            )),
                        ));
                    }
                },
                None => {
                    return Some(JsonRpcResponse::error(
                        req.id.clone(),
                        JsonRpcError::invalid_params("Missing params for tools/call"),
                    ));
                }
            };

            match dispatch_tool_call(&params, roster).await {
                Ok(tool_result) => match serde_json::to_value(&tool_result) {
                    Ok(result_json) => Some(JsonRpcResponse::success(req.id.clone(), result_json)),
                    Err(e) => {
                        tracing::error!(error = %e, "Tool result serialization failed");
                        Some(JsonRpcResponse::error(
                            req.id.clone(),
                            JsonRpcError::internal_error("Internal error"),
                        ))
                    }
                },
                Err(err) => Some(JsonRpcResponse::error(req.id.clone(), err)),
            }
        }

        _ => Some(JsonRpcResponse::error(
            req.id.clone(),
            JsonRpcError::method_not_found(&req.method),
        )),
    }
}

/// The `tools/list` result payload.
pub fn tool_definitions() -> serde_json::Value {
    serde_json::json!({
        "tools": [
            get_student_list::definition(),
            get_student_info::definition(),
        ]
    })
}

/// Pick the client's protocol revision when we support it, else our newest.
pub fn negotiate_protocol_version(requested: Option<&str>) -> &'static str {
    requested
        .and_then(|r| SUPPORTED_PROTOCOL_VERSIONS.iter().find(|v| **v == r).copied())
        .unwrap_or(SUPPORTED_PROTOCOL_VERSIONS[0])
}

/// Route a `tools/call` to its handler.
///
/// Argument problems and unknown tools are protocol errors and never reach
/// the query layer. Lookup misses come back as an `isError` tool result.
async fn dispatch_tool_call(
    params: &ToolCallParams,
    roster: &Roster,
) -> Result<ToolResult, JsonRpcError> {
    tracing::debug!(tool = %params.name, "Tool call");

    match params.name.as_str() {
        get_student_list::NAME => {
            let args: GetStudentListParams = parse_arguments(
                get_student_list::NAME,
                get_student_list::input_schema(),
                params.arguments.as_ref(),
            )?;
            Ok(get_student_list::handle(args, roster).await)
        }

        get_student_info::NAME => {
            let args: GetStudentInfoParams = parse_arguments(
                get_student_info::NAME,
                get_student_info::input_schema(),
                params.arguments.as_ref(),
            )?;
            Ok(get_student_info::handle(args, roster).await)
        }

        _ => Err(JsonRpcError::invalid_params(format!("Unknown tool: {}", params.name))),
    }
}

/// Validate tool arguments against the tool's compiled `inputSchema`, then bind them
/// to the typed argument struct. Absent arguments are treated as `{}`.
fn parse_arguments<T: DeserializeOwned>(
    tool: &str,
    schema: Result<&CompiledSchema, &SchemaValidationError>,
    arguments: Option<&serde_json::Value>,
) -> Result<T, JsonRpcError> {
    let empty = serde_json::json!({});
    let arguments = arguments.unwrap_or(&empty);

    let schema = schema.map_err(|e| {
        tracing::error!(tool, error = %e, "Tool schema unusable");
        JsonRpcError::internal_error("Internal error")
    })?;

    match schema.validate(arguments) {
        Ok(()) => {}
        Err(SchemaValidationError::ValidationFailed(errors)) => {
            tracing::warn!(tool, ?errors, "Rejected tool arguments");
            return Err(JsonRpcError::invalid_params_with(
                format!("Invalid arguments for {tool}"),
                errors,
            ));
        }
        Err(e) => {
            tracing::error!(tool, error = %e, "Tool schema check failed");
            return Err(JsonRpcError::internal_error("Internal error"));
        }
    }

    serde_json::from_value(arguments.clone()).map_err(|e| {
        tracing::warn!(tool, error = %e, "Rejected tool arguments");
        JsonRpcError::invalid_params(format!("Invalid arguments for {tool}: {e}"))
    })
}
