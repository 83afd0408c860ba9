pub mod request;
pub mod response;

pub use request::{
    ClientInfo, GetStudentInfoParams, GetStudentListParams, InitializeParams, JsonRpcRequest,
    RpcId, ToolCallParams,
};
pub use response::{JsonRpcError, JsonRpcResponse, ToolResult, ToolResultContent};
