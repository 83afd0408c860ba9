use std::sync::LazyLock;

use crate::protocol::{GetStudentInfoParams, ToolResult};
use crate::query;
use crate::roster::{Roster, Student};
use crate::schema::{CompiledSchema, SchemaValidationError};

pub const NAME: &str = "get_student_info";

/// Tool declaration advertised through `tools/list`.
///
/// `minLength` keeps an empty id from ever reaching the lookup.
pub fn definition() -> serde_json::Value {
    serde_json::json!({
        "name": NAME,
        "description": "Get the details of a single student by ID",
        "inputSchema": {
            "type": "object",
            "required": ["student_id"],
            "properties": {
                "student_id": {
                    "type": "string",
                    "description": "Unique identifier of the student",
                    "minLength": 1
                }
            }
        }
    })
}

static INPUT_SCHEMA: LazyLock<Result<CompiledSchema, SchemaValidationError>> =
    LazyLock::new(|| CompiledSchema::compile(&definition()["inputSchema"]));

/// The compiled `inputSchema`, built on first use.
pub fn input_schema() -> Result<&'static CompiledSchema, &'static SchemaValidationError> {
    INPUT_SCHEMA.as_ref()
}

/// Handle a `get_student_info` tool call.
pub async fn handle(params: GetStudentInfoParams, roster: &Roster) -> ToolResult {
    match query::get_student(roster, &params.student_id) {
        Ok(student) => ToolResult::text(format_student_details(student)),
        Err(err) => {
            tracing::debug!(student_id = %params.student_id, "Student not found");
            err.into()
        }
    }
}

pub fn format_student_details(s: &Student) -> String {
    format!(
        "Student details:\nID: {}\nName: {}\nAge: {}\nGrade: {}\nSection: {}",
        s.id, s.name, s.age, s.grade, s.section
    )
}
