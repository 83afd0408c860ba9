use std::fmt::Write;
use std::sync::LazyLock;

use crate::protocol::{GetStudentListParams, ToolResult};
use crate::query;
use crate::roster::{Roster, Student};
use crate::schema::{CompiledSchema, SchemaValidationError};

pub const NAME: &str = "get_student_list";

/// Tool declaration advertised through `tools/list`.
pub fn definition() -> serde_json::Value {
    serde_json::json!({
        "name": NAME,
        "description": "List the students in the roster, optionally limited to one section",
        "inputSchema": {
            "type": "object",
            "properties": {
                "section": {
                    "type": "string",
                    "description": "Optional section name; limits the result to that section"
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

/// Handle a `get_student_list` tool call.
///
/// Never fails: an unknown section yields a zero count, not an error.
pub async fn handle(params: GetStudentListParams, roster: &Roster) -> ToolResult {
    let students = query::list_students(roster, params.section.as_deref());
    ToolResult::text(format_student_list(&students))
}

/// Header line with the match count, then one line per student.
pub fn format_student_list(students: &[&Student]) -> String {
    let mut out = format!("Found {} students:\n", students.len());
    for s in students {
        // Writing into a String cannot fail.
        let _ = writeln!(
            out,
            "ID: {}, Name: {}, Age: {}, Grade: {}, Section: {}",
            s.id, s.name, s.age, s.grade, s.section
        );
    }
    out
}
