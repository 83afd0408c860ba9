//! Read-only queries over a [`Roster`].

use crate::roster::{Roster, Student};

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum QueryError {
    #[error("No student found with ID {0}")]
    NotFound(String),
}

/// List students, optionally restricted to one section.
///
/// An absent or empty `section` returns the whole roster. Otherwise the match
/// is exact and case-sensitive. Roster order is preserved.
pub fn list_students<'a>(roster: &'a Roster, section: Option<&str>) -> Vec<&'a Student> {
    match section.filter(|s| !s.is_empty()) {
        Some(section) => roster
            .students()
            .iter()
            .filter(|s| s.section == section)
            .collect(),
        None => roster.students().iter().collect(),
    }
}

/// Look up one student by exact id.
pub fn get_student<'a>(roster: &'a Roster, student_id: &str) -> Result<&'a Student, QueryError> {
    roster
        .students()
        .iter()
        .find(|s| s.id == student_id)
        .ok_or_else(|| QueryError::NotFound(student_id.to_string()))
}
