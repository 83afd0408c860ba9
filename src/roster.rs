use std::collections::HashSet;

use serde::Serialize;

/// A single roster entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Student {
    pub id: String,
    pub name: String,
    pub age: u32,
    pub grade: String,
    pub section: String,
}

impl Student {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        age: u32,
        grade: impl Into<String>,
        section: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            age,
            grade: grade.into(),
            section: section.into(),
        }
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum RosterError {
    #[error("Duplicate student id: {0}")]
    DuplicateId(String),
    #[error("Student id must not be empty")]
    EmptyId,
}

/// Immutable, ordered set of students. Built once, then shared read-only.
#[derive(Debug, Clone)]
pub struct Roster {
    students: Vec<Student>,
}

impl Roster {
    /// Build a roster, rejecting empty or repeated ids.
    pub fn new(students: Vec<Student>) -> Result<Self, RosterError> {
        let mut seen = HashSet::with_capacity(students.len());
        for student in &students {
            if student.id.is_empty() {
                return Err(RosterError::EmptyId);
            }
            if !seen.insert(student.id.as_str()) {
                return Err(RosterError::DuplicateId(student.id.clone()));
            }
        }
        Ok(Self { students })
    }

    /// The roster served in production.
    pub fn seed() -> Self {
        Self {
            students: vec![
                Student::new("1", "张三", 18, "高三", "A班"),
                Student::new("2", "李四", 17, "高二", "B班"),
                Student::new("3", "王五", 16, "高一", "C班"),
                Student::new("4", "赵六", 17, "高二", "A班"),
                Student::new("5", "孙七", 16, "高一", "B班"),
            ],
        }
    }

    /// All students, in roster order.
    pub fn students(&self) -> &[Student] {
        &self.students
    }
}
