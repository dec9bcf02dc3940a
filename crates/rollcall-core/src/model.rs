//! The application database: students plus the append-only attendance log.
//!
//! Student identifiers are assigned by scanning existing records for the
//! highest sequence under the same prefix/year/class stem. That is correct
//! only under a single writer; the session layer keeps all mutation behind
//! `&mut` access for exactly this reason.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ModelError;

/// Fixed textual prefix of every student identifier.
pub const STUDENT_ID_PREFIX: &str = "TATATB-";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FamilyRole {
    Father,
    Mother,
    Guardian,
}

/// At most one image (base64 data) per family role.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhotoSet {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub father: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mother: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub guardian: Option<String>,
}

impl PhotoSet {
    pub fn get(&self, role: FamilyRole) -> Option<&str> {
        match role {
            FamilyRole::Father => self.father.as_deref(),
            FamilyRole::Mother => self.mother.as_deref(),
            FamilyRole::Guardian => self.guardian.as_deref(),
        }
    }

    /// Replaces any previous image for the role.
    pub fn set(&mut self, role: FamilyRole, image: String) {
        let slot = match role {
            FamilyRole::Father => &mut self.father,
            FamilyRole::Mother => &mut self.mother,
            FamilyRole::Guardian => &mut self.guardian,
        };
        *slot = Some(image);
    }

    pub fn is_empty(&self) -> bool {
        self.father.is_none() && self.mother.is_none() && self.guardian.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Student {
    pub id: String,
    pub name: String,
    pub class_name: String,
    pub class_code: u8,
    #[serde(default)]
    pub date_of_birth: Option<NaiveDate>,
    #[serde(default)]
    pub father_name: Option<String>,
    #[serde(default)]
    pub mother_name: Option<String>,
    #[serde(default)]
    pub contact: Option<String>,
    #[serde(default)]
    pub photos: PhotoSet,
}

/// An enrollment candidate: a [`Student`] minus the generated identifier.
/// Bulk-import parsers produce these; `Database::import` deduplicates them.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewStudent {
    pub name: String,
    pub class_name: String,
    pub class_code: u8,
    pub enrollment_year: i32,
    #[serde(default)]
    pub date_of_birth: Option<NaiveDate>,
    #[serde(default)]
    pub father_name: Option<String>,
    #[serde(default)]
    pub mother_name: Option<String>,
    #[serde(default)]
    pub contact: Option<String>,
    #[serde(default)]
    pub photos: PhotoSet,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogKind {
    CheckIn,
    CheckOut,
}

/// Immutable attendance event. Never mutated or deleted by normal operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    pub id: String,
    pub student_id: String,
    pub kind: LogKind,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub collected_by: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportSummary {
    pub added: usize,
    pub skipped: usize,
}

/// The single unit of persistence. Always serialized and deserialized
/// atomically — the store never sees a partial update.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Database {
    #[serde(default)]
    pub students: Vec<Student>,
    #[serde(default)]
    pub logs: Vec<LogEntry>,
}

impl Database {
    pub fn is_empty(&self) -> bool {
        self.students.is_empty() && self.logs.is_empty()
    }

    /// Next identifier under `{prefix}{yy}{yy+1}{class:02}`: one greater
    /// than the maximum existing 4-digit sequence sharing that stem.
    pub fn next_student_id(&self, enrollment_year: i32, class_code: u8) -> String {
        let yy = enrollment_year.rem_euclid(100);
        let stem = format!(
            "{STUDENT_ID_PREFIX}{:02}{:02}{:02}",
            yy,
            (yy + 1) % 100,
            class_code
        );
        let max_seq = self
            .students
            .iter()
            .filter_map(|s| s.id.strip_prefix(&stem))
            .filter(|rest| rest.len() == 4 && rest.bytes().all(|b| b.is_ascii_digit()))
            .filter_map(|rest| rest.parse::<u32>().ok())
            .max()
            .unwrap_or(0);
        format!("{stem}{:04}", max_seq + 1)
    }

    pub fn student(&self, id: &str) -> Option<&Student> {
        self.students.iter().find(|s| s.id == id)
    }

    pub fn enroll(&mut self, candidate: NewStudent) -> &Student {
        let id = self.next_student_id(candidate.enrollment_year, candidate.class_code);
        let idx = self.students.len();
        self.students.push(Student {
            id,
            name: candidate.name,
            class_name: candidate.class_name,
            class_code: candidate.class_code,
            date_of_birth: candidate.date_of_birth,
            father_name: candidate.father_name,
            mother_name: candidate.mother_name,
            contact: candidate.contact,
            photos: candidate.photos,
        });
        &self.students[idx]
    }

    pub fn check_in(&mut self, student_id: &str) -> Result<&LogEntry, ModelError> {
        self.append_log(student_id, LogKind::CheckIn, None)
    }

    pub fn check_out(
        &mut self,
        student_id: &str,
        collected_by: &str,
    ) -> Result<&LogEntry, ModelError> {
        self.append_log(student_id, LogKind::CheckOut, Some(collected_by.to_owned()))
    }

    fn append_log(
        &mut self,
        student_id: &str,
        kind: LogKind,
        collected_by: Option<String>,
    ) -> Result<&LogEntry, ModelError> {
        if self.student(student_id).is_none() {
            return Err(ModelError::UnknownStudent(student_id.to_owned()));
        }
        let idx = self.logs.len();
        self.logs.push(LogEntry {
            id: Uuid::new_v4().to_string(),
            student_id: student_id.to_owned(),
            kind,
            timestamp: Utc::now(),
            collected_by,
        });
        Ok(&self.logs[idx])
    }

    /// Case-insensitive (name, date of birth, contact) match against the
    /// enrolled students. This is the bulk-import duplicate gate.
    pub fn is_duplicate(&self, candidate: &NewStudent) -> bool {
        let key = dedup_key(
            &candidate.name,
            candidate.date_of_birth,
            candidate.contact.as_deref(),
        );
        self.students
            .iter()
            .any(|s| dedup_key(&s.name, s.date_of_birth, s.contact.as_deref()) == key)
    }

    pub fn import(&mut self, candidates: Vec<NewStudent>) -> ImportSummary {
        let mut summary = ImportSummary::default();
        for candidate in candidates {
            if self.is_duplicate(&candidate) {
                summary.skipped += 1;
            } else {
                self.enroll(candidate);
                summary.added += 1;
            }
        }
        summary
    }
}

fn dedup_key(
    name: &str,
    date_of_birth: Option<NaiveDate>,
    contact: Option<&str>,
) -> (String, Option<NaiveDate>, String) {
    (
        name.trim().to_lowercase(),
        date_of_birth,
        contact.map(|c| c.trim().to_lowercase()).unwrap_or_default(),
    )
}
