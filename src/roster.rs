use chrono::NaiveDate;
use serde::Deserialize;
use std::rc::Rc;
use uuid::Uuid;

use crate::model::{Class, RiskLevel, Student, StudentStatus, DEFAULT_INSTITUTION_ID};
use crate::store::{Collection, KvStore};

pub const CLASSES_KEY: &str = "classes";
pub const STUDENTS_KEY: &str = "students";

#[derive(Debug, thiserror::Error)]
pub enum RosterError {
    #[error("class not found: {0}")]
    ClassNotFound(String),
    #[error("student not found: {0}")]
    StudentNotFound(String),
    #[error("{0}")]
    Invalid(String),
    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}

#[derive(Debug, Clone)]
pub struct NewClass {
    pub name: String,
    pub division: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewStudent {
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub phone: String,
    pub roll_number: String,
    pub class_id: String,
    #[serde(default)]
    pub enrollment_date: Option<NaiveDate>,
    #[serde(default)]
    pub status: Option<StudentStatus>,
    #[serde(default)]
    pub risk_level: Option<RiskLevel>,
    #[serde(default)]
    pub attendance_percentage: Option<f64>,
    #[serde(default)]
    pub average_score: Option<f64>,
}

/// Partial update; absent fields are left as they are.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct StudentPatch {
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub roll_number: Option<String>,
    pub class_id: Option<String>,
    pub enrollment_date: Option<NaiveDate>,
    pub status: Option<StudentStatus>,
    pub risk_level: Option<RiskLevel>,
    pub attendance_percentage: Option<f64>,
    pub average_score: Option<f64>,
}

pub struct Roster {
    classes: Collection<Class>,
    students: Collection<Student>,
}

impl Roster {
    pub fn open(kv: Rc<dyn KvStore>) -> anyhow::Result<Self> {
        Ok(Self {
            classes: Collection::open(kv.clone(), CLASSES_KEY)?,
            students: Collection::open(kv, STUDENTS_KEY)?,
        })
    }

    pub fn classes(&self) -> &[Class] {
        self.classes.list_all()
    }

    pub fn find_class(&self, class_id: &str) -> Option<&Class> {
        self.classes.find_by_id(class_id)
    }

    pub fn add_class(&mut self, new: NewClass) -> Result<Class, RosterError> {
        let name = new.name.trim().to_string();
        if name.is_empty() {
            return Err(RosterError::Invalid("name must not be empty".into()));
        }
        let class = Class {
            id: Uuid::new_v4().to_string(),
            name,
            division: new
                .division
                .map(|d| d.trim().to_string())
                .filter(|d| !d.is_empty()),
            institution_id: DEFAULT_INSTITUTION_ID.to_string(),
        };
        self.classes.insert(class.clone())?;
        log::info!("class created: {} ({})", class.label(), class.id);
        Ok(class)
    }

    pub fn students(&self) -> &[Student] {
        self.students.list_all()
    }

    pub fn find_student(&self, student_id: &str) -> Option<&Student> {
        self.students.find_by_id(student_id)
    }

    pub fn students_in_class(&self, class_id: &str) -> Vec<&Student> {
        self.students
            .list_all()
            .iter()
            .filter(|s| s.class_id == class_id)
            .collect()
    }

    pub fn student_count(&self, class_id: &str) -> usize {
        self.students
            .list_all()
            .iter()
            .filter(|s| s.class_id == class_id)
            .count()
    }

    pub fn add_student(&mut self, new: NewStudent, today: NaiveDate) -> Result<Student, RosterError> {
        let name = required("name", &new.name)?;
        let roll_number = required("rollNumber", &new.roll_number)?;
        check_percent("attendancePercentage", new.attendance_percentage)?;
        check_percent("averageScore", new.average_score)?;
        let class = self
            .find_class(&new.class_id)
            .ok_or_else(|| RosterError::ClassNotFound(new.class_id.clone()))?
            .clone();

        let student = Student {
            id: Uuid::new_v4().to_string(),
            name,
            email: new.email.trim().to_string(),
            phone: new.phone.trim().to_string(),
            roll_number,
            class_id: class.id,
            class_name: class.name,
            division: class.division,
            enrollment_date: new.enrollment_date.unwrap_or(today),
            status: new.status.unwrap_or(StudentStatus::Active),
            risk_level: new.risk_level,
            attendance_percentage: new.attendance_percentage,
            average_score: new.average_score,
        };
        self.students.insert(student.clone())?;
        log::info!("student created: {} ({})", student.name, student.id);
        Ok(student)
    }

    pub fn update_student(&mut self, student_id: &str, patch: StudentPatch) -> Result<Student, RosterError> {
        if self.find_student(student_id).is_none() {
            return Err(RosterError::StudentNotFound(student_id.to_string()));
        }
        let name = patch.name.as_deref().map(|v| required("name", v)).transpose()?;
        let roll_number = patch
            .roll_number
            .as_deref()
            .map(|v| required("rollNumber", v))
            .transpose()?;
        check_percent("attendancePercentage", patch.attendance_percentage)?;
        check_percent("averageScore", patch.average_score)?;
        // Moving classes re-denormalizes the class name and division.
        let class = match patch.class_id.as_deref() {
            Some(cid) => Some(
                self.find_class(cid)
                    .ok_or_else(|| RosterError::ClassNotFound(cid.to_string()))?
                    .clone(),
            ),
            None => None,
        };

        let updated = self.students.update(student_id, |s| {
            if let Some(v) = name {
                s.name = v;
            }
            if let Some(v) = patch.email {
                s.email = v.trim().to_string();
            }
            if let Some(v) = patch.phone {
                s.phone = v.trim().to_string();
            }
            if let Some(v) = roll_number {
                s.roll_number = v;
            }
            if let Some(c) = class {
                s.class_id = c.id;
                s.class_name = c.name;
                s.division = c.division;
            }
            if let Some(v) = patch.enrollment_date {
                s.enrollment_date = v;
            }
            if let Some(v) = patch.status {
                s.status = v;
            }
            if let Some(v) = patch.risk_level {
                s.risk_level = Some(v);
            }
            if let Some(v) = patch.attendance_percentage {
                s.attendance_percentage = Some(v);
            }
            if let Some(v) = patch.average_score {
                s.average_score = Some(v);
            }
        })?;
        updated.ok_or_else(|| RosterError::StudentNotFound(student_id.to_string()))
    }

    pub fn delete_student(&mut self, student_id: &str) -> Result<Student, RosterError> {
        let removed = self
            .students
            .remove(student_id)?
            .ok_or_else(|| RosterError::StudentNotFound(student_id.to_string()))?;
        log::info!("student deleted: {} ({})", removed.name, removed.id);
        Ok(removed)
    }
}

fn required(field: &str, value: &str) -> Result<String, RosterError> {
    let v = value.trim();
    if v.is_empty() {
        return Err(RosterError::Invalid(format!("{} must not be empty", field)));
    }
    Ok(v.to_string())
}

fn check_percent(field: &str, value: Option<f64>) -> Result<(), RosterError> {
    match value {
        Some(v) if !(0.0..=100.0).contains(&v) => Err(RosterError::Invalid(format!(
            "{} must be between 0 and 100",
            field
        ))),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryKv;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 1).expect("date")
    }

    fn new_student(class_id: &str, name: &str, roll: &str) -> NewStudent {
        NewStudent {
            name: name.into(),
            email: format!("{}@school.edu", roll),
            phone: String::new(),
            roll_number: roll.into(),
            class_id: class_id.into(),
            enrollment_date: None,
            status: None,
            risk_level: None,
            attendance_percentage: Some(92.0),
            average_score: Some(85.0),
        }
    }

    #[test]
    fn student_denormalizes_class_and_moves_between_classes() {
        let kv: Rc<dyn KvStore> = Rc::new(MemoryKv::new());
        let mut roster = Roster::open(kv.clone()).expect("open");
        let a = roster
            .add_class(NewClass {
                name: "Class 10".into(),
                division: Some("A".into()),
            })
            .expect("class a");
        let b = roster
            .add_class(NewClass {
                name: "Class 11".into(),
                division: Some("  ".into()),
            })
            .expect("class b");
        assert_eq!(b.division, None);

        let s = roster
            .add_student(new_student(&a.id, "Alice Johnson", "001"), today())
            .expect("student");
        assert_eq!(s.class_label(), "Class 10 - A");
        assert_eq!(s.enrollment_date, today());
        assert_eq!(s.status, StudentStatus::Active);

        let moved = roster
            .update_student(
                &s.id,
                StudentPatch {
                    class_id: Some(b.id.clone()),
                    average_score: Some(40.0),
                    ..Default::default()
                },
            )
            .expect("move");
        assert_eq!(moved.class_name, "Class 11");
        assert_eq!(moved.division, None);
        assert_eq!(moved.average_score, Some(40.0));
        assert_eq!(moved.name, "Alice Johnson");

        let reopened = Roster::open(kv).expect("reopen");
        assert_eq!(reopened.student_count(&b.id), 1);
        assert_eq!(reopened.student_count(&a.id), 0);
    }

    #[test]
    fn invalid_inputs_are_rejected() {
        let mut roster = Roster::open(Rc::new(MemoryKv::new())).expect("open");
        assert!(matches!(
            roster.add_class(NewClass {
                name: " ".into(),
                division: None
            }),
            Err(RosterError::Invalid(_))
        ));
        assert!(matches!(
            roster.add_student(new_student("missing", "Bob", "002"), today()),
            Err(RosterError::ClassNotFound(_))
        ));
        let c = roster
            .add_class(NewClass {
                name: "Class 12".into(),
                division: None,
            })
            .expect("class");
        let mut bad = new_student(&c.id, "Bob", "002");
        bad.attendance_percentage = Some(130.0);
        assert!(matches!(
            roster.add_student(bad, today()),
            Err(RosterError::Invalid(_))
        ));
        assert!(matches!(
            roster.delete_student("nobody"),
            Err(RosterError::StudentNotFound(_))
        ));
    }

    #[test]
    fn delete_removes_student() {
        let mut roster = Roster::open(Rc::new(MemoryKv::new())).expect("open");
        let c = roster
            .add_class(NewClass {
                name: "Class 12".into(),
                division: None,
            })
            .expect("class");
        let s = roster
            .add_student(new_student(&c.id, "Edward King", "005"), today())
            .expect("student");
        roster.delete_student(&s.id).expect("delete");
        assert!(roster.find_student(&s.id).is_none());
        assert!(roster.students_in_class(&c.id).is_empty());
    }
}
