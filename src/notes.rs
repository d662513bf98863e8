use chrono::{DateTime, Utc};
use std::rc::Rc;
use uuid::Uuid;

use crate::model::StudyNote;
use crate::roster::Roster;
use crate::store::{Collection, KvStore};

pub const NOTES_KEY: &str = "studyNotes";

pub const SUBJECTS: &[&str] = &[
    "Mathematics",
    "Physics",
    "Chemistry",
    "Biology",
    "English",
    "Computer Science",
    "History",
    "Geography",
];

#[derive(Debug, thiserror::Error)]
pub enum NoteError {
    #[error("missing {0}")]
    Missing(&'static str),
    #[error("only PDF files can be uploaded")]
    NotPdf,
    #[error("unknown subject: {0}")]
    UnknownSubject(String),
    #[error("class not found: {0}")]
    ClassNotFound(String),
    #[error("note not found: {0}")]
    NotFound(String),
    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}

#[derive(Debug, Clone, Default)]
pub struct NewNote {
    pub title: String,
    pub subject: String,
    pub description: String,
    pub class_id: String,
    pub file_name: String,
    pub file_url: Option<String>,
    pub uploaded_by: String,
    pub uploaded_by_name: String,
}

pub struct NoteLibrary {
    notes: Collection<StudyNote>,
}

impl NoteLibrary {
    pub fn open(kv: Rc<dyn KvStore>) -> anyhow::Result<Self> {
        Ok(Self {
            notes: Collection::open(kv, NOTES_KEY)?,
        })
    }

    pub fn upload(
        &mut self,
        roster: &Roster,
        new: NewNote,
        now: DateTime<Utc>,
    ) -> Result<StudyNote, NoteError> {
        let title = new.title.trim();
        if title.is_empty() {
            return Err(NoteError::Missing("title"));
        }
        let file_name = new.file_name.trim();
        if file_name.is_empty() {
            return Err(NoteError::Missing("fileName"));
        }
        if !file_name.to_ascii_lowercase().ends_with(".pdf") {
            return Err(NoteError::NotPdf);
        }
        let subject = SUBJECTS
            .iter()
            .find(|s| s.eq_ignore_ascii_case(new.subject.trim()))
            .ok_or_else(|| NoteError::UnknownSubject(new.subject.clone()))?;
        let class = roster
            .find_class(&new.class_id)
            .ok_or_else(|| NoteError::ClassNotFound(new.class_id.clone()))?;

        let note = StudyNote {
            id: Uuid::new_v4().to_string(),
            title: title.to_string(),
            subject: subject.to_string(),
            description: new.description.trim().to_string(),
            file_name: file_name.to_string(),
            file_url: new.file_url.unwrap_or_else(|| "#".to_string()),
            uploaded_by: new.uploaded_by,
            uploaded_by_name: new.uploaded_by_name,
            uploaded_at: now,
            class_id: class.id.clone(),
            class_name: class.label(),
        };
        self.notes.insert(note.clone())?;
        log::info!("study note uploaded: {} ({})", note.title, note.id);
        Ok(note)
    }

    /// Newest first. `query` matches title or description, case-insensitively.
    pub fn list(&self, query: Option<&str>, subject: Option<&str>) -> Vec<&StudyNote> {
        let needle = query
            .map(|q| q.trim().to_lowercase())
            .filter(|q| !q.is_empty());
        let mut out: Vec<&StudyNote> = self
            .notes
            .list_all()
            .iter()
            .filter(|n| match &needle {
                Some(q) => {
                    n.title.to_lowercase().contains(q) || n.description.to_lowercase().contains(q)
                }
                None => true,
            })
            .filter(|n| match subject {
                Some(s) => n.subject.eq_ignore_ascii_case(s.trim()),
                None => true,
            })
            .collect();
        out.sort_by(|a, b| b.uploaded_at.cmp(&a.uploaded_at));
        out
    }

    pub fn delete(&mut self, note_id: &str) -> Result<StudyNote, NoteError> {
        self.notes
            .remove(note_id)?
            .ok_or_else(|| NoteError::NotFound(note_id.to_string()))
    }
}
