use serde::Serialize;
use std::collections::BTreeMap;

pub const TARGET_SCORE: f64 = 75.0;
const WEAK_BELOW: f64 = 60.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SubjectStanding {
    Weak,
    Average,
    Strong,
}

impl SubjectStanding {
    pub fn for_score(score: f64) -> Self {
        if score < WEAK_BELOW {
            SubjectStanding::Weak
        } else if score < TARGET_SCORE {
            SubjectStanding::Average
        } else {
            SubjectStanding::Strong
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceKind {
    Video,
    Article,
    Practice,
    Book,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Resource {
    pub title: &'static str,
    #[serde(rename = "type")]
    pub kind: ResourceKind,
    pub url: &'static str,
    pub description: &'static str,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubjectRecommendation {
    pub subject: String,
    pub score: f64,
    pub status: SubjectStanding,
    pub gap_to_target: f64,
    pub resources: Vec<Resource>,
    pub tips: Vec<&'static str>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecommendationSet {
    pub subjects: Vec<SubjectRecommendation>,
    pub overall_score: u32,
    /// Subjects to work on, weakest first.
    pub focus_order: Vec<String>,
}

struct CatalogEntry {
    subject: &'static str,
    resources: &'static [Resource],
    tips: &'static [&'static str],
}

const CATALOG: &[CatalogEntry] = &[
    CatalogEntry {
        subject: "Mathematics",
        resources: &[
            Resource {
                title: "Khan Academy - Algebra Basics",
                kind: ResourceKind::Video,
                url: "https://khanacademy.org/math/algebra",
                description: "Free comprehensive video tutorials on algebra fundamentals",
            },
            Resource {
                title: "Math is Fun - Practice Problems",
                kind: ResourceKind::Practice,
                url: "https://mathisfun.com/algebra",
                description: "Interactive practice problems with step-by-step solutions",
            },
        ],
        tips: &[
            "Practice at least 10 problems daily",
            "Focus on understanding concepts rather than memorizing formulas",
            "Review mistakes and understand where you went wrong",
        ],
    },
    CatalogEntry {
        subject: "Physics",
        resources: &[
            Resource {
                title: "Physics Classroom",
                kind: ResourceKind::Article,
                url: "https://physicsclassroom.com",
                description: "Comprehensive physics tutorials with animations",
            },
            Resource {
                title: "HC Verma - Concepts of Physics",
                kind: ResourceKind::Book,
                url: "#",
                description: "Recommended textbook for building strong fundamentals",
            },
        ],
        tips: &[
            "Visualize physical phenomena using diagrams",
            "Understand the derivations, not just final formulas",
            "Solve numerical problems after understanding theory",
        ],
    },
    CatalogEntry {
        subject: "Chemistry",
        resources: &[Resource {
            title: "ChemLibreTexts",
            kind: ResourceKind::Article,
            url: "https://chem.libretexts.org",
            description: "Free online chemistry textbook",
        }],
        tips: &[
            "Create flashcards for chemical reactions",
            "Practice balancing equations regularly",
        ],
    },
    CatalogEntry {
        subject: "English",
        resources: &[Resource {
            title: "Grammarly Blog",
            kind: ResourceKind::Article,
            url: "https://grammarly.com/blog",
            description: "Advanced writing tips and grammar guides",
        }],
        tips: &[
            "Continue reading diverse literature",
            "Practice writing essays on various topics",
        ],
    },
    CatalogEntry {
        subject: "Computer Science",
        resources: &[Resource {
            title: "freeCodeCamp",
            kind: ResourceKind::Practice,
            url: "https://freecodecamp.org",
            description: "Interactive coding challenges and projects",
        }],
        tips: &["Build personal projects to apply concepts"],
    },
];

fn catalog_entry(subject: &str) -> Option<&'static CatalogEntry> {
    CATALOG
        .iter()
        .find(|e| e.subject.eq_ignore_ascii_case(subject.trim()))
}

pub fn recommend(scores: &BTreeMap<String, f64>) -> RecommendationSet {
    let subjects: Vec<SubjectRecommendation> = scores
        .iter()
        .map(|(subject, &score)| {
            let entry = catalog_entry(subject);
            SubjectRecommendation {
                subject: subject.clone(),
                score,
                status: SubjectStanding::for_score(score),
                gap_to_target: (TARGET_SCORE - score).max(0.0),
                resources: entry.map(|e| e.resources.to_vec()).unwrap_or_default(),
                tips: entry.map(|e| e.tips.to_vec()).unwrap_or_default(),
            }
        })
        .collect();

    let overall_score = if subjects.is_empty() {
        0
    } else {
        (subjects.iter().map(|s| s.score).sum::<f64>() / subjects.len() as f64).round() as u32
    };

    let mut needs_work: Vec<&SubjectRecommendation> = subjects
        .iter()
        .filter(|s| s.status != SubjectStanding::Strong)
        .collect();
    needs_work.sort_by(|a, b| a.score.total_cmp(&b.score));
    let focus_order = needs_work.into_iter().map(|s| s.subject.clone()).collect();

    RecommendationSet {
        subjects,
        overall_score,
        focus_order,
    }
}
