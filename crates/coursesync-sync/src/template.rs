//! Directory layout templates
//!
//! A template is a `/`-separated list of segments. Each segment mixes
//! literal text with placeholders:
//!
//! | Placeholder | Resolves to                                              |
//! |-------------|----------------------------------------------------------|
//! | `:semester` | semester title                                           |
//! | `:course`   | course title                                             |
//! | `:sem`      | two-digit year + `ss`/`ws` from the semester begin (UTC) |
//! | `:lecture`  | title of the lecture an exercise belongs to              |
//! | `:type`     | `vorlesung`, `seminar`, `uebung`, `praktikum`, ...       |
//!
//! Every resolved segment is sanitized, so a title can never introduce a
//! path separator.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use chrono::{DateTime, Datelike};
use coursesync_conflict::{fold, sanitize};
use coursesync_core::domain::{CourseNode, CourseType, SemesterNode};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TemplateError {
    #[error("unknown placeholder `:{0}` in path template")]
    UnknownPlaceholder(String),

    #[error("path template has no segments")]
    Empty,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Placeholder {
    Semester,
    Course,
    Sem,
    Lecture,
    Type,
}

impl Placeholder {
    fn from_name(name: &str) -> Option<Self> {
        match name {
            "semester" => Some(Self::Semester),
            "course" => Some(Self::Course),
            "sem" => Some(Self::Sem),
            "lecture" => Some(Self::Lecture),
            "type" => Some(Self::Type),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Literal(String),
    Placeholder(Placeholder),
}

/// Parsed directory layout template
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathTemplate {
    source: String,
    segments: Vec<Vec<Token>>,
}

impl PathTemplate {
    /// Parses a template, rejecting unknown placeholders
    pub fn parse(template: &str) -> Result<Self, TemplateError> {
        let segments = template
            .split('/')
            .filter(|s| !s.trim().is_empty())
            .map(parse_segment)
            .collect::<Result<Vec<_>, _>>()?;

        if segments.is_empty() {
            return Err(TemplateError::Empty);
        }

        Ok(Self {
            source: template.to_string(),
            segments,
        })
    }

    /// Relative directory of `course` within `semester`.
    ///
    /// `semester.courses` supplies the siblings `:lecture` matches against.
    pub fn resolve(&self, semester: &SemesterNode, course: &CourseNode) -> PathBuf {
        self.segments
            .iter()
            .map(|tokens| {
                let raw: String = tokens
                    .iter()
                    .map(|token| match token {
                        Token::Literal(text) => text.clone(),
                        Token::Placeholder(p) => expand(*p, semester, course),
                    })
                    .collect();
                sanitize(&raw)
            })
            .collect()
    }
}

impl FromStr for PathTemplate {
    type Err = TemplateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for PathTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

fn parse_segment(segment: &str) -> Result<Vec<Token>, TemplateError> {
    let mut tokens = Vec::new();
    let mut literal = String::new();
    let mut chars = segment.chars().peekable();

    while let Some(c) = chars.next() {
        if c != ':' || !chars.peek().is_some_and(|n| n.is_ascii_alphabetic()) {
            literal.push(c);
            continue;
        }

        let mut name = String::new();
        while let Some(&n) = chars.peek() {
            if !n.is_ascii_alphabetic() {
                break;
            }
            name.push(n);
            chars.next();
        }

        let placeholder =
            Placeholder::from_name(&name).ok_or(TemplateError::UnknownPlaceholder(name))?;
        if !literal.is_empty() {
            tokens.push(Token::Literal(std::mem::take(&mut literal)));
        }
        tokens.push(Token::Placeholder(placeholder));
    }

    if !literal.is_empty() {
        tokens.push(Token::Literal(literal));
    }
    Ok(tokens)
}

// ============================================================================
// Placeholder expansion
// ============================================================================

fn expand(placeholder: Placeholder, semester: &SemesterNode, course: &CourseNode) -> String {
    match placeholder {
        Placeholder::Semester => sanitize(&semester.title),
        Placeholder::Course => sanitize(&course.title),
        Placeholder::Sem => short_semester(semester),
        Placeholder::Lecture => lecture_title(semester, course),
        Placeholder::Type => type_slug(course).to_string(),
    }
}

/// `24ws`, `25ss`; summer terms begin in January through June
fn short_semester(semester: &SemesterNode) -> String {
    let Some(begin) = DateTime::from_timestamp(semester.begin, 0) else {
        return sanitize(&semester.title);
    };
    let term = if begin.month() <= 6 { "ss" } else { "ws" };
    format!("{:02}{term}", begin.year().rem_euclid(100))
}

fn is_exercise(course: &CourseNode) -> bool {
    let title = fold(&course.title);
    course.course_type() == Some(CourseType::Exercise)
        || title.contains("übung")
        || title.contains("uebung")
}

/// Exercises resolve to the longest sibling title their own title contains
fn lecture_title(semester: &SemesterNode, course: &CourseNode) -> String {
    if !is_exercise(course) {
        return sanitize(&course.title);
    }

    let own = fold(&course.title);
    let mut best: Option<&CourseNode> = None;
    for sibling in &semester.courses {
        if sibling.id == course.id || sibling.title.trim().is_empty() {
            continue;
        }
        let candidate = fold(&sibling.title);
        if !own.contains(&candidate) {
            continue;
        }
        let longer = best.map_or(true, |b| {
            candidate.chars().count() > fold(&b.title).chars().count()
        });
        if longer {
            best = Some(sibling);
        }
    }

    sanitize(&best.unwrap_or(course).title)
}

fn type_slug(course: &CourseNode) -> &'static str {
    if let Some(kind) = course.course_type() {
        return match kind {
            CourseType::Lecture => "vorlesung",
            CourseType::Seminar => "seminar",
            CourseType::Exercise => "uebung",
            CourseType::Lab => "praktikum",
            CourseType::StudyGroup => "studiengruppe",
        };
    }

    let title = fold(&course.title);
    if title.contains("seminar") {
        "seminar"
    } else if title.contains("übung") || title.contains("uebung") {
        "uebung"
    } else if title.contains("praktikum") || title.contains("projekt") {
        "praktikum"
    } else {
        "vorlesung"
    }
}
