//! Course type codes
//!
//! The remote catalog tags every course with a numeric type code. Only a
//! handful of codes have a well-known meaning; all other values are valid
//! and are carried through untouched.

use std::fmt::{self, Display, Formatter};

/// Well-known course type codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CourseType {
    Lecture,
    Seminar,
    Exercise,
    Lab,
    StudyGroup,
}

impl CourseType {
    /// Maps a raw type code to a known course type.
    ///
    /// Returns `None` for codes without a well-known meaning; callers are
    /// expected to fall back to other heuristics.
    #[must_use]
    pub fn from_code(code: i32) -> Option<Self> {
        match code {
            1 => Some(Self::Lecture),
            2 => Some(Self::Seminar),
            3 => Some(Self::Exercise),
            4 => Some(Self::Lab),
            99 => Some(Self::StudyGroup),
            _ => None,
        }
    }

    /// The raw code for this type
    #[must_use]
    pub const fn code(self) -> i32 {
        match self {
            Self::Lecture => 1,
            Self::Seminar => 2,
            Self::Exercise => 3,
            Self::Lab => 4,
            Self::StudyGroup => 99,
        }
    }
}

impl Display for CourseType {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Lecture => "lecture",
            Self::Seminar => "seminar",
            Self::Exercise => "exercise",
            Self::Lab => "lab",
            Self::StudyGroup => "study-group",
        };
        f.write_str(name)
    }
}
