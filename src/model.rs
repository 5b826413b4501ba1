use std::fmt;
use std::str::FromStr;

use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use serde::{Serialize, Serializer};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown {kind}: {value:?}")]
pub struct ModelError {
    pub kind: &'static str,
    pub value: String,
}

impl ModelError {
    fn new(kind: &'static str, value: &str) -> Self {
        Self {
            kind,
            value: value.to_string(),
        }
    }
}

/// Declares a closed string enumeration with `as_str`, `ALL`, `Display` and `FromStr`.
macro_rules! string_enum {
    ($name:ident, $kind:literal, { $($variant:ident => $text:literal),+ $(,)? }) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            #[allow(dead_code)]
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = ModelError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s.trim() {
                    $($text => Ok($name::$variant),)+
                    other => Err(ModelError::new($kind, other)),
                }
            }
        }

        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_str(self.as_str())
            }
        }

        impl ToSql for $name {
            fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
                Ok(ToSqlOutput::from(self.as_str()))
            }
        }

        impl FromSql for $name {
            fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
                parse_column(value)
            }
        }
    };
}

string_enum!(Grade, "grade", {
    Ninth => "9th",
    Tenth => "10th",
    Eleventh => "11th",
    Twelfth => "12th",
});

string_enum!(Section, "section", {
    A => "A",
    B => "B",
    C => "C",
    D => "D",
});

string_enum!(StudentStatus, "student status", {
    Active => "Active",
    Inactive => "Inactive",
    Graduated => "Graduated",
    Suspended => "Suspended",
});

string_enum!(AttendanceStatus, "attendance status", {
    Present => "Present",
    Absent => "Absent",
    Late => "Late",
    Excused => "Excused",
});

string_enum!(Gender, "gender", {
    Male => "Male",
    Female => "Female",
    Other => "Other",
});

string_enum!(Role, "role", {
    Admin => "admin",
    Teacher => "teacher",
    Student => "student",
});

string_enum!(ViewMode, "view", {
    Mark => "mark",
    History => "history",
});

impl Role {
    pub fn is_staff(self) -> bool {
        matches!(self, Role::Admin | Role::Teacher)
    }
}

fn parse_column<T: FromStr<Err = ModelError>>(value: ValueRef<'_>) -> FromSqlResult<T> {
    let text = value.as_str()?;
    text.parse().map_err(|e: ModelError| FromSqlError::Other(Box::new(e)))
}

/// A teaching period, 1 through 8.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Period(u8);

impl Period {
    pub const FIRST: Period = Period(1);
    pub const LAST: Period = Period(8);

    pub fn new(n: u8) -> Option<Period> {
        (Self::FIRST.0..=Self::LAST.0).contains(&n).then_some(Period(n))
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Period {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim()
            .parse::<u8>()
            .ok()
            .and_then(Period::new)
            .ok_or_else(|| ModelError::new("period", s))
    }
}

impl Serialize for Period {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl ToSql for Period {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.to_string()))
    }
}

impl FromSql for Period {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        parse_column(value)
    }
}

/// A value or the `all` sentinel meaning "unfiltered".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Filter<T> {
    All,
    Only(T),
}

pub type PeriodFilter = Filter<Period>;
pub type GradeFilter = Filter<Grade>;

impl<T: Copy> Filter<T> {
    pub fn value(self) -> Option<T> {
        match self {
            Filter::All => None,
            Filter::Only(v) => Some(v),
        }
    }
}

impl<T: PartialEq> Filter<T> {
    pub fn matches(&self, v: &T) -> bool {
        match self {
            Filter::All => true,
            Filter::Only(want) => want == v,
        }
    }
}

impl<T: fmt::Display> fmt::Display for Filter<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Filter::All => f.write_str("all"),
            Filter::Only(v) => v.fmt(f),
        }
    }
}

impl<T: fmt::Display> Serialize for Filter<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<T: FromStr<Err = ModelError>> FromStr for Filter<T> {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let t = s.trim();
        if t.eq_ignore_ascii_case("all") {
            Ok(Filter::All)
        } else {
            t.parse().map(Filter::Only)
        }
    }
}
