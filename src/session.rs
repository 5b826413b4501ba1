use rusqlite::{Connection, OptionalExtension};
use serde::Serialize;
use uuid::Uuid;

use crate::error::{db_err, DbOp, StoreError, StoreResult};
use crate::model::Role;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
}

/// The signed-in user. Created by `sign_in`, dropped by sign-out; handlers
/// receive it explicitly instead of looking up ambient state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub user_id: String,
    pub role: Option<Role>,
    pub profile: Option<Profile>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct NavItem {
    pub path: &'static str,
    pub label: &'static str,
}

const STAFF_NAV: &[NavItem] = &[
    NavItem {
        path: "/",
        label: "Dashboard",
    },
    NavItem {
        path: "/attendance",
        label: "Attendance",
    },
    NavItem {
        path: "/add-student",
        label: "Add Student",
    },
    NavItem {
        path: "/students",
        label: "Students",
    },
];

const STUDENT_NAV: &[NavItem] = &[NavItem {
    path: "/",
    label: "My Dashboard",
}];

impl Session {
    /// Views reachable for this session's role.
    pub fn views(&self) -> &'static [NavItem] {
        match self.role {
            Some(r) if r.is_staff() => STAFF_NAV,
            Some(_) => STUDENT_NAV,
            None => &[],
        }
    }

    pub fn has_role(&self, allowed: &[Role]) -> bool {
        self.role.map_or(false, |r| allowed.contains(&r))
    }
}

#[derive(Debug, Clone, Default)]
pub struct Registration {
    pub user_id: Option<String>,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub role: Option<Role>,
}

/// Sign-up: stores the profile and, when given, the role. Returns the user id.
pub fn register(conn: &Connection, reg: &Registration) -> StoreResult<String> {
    let email = reg.email.trim();
    let first_name = reg.first_name.trim();
    let last_name = reg.last_name.trim();
    if email.is_empty() {
        return Err(StoreError::MissingField("email"));
    }
    if first_name.is_empty() {
        return Err(StoreError::MissingField("firstName"));
    }
    if last_name.is_empty() {
        return Err(StoreError::MissingField("lastName"));
    }
    let user_id = reg
        .user_id
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    let tx = conn
        .unchecked_transaction()
        .map_err(db_err(DbOp::Tx, "profiles"))?;
    tx.execute(
        "INSERT INTO profiles(user_id, first_name, last_name, email)
         VALUES(?, ?, ?, ?)
         ON CONFLICT(user_id) DO UPDATE SET
           first_name = excluded.first_name,
           last_name = excluded.last_name,
           email = excluded.email",
        (&user_id, first_name, last_name, email),
    )
    .map_err(db_err(DbOp::Insert, "profiles"))?;
    if let Some(role) = reg.role {
        tx.execute(
            "INSERT INTO user_roles(user_id, role) VALUES(?, ?)
             ON CONFLICT(user_id) DO UPDATE SET role = excluded.role",
            (&user_id, role),
        )
        .map_err(db_err(DbOp::Insert, "user_roles"))?;
    }
    tx.commit().map_err(db_err(DbOp::Commit, "profiles"))?;
    tracing::info!(%user_id, role = ?reg.role, "user registered");
    Ok(user_id)
}

/// Loads role and profile for `user_id`. A user with neither is unknown.
pub fn sign_in(conn: &Connection, user_id: &str) -> StoreResult<Session> {
    let role: Option<Role> = conn
        .query_row(
            "SELECT role FROM user_roles WHERE user_id = ?",
            [user_id],
            |r| r.get(0),
        )
        .optional()
        .map_err(db_err(DbOp::Query, "user_roles"))?;
    let profile = conn
        .query_row(
            "SELECT first_name, last_name, email FROM profiles WHERE user_id = ?",
            [user_id],
            |r| {
                Ok(Profile {
                    first_name: r.get(0)?,
                    last_name: r.get(1)?,
                    email: r.get(2)?,
                })
            },
        )
        .optional()
        .map_err(db_err(DbOp::Query, "profiles"))?;
    if role.is_none() && profile.is_none() {
        return Err(StoreError::NotFound("user"));
    }
    tracing::info!(%user_id, role = ?role, "signed in");
    Ok(Session {
        user_id: user_id.to_string(),
        role,
        profile,
    })
}
