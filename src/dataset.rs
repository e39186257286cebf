//! Deterministic fixture payloads.
//!
//! A payload is a list of user records:
//!
//! ```text
//! { "users": [ { "id": 1, "name": "User_0", "role": "admin" }, ... ] }
//! ```
//!
//! Record `i` (zero based) has `id = i + 1`, `name = "User_{i}"` and cycles
//! through [`ROLES`]. The same `count` always produces the same payload, so
//! encoded sizes and digests are comparable across runs and machines.

use rayon::prelude::*;
use serde::de::{self, Deserializer, Visitor};
use serde::{Deserialize, Serialize, Serializer};
use std::fmt;

/// Default payload size, matching the quick profile.
pub const DEFAULT_USERS: usize = 5_000;

/// Role values in generation order.
pub const ROLES: [Role; 4] = [Role::Admin, Role::User, Role::Moderator, Role::Superuser];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    Admin,
    User,
    Moderator,
    Superuser,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::User => "user",
            Role::Moderator => "moderator",
            Role::Superuser => "superuser",
        }
    }

    pub fn parse(s: &str) -> Option<Role> {
        ROLES.iter().copied().find(|r| r.as_str() == s)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// Roles travel as plain strings in every format (the protobuf schema declares
// `string role`), so they are not encoded as serde enum variants.
impl Serialize for Role {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Role {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct RoleVisitor;

        impl Visitor<'_> for RoleVisitor {
            type Value = Role;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("one of admin, user, moderator, superuser")
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<Role, E> {
                Role::parse(v).ok_or_else(|| E::unknown_variant(v, &ROLE_NAMES))
            }
        }

        deserializer.deserialize_str(RoleVisitor)
    }
}

const ROLE_NAMES: [&str; 4] = ["admin", "user", "moderator", "superuser"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: u64,
    pub name: String,
    pub role: Role,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Payload {
    pub users: Vec<User>,
}

impl Payload {
    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }
}

fn generate_user(index: usize) -> User {
    User {
        id: index as u64 + 1,
        name: format!("User_{index}"),
        role: ROLES[index % ROLES.len()],
    }
}

/// Generate a payload of `count` users.
///
/// Records are built in parallel; `collect` on an indexed range keeps them in
/// index order.
pub fn generate_payload(count: usize) -> Payload {
    let users = (0..count).into_par_iter().map(generate_user).collect();
    Payload { users }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_deterministic() {
        let a = generate_payload(1_000);
        let b = generate_payload(1_000);
        assert_eq!(a, b);
        assert_eq!(a.len(), 1_000);
    }

    #[test]
    fn test_record_layout() {
        let payload = generate_payload(6);
        let first = &payload.users[0];
        assert_eq!(first.id, 1);
        assert_eq!(first.name, "User_0");
        assert_eq!(first.role, Role::Admin);

        let roles: Vec<Role> = payload.users.iter().map(|u| u.role).collect();
        assert_eq!(
            roles,
            vec![
                Role::Admin,
                Role::User,
                Role::Moderator,
                Role::Superuser,
                Role::Admin,
                Role::User
            ]
        );
        assert_eq!(payload.users[5].id, 6);
    }

    #[test]
    fn test_empty_payload() {
        let payload = generate_payload(0);
        assert!(payload.is_empty());
    }

    #[test]
    fn test_role_serializes_as_string() {
        let json = serde_json::to_string(&Role::Moderator).unwrap();
        assert_eq!(json, "\"moderator\"");
        let back: Role = serde_json::from_str("\"superuser\"").unwrap();
        assert_eq!(back, Role::Superuser);
        assert!(serde_json::from_str::<Role>("\"root\"").is_err());
    }
}
