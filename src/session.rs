use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Leader,
    Member,
}

impl Role {
    /// Admins and group leaders hand out work; members only carry it out.
    pub fn can_assign(&self) -> bool {
        matches!(self, Role::Admin | Role::Leader)
    }

    pub fn can_manage_devices(&self) -> bool {
        matches!(self, Role::Admin | Role::Leader)
    }

    pub fn can_manage_users(&self) -> bool {
        matches!(self, Role::Admin)
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::Admin => write!(f, "admin"),
            Role::Leader => write!(f, "leader"),
            Role::Member => write!(f, "member"),
        }
    }
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "admin" => Ok(Role::Admin),
            "leader" => Ok(Role::Leader),
            "member" => Ok(Role::Member),
            other => Err(format!("unknown role: {other}")),
        }
    }
}

/// Who is acting. Passed explicitly into every operation that needs it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub user_id: u64,
    pub role: Role,
    pub group_id: Option<u64>,
}

impl Session {
    pub fn new(user_id: u64, role: Role) -> Self {
        Self {
            user_id,
            role,
            group_id: None,
        }
    }

    pub fn with_group(mut self, group_id: u64) -> Self {
        self.group_id = Some(group_id);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_parsing() {
        assert_eq!(" Leader ".parse::<Role>(), Ok(Role::Leader));
        assert_eq!("admin".parse::<Role>(), Ok(Role::Admin));
        assert!("guest".parse::<Role>().is_err());
    }

    #[test]
    fn role_permissions() {
        assert!(Role::Admin.can_assign());
        assert!(Role::Leader.can_assign());
        assert!(!Role::Member.can_assign());
        assert!(Role::Admin.can_manage_users());
        assert!(!Role::Leader.can_manage_users());
    }
}
