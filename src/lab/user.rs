use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: u64,
    pub username: String,
    #[serde(default)]
    pub skills: BTreeSet<String>,
    /// Device names this user may operate.
    #[serde(default, alias = "allowed_devices")]
    pub authorized_devices: BTreeSet<String>,
    #[serde(default)]
    pub active_tasks: u32,
    #[serde(default)]
    pub group_id: Option<u64>,
}

impl User {
    pub fn new(id: u64, username: impl Into<String>) -> Self {
        Self {
            id,
            username: username.into(),
            skills: BTreeSet::new(),
            authorized_devices: BTreeSet::new(),
            active_tasks: 0,
            group_id: None,
        }
    }

    pub fn with_skills<I, S>(mut self, skills: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.skills.extend(skills.into_iter().map(Into::into));
        self
    }

    pub fn with_authorized_devices<I, S>(mut self, devices: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.authorized_devices
            .extend(devices.into_iter().map(Into::into));
        self
    }

    pub fn with_group(mut self, group_id: u64) -> Self {
        self.group_id = Some(group_id);
        self
    }

    pub fn has_skill(&self, tag: &str) -> bool {
        self.skills.contains(tag)
    }

    pub fn may_operate(&self, device_name: &str) -> bool {
        self.authorized_devices.contains(device_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_allowed_devices_alias() {
        let user: User = serde_json::from_str(
            r#"{"id": 1, "username": "ylchen", "skills": ["temperature"], "allowed_devices": ["Thermal Box A"]}"#,
        )
        .unwrap();
        assert!(user.may_operate("Thermal Box A"));
        assert_eq!(user.active_tasks, 0);
    }

    #[test]
    fn skill_match_is_case_sensitive() {
        let user = User::new(1, "ylchen").with_skills(["temperature"]);
        assert!(user.has_skill("temperature"));
        assert!(!user.has_skill("Temperature"));
    }
}
