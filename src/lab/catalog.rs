use std::collections::{BTreeSet, HashMap};
use std::path::Path;

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::eligibility::{validate_task, InvalidInputError};
use crate::error::{LabError, Result};
use crate::lab::device::{Device, DeviceStatus};
use crate::lab::task::{Task, TaskStatus};
use crate::lab::user::User;

/// Initial contents of a catalog.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Seed {
    #[serde(default)]
    pub tasks: Vec<Task>,
    #[serde(default)]
    pub users: Vec<User>,
    #[serde(default)]
    pub devices: Vec<Device>,
}

impl Seed {
    pub async fn load(path: &Path) -> Result<Self> {
        let data = tokio::fs::read(path).await?;
        Ok(serde_json::from_slice(&data)?)
    }

    /// A small lab with two testers, two devices and two tasks.
    pub fn demo() -> Self {
        let at = |d: u32, h: u32| -> DateTime<Utc> {
            Utc.with_ymd_and_hms(2024, 1, d, h, 0, 0)
                .single()
                .unwrap_or_default()
        };

        let mut assigned = Task::new(
            1,
            "Temperature stress test - sample A".to_string(),
            "temperature".to_string(),
            at(20, 17),
        )
        .with_instructions("Cycle between -40C and 85C".to_string());
        assigned.status = TaskStatus::Assigned;
        assigned.assigned_user = Some(1);
        assigned.assigned_devices = vec![1];
        assigned.created_at = at(15, 10);

        let mut open = Task::new(
            2,
            "Electrical performance analysis".to_string(),
            "electrical".to_string(),
            at(22, 17),
        )
        .with_device_count(2)
        .with_instructions("Measure electrical characteristics under varied conditions".to_string());
        open.created_at = at(15, 11);

        let mut chen = User::new(1, "ylchen")
            .with_skills(["temperature", "electrical"])
            .with_authorized_devices(["Thermal Box A", "Oscilloscope A"])
            .with_group(1);
        chen.active_tasks = 2;
        let mut wang = User::new(2, "zmwang")
            .with_skills(["physical", "temperature"])
            .with_authorized_devices(["Universal Testing Machine", "Thermal Box A"])
            .with_group(1);
        wang.active_tasks = 1;

        Self {
            tasks: vec![assigned, open],
            users: vec![chen, wang],
            devices: vec![
                Device::new(1, "Thermal Box A", DeviceStatus::Available)
                    .with_supported_types(["temperature"]),
                Device::new(2, "Oscilloscope A", DeviceStatus::Occupied)
                    .with_supported_types(["electrical"]),
            ],
        }
    }
}

/// Filter for task listings. Search is a case-insensitive substring match
/// on the task name or test type.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TaskFilter {
    pub status: Option<TaskStatus>,
    pub search: Option<String>,
    /// `Some(true)` keeps only overdue tasks, `Some(false)` only the rest.
    pub overdue: Option<bool>,
}

impl TaskFilter {
    fn matches(&self, task: &Task, now: DateTime<Utc>) -> bool {
        let status_ok = self.status.is_none_or(|s| task.status == s);
        let overdue_ok = self.overdue.is_none_or(|o| task.is_overdue(now) == o);
        let search_ok = match self.search.as_deref().map(str::trim) {
            None | Some("") => true,
            Some(term) => {
                let term = term.to_lowercase();
                task.name.to_lowercase().contains(&term)
                    || task.test_type.to_lowercase().contains(&term)
            }
        };
        status_ok && overdue_ok && search_ok
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewTask {
    pub name: String,
    pub test_type: String,
    pub deadline: DateTime<Utc>,
    #[serde(default = "one")]
    pub device_count: u32,
    #[serde(default)]
    pub instructions: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewUser {
    pub username: String,
    #[serde(default)]
    pub skills: BTreeSet<String>,
    #[serde(default, alias = "allowed_devices")]
    pub authorized_devices: BTreeSet<String>,
    #[serde(default)]
    pub group_id: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewDevice {
    pub name: String,
    #[serde(default)]
    pub supported_types: BTreeSet<String>,
    #[serde(default = "available")]
    pub status: DeviceStatus,
}

fn one() -> u32 {
    1
}

fn available() -> DeviceStatus {
    DeviceStatus::Available
}

/// Key seed records by id, refusing duplicates.
fn index_by_id<T>(kind: &str, items: Vec<T>, id: impl Fn(&T) -> u64) -> Result<HashMap<u64, T>> {
    let mut map = HashMap::with_capacity(items.len());
    for item in items {
        let key = id(&item);
        if map.insert(key, item).is_some() {
            return Err(LabError::InvalidSeed(format!("duplicate {kind} id {key}")));
        }
    }
    Ok(map)
}

fn next_id<T>(kind: &'static str, map: &HashMap<u64, T>) -> Result<u64> {
    match map.keys().max() {
        None => Ok(1),
        Some(max) => max.checked_add(1).ok_or(LabError::IdsExhausted(kind)),
    }
}

/// In-memory snapshot of tasks, users and devices.
///
/// Every mutation bumps `revision`, which callers quote back when
/// committing to detect that the data they evaluated against has changed.
#[derive(Debug, Default)]
pub struct Catalog {
    tasks: HashMap<u64, Task>,
    users: HashMap<u64, User>,
    devices: HashMap<u64, Device>,
    revision: u64,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a catalog from seed data, rejecting duplicate ids and records
    /// the evaluator could not work with.
    pub fn from_seed(seed: Seed) -> Result<Self> {
        for task in &seed.tasks {
            validate_task(task)
                .map_err(|e| LabError::InvalidSeed(format!("task {}: {e}", task.id)))?;
        }
        if let Some(device) = seed.devices.iter().find(|d| d.name.trim().is_empty()) {
            return Err(LabError::InvalidSeed(format!(
                "device {}: {}",
                device.id,
                InvalidInputError::MissingDeviceName(device.id)
            )));
        }

        Ok(Self {
            tasks: index_by_id("task", seed.tasks, |t| t.id)?,
            users: index_by_id("user", seed.users, |u| u.id)?,
            devices: index_by_id("device", seed.devices, |d| d.id)?,
            revision: 0,
        })
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub(crate) fn bump_revision(&mut self) {
        self.revision += 1;
    }

    pub fn task(&self, id: u64) -> Result<&Task> {
        self.tasks.get(&id).ok_or(LabError::TaskNotFound(id))
    }

    pub fn user(&self, id: u64) -> Result<&User> {
        self.users.get(&id).ok_or(LabError::UserNotFound(id))
    }

    pub fn device(&self, id: u64) -> Result<&Device> {
        self.devices.get(&id).ok_or(LabError::DeviceNotFound(id))
    }

    pub(crate) fn task_mut(&mut self, id: u64) -> Result<&mut Task> {
        self.tasks.get_mut(&id).ok_or(LabError::TaskNotFound(id))
    }

    pub(crate) fn user_mut(&mut self, id: u64) -> Result<&mut User> {
        self.users.get_mut(&id).ok_or(LabError::UserNotFound(id))
    }

    pub(crate) fn device_mut(&mut self, id: u64) -> Result<&mut Device> {
        self.devices.get_mut(&id).ok_or(LabError::DeviceNotFound(id))
    }

    /// Tasks matching `filter`, ordered by id.
    pub fn tasks(&self, filter: &TaskFilter) -> Vec<&Task> {
        let now = Utc::now();
        let mut tasks: Vec<&Task> = self
            .tasks
            .values()
            .filter(|t| filter.matches(t, now))
            .collect();
        tasks.sort_by_key(|t| t.id);
        tasks
    }

    /// Tasks currently assigned to a user, ordered by deadline.
    pub fn tasks_for_user(&self, user_id: u64) -> Vec<&Task> {
        let mut tasks: Vec<&Task> = self
            .tasks
            .values()
            .filter(|t| t.assigned_user == Some(user_id))
            .collect();
        tasks.sort_by_key(|t| (t.deadline, t.id));
        tasks
    }

    /// Assigned or in-progress tasks holding `device_id`.
    pub fn bookings(&self, device_id: u64) -> Vec<&Task> {
        let mut tasks: Vec<&Task> = self
            .tasks
            .values()
            .filter(|t| matches!(t.status, TaskStatus::Assigned | TaskStatus::InProgress))
            .filter(|t| t.assigned_devices.contains(&device_id))
            .collect();
        tasks.sort_by_key(|t| t.id);
        tasks
    }

    pub fn users(&self) -> Vec<&User> {
        let mut users: Vec<&User> = self.users.values().collect();
        users.sort_by_key(|u| u.id);
        users
    }

    pub fn devices(&self) -> Vec<&Device> {
        let mut devices: Vec<&Device> = self.devices.values().collect();
        devices.sort_by_key(|d| d.id);
        devices
    }

    pub fn create_task(&mut self, new: NewTask) -> Result<&Task> {
        if new.name.trim().is_empty() {
            return Err(InvalidInputError::MissingReference("name").into());
        }
        if new.test_type.trim().is_empty() {
            return Err(InvalidInputError::MissingRequiredType.into());
        }
        if new.device_count == 0 {
            return Err(InvalidInputError::ZeroDeviceCount.into());
        }

        let id = next_id("task", &self.tasks)?;
        let task = Task::new(id, new.name, new.test_type, new.deadline)
            .with_device_count(new.device_count)
            .with_instructions(new.instructions);
        self.bump_revision();
        tracing::info!(task_id = id, test_type = %task.test_type, "Task created");
        Ok(self.tasks.entry(id).or_insert(task))
    }

    pub fn create_user(&mut self, new: NewUser) -> Result<&User> {
        if new.username.trim().is_empty() {
            return Err(InvalidInputError::MissingReference("username").into());
        }

        let id = next_id("user", &self.users)?;
        let user = User {
            id,
            username: new.username,
            skills: new.skills,
            authorized_devices: new.authorized_devices,
            active_tasks: 0,
            group_id: new.group_id,
        };
        self.bump_revision();
        tracing::info!(user_id = id, "User created");
        Ok(self.users.entry(id).or_insert(user))
    }

    pub fn create_device(&mut self, new: NewDevice) -> Result<&Device> {
        let id = next_id("device", &self.devices)?;
        if new.name.trim().is_empty() {
            return Err(InvalidInputError::MissingDeviceName(id).into());
        }

        let device = Device {
            id,
            name: new.name,
            supported_types: new.supported_types,
            status: new.status,
        };
        self.bump_revision();
        tracing::info!(device_id = id, name = %device.name, "Device created");
        Ok(self.devices.entry(id).or_insert(device))
    }

    pub fn set_device_status(&mut self, id: u64, status: DeviceStatus) -> Result<&Device> {
        let device = self.devices.get_mut(&id).ok_or(LabError::DeviceNotFound(id))?;
        let previous = device.status;
        device.status = status;
        self.revision += 1;
        tracing::info!(device_id = id, from = %previous, to = %status, "Device status changed");
        self.device(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn demo_seed_round_trips_through_catalog() {
        let catalog = Catalog::from_seed(Seed::demo()).unwrap();
        assert_eq!(catalog.tasks(&TaskFilter::default()).len(), 2);
        assert_eq!(catalog.users().len(), 2);
        assert_eq!(catalog.device(2).unwrap().status, DeviceStatus::Occupied);
        assert_eq!(catalog.revision(), 0);
    }

    #[test]
    fn filter_by_status_and_search() {
        let catalog = Catalog::from_seed(Seed::demo()).unwrap();

        let unassigned = catalog.tasks(&TaskFilter {
            status: Some(TaskStatus::Unassigned),
            search: None,
            ..TaskFilter::default()
        });
        assert_eq!(unassigned.len(), 1);
        assert_eq!(unassigned[0].id, 2);

        let search = catalog.tasks(&TaskFilter {
            status: None,
            search: Some("TEMPERATURE".to_string()),
            ..TaskFilter::default()
        });
        assert_eq!(search.len(), 1);
        assert_eq!(search[0].id, 1);

        let blank = catalog.tasks(&TaskFilter {
            status: None,
            search: Some("  ".to_string()),
            ..TaskFilter::default()
        });
        assert_eq!(blank.len(), 2);
    }

    #[test]
    fn create_task_assigns_next_id_and_bumps_revision() {
        let mut catalog = Catalog::from_seed(Seed::demo()).unwrap();
        let task = catalog
            .create_task(NewTask {
                name: "Tensile test".to_string(),
                test_type: "physical".to_string(),
                deadline: Utc::now(),
                device_count: 1,
                instructions: String::new(),
            })
            .unwrap();
        assert_eq!(task.id, 3);
        assert_eq!(task.status, TaskStatus::Unassigned);
        assert_eq!(catalog.revision(), 1);
    }

    #[test]
    fn create_task_rejects_missing_type() {
        let mut catalog = Catalog::new();
        let err = catalog
            .create_task(NewTask {
                name: "Tensile test".to_string(),
                test_type: "".to_string(),
                deadline: Utc::now(),
                device_count: 1,
                instructions: String::new(),
            })
            .unwrap_err();
        assert!(matches!(
            err,
            LabError::InvalidInput(InvalidInputError::MissingRequiredType)
        ));
        assert_eq!(catalog.revision(), 0);
    }

    #[test]
    fn set_device_status_unknown_device() {
        let mut catalog = Catalog::new();
        assert!(matches!(
            catalog.set_device_status(4, DeviceStatus::Maintenance),
            Err(LabError::DeviceNotFound(4))
        ));
    }

    #[test]
    fn tasks_for_user_only_returns_their_work() {
        let catalog = Catalog::from_seed(Seed::demo()).unwrap();
        let mine = catalog.tasks_for_user(1);
        assert_eq!(mine.len(), 1);
        assert_eq!(mine[0].id, 1);
        assert!(catalog.tasks_for_user(2).is_empty());
    }

    #[test]
    fn seed_with_duplicate_ids_is_rejected() {
        let mut seed = Seed::demo();
        seed.users.push(User::new(2, "impostor"));
        let err = Catalog::from_seed(seed).unwrap_err();
        assert!(matches!(err, LabError::InvalidSeed(ref msg) if msg == "duplicate user id 2"));
        assert_eq!(err.code(), "SEED_ERROR");
    }

    #[test]
    fn seed_with_untyped_task_is_rejected() {
        let mut seed = Seed::demo();
        seed.tasks[1].test_type = String::new();
        seed.tasks[1].device_count = 0;
        assert!(matches!(
            Catalog::from_seed(seed),
            Err(LabError::InvalidSeed(msg)) if msg.starts_with("task 2:")
        ));
    }

    #[test]
    fn seed_with_nameless_device_is_rejected() {
        let mut seed = Seed::demo();
        seed.devices.push(Device::new(7, " ", DeviceStatus::Available));
        assert!(matches!(
            Catalog::from_seed(seed),
            Err(LabError::InvalidSeed(msg)) if msg.starts_with("device 7:")
        ));
    }

    #[test]
    fn ids_run_out_instead_of_wrapping() {
        let mut seed = Seed::demo();
        seed.devices.push(Device::new(u64::MAX, "Last Box", DeviceStatus::Available));
        let mut catalog = Catalog::from_seed(seed).unwrap();
        let err = catalog
            .create_device(NewDevice {
                name: "One more".to_string(),
                supported_types: BTreeSet::new(),
                status: DeviceStatus::Available,
            })
            .unwrap_err();
        assert!(matches!(err, LabError::IdsExhausted("device")));
        assert_eq!(catalog.revision(), 0);
    }

    #[test]
    fn overdue_filter_uses_deadline_and_status() {
        let mut catalog = Catalog::from_seed(Seed::demo()).unwrap();
        let future = catalog
            .create_task(NewTask {
                name: "Humidity soak".to_string(),
                test_type: "humidity".to_string(),
                deadline: Utc::now() + chrono::Duration::days(30),
                device_count: 1,
                instructions: String::new(),
            })
            .unwrap()
            .id;

        let overdue = catalog.tasks(&TaskFilter {
            overdue: Some(true),
            ..TaskFilter::default()
        });
        assert_eq!(overdue.iter().map(|t| t.id).collect::<Vec<_>>(), vec![1, 2]);

        let on_time = catalog.tasks(&TaskFilter {
            overdue: Some(false),
            ..TaskFilter::default()
        });
        assert_eq!(on_time.iter().map(|t| t.id).collect::<Vec<_>>(), vec![future]);
    }

    #[test]
    fn bookings_list_active_holders() {
        let catalog = Catalog::from_seed(Seed::demo()).unwrap();
        let holders = catalog.bookings(1);
        assert_eq!(holders.len(), 1);
        assert_eq!(holders[0].id, 1);
        assert!(catalog.bookings(2).is_empty());
    }
}
