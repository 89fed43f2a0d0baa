// Simulated device state
//
// In-memory hotspot accounts, active sessions, profiles and static board
// facts. Shared by every connection to one mock server.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tiklink_api::{Row, Sentence};

/// Value devices print for a limit that is not set.
const UNLIMITED: &str = "unlimited";

/// A hotspot account as the simulated device stores it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MockAccount {
    pub id: String,
    pub name: String,
    pub password: String,
    pub profile: String,
    pub limit_uptime: Option<String>,
    pub limit_bytes_total: Option<String>,
    pub comment: Option<String>,
    pub uptime: String,
    pub bytes_in: u64,
    pub bytes_out: u64,
}

impl MockAccount {
    pub fn has_limits(&self) -> bool {
        self.limit_uptime.is_some() || self.limit_bytes_total.is_some()
    }

    fn to_row(&self) -> Row {
        let mut row = Row::new();
        row.insert(".id".into(), self.id.clone());
        row.insert("name".into(), self.name.clone());
        row.insert("password".into(), self.password.clone());
        row.insert("profile".into(), self.profile.clone());
        if let Some(limit) = &self.limit_uptime {
            row.insert("limit-uptime".into(), limit.clone());
        }
        if let Some(limit) = &self.limit_bytes_total {
            row.insert("limit-bytes-total".into(), limit.clone());
        }
        if let Some(comment) = &self.comment {
            row.insert("comment".into(), comment.clone());
        }
        row.insert("uptime".into(), self.uptime.clone());
        row.insert("bytes-in".into(), self.bytes_in.to_string());
        row.insert("bytes-out".into(), self.bytes_out.to_string());
        row.insert("disabled".into(), "false".into());
        row
    }
}

/// A logged-in hotspot client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MockActive {
    pub id: String,
    pub user: String,
    pub address: String,
    pub mac_address: String,
    pub uptime: String,
    pub bytes_in: u64,
    pub bytes_out: u64,
}

impl MockActive {
    fn to_row(&self) -> Row {
        Row::from([
            (".id".into(), self.id.clone()),
            ("user".into(), self.user.clone()),
            ("address".into(), self.address.clone()),
            ("mac-address".into(), self.mac_address.clone()),
            ("uptime".into(), self.uptime.clone()),
            ("bytes-in".into(), self.bytes_in.to_string()),
            ("bytes-out".into(), self.bytes_out.to_string()),
        ])
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MockProfile {
    pub id: String,
    pub name: String,
    pub shared_users: u32,
}

impl MockProfile {
    fn to_row(&self) -> Row {
        Row::from([
            (".id".into(), self.id.clone()),
            ("name".into(), self.name.clone()),
            ("shared-users".into(), self.shared_users.to_string()),
        ])
    }
}

/// Static identity and hardware facts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceFacts {
    pub identity: String,
    pub model: String,
    pub serial_number: String,
    pub firmware: String,
    pub board_name: String,
    pub total_memory: u64,
    pub uptime: String,
}

impl Default for DeviceFacts {
    fn default() -> Self {
        Self {
            identity: "MockRouterOS".into(),
            model: "RB750Gr3".into(),
            serial_number: "MOCK-12345678".into(),
            firmware: "6.49.7".into(),
            board_name: "RB750Gr3".into(),
            total_memory: 262_144_000,
            uptime: "5d 12h 30m 15s".into(),
        }
    }
}

/// Result of applying one command to the device state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Outcome {
    /// `!re` per row, then `!done`.
    Rows(Vec<Row>),
    /// `!done =ret=<value>`.
    Created(String),
    /// Bare `!done`.
    Done,
    /// `!trap =message=<text>` then `!done`.
    Trap(String),
}

/// Everything one simulated device knows.
#[derive(Debug, Clone)]
pub struct DeviceState {
    facts: DeviceFacts,
    accounts: Vec<MockAccount>,
    active: Vec<MockActive>,
    profiles: Vec<MockProfile>,
}

impl Default for DeviceState {
    fn default() -> Self {
        Self::new(DeviceFacts::default())
    }
}

impl DeviceState {
    /// A fresh device with one `default` profile.
    pub fn new(facts: DeviceFacts) -> Self {
        let mut state = Self {
            facts,
            accounts: Vec::new(),
            active: Vec::new(),
            profiles: Vec::new(),
        };
        let id = state.fresh_id();
        state.profiles.push(MockProfile {
            id,
            name: "default".into(),
            shared_users: 1,
        });
        state
    }

    pub fn facts(&self) -> &DeviceFacts {
        &self.facts
    }

    pub fn accounts(&self) -> &[MockAccount] {
        &self.accounts
    }

    pub fn active_sessions(&self) -> &[MockActive] {
        &self.active
    }

    pub fn profiles(&self) -> &[MockProfile] {
        &self.profiles
    }

    pub fn account(&self, name: &str) -> Option<&MockAccount> {
        self.accounts.iter().find(|a| a.name == name)
    }

    /// Apply one authenticated command.
    pub(crate) fn apply(&mut self, command: &Sentence) -> Outcome {
        let path = command.head().unwrap_or_default();
        let outcome = match path {
            "/ip/hotspot/user/print" => Outcome::Rows(self.accounts.iter().map(MockAccount::to_row).collect()),
            "/ip/hotspot/user/add" => self.add_account(command),
            "/ip/hotspot/user/remove" => self.remove_account(command),
            "/ip/hotspot/active/print" => Outcome::Rows(self.active.iter().map(MockActive::to_row).collect()),
            "/ip/hotspot/user/profile/print" => {
                Outcome::Rows(self.profiles.iter().map(MockProfile::to_row).collect())
            }
            "/ip/hotspot/user/profile/add" => self.add_profile(command),
            "/system/identity/print" => Outcome::Rows(vec![Row::from([(
                "name".into(),
                self.facts.identity.clone(),
            )])]),
            "/system/routerboard/print" => Outcome::Rows(vec![self.board_row()]),
            "/system/resource/print" => Outcome::Rows(vec![self.resource_row()]),
            _ => Outcome::Done,
        };

        match outcome {
            Outcome::Rows(rows) => Outcome::Rows(filter_rows(rows, &command.queries())),
            other => other,
        }
    }

    fn add_account(&mut self, command: &Sentence) -> Outcome {
        let Some(name) = command.attribute("name").filter(|n| !n.is_empty()) else {
            return Outcome::Trap("missing value for name".into());
        };
        if self.account(name).is_some() {
            return Outcome::Trap("failure: already have user with this name".into());
        }
        let profile = command.attribute("profile").unwrap_or("default");
        if !self.profiles.iter().any(|p| p.name == profile) {
            return Outcome::Trap(format!("input does not match any value of profile: {profile}"));
        }

        let account = MockAccount {
            id: self.fresh_id(),
            name: name.to_owned(),
            password: command.attribute("password").unwrap_or(name).to_owned(),
            profile: profile.to_owned(),
            limit_uptime: limit(command.attribute("limit-uptime")),
            limit_bytes_total: limit(command.attribute("limit-bytes-total")),
            comment: command.attribute("comment").map(str::to_owned),
            uptime: "0s".into(),
            bytes_in: 0,
            bytes_out: 0,
        };

        if account.has_limits() {
            let active = MockActive {
                id: self.fresh_id(),
                user: account.name.clone(),
                address: format!("192.168.88.{}", fastrand::u8(1..=254)),
                mac_address: random_mac(),
                uptime: "0s".into(),
                bytes_in: 0,
                bytes_out: 0,
            };
            tracing::debug!(user = %active.user, address = %active.address, "active session materialized");
            self.active.push(active);
        }

        let id = account.id.clone();
        tracing::info!(name = %account.name, id = %id, profile = %account.profile, "account added");
        self.accounts.push(account);
        Outcome::Created(id)
    }

    fn remove_account(&mut self, command: &Sentence) -> Outcome {
        let Some(ids) = command
            .attribute(".id")
            .or_else(|| command.attribute("numbers"))
            .filter(|v| !v.is_empty())
        else {
            return Outcome::Trap("missing value for .id".into());
        };

        // Validate the whole list before removing anything.
        let ids: Vec<&str> = ids.split(',').collect();
        if let Some(missing) = ids.iter().find(|id| !self.accounts.iter().any(|a| a.id == **id)) {
            return Outcome::Trap(format!("no such item ({missing})"));
        }

        for id in ids {
            if let Some(pos) = self.accounts.iter().position(|a| a.id == id) {
                let account = self.accounts.remove(pos);
                self.active.retain(|s| s.user != account.name);
                tracing::info!(name = %account.name, id, "account removed");
            }
        }
        Outcome::Done
    }

    fn add_profile(&mut self, command: &Sentence) -> Outcome {
        let Some(name) = command.attribute("name").filter(|n| !n.is_empty()) else {
            return Outcome::Trap("missing value for name".into());
        };
        if self.profiles.iter().any(|p| p.name == name) {
            return Outcome::Trap("failure: already have profile with this name".into());
        }
        let shared_users = match command.attribute("shared-users").map(str::parse::<u32>) {
            None => 1,
            Some(Ok(n)) => n,
            Some(Err(_)) => return Outcome::Trap("invalid value for argument shared-users".into()),
        };

        let profile = MockProfile {
            id: self.fresh_id(),
            name: name.to_owned(),
            shared_users,
        };
        let id = profile.id.clone();
        tracing::info!(name = %profile.name, shared_users, "profile added");
        self.profiles.push(profile);
        Outcome::Created(id)
    }

    fn board_row(&self) -> Row {
        Row::from([
            ("routerboard".into(), "true".into()),
            ("model".into(), self.facts.model.clone()),
            ("serial-number".into(), self.facts.serial_number.clone()),
            ("current-firmware".into(), self.facts.firmware.clone()),
            ("upgrade-firmware".into(), self.facts.firmware.clone()),
        ])
    }

    /// Live counters jitter on every read.
    fn resource_row(&self) -> Row {
        Row::from([
            ("uptime".into(), self.facts.uptime.clone()),
            ("version".into(), format!("{} (stable)", self.facts.firmware)),
            ("board-name".into(), self.facts.board_name.clone()),
            ("cpu-load".into(), fastrand::u8(10..=40).to_string()),
            (
                "free-memory".into(),
                fastrand::u64(150_000_000..200_000_000).to_string(),
            ),
            ("total-memory".into(), self.facts.total_memory.to_string()),
        ])
    }

    /// A `*XXXXXXXX` item id not used by any account, session or profile.
    fn fresh_id(&self) -> String {
        loop {
            let id = format!("*{:08X}", fastrand::u32(..));
            let taken = self.accounts.iter().any(|a| a.id == id)
                || self.active.iter().any(|s| s.id == id)
                || self.profiles.iter().any(|p| p.id == id);
            if !taken {
                return id;
            }
        }
    }
}

fn limit(value: Option<&str>) -> Option<String> {
    value
        .filter(|v| !v.is_empty() && *v != UNLIMITED)
        .map(str::to_owned)
}

fn random_mac() -> String {
    (0..6)
        .map(|_| format!("{:02X}", fastrand::u8(..)))
        .collect::<Vec<_>>()
        .join(":")
}

/// Keep rows matching every `?key=value` filter; `?key` alone tests presence.
fn filter_rows(rows: Vec<Row>, queries: &[(&str, &str)]) -> Vec<Row> {
    if queries.is_empty() {
        return rows;
    }
    rows.into_iter()
        .filter(|row| {
            queries.iter().all(|(key, value)| match row.get(*key) {
                Some(actual) => value.is_empty() || actual == value,
                None => false,
            })
        })
        .collect()
}

/// Device state shared between the server and test assertions.
#[derive(Debug, Clone, Default)]
pub struct SharedState(Arc<Mutex<DeviceState>>);

impl SharedState {
    pub fn new(state: DeviceState) -> Self {
        Self(Arc::new(Mutex::new(state)))
    }

    /// Lock the state. A panicked holder cannot leave it half-written, so
    /// poisoning is ignored.
    pub fn lock(&self) -> MutexGuard<'_, DeviceState> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Clone the current state for inspection.
    pub fn snapshot(&self) -> DeviceState {
        self.lock().clone()
    }
}
