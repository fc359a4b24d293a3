use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub input_file: String,
    pub output_directory: String,
    pub capacity_mode: CapacityMode,
    pub override_margin: i32,
    // Seats per department, used only in manual mode
    pub manual_capacities: HashMap<String, u32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CapacityMode {
    #[serde(rename = "equal")]
    Equal,
    #[serde(rename = "manual")]
    Manual,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            input_file: "students.csv".to_string(),
            output_directory: "output".to_string(),
            capacity_mode: CapacityMode::Equal,
            override_margin: 5,
            manual_capacities: HashMap::new(),
        }
    }
}

impl Config {
    pub fn load_from_file(file_path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(file_path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    pub fn save_to_file(&self, file_path: &str) -> anyhow::Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(file_path, content)?;
        Ok(())
    }
}

/// Admission channel. Each channel is allocated fully independently:
/// capacities are never shared across channels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Channel {
    #[serde(rename = "general")]
    General,
    #[serde(rename = "martyrs_kin")]
    MartyrsKin,
    #[serde(rename = "parallel")]
    Parallel,
}

impl Channel {
    pub const ALL: [Channel; 3] = [Channel::General, Channel::MartyrsKin, Channel::Parallel];

    /// Strict parse of a canonical channel label. Records carrying any other
    /// value are expected to be filtered out during ingestion.
    pub fn parse(value: &str) -> Option<Channel> {
        match value {
            "general" => Some(Channel::General),
            "martyrs_kin" => Some(Channel::MartyrsKin),
            "parallel" => Some(Channel::Parallel),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Channel::General => "general",
            Channel::MartyrsKin => "martyrs_kin",
            Channel::Parallel => "parallel",
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StudentRecord {
    pub id: String,
    pub name: String,
    pub score: f64,
    pub channel: Channel,
    pub preferences: Vec<String>, // ranked, most preferred first
    pub privileged: bool,
    pub note: String,
}

/// Sentinel department label used in exported artifacts for students
/// no eligible department could take.
pub const UNASSIGNED: &str = "unassigned";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AllocatedStudent {
    pub record: StudentRecord,
    pub assigned: Option<String>,
    pub reason: String,
}

impl AllocatedStudent {
    pub fn is_assigned(&self) -> bool {
        self.assigned.is_some()
    }

    pub fn department_label(&self) -> &str {
        self.assigned.as_deref().unwrap_or(UNASSIGNED)
    }
}

/// Resolve a yes/no style cell to the privileged flag
pub fn parse_privileged_flag(value: &str) -> bool {
    matches!(
        value.trim().to_lowercase().as_str(),
        "yes" | "y" | "true" | "1"
    )
}
