use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::credentials::ValidationError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SoftwareBackground {
    #[serde(rename = "python-ros")]
    PythonRos,
    #[serde(rename = "cpp-low-level")]
    CppLowLevel,
    #[serde(rename = "data-science-ml")]
    DataScienceMl,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HardwareExperience {
    #[serde(rename = "beginner")]
    Beginner,
    #[serde(rename = "intermediate-jetson")]
    IntermediateJetson,
    #[serde(rename = "expert-fullstack")]
    ExpertFullstack,
}

impl SoftwareBackground {
    pub const ALL: [SoftwareBackground; 3] = [Self::PythonRos, Self::CppLowLevel, Self::DataScienceMl];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PythonRos => "python-ros",
            Self::CppLowLevel => "cpp-low-level",
            Self::DataScienceMl => "data-science-ml",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::PythonRos => "Python/ROS Focused",
            Self::CppLowLevel => "C++/Low-Level Focused",
            Self::DataScienceMl => "Data Science/ML Focused",
        }
    }
}

impl HardwareExperience {
    pub const ALL: [HardwareExperience; 3] = [Self::Beginner, Self::IntermediateJetson, Self::ExpertFullstack];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Beginner => "beginner",
            Self::IntermediateJetson => "intermediate-jetson",
            Self::ExpertFullstack => "expert-fullstack",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Beginner => "Beginner/Theoretical",
            Self::IntermediateJetson => "Intermediate/Edge Devices (Jetson)",
            Self::ExpertFullstack => "Expert/Full Stack Robotics",
        }
    }
}

impl FromStr for SoftwareBackground {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|v| v.as_str() == s.trim())
            .ok_or_else(|| ValidationError::UnknownSoftwareBackground(s.to_string()))
    }
}

impl FromStr for HardwareExperience {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|v| v.as_str() == s.trim())
            .ok_or_else(|| ValidationError::UnknownHardwareExperience(s.to_string()))
    }
}

impl fmt::Display for SoftwareBackground {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

impl fmt::Display for HardwareExperience {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

/// Learning profile used downstream for content personalization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    pub software_background: SoftwareBackground,
    pub hardware_experience: HardwareExperience,
}

impl Profile {
    pub fn new(software_background: SoftwareBackground, hardware_experience: HardwareExperience) -> Self {
        Self { software_background, hardware_experience }
    }

    /// Parses both fields from their wire names, e.g. `("python-ros", "beginner")`.
    pub fn parse(software: &str, hardware: &str) -> Result<Self, ValidationError> {
        Ok(Self::new(software.parse()?, hardware.parse()?))
    }
}
