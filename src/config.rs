/* Copyright (C) 2022 Antmicro
 * 
 * Licensed under the Apache License, Version 2.0 (the "License");
 * you may not use this file except in compliance with the License.
 * You may obtain a copy of the License at
 * 
 *     https://www.apache.org/licenses/LICENSE-2.0
 * 
 * Unless required by applicable law or agreed to in writing, software
 * distributed under the License is distributed on an "AS IS" BASIS,
 * WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 * See the License for the specific language governing permissions and
 * limitations under the License.
 */

use std::path::Path;
use serde::{Serialize, Deserialize};
use crate::lab::CtrlSetCapacity;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("can't read config file: {0}")]
    CantOpenFile(#[from] std::io::Error),
    #[error("invalid config: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Run options of the device model. Every field may be omitted from the file.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ArchConfig {
    /// Distinct control signals per LAB for every category
    pub capacity: CtrlSetCapacity,
    /// Number of threads used when checking all LABs
    pub threads: usize,
}

impl Default for ArchConfig {
    fn default() -> Self {
        Self {
            capacity: Default::default(),
            threads: 1,
        }
    }
}

impl ArchConfig {
    pub fn from_yaml(text: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_yaml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load<P>(path: P) -> Result<Self, ConfigError> where P: AsRef<Path> {
        Self::from_yaml(&std::fs::read_to_string(path)?)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.threads == 0 {
            return Err(ConfigError::Invalid("`threads` must be at least 1".into()));
        }
        if self.capacity.clk == 0 {
            return Err(ConfigError::Invalid("LABs need at least one clock".into()));
        }
        Ok(())
    }
}
