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

use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use serde::{Serialize, Deserialize};

use crate::arch::Arch;
use crate::cells::{Cell, CellPlacement, PortConn};
use crate::lab::{HalfPin, NetId};
use super::{read_document, OpenError, OpenOpts};

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PortDesc {
    Net(String),
    Driven { net: String, driver: String },
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CellDesc {
    pub name: String,
    #[serde(rename = "type")]
    pub cell_type: String,
    #[serde(default)]
    pub ports: BTreeMap<String, PortDesc>,
    #[serde(default)]
    pub inverted: Vec<String>,
    #[serde(default)]
    pub fixed_pins: BTreeMap<String, HalfPin>,
    #[serde(default)]
    pub init: u64,
    #[serde(default)]
    pub placement: Option<CellPlacement>,
}

/// Packed and placed cells, as produced by a packer.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct PackingFile {
    pub cells: Vec<CellDesc>,
}

/// Cells of a packing file with nets numbered in order of appearance.
pub struct ResolvedPacking {
    pub cells: Vec<Cell>,
    pub net_names: Vec<String>,
}

impl PackingFile {
    pub fn open<P>(path: P, opts: &OpenOpts) -> Result<Self, OpenError> where
        P: AsRef<Path>
    {
        read_document(path, opts)
    }

    /// Resolves driver wire names against `arch`.
    pub fn resolve(&self, arch: &Arch) -> Result<ResolvedPacking, OpenError> {
        let mut net_ids: HashMap<&str, NetId> = HashMap::new();
        let mut net_names = Vec::new();
        let mut cells = Vec::with_capacity(self.cells.len());

        for desc in &self.cells {
            let mut cell = Cell::new(&desc.name, &desc.cell_type);
            for (port, port_desc) in &desc.ports {
                let (net, driver) = match port_desc {
                    PortDesc::Net(net) => (net.as_str(), None),
                    PortDesc::Driven { net, driver } => {
                        let wire = arch.wire_by_name(driver).ok_or_else(|| OpenError::Invalid(
                            format!("cell {} port {}: unknown wire {}", desc.name, port, driver)
                        ))?;
                        (net.as_str(), Some(wire))
                    },
                };
                let net = *net_ids.entry(net).or_insert_with(|| {
                    net_names.push(net.to_string());
                    (net_names.len() - 1) as NetId
                });
                cell.ports.insert(port.clone(), PortConn { net, driver });
            }
            cell.inverted_ports = desc.inverted.iter().cloned().collect();
            cell.fixed_pins = desc.fixed_pins.iter()
                .map(|(port, pin)| (port.clone(), *pin))
                .collect();
            cell.lut_init = desc.init;
            cell.placement = desc.placement;
            cells.push(cell);
        }

        Ok(ResolvedPacking { cells, net_names })
    }
}
