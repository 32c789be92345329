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

use std::collections::HashMap;
use std::path::Path;
use serde::{Serialize, Deserialize};

use crate::arch::GeometryOracle;
use crate::graph::{parse_native_name, WirePos};
use super::{read_document, OpenError, OpenOpts};

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct WireTypeDesc {
    pub index: u8,
    pub name: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PipDesc {
    pub src: String,
    pub dst: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LabDesc {
    pub x: u8,
    pub y: u8,
    /// Native wires feeding the LAB's local interconnect
    #[serde(default)]
    pub inputs: Vec<String>,
}

/// Device description file. Wires are given by their native names
/// (`<TYPE>.<x>.<y>.<z>`).
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DeviceDescription {
    pub name: String,
    pub width: u8,
    pub height: u8,
    pub wire_types: Vec<WireTypeDesc>,
    #[serde(default)]
    pub wires: Vec<String>,
    #[serde(default)]
    pub pips: Vec<PipDesc>,
    #[serde(default)]
    pub labs: Vec<LabDesc>,
}

/// Device description with all wire names resolved to positions.
#[derive(Clone, Debug)]
pub struct DeviceGeometry {
    name: String,
    size: (u8, u8),
    wire_types: Vec<(u8, String)>,
    wires: Vec<WirePos>,
    pips: Vec<(WirePos, WirePos)>,
    labs: Vec<(u8, u8)>,
    lab_inputs: HashMap<(u8, u8), Vec<WirePos>>,
}

impl DeviceDescription {
    pub fn open<P>(path: P, opts: &OpenOpts) -> Result<Self, OpenError> where
        P: AsRef<Path>
    {
        read_document(path, opts)
    }

    pub fn resolve(&self) -> Result<DeviceGeometry, OpenError> {
        let types: HashMap<&str, u8> = self.wire_types.iter()
            .map(|ty| (ty.name.as_str(), ty.index))
            .collect();
        let wire = |name: &str| -> Result<WirePos, OpenError> {
            parse_native_name(name, |ty| types.get(ty).copied())
                .ok_or_else(|| OpenError::Invalid(format!("bad wire name {}", name)))
        };

        let mut lab_inputs = HashMap::new();
        for lab in &self.labs {
            if lab.x >= self.width || lab.y >= self.height {
                return Err(OpenError::Invalid(
                    format!("LAB X{}Y{} is outside of the device grid", lab.x, lab.y)
                ));
            }
            let inputs = lab.inputs.iter()
                .map(|name| wire(name))
                .collect::<Result<Vec<_>, _>>()?;
            lab_inputs.insert((lab.x, lab.y), inputs);
        }

        Ok(DeviceGeometry {
            name: self.name.clone(),
            size: (self.width, self.height),
            wire_types: self.wire_types.iter()
                .map(|ty| (ty.index, ty.name.clone()))
                .collect(),
            wires: self.wires.iter()
                .map(|name| wire(name))
                .collect::<Result<_, _>>()?,
            pips: self.pips.iter()
                .map(|pip| Ok((wire(&pip.src)?, wire(&pip.dst)?)))
                .collect::<Result<_, OpenError>>()?,
            labs: self.labs.iter().map(|lab| (lab.x, lab.y)).collect(),
            lab_inputs,
        })
    }
}

impl GeometryOracle for DeviceGeometry {
    fn device_name(&self) -> &str {
        &self.name
    }

    fn grid_size(&self) -> (u8, u8) {
        self.size
    }

    fn wire_type_names(&self) -> Vec<(u8, String)> {
        self.wire_types.clone()
    }

    fn native_wires(&self) -> Vec<WirePos> {
        self.wires.clone()
    }

    fn native_pips(&self) -> Vec<(WirePos, WirePos)> {
        self.pips.clone()
    }

    fn lab_locations(&self) -> Vec<(u8, u8)> {
        self.labs.clone()
    }

    fn lab_input_wires(&self, x: u8, y: u8) -> Vec<WirePos> {
        self.lab_inputs.get(&(x, y)).cloned().unwrap_or_default()
    }
}
