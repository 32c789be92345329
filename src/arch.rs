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

//! Device model: the routing graph, logic elements and LABs of one device,
//! built once from a geometry oracle and queried by the placer and router.

use crate::bels::*;
use crate::config::ArchConfig;
use crate::graph::*;
use crate::lab::{CtrlSetCapacity, LabError, LabInfo};
use crate::strings::{IdString, IdStrings};
#[allow(unused)]
use crate::log::*;

/// Source of raw device facts. Only consulted while the device model is built.
pub trait GeometryOracle {
    fn device_name(&self) -> &str;
    /// Grid width and height in tiles
    fn grid_size(&self) -> (u8, u8);
    /// Native wire types as `(type index, type name)`
    fn wire_type_names(&self) -> Vec<(u8, String)>;
    fn native_wires(&self) -> Vec<WirePos>;
    fn native_pips(&self) -> Vec<(WirePos, WirePos)>;
    fn lab_locations(&self) -> Vec<(u8, u8)>;
    /// Native wires feeding the local interconnect of the LAB at `x`, `y`
    fn lab_input_wires(&self, x: u8, y: u8) -> Vec<WirePos>;
}

#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("routing graph: {0}")]
    Graph(#[from] GraphError),
    #[error("bels: {0}")]
    Bel(#[from] BelError),
    #[error("LAB: {0}")]
    Lab(#[from] LabError),
}

pub struct Arch {
    pub name: String,
    pub strings: IdStrings,
    pub graph: RoutingGraph,
    pub bels: BelStore,
    pub labs: Vec<LabInfo>,
    pub capacity: CtrlSetCapacity,
}

impl Arch {
    /// Creates an empty device model, wire types and wires have to be added manually.
    pub fn empty(name: &str, width: u8, height: u8, config: &ArchConfig) -> Self {
        Self {
            name: name.to_string(),
            strings: IdStrings::new(),
            graph: RoutingGraph::new(),
            bels: BelStore::new(width, height),
            labs: Vec::new(),
            capacity: config.capacity.clone(),
        }
    }

    pub fn new<O>(oracle: &O, config: &ArchConfig) -> Result<Self, BuildError> where
        O: GeometryOracle
    {
        let (width, height) = oracle.grid_size();
        let mut arch = Self::empty(oracle.device_name(), width, height, config);

        for (ty, name) in oracle.wire_type_names() {
            arch.graph.register_wire_type(&mut arch.strings, ty, &name)?;
        }

        for pos in oracle.native_wires() {
            arch.graph.add_wire(&mut arch.strings, pos, None, 0)?;
        }
        for (src, dst) in oracle.native_pips() {
            arch.graph.add_pip(WireId::from_pos(src)?, WireId::from_pos(dst)?)?;
        }
        dbg_log!(
            DBG_INFO,
            "{}: {} native wires, {} native pips",
            arch.name,
            arch.graph.wire_count(),
            arch.graph.pip_count()
        );

        for (x, y) in oracle.lab_locations() {
            let inputs = oracle.lab_input_wires(x, y).into_iter()
                .map(WireId::from_pos)
                .collect::<Result<Vec<_>, _>>()?;
            arch.create_lab(x, y, &inputs)?;
        }
        dbg_log!(
            DBG_INFO,
            "{}: {} LABs, {} wires, {} pips in total",
            arch.name,
            arch.labs.len(),
            arch.graph.wire_count(),
            arch.graph.pip_count()
        );

        #[cfg(debug_assertions)]
        arch.graph.check_consistency()?;

        Ok(arch)
    }

    pub fn id(&mut self, s: &str) -> IdString {
        self.strings.intern(s)
    }

    pub fn str(&self, id: IdString) -> &str {
        self.strings.get(id)
    }

    /* -------------------------------------------------------------------------- */
    /* Construction                                                               */
    /* -------------------------------------------------------------------------- */

    /// Adds a synthetic wire named `name` in tile `x`, `y`.
    pub fn add_wire(&mut self, x: u8, y: u8, name: &str, flags: u64)
        -> Result<WireId, GraphError>
    {
        self.graph.add_wire(&mut self.strings, WirePos::new(0, x, y, 0), Some(name), flags)
    }

    pub fn add_pip(&mut self, src: WireId, dst: WireId) -> Result<PipId, GraphError> {
        self.graph.add_pip(src, dst)
    }

    pub fn add_bel(&mut self, x: u8, y: u8, name: &str, bel_type: &str, aux: BelAux)
        -> Result<BelId, BelError>
    {
        let name = self.strings.intern(name);
        let bel_type = self.strings.intern(bel_type);
        let block_index = match aux {
            BelAux::Lab(data) => data.alm as u32,
            BelAux::None => 0,
        };
        self.bels.add_bel(x, y, name, bel_type, block_index, aux)
    }

    pub fn add_bel_pin(&mut self, bel: BelId, pin: &str, dir: PortType, wire: WireId)
        -> Result<(), BuildError>
    {
        let pin = self.strings.intern(pin);
        self.graph.add_bel_pin(wire, BelPin { bel, pin })?;
        let info = self.bels.bel_mut(bel).ok_or(BelError::NoSuchBel(bel))?;
        info.pins.insert(pin, PinInfo { wire, dir });
        Ok(())
    }

    /* -------------------------------------------------------------------------- */
    /* Queries                                                                    */
    /* -------------------------------------------------------------------------- */

    pub fn wire_by_name(&self, name: &str) -> Option<WireId> {
        self.graph.wire_by_name(&self.strings, name)
    }

    pub fn wire_name(&self, wire: WireId) -> Option<String> {
        self.graph.wire_name(&self.strings, wire)
    }

    pub fn pip_by_name(&self, name: &str) -> Option<PipId> {
        self.graph.pip_by_name(&self.strings, name)
    }

    pub fn pip_name(&self, pip: PipId) -> Option<String> {
        self.graph.pip_name(&self.strings, pip)
    }

    pub fn wires_connected(&self, src: WireId, dst: WireId) -> bool {
        self.graph.wires_connected(src, dst)
    }

    pub fn wires<'a>(&'a self) -> AllWireRange<'a> {
        self.graph.wires()
    }

    pub fn pips<'a>(&'a self) -> AllPipRange<'a> {
        self.graph.pips()
    }

    pub fn pips_downhill<'a>(&'a self, wire: WireId) -> UpDownhillPipRange<'a> {
        self.graph.pips_downhill(wire)
    }

    pub fn pips_uphill<'a>(&'a self, wire: WireId) -> UpDownhillPipRange<'a> {
        self.graph.pips_uphill(wire)
    }

    pub fn wire_bel_pins(&self, wire: WireId) -> &[BelPin] {
        self.graph.wire_bel_pins(wire)
    }

    pub fn bel_by_name(&self, x: u8, y: u8, name: &str) -> Option<BelId> {
        self.bels.bel_by_name(x, y, self.strings.find(name)?)
    }

    pub fn bel_pin_wire(&self, bel: BelId, pin: &str) -> Option<WireId> {
        self.bels.bel_pin_wire(bel, self.strings.find(pin)?)
    }

    pub fn lab(&self, lab: u32) -> Option<&LabInfo> {
        self.labs.get(lab as usize)
    }

    pub fn lab_at(&self, x: u8, y: u8) -> Option<u32> {
        self.labs.iter()
            .position(|lab| lab.x == x && lab.y == y)
            .map(|idx| idx as u32)
    }
}
