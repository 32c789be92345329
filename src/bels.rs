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
use serde::{Serialize, Deserialize};
use crate::graph::WireId;
use crate::strings::IdString;

#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Debug, Default, Serialize, Deserialize)]
pub struct BelId {
    pub x: u8,
    pub y: u8,
    pub z: u16,
}

#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub enum PortType {
    In,
    Out,
    Inout,
}

#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub struct PinInfo {
    pub wire: WireId,
    pub dir: PortType,
}

/// Back-reference from a LAB bel to the ALM slot it implements.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub struct LabBelData {
    pub lab: u32,
    pub alm: u8,
    /// LUT index (0, 1) for combinational bels, FF index (0..4) for flip-flops
    pub idx: u8,
}

/// Kind-specific bel data. Only the variant matching the bel's kind is ever present.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum BelAux {
    None,
    Lab(LabBelData),
}

#[derive(Clone, Debug)]
pub struct BelInfo {
    pub name: IdString,
    pub bel_type: IdString,
    /* Index of the block within its tile as the geometry reports it, this is not
     * always the same as the z coordinate */
    pub block_index: u32,
    pub pins: HashMap<IdString, PinInfo>,
    pub aux: BelAux,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BelError {
    #[error("tile X{0}Y{1} is outside of the device grid")]
    OutOfGrid(u8, u8),
    #[error("bel {0:?} does not exist")]
    NoSuchBel(BelId),
}

#[derive(Clone, Debug, Default)]
pub struct BelStore {
    width: u8,
    height: u8,
    bels_by_tile: Vec<Vec<BelInfo>>,
    all_bels: Vec<BelId>,
}

impl BelStore {
    pub fn new(width: u8, height: u8) -> Self {
        Self {
            width,
            height,
            bels_by_tile: vec![Vec::new(); width as usize * height as usize],
            all_bels: Vec::new(),
        }
    }

    fn pos2idx(&self, x: u8, y: u8) -> Option<usize> {
        if x >= self.width || y >= self.height {
            return None;
        }
        Some(y as usize * self.width as usize + x as usize)
    }

    pub fn add_bel(
        &mut self,
        x: u8,
        y: u8,
        name: IdString,
        bel_type: IdString,
        block_index: u32,
        aux: BelAux
    )
        -> Result<BelId, BelError>
    {
        let idx = self.pos2idx(x, y).ok_or(BelError::OutOfGrid(x, y))?;
        let tile = &mut self.bels_by_tile[idx];
        let bel = BelId { x, y, z: tile.len() as u16 };
        tile.push(BelInfo { name, bel_type, block_index, pins: HashMap::new(), aux });
        self.all_bels.push(bel);
        Ok(bel)
    }

    pub fn bel(&self, bel: BelId) -> Option<&BelInfo> {
        self.bels_by_tile.get(self.pos2idx(bel.x, bel.y)?)?.get(bel.z as usize)
    }

    pub fn bel_mut(&mut self, bel: BelId) -> Option<&mut BelInfo> {
        let idx = self.pos2idx(bel.x, bel.y)?;
        self.bels_by_tile.get_mut(idx)?.get_mut(bel.z as usize)
    }

    pub fn bels(&self) -> &[BelId] {
        &self.all_bels
    }

    pub fn bels_by_tile(&self, x: u8, y: u8) -> Vec<BelId> {
        let count = self.pos2idx(x, y)
            .map(|idx| self.bels_by_tile[idx].len())
            .unwrap_or(0);
        (0 .. count).map(|z| BelId { x, y, z: z as u16 }).collect()
    }

    pub fn bel_by_name(&self, x: u8, y: u8, name: IdString) -> Option<BelId> {
        let tile = &self.bels_by_tile[self.pos2idx(x, y)?];
        tile.iter()
            .position(|info| info.name == name)
            .map(|z| BelId { x, y, z: z as u16 })
    }

    pub fn bel_pin_wire(&self, bel: BelId, pin: IdString) -> Option<WireId> {
        self.bel(bel)?.pins.get(&pin).map(|info| info.wire)
    }

    pub fn lab_data(&self, bel: BelId) -> Option<LabBelData> {
        match self.bel(bel)?.aux {
            BelAux::Lab(data) => Some(data),
            BelAux::None => None,
        }
    }
}
