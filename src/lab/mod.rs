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

//! LABs (logic array blocks) and their ALMs (adaptive logic modules).
//!
//! A placer stages an [`AlmBinding`] per ALM with [`Arch::propose`], asks
//! [`Arch::check_legal`] whether the whole LAB still fits and finally locks
//! the LAB with [`Arch::commit`], which also assigns control signals to the
//! LAB control wires.

pub mod legality;
pub mod reassign;
#[cfg(test)]
mod tests;

use std::fmt;
use enum_map::{Enum, EnumMap};
use serde::{Serialize, Deserialize};

use crate::arch::{Arch, BuildError};
use crate::bels::*;
use crate::graph::*;
use crate::pins::*;
#[allow(unused)]
use crate::log::*;

pub use self::legality::*;
pub use self::reassign::*;

pub const ALMS_PER_LAB: usize = 10;
pub const LUTS_PER_ALM: usize = 2;
pub const FFS_PER_ALM: usize = 4;
pub const LUT_MAX_INPUTS: usize = 6;
pub const ALM_INPUT_PINS: usize = 8;

/// Opaque net identifier owned by the caller
pub type NetId = u32;

#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug, Enum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CtrlCategory {
    Clk,
    Ena,
    Aclr,
    Sclr,
    Sload,
}

impl CtrlCategory {
    pub const ALL: [CtrlCategory; 5] = [
        CtrlCategory::Clk,
        CtrlCategory::Ena,
        CtrlCategory::Aclr,
        CtrlCategory::Sclr,
        CtrlCategory::Sload,
    ];

    pub fn wire_prefix(self) -> &'static str {
        match self {
            CtrlCategory::Clk => "LAB_CLK",
            CtrlCategory::Ena => "LAB_ENA",
            CtrlCategory::Aclr => "LAB_ACLR",
            CtrlCategory::Sclr => "LAB_SCLR",
            CtrlCategory::Sload => "LAB_SLOAD",
        }
    }

    /// Categories selected per ALM half, the rest are shared by the whole LAB.
    pub fn is_per_half(self) -> bool {
        matches!(self, CtrlCategory::Clk | CtrlCategory::Ena | CtrlCategory::Aclr)
    }
}

impl fmt::Display for CtrlCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CtrlCategory::Clk => "clk",
            CtrlCategory::Ena => "ena",
            CtrlCategory::Aclr => "aclr",
            CtrlCategory::Sclr => "sclr",
            CtrlCategory::Sload => "sload",
        };
        f.write_str(s)
    }
}

/// Distinct control signals a single LAB can route, per category.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CtrlSetCapacity {
    pub clk: usize,
    pub ena: usize,
    pub aclr: usize,
    pub sclr: usize,
    pub sload: usize,
}

impl Default for CtrlSetCapacity {
    fn default() -> Self {
        Self { clk: 3, ena: 3, aclr: 2, sclr: 1, sload: 1 }
    }
}

impl CtrlSetCapacity {
    pub fn get(&self, category: CtrlCategory) -> usize {
        match category {
            CtrlCategory::Clk => self.clk,
            CtrlCategory::Ena => self.ena,
            CtrlCategory::Aclr => self.aclr,
            CtrlCategory::Sclr => self.sclr,
            CtrlCategory::Sload => self.sload,
        }
    }
}

/// A control signal as seen by a flip-flop: the driving wire and its polarity.
/// The same wire used inverted and non-inverted counts as two signals.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub struct ControlSig {
    pub wire: WireId,
    pub inverted: bool,
}

impl ControlSig {
    pub fn new(wire: WireId) -> Self {
        Self { wire, inverted: false }
    }

    pub fn inverted(wire: WireId) -> Self {
        Self { wire, inverted: true }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CtrlSet {
    pub sigs: EnumMap<CtrlCategory, Option<ControlSig>>,
}

impl CtrlSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, category: CtrlCategory, sig: ControlSig) -> Self {
        self.sigs[category] = Some(sig);
        self
    }

    pub fn get(&self, category: CtrlCategory) -> Option<ControlSig> {
        self.sigs[category]
    }

    pub fn set(&mut self, category: CtrlCategory, sig: Option<ControlSig>) {
        self.sigs[category] = sig;
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct LutInput {
    pub net: NetId,
    /// Half-pins this logical input may be placed on
    pub allowed: HalfPinMask,
}

impl LutInput {
    pub fn new(net: NetId) -> Self {
        Self { net, allowed: HalfPinMask::ALL }
    }

    pub fn restricted(net: NetId, allowed: HalfPinMask) -> Self {
        Self { net, allowed }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LutBinding {
    pub inputs: Vec<LutInput>,
    /// Net driven by the LUT output
    pub comb_out: Option<NetId>,
    /// Truth table over the logical input order of `inputs`
    pub init: u64,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FfBinding {
    pub ctrlset: CtrlSet,
    pub datain: Option<NetId>,
    pub sdata: Option<NetId>,
}

/// Staged contents of one ALM.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AlmBinding {
    pub luts: [Option<LutBinding>; LUTS_PER_ALM],
    pub ffs: [Option<FfBinding>; FFS_PER_ALM],
    /// Both LUT halves form a single 6-input function
    pub wide: bool,
}

impl AlmBinding {
    pub fn is_empty(&self) -> bool {
        self.luts.iter().all(Option::is_none) && self.ffs.iter().all(Option::is_none)
    }

    pub fn requires_wide(&self) -> bool {
        self.wide || self.luts.iter()
            .flatten()
            .any(|lut| lut.inputs.len() == LUT_MAX_INPUTS)
    }
}

#[derive(Copy, Clone, PartialEq, Eq, Debug, Serialize)]
pub enum LabState {
    Tentative,
    Confirmed,
}

#[derive(Clone, Debug)]
pub struct AlmInfo {
    pub comb_out: [WireId; 2],
    pub sel_clk: [WireId; 2],
    pub sel_ena: [WireId; 2],
    pub sel_aclr: [WireId; 2],
    pub sel_ef: [WireId; 2],
    pub ff_in: [WireId; 4],
    pub ff_out: [WireId; 4],
    /// Indexed by `AlmPin`
    pub lut_in: [WireId; ALM_INPUT_PINS],
    pub lut_bels: [BelId; 2],
    pub ff_bels: [BelId; 4],
    pub l6_mode: bool,
    pub binding: AlmBinding,
    /// Set by input reassignment, dropped whenever the binding changes
    pub pin_map: Option<AlmPinMap>,
}

impl AlmInfo {
    pub fn sel_wire(&self, category: CtrlCategory, half: usize) -> Option<WireId> {
        match category {
            CtrlCategory::Clk => Some(self.sel_clk[half]),
            CtrlCategory::Ena => Some(self.sel_ena[half]),
            CtrlCategory::Aclr => Some(self.sel_aclr[half]),
            CtrlCategory::Sclr | CtrlCategory::Sload => None,
        }
    }
}

/// Control-wire slot chosen for every staged signal when a LAB is committed.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct CtrlSetAssignment {
    /// `signals[category][slot]` drives LAB control wire `slot` of `category`
    pub signals: EnumMap<CtrlCategory, Vec<ControlSig>>,
    /// Per ALM and half, the slot each per-half select is set to
    pub alm_selects: Vec<[EnumMap<CtrlCategory, Option<u8>>; 2]>,
}

#[derive(Clone, Debug)]
pub struct LabInfo {
    pub x: u8,
    pub y: u8,
    pub alms: Vec<AlmInfo>,
    pub ctrl_wires: EnumMap<CtrlCategory, Vec<WireId>>,
    pub state: LabState,
    /// Aggregate computed by the last legality check, `None` when stale
    pub usage: Option<LabUsage>,
    pub ctrlset: Option<CtrlSetAssignment>,
}

impl LabInfo {
    fn new(x: u8, y: u8, alms: Vec<AlmInfo>, ctrl_wires: EnumMap<CtrlCategory, Vec<WireId>>)
        -> Self
    {
        Self {
            x,
            y,
            alms,
            ctrl_wires,
            state: LabState::Tentative,
            usage: None,
            ctrlset: None,
        }
    }

    fn invalidate(&mut self) {
        self.state = LabState::Tentative;
        self.usage = None;
        self.ctrlset = None;
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LabError {
    #[error("LAB {0} does not exist")]
    NoSuchLab(u32),
    #[error("ALM {alm} does not exist in LAB {lab}")]
    NoSuchAlm { lab: u32, alm: u8 },
    #[error("LAB {lab} uses more distinct {category} signals than it can route")]
    CapacityExceeded { lab: u32, category: CtrlCategory },
    #[error("contents of ALM {alm} in LAB {lab} can't be implemented")]
    AlmIllegal { lab: u32, alm: u8 },
    #[error("no route from LAB {lab} {category} wire to ALM {alm}")]
    UnroutableControl { lab: u32, alm: u8, category: CtrlCategory },
}

impl Arch {
    /* -------------------------------------------------------------------------- */
    /* Construction                                                               */
    /* -------------------------------------------------------------------------- */

    /// Creates the wires, bels and local routing of the LAB at `x`, `y`. `inputs`
    /// are the wires feeding the local interconnect. Returns the LAB index.
    pub fn create_lab(&mut self, x: u8, y: u8, inputs: &[WireId]) -> Result<u32, BuildError> {
        let lab = self.labs.len() as u32;

        let mut ctrl_wires: EnumMap<CtrlCategory, Vec<WireId>> = EnumMap::default();
        for category in CtrlCategory::ALL {
            for slot in 0 .. self.capacity.get(category) {
                let name = format!("{}{}", category.wire_prefix(), slot);
                ctrl_wires[category].push(self.add_wire(x, y, &name, 0)?);
            }
        }

        let mut alms = Vec::with_capacity(ALMS_PER_LAB);
        for alm in 0 .. ALMS_PER_LAB as u8 {
            alms.push(self.create_alm(lab, x, y, alm, &ctrl_wires)?);
        }

        for &input in inputs {
            for wires in ctrl_wires.values() {
                for &wire in wires {
                    self.add_pip(input, wire)?;
                }
            }
            for alm in &alms {
                for &wire in &alm.lut_in {
                    self.add_pip(input, wire)?;
                }
            }
        }

        dbg_log!(DBG_EXTRA, "Created LAB {} at X{}Y{} with {} inputs", lab, x, y, inputs.len());
        self.labs.push(LabInfo::new(x, y, alms, ctrl_wires));
        Ok(lab)
    }

    fn alm_wires<const N: usize, F>(&mut self, x: u8, y: u8, alm: u8, suffix: F)
        -> Result<[WireId; N], GraphError>
    where
        F: Fn(usize) -> String
    {
        let mut wires = [WireId::INVALID; N];
        for (idx, wire) in wires.iter_mut().enumerate() {
            *wire = self.add_wire(x, y, &format!("ALM{}_{}", alm, suffix(idx)), 0)?;
        }
        Ok(wires)
    }

    fn create_alm(
        &mut self,
        lab: u32,
        x: u8,
        y: u8,
        alm: u8,
        ctrl_wires: &EnumMap<CtrlCategory, Vec<WireId>>
    ) -> Result<AlmInfo, BuildError> {
        let lut_in: [WireId; ALM_INPUT_PINS] =
            self.alm_wires(x, y, alm, |i| AlmPin::ALL[i].to_string())?;
        let comb_out: [WireId; 2] = self.alm_wires(x, y, alm, |i| format!("COMBOUT{}", i))?;
        let sel_clk: [WireId; 2] = self.alm_wires(x, y, alm, |i| format!("CLKSEL{}", i))?;
        let sel_ena: [WireId; 2] = self.alm_wires(x, y, alm, |i| format!("ENASEL{}", i))?;
        let sel_aclr: [WireId; 2] = self.alm_wires(x, y, alm, |i| format!("ACLRSEL{}", i))?;
        let sel_ef: [WireId; 2] = self.alm_wires(x, y, alm, |i| format!("EFSEL{}", i))?;
        let ff_in: [WireId; 4] = self.alm_wires(x, y, alm, |i| format!("FF{}_D", i))?;
        let ff_out: [WireId; 4] = self.alm_wires(x, y, alm, |i| format!("FF{}_Q", i))?;

        for half in 0 .. 2 {
            for (category, sel) in [
                (CtrlCategory::Clk, sel_clk[half]),
                (CtrlCategory::Ena, sel_ena[half]),
                (CtrlCategory::Aclr, sel_aclr[half]),
            ] {
                for &wire in &ctrl_wires[category] {
                    self.add_pip(wire, sel)?;
                }
            }
            for pin in [HalfPin::E, HalfPin::F] {
                self.add_pip(lut_in[pin.physical(half, false).index()], sel_ef[half])?;
            }
            for ff in [2 * half, 2 * half + 1] {
                self.add_pip(comb_out[half], ff_in[ff])?;
                self.add_pip(sel_ef[half], ff_in[ff])?;
            }
        }

        let mut lut_bels = [BelId::default(); 2];
        for (idx, bel) in lut_bels.iter_mut().enumerate() {
            let aux = BelAux::Lab(LabBelData { lab, alm, idx: idx as u8 });
            *bel = self.add_bel(x, y, &format!("ALM{}_LUT{}", alm, idx), COMB_BEL_TYPE, aux)?;
            for (pin, port) in HalfPin::ALL.iter().zip(LUT_INPUT_PORTS) {
                let wire = lut_in[pin.physical(idx, false).index()];
                self.add_bel_pin(*bel, port, PortType::In, wire)?;
            }
            self.add_bel_pin(*bel, LUT_OUTPUT_PORT, PortType::Out, comb_out[idx])?;
        }

        let mut ff_bels = [BelId::default(); 4];
        for (idx, bel) in ff_bels.iter_mut().enumerate() {
            let half = idx / 2;
            let aux = BelAux::Lab(LabBelData { lab, alm, idx: idx as u8 });
            *bel = self.add_bel(x, y, &format!("ALM{}_FF{}", alm, idx), FF_CELL_TYPE, aux)?;
            self.add_bel_pin(*bel, "CLK", PortType::In, sel_clk[half])?;
            self.add_bel_pin(*bel, "ENA", PortType::In, sel_ena[half])?;
            self.add_bel_pin(*bel, "ACLR", PortType::In, sel_aclr[half])?;
            if let Some(&wire) = ctrl_wires[CtrlCategory::Sclr].first() {
                self.add_bel_pin(*bel, "SCLR", PortType::In, wire)?;
            }
            if let Some(&wire) = ctrl_wires[CtrlCategory::Sload].first() {
                self.add_bel_pin(*bel, "SLOAD", PortType::In, wire)?;
            }
            self.add_bel_pin(*bel, "SDATA", PortType::In, sel_ef[half])?;
            self.add_bel_pin(*bel, "DATAIN", PortType::In, ff_in[idx])?;
            self.add_bel_pin(*bel, "Q", PortType::Out, ff_out[idx])?;
        }

        Ok(AlmInfo {
            comb_out,
            sel_clk,
            sel_ena,
            sel_aclr,
            sel_ef,
            ff_in,
            ff_out,
            lut_in,
            lut_bels,
            ff_bels,
            l6_mode: false,
            binding: AlmBinding::default(),
            pin_map: None,
        })
    }

    /* -------------------------------------------------------------------------- */
    /* Staging                                                                    */
    /* -------------------------------------------------------------------------- */

    pub fn lab_mut(&mut self, lab: u32) -> Result<&mut LabInfo, LabError> {
        self.labs.get_mut(lab as usize).ok_or(LabError::NoSuchLab(lab))
    }

    pub fn alm(&self, lab: u32, alm: u8) -> Result<&AlmInfo, LabError> {
        self.labs.get(lab as usize)
            .ok_or(LabError::NoSuchLab(lab))?
            .alms.get(alm as usize)
            .ok_or(LabError::NoSuchAlm { lab, alm })
    }

    /// Stages `binding` for an ALM. The LAB becomes tentative and its legality
    /// cache is dropped.
    pub fn propose(&mut self, lab: u32, alm: u8, binding: AlmBinding) -> Result<(), LabError> {
        let lab_info = self.lab_mut(lab)?;
        let alm_info = lab_info.alms.get_mut(alm as usize)
            .ok_or(LabError::NoSuchAlm { lab, alm })?;

        alm_info.l6_mode = binding.requires_wide();
        alm_info.binding = binding;
        alm_info.pin_map = None;
        lab_info.invalidate();
        Ok(())
    }

    pub fn clear(&mut self, lab: u32, alm: u8) -> Result<(), LabError> {
        self.propose(lab, alm, AlmBinding::default())
    }

    /// Locks a legal LAB and assigns its control signals to LAB wires.
    /// An illegal LAB stays tentative with its staged contents intact.
    pub fn commit(&mut self, lab: u32) -> Result<(), LabError> {
        if self.lab(lab).is_none() {
            return Err(LabError::NoSuchLab(lab));
        }

        if !self.check_legal(lab) {
            let lab_info = self.lab_mut(lab)?;
            let err = match &lab_info.usage {
                Some(LabUsage { overflow: Some(category), .. }) =>
                    LabError::CapacityExceeded { lab, category: *category },
                Some(usage) => {
                    let alm = usage.alm_legal.iter().position(|legal| !legal).unwrap_or(0);
                    LabError::AlmIllegal { lab, alm: alm as u8 }
                },
                None => LabError::NoSuchLab(lab),
            };
            dbg_log!(DBG_WARN, "Can't commit LAB {}: {}", lab, err);
            return Err(err);
        }

        let assignment = self.assign_control_sets(lab)?;
        let lab_info = self.lab_mut(lab)?;
        lab_info.ctrlset = Some(assignment);
        lab_info.state = LabState::Confirmed;
        Ok(())
    }

    /// Maps each distinct control signal of a LAB onto a control wire slot and
    /// every ALM half's select onto the slot of its signal.
    pub fn assign_control_sets(&self, lab: u32) -> Result<CtrlSetAssignment, LabError> {
        let lab_info = self.lab(lab).ok_or(LabError::NoSuchLab(lab))?;
        let computed;
        let usage = match &lab_info.usage {
            Some(usage) => usage,
            None => {
                computed = compute_lab_usage(lab_info, &self.capacity);
                &computed
            },
        };
        if let Some(category) = usage.overflow {
            return Err(LabError::CapacityExceeded { lab, category });
        }

        let mut alm_selects = Vec::with_capacity(lab_info.alms.len());
        for (alm_idx, alm) in lab_info.alms.iter().enumerate() {
            let mut halves: [EnumMap<CtrlCategory, Option<u8>>; 2] = Default::default();
            for (ff_idx, ff) in alm.binding.ffs.iter().enumerate() {
                let Some(ff) = ff else { continue };
                let half = ff_idx / 2;
                for category in CtrlCategory::ALL {
                    let Some(sig) = ff.ctrlset.get(category) else { continue };
                    let unroutable = LabError::UnroutableControl {
                        lab,
                        alm: alm_idx as u8,
                        category,
                    };
                    let slot = usage.signals[category].iter()
                        .position(|s| *s == sig)
                        .ok_or(unroutable.clone())?;
                    let lab_wire = *lab_info.ctrl_wires[category].get(slot)
                        .ok_or(unroutable.clone())?;
                    if let Some(sel) = alm.sel_wire(category, half) {
                        if !self.graph.wires_connected(lab_wire, sel) {
                            return Err(unroutable);
                        }
                    }
                    halves[half][category] = Some(slot as u8);
                }
            }
            alm_selects.push(halves);
        }

        Ok(CtrlSetAssignment { signals: usage.signals.clone(), alm_selects })
    }
}
