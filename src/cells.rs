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

//! Packed primitives (cells) and the ALM bindings derived from them.

use std::collections::{BTreeMap, HashMap, HashSet};
use serde::{Serialize, Deserialize};

use crate::arch::Arch;
use crate::graph::WireId;
use crate::lab::*;
use crate::pins::*;
#[allow(unused)]
use crate::log::*;

/// Where a cell sits: `idx` 0 and 1 are the LUT halves, 2 to 5 the flip-flops.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub struct CellPlacement {
    pub lab: u32,
    pub alm: u8,
    pub idx: u8,
}

#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub struct PortConn {
    pub net: NetId,
    /// Routing wire driving the net, needed for control signals
    pub driver: Option<WireId>,
}

#[derive(Clone, Debug, Default)]
pub struct Cell {
    pub name: String,
    pub cell_type: String,
    pub ports: HashMap<String, PortConn>,
    pub inverted_ports: HashSet<String>,
    /// LUT ports that may only use one particular half-pin
    pub fixed_pins: HashMap<String, HalfPin>,
    pub lut_init: u64,
    pub placement: Option<CellPlacement>,
}

impl Cell {
    pub fn new(name: &str, cell_type: &str) -> Self {
        Self {
            name: name.to_string(),
            cell_type: cell_type.to_string(),
            ..Default::default()
        }
    }

    pub fn connect(mut self, port: &str, net: NetId, driver: Option<WireId>) -> Self {
        self.ports.insert(port.to_string(), PortConn { net, driver });
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CellError {
    #[error("cell {0} is not a LUT")]
    NotALut(String),
    #[error("cell {0} is not a flip-flop")]
    NotAFlipFlop(String),
    #[error("port {port} of cell {cell} can't be inverted")]
    CantInvert { cell: String, port: String },
    #[error("control port {port} of cell {cell} has no driving wire")]
    UndrivenControl { cell: String, port: String },
    #[error("port {port} of cell {cell} has to be connected")]
    MissingPort { cell: String, port: String },
    #[error("cell {0} has an invalid placement index")]
    BadPlacement(String),
    #[error("cell {cell} placed on a slot already taken in LAB {lab} ALM {alm}")]
    SlotTaken { cell: String, lab: u32, alm: u8 },
    #[error("{0}")]
    Lab(#[from] LabError),
}

/// Truth table over `inputs - 1` inputs with logical input `k` tied to `value`.
pub fn fold_constant_input(init: u64, inputs: usize, k: usize, value: bool) -> u64 {
    let mut folded = 0;
    for idx in 0 .. 1u64 << (inputs - 1) {
        let low = idx & ((1 << k) - 1);
        let high = (idx >> k) << (k + 1);
        let src = high | (value as u64) << k | low;
        if (init >> src) & 1 != 0 {
            folded |= 1 << idx;
        }
    }
    folded
}

/// Truth table with logical input `k` inverted.
pub fn invert_input(init: u64, inputs: usize, k: usize) -> u64 {
    let mut inverted = 0;
    for idx in 0 .. 1u64 << inputs {
        if (init >> (idx ^ (1 << k))) & 1 != 0 {
            inverted |= 1 << idx;
        }
    }
    inverted
}

/// Derives the LUT half binding of a LUT cell. Disconnected inputs are folded
/// into the truth table at their default value, inverted inputs are absorbed.
pub fn assign_comb_info(cell: &Cell) -> Result<LutBinding, CellError> {
    let count = lut_input_count(&cell.cell_type)
        .ok_or_else(|| CellError::NotALut(cell.name.clone()))?;
    let mut init = match cell.cell_type.as_str() {
        "MISTRAL_NOT" => 0b01,
        "MISTRAL_BUF" => 0b10,
        _ => cell.lut_init,
    };

    /* Walk backwards, so folding an input doesn't shift the ones still to visit */
    let mut inputs = Vec::new();
    let mut remaining = count;
    for (k, port) in LUT_INPUT_PORTS[.. count].iter().enumerate().rev() {
        let style = cell_pin_style(&cell.cell_type, port);
        let Some(conn) = cell.ports.get(*port) else {
            let value = match style.default_value() {
                PinDefault::High => true,
                PinDefault::Low => false,
                PinDefault::Disconnected => return Err(CellError::MissingPort {
                    cell: cell.name.clone(),
                    port: port.to_string(),
                }),
            };
            init = fold_constant_input(init, remaining, k, value);
            remaining -= 1;
            continue;
        };

        if cell.inverted_ports.contains(*port) {
            if !style.can_invert() {
                return Err(CellError::CantInvert {
                    cell: cell.name.clone(),
                    port: port.to_string(),
                });
            }
            init = invert_input(init, remaining, k);
        }
        let input = match cell.fixed_pins.get(*port) {
            Some(pin) => LutInput::restricted(conn.net, HalfPinMask::of(&[*pin])),
            None => LutInput::new(conn.net),
        };
        inputs.push(input);
    }
    inputs.reverse();

    Ok(LutBinding {
        inputs,
        comb_out: cell.ports.get(LUT_OUTPUT_PORT).map(|conn| conn.net),
        init,
    })
}

const FF_CONTROL_PORTS: [(CtrlCategory, &'static str); 5] = [
    (CtrlCategory::Clk, "CLK"),
    (CtrlCategory::Ena, "ENA"),
    (CtrlCategory::Aclr, "ACLR"),
    (CtrlCategory::Sclr, "SCLR"),
    (CtrlCategory::Sload, "SLOAD"),
];

/// Derives the flip-flop binding of a flip-flop cell.
pub fn assign_ff_info(cell: &Cell) -> Result<FfBinding, CellError> {
    if cell.cell_type != FF_CELL_TYPE {
        return Err(CellError::NotAFlipFlop(cell.name.clone()));
    }

    let check_inversion = |port: &str| -> Result<bool, CellError> {
        let inverted = cell.inverted_ports.contains(port);
        if inverted && !cell_pin_style(FF_CELL_TYPE, port).can_invert() {
            return Err(CellError::CantInvert {
                cell: cell.name.clone(),
                port: port.to_string(),
            });
        }
        Ok(inverted)
    };

    let mut ctrlset = CtrlSet::new();
    for (category, port) in FF_CONTROL_PORTS {
        let Some(conn) = cell.ports.get(port) else { continue };
        let inverted = check_inversion(port)?;
        let wire = conn.driver.ok_or_else(|| CellError::UndrivenControl {
            cell: cell.name.clone(),
            port: port.to_string(),
        })?;
        ctrlset.set(category, Some(ControlSig { wire, inverted }));
    }

    let data = |port: &str| -> Result<Option<NetId>, CellError> {
        check_inversion(port)?;
        Ok(cell.ports.get(port).map(|conn| conn.net))
    };
    Ok(FfBinding {
        ctrlset,
        datain: data("DATAIN")?,
        sdata: data("SDATA")?,
    })
}

/// Groups placed cells into ALM bindings keyed by `(lab, alm)`. Unplaced cells
/// are skipped.
pub fn bindings_from_placements(cells: &[Cell])
    -> Result<BTreeMap<(u32, u8), AlmBinding>, CellError>
{
    let mut bindings: BTreeMap<(u32, u8), AlmBinding> = BTreeMap::new();
    for cell in cells {
        let Some(placement) = cell.placement else { continue };
        let binding = bindings.entry((placement.lab, placement.alm)).or_default();
        let taken = CellError::SlotTaken {
            cell: cell.name.clone(),
            lab: placement.lab,
            alm: placement.alm,
        };

        let idx = placement.idx as usize;
        if idx < LUTS_PER_ALM {
            if binding.luts[idx].is_some() {
                return Err(taken);
            }
            binding.luts[idx] = Some(assign_comb_info(cell)?);
        } else if idx < LUTS_PER_ALM + FFS_PER_ALM {
            let ff = idx - LUTS_PER_ALM;
            if binding.ffs[ff].is_some() {
                return Err(taken);
            }
            binding.ffs[ff] = Some(assign_ff_info(cell)?);
        } else {
            return Err(CellError::BadPlacement(cell.name.clone()));
        }
    }
    Ok(bindings)
}

impl Arch {
    /// Proposes the bindings of all placed cells. Returns the number of ALMs
    /// touched.
    pub fn propose_cells(&mut self, cells: &[Cell]) -> Result<usize, CellError> {
        let bindings = bindings_from_placements(cells)?;
        let count = bindings.len();
        for ((lab, alm), binding) in bindings {
            self.propose(lab, alm, binding)?;
        }
        dbg_log!(DBG_INFO, "Proposed {} cells on {} ALMs", cells.len(), count);
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::WirePos;

    fn wire(ty: u8) -> WireId {
        WireId::from_pos(WirePos::new(ty, 0, 0, 0)).unwrap()
    }

    #[test]
    fn truth_table_folding() {
        /* a & b with b tied high is a */
        assert_eq!(fold_constant_input(0b1000, 2, 1, true), 0b10);
        /* a & b with a tied low is constant 0 */
        assert_eq!(fold_constant_input(0b1000, 2, 0, false), 0b00);
        /* a & !b */
        assert_eq!(invert_input(0b1000, 2, 1), 0b0010);
    }

    #[test]
    fn comb_info() {
        let mut cell = Cell::new("and", "MISTRAL_ALUT3")
            .connect("A", 1, None)
            .connect("C", 3, None)
            .connect("Q", 10, None);
        /* a & c, with b disconnected and defaulting to low */
        cell.lut_init = 0b1010_0000;
        cell.fixed_pins.insert("C".to_string(), HalfPin::E);

        let lut = assign_comb_info(&cell).unwrap();
        assert_eq!(lut.inputs.len(), 2);
        assert_eq!(lut.inputs[0], LutInput::new(1));
        assert_eq!(lut.inputs[1], LutInput::restricted(3, HalfPinMask::of(&[HalfPin::E])));
        assert_eq!(lut.comb_out, Some(10));
        assert_eq!(lut.init, 0b1000);

        let not = Cell::new("inv", "MISTRAL_NOT").connect("A", 1, None);
        assert_eq!(assign_comb_info(&not).unwrap().init, 0b01);

        let ff = Cell::new("ff", FF_CELL_TYPE);
        assert_eq!(assign_comb_info(&ff), Err(CellError::NotALut("ff".to_string())));
    }

    #[test]
    fn ff_info() {
        let mut cell = Cell::new("ff", FF_CELL_TYPE)
            .connect("CLK", 1, Some(wire(1)))
            .connect("ACLR", 2, Some(wire(2)))
            .connect("DATAIN", 3, None);
        cell.inverted_ports.insert("CLK".to_string());

        let ff = assign_ff_info(&cell).unwrap();
        assert_eq!(ff.ctrlset.get(CtrlCategory::Clk), Some(ControlSig::inverted(wire(1))));
        assert_eq!(ff.ctrlset.get(CtrlCategory::Aclr), Some(ControlSig::new(wire(2))));
        assert_eq!(ff.ctrlset.get(CtrlCategory::Ena), None);
        assert_eq!(ff.datain, Some(3));
        assert_eq!(ff.sdata, None);

        cell.inverted_ports.insert("DATAIN".to_string());
        assert!(matches!(assign_ff_info(&cell), Err(CellError::CantInvert { .. })));

        let undriven = Cell::new("ff", FF_CELL_TYPE).connect("ENA", 4, None);
        assert!(matches!(assign_ff_info(&undriven), Err(CellError::UndrivenControl { .. })));
    }

    #[test]
    fn placements() {
        let place = |cell: Cell, idx| Cell {
            placement: Some(CellPlacement { lab: 0, alm: 1, idx }),
            ..cell
        };
        let cells = vec![
            place(Cell::new("lut", "MISTRAL_BUF").connect("A", 1, None).connect("Q", 2, None), 0),
            place(Cell::new("ff", FF_CELL_TYPE).connect("CLK", 5, Some(wire(1))), 3),
            Cell::new("floating", "MISTRAL_BUF"),
        ];
        let bindings = bindings_from_placements(&cells).unwrap();
        assert_eq!(bindings.len(), 1);
        let binding = &bindings[&(0, 1)];
        assert!(binding.luts[0].is_some());
        assert!(binding.luts[1].is_none());
        assert!(binding.ffs[1].is_some());

        let clash = vec![cells[0].clone(), cells[0].clone()];
        assert!(matches!(bindings_from_placements(&clash), Err(CellError::SlotTaken { .. })));

        let bad = vec![place(Cell::new("x", FF_CELL_TYPE), 6)];
        assert_eq!(bindings_from_placements(&bad), Err(CellError::BadPlacement("x".to_string())));
    }
}
