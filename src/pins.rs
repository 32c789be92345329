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

//! Per-cell-type pin policies. The tables are read-only after initialization and
//! shared by every device model in the process.

use std::collections::HashMap;
use std::ops::BitOr;

/// Combination of the modes available for a pin (tied high, low or inverted), the
/// value it takes when left unconnected and whether it is a clock.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub struct CellPinStyle(pub u32);

/// What an unconnected pin is driven with.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum PinDefault {
    Disconnected,
    Low,
    High,
}

impl CellPinStyle {
    pub const PINOPT_NONE: Self = Self(0x0);
    pub const PINOPT_LO: Self = Self(0x1);
    pub const PINOPT_HI: Self = Self(0x2);
    pub const PINOPT_INV: Self = Self(0x4);
    pub const PINOPT_LOHI: Self = Self(0x3);
    pub const PINOPT_LOHIINV: Self = Self(0x7);
    pub const PINOPT_MASK: u32 = 0x7;

    pub const PINDEF_NONE: Self = Self(0x00);
    pub const PINDEF_0: Self = Self(0x10);
    pub const PINDEF_1: Self = Self(0x20);
    pub const PINDEF_MASK: u32 = 0x30;

    pub const PINGLB_CLK: Self = Self(0x100);
    pub const PINGLB_MASK: u32 = 0x100;

    pub const PINSTYLE_NONE: Self = Self(0x000);
    /* Combinational signal, defaults low, can be inverted and tied */
    pub const PINSTYLE_COMB: Self = Self(0x017);
    /* Clock, invertible, left disconnected by default */
    pub const PINSTYLE_CLK: Self = Self(0x107);
    /* Clock enable and resets are not invertible: using both polarities of one net
     * would need two LAB control wires for it */
    pub const PINSTYLE_CE: Self = Self(0x023);
    pub const PINSTYLE_RST: Self = Self(0x013);
    pub const PINSTYLE_DEDI: Self = Self(0x000);
    pub const PINSTYLE_INP: Self = Self(0x001);
    pub const PINSTYLE_PU: Self = Self(0x022);
    pub const PINSTYLE_CARRY: Self = Self(0x001);

    pub fn can_tie_low(self) -> bool {
        self.0 & Self::PINOPT_LO.0 != 0
    }

    pub fn can_tie_high(self) -> bool {
        self.0 & Self::PINOPT_HI.0 != 0
    }

    pub fn can_invert(self) -> bool {
        self.0 & Self::PINOPT_INV.0 != 0
    }

    pub fn is_global_clock(self) -> bool {
        self.0 & Self::PINGLB_MASK != 0
    }

    pub fn default_value(self) -> PinDefault {
        match self.0 & Self::PINDEF_MASK {
            0x10 => PinDefault::Low,
            0x20 => PinDefault::High,
            _ => PinDefault::Disconnected,
        }
    }
}

impl BitOr for CellPinStyle {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

pub struct CellPinsData {
    /* Style for pins not listed explicitly */
    pub default: CellPinStyle,
    pub pins: HashMap<&'static str, CellPinStyle>,
}

impl CellPinsData {
    fn uniform(default: CellPinStyle) -> Self {
        Self { default, pins: HashMap::new() }
    }
}

pub const LUT_CELL_TYPES: &'static [&'static str] = &[
    "MISTRAL_ALUT6",
    "MISTRAL_ALUT5",
    "MISTRAL_ALUT4",
    "MISTRAL_ALUT3",
    "MISTRAL_ALUT2",
    "MISTRAL_NOT",
    "MISTRAL_BUF",
];

pub const FF_CELL_TYPE: &'static str = "MISTRAL_FF";
/// Bel type of the LUT halves every LUT cell type is placed on
pub const COMB_BEL_TYPE: &'static str = "MISTRAL_COMB";

/// Logical LUT input port names, in truth table bit order.
pub const LUT_INPUT_PORTS: &'static [&'static str] = &["A", "B", "C", "D", "E", "F"];
pub const LUT_OUTPUT_PORT: &'static str = "Q";

lazy_static! {
    pub static ref CELL_PINS_DB: HashMap<&'static str, CellPinsData> = {
        let mut db = HashMap::new();
        for lut in LUT_CELL_TYPES {
            db.insert(*lut, CellPinsData::uniform(CellPinStyle::PINSTYLE_COMB));
        }
        db.insert(FF_CELL_TYPE, CellPinsData {
            default: CellPinStyle::PINSTYLE_NONE,
            pins: [
                ("CLK", CellPinStyle::PINSTYLE_CLK),
                ("ENA", CellPinStyle::PINSTYLE_CE),
                ("ACLR", CellPinStyle::PINSTYLE_RST),
                ("SCLR", CellPinStyle::PINSTYLE_RST),
                ("SLOAD", CellPinStyle::PINSTYLE_RST),
                ("SDATA", CellPinStyle::PINSTYLE_DEDI),
                ("DATAIN", CellPinStyle::PINSTYLE_INP),
            ].into_iter().collect(),
        });
        db
    };
}

/// Style of `port` on cells of type `cell_type`, `PINSTYLE_NONE` for anything the
/// tables do not know about.
pub fn cell_pin_style(cell_type: &str, port: &str) -> CellPinStyle {
    match CELL_PINS_DB.get(cell_type) {
        Some(data) => data.pins.get(port).copied().unwrap_or(data.default),
        None => CellPinStyle::PINSTYLE_NONE,
    }
}

/// Number of logical inputs of a LUT cell type.
pub fn lut_input_count(cell_type: &str) -> Option<usize> {
    Some(match cell_type {
        "MISTRAL_ALUT6" => 6,
        "MISTRAL_ALUT5" => 5,
        "MISTRAL_ALUT4" => 4,
        "MISTRAL_ALUT3" => 3,
        "MISTRAL_ALUT2" => 2,
        "MISTRAL_NOT" | "MISTRAL_BUF" => 1,
        _ => return None,
    })
}
