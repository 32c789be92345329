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

use std::fmt;
use std::collections::HashSet;
use serde::{Serialize, Deserialize};

use crate::arch::Arch;
use super::*;
#[allow(unused)]
use crate::log::*;

/// Upper bound on pin placements tried by one reassignment. Every half places
/// at most 6 inputs on distinct half-pins, so the whole search space has at
/// most (6!)^2 leaves of depth 12 and stays below this bound.
pub const MAX_REASSIGN_ATTEMPTS: usize = 1 << 23;

/// Physical input pins of an ALM. A-D feed both halves, E and F exist once per
/// half.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug, Serialize)]
pub enum AlmPin {
    A,
    B,
    C,
    D,
    E0,
    F0,
    E1,
    F1,
}

impl AlmPin {
    pub const ALL: [AlmPin; ALM_INPUT_PINS] = [
        AlmPin::A, AlmPin::B, AlmPin::C, AlmPin::D,
        AlmPin::E0, AlmPin::F0, AlmPin::E1, AlmPin::F1,
    ];

    pub fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for AlmPin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Input pin of a single LUT half.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub enum HalfPin {
    A,
    B,
    C,
    D,
    E,
    F,
}

impl HalfPin {
    pub const ALL: [HalfPin; LUT_MAX_INPUTS] =
        [HalfPin::A, HalfPin::B, HalfPin::C, HalfPin::D, HalfPin::E, HalfPin::F];
    pub const SHARED: [HalfPin; 4] = [HalfPin::A, HalfPin::B, HalfPin::C, HalfPin::D];

    pub fn index(self) -> usize {
        self as usize
    }

    /// Physical pin behind this half-pin. In wide mode both halves see E0 and F0.
    pub fn physical(self, half: usize, wide: bool) -> AlmPin {
        let upper = half == 1 && !wide;
        match self {
            HalfPin::A => AlmPin::A,
            HalfPin::B => AlmPin::B,
            HalfPin::C => AlmPin::C,
            HalfPin::D => AlmPin::D,
            HalfPin::E => if upper { AlmPin::E1 } else { AlmPin::E0 },
            HalfPin::F => if upper { AlmPin::F1 } else { AlmPin::F0 },
        }
    }
}

#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug, Serialize)]
pub struct HalfPinMask(u8);

impl HalfPinMask {
    pub const NONE: Self = Self(0);
    pub const ALL: Self = Self(0x3f);

    pub fn of(pins: &[HalfPin]) -> Self {
        Self(pins.iter().fold(0, |mask, pin| mask | 1 << pin.index()))
    }

    pub fn contains(self, pin: HalfPin) -> bool {
        self.0 & (1 << pin.index()) != 0
    }

    pub fn count(self) -> u32 {
        self.0.count_ones()
    }
}

impl Default for HalfPinMask {
    fn default() -> Self {
        Self::ALL
    }
}

/// Result of input reassignment: for every LUT half, the half-pin each logical
/// input ended up on.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct AlmPinMap {
    pub luts: [Vec<HalfPin>; LUTS_PER_ALM],
    /// Pin placements tried before this map was found
    pub attempts: usize,
}

impl AlmPinMap {
    pub fn physical_pin(&self, half: usize, input: usize, wide: bool) -> Option<AlmPin> {
        self.luts.get(half)?.get(input).map(|pin| pin.physical(half, wide))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ReassignError {
    #[error("no input assignment found after {attempts} attempts")]
    Unresolvable { attempts: usize },
    #[error("LUT {lut} has {inputs} inputs")]
    TooManyInputs { lut: usize, inputs: usize },
    #[error("{0}")]
    Lab(#[from] LabError),
}

struct PinRequest {
    half: usize,
    input: usize,
    net: NetId,
    allowed: HalfPinMask,
    shared: bool,
}

struct PinSearch<'r> {
    requests: &'r [PinRequest],
    wide: bool,
    /* Net driving each physical pin and how many half inputs rely on it */
    occupant: [Option<(NetId, usize)>; ALM_INPUT_PINS],
    used: [[bool; LUT_MAX_INPUTS]; LUTS_PER_ALM],
    picks: Vec<HalfPin>,
    attempts: usize,
}

impl<'r> PinSearch<'r> {
    fn new(requests: &'r [PinRequest], wide: bool) -> Self {
        Self {
            requests,
            wide,
            occupant: [None; ALM_INPUT_PINS],
            used: [[false; LUT_MAX_INPUTS]; LUTS_PER_ALM],
            picks: Vec::with_capacity(requests.len()),
            attempts: 0,
        }
    }

    /* Pins worth trying for a request, best first. A pin already carrying the
     * net is free to reuse, shared nets prefer A-D and private ones E/F. */
    fn candidates(&self, req: &PinRequest) -> Vec<HalfPin> {
        let private = [HalfPin::E, HalfPin::F];
        let preferred: Vec<HalfPin> = if req.shared {
            HalfPin::SHARED.iter().chain(private.iter()).copied().collect()
        } else {
            private.iter().chain(HalfPin::SHARED.iter()).copied().collect()
        };
        let usable: Vec<HalfPin> = preferred.into_iter()
            .filter(|pin| req.allowed.contains(*pin) && !self.used[req.half][pin.index()])
            .collect();

        let occupant = |pin: &HalfPin| self.occupant[pin.physical(req.half, self.wide).index()];
        let reuse = usable.iter()
            .filter(|pin| matches!(occupant(*pin), Some((net, _)) if net == req.net));
        let free = usable.iter().filter(|pin| occupant(*pin).is_none());
        reuse.chain(free).copied().collect()
    }

    fn place(&mut self, req: &PinRequest, pin: HalfPin) {
        let slot = &mut self.occupant[pin.physical(req.half, self.wide).index()];
        *slot = match *slot {
            Some((net, users)) => Some((net, users + 1)),
            None => Some((req.net, 1)),
        };
        self.used[req.half][pin.index()] = true;
        self.picks.push(pin);
    }

    fn unplace(&mut self, req: &PinRequest, pin: HalfPin) {
        let slot = &mut self.occupant[pin.physical(req.half, self.wide).index()];
        *slot = match *slot {
            Some((net, users)) if users > 1 => Some((net, users - 1)),
            _ => None,
        };
        self.used[req.half][pin.index()] = false;
        self.picks.pop();
    }

    /* Depth-first over the requests, false once every branch failed or the
     * attempt budget ran out */
    fn solve(&mut self, depth: usize) -> bool {
        let requests = self.requests;
        let Some(req) = requests.get(depth) else {
            return true;
        };
        for pin in self.candidates(req) {
            if self.attempts >= MAX_REASSIGN_ATTEMPTS {
                return false;
            }
            self.attempts += 1;
            self.place(req, pin);
            if self.solve(depth + 1) {
                return true;
            }
            self.unplace(req, pin);
        }
        false
    }
}

/// Places every LUT input of `binding` on a physical pin. Backtracks over the
/// allowed pins of every input until an assignment is found or all of them were
/// ruled out.
pub fn assign_alm_inputs(binding: &AlmBinding) -> Result<AlmPinMap, ReassignError> {
    let mut lut_sizes = [0; LUTS_PER_ALM];
    for (lut, lut_binding) in binding.luts.iter().enumerate() {
        let inputs = lut_binding.as_ref().map(|b| b.inputs.len()).unwrap_or(0);
        if inputs > LUT_MAX_INPUTS {
            return Err(ReassignError::TooManyInputs { lut, inputs });
        }
        lut_sizes[lut] = inputs;
    }

    let nets_of = |half: usize| -> HashSet<NetId> {
        binding.luts[half].iter().flat_map(|lut| lut.inputs.iter().map(|i| i.net)).collect()
    };
    let (nets0, nets1) = (nets_of(0), nets_of(1));

    let mut requests = Vec::new();
    for (half, lut) in binding.luts.iter().enumerate() {
        let Some(lut) = lut else { continue };
        for (input, lut_input) in lut.inputs.iter().enumerate() {
            requests.push(PinRequest {
                half,
                input,
                net: lut_input.net,
                allowed: lut_input.allowed,
                shared: nets0.contains(&lut_input.net) && nets1.contains(&lut_input.net),
            });
        }
    }
    /* Shared nets first, then the most constrained inputs */
    requests.sort_by_key(|req| (!req.shared, req.allowed.count()));

    let mut search = PinSearch::new(&requests, binding.requires_wide());
    if !search.solve(0) {
        return Err(ReassignError::Unresolvable { attempts: search.attempts });
    }

    let mut luts = [vec![HalfPin::A; lut_sizes[0]], vec![HalfPin::A; lut_sizes[1]]];
    for (req, pin) in requests.iter().zip(&search.picks) {
        luts[req.half][req.input] = *pin;
    }
    Ok(AlmPinMap { luts, attempts: search.attempts })
}

/// Rewrites a truth table given over logical input order into physical pin
/// order. Pins not used by the LUT replicate the function.
pub fn permute_lut_init(init: u64, pins: &[HalfPin]) -> u64 {
    let mut mask = 0u64;
    for phys in 0 .. 64u32 {
        let logical = pins.iter()
            .enumerate()
            .filter(|(_, pin)| (phys >> pin.index()) & 1 != 0)
            .fold(0u32, |acc, (k, _)| acc | 1 << k);
        if (init >> logical) & 1 != 0 {
            mask |= 1 << phys;
        }
    }
    mask
}

impl Arch {
    /// Recomputes the physical input pins of an ALM and stores the result.
    pub fn reassign_inputs(&mut self, lab: u32, alm: u8) -> Result<AlmPinMap, ReassignError> {
        let result = assign_alm_inputs(&self.alm(lab, alm)?.binding);
        match &result {
            Ok(map) => {
                dbg_log!(
                    DBG_EXTRA,
                    "LAB {} ALM {}: inputs assigned after {} attempt(s)",
                    lab, alm, map.attempts
                );
            },
            Err(err) => {
                dbg_log!(DBG_WARN, "LAB {} ALM {}: {}", lab, alm, err);
            },
        }
        let map = result?;
        self.lab_mut(lab)?.alms[alm as usize].pin_map = Some(map.clone());
        Ok(map)
    }

    /// Physical LUT masks of both halves, `0` for an unused half. Runs input
    /// reassignment first if it was not done since the last proposal.
    pub fn compute_lut_masks(&mut self, lab: u32, alm: u8) -> Result<[u64; 2], ReassignError> {
        let cached = self.alm(lab, alm)?.pin_map.clone();
        let map = match cached {
            Some(map) => map,
            None => self.reassign_inputs(lab, alm)?,
        };

        let mut masks = [0; 2];
        for (half, lut) in self.alm(lab, alm)?.binding.luts.iter().enumerate() {
            if let Some(lut) = lut {
                masks[half] = permute_lut_init(lut.init, &map.luts[half]);
            }
        }
        Ok(masks)
    }
}
