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

use std::collections::HashSet;
use std::thread;
use enum_map::EnumMap;
use serde::Serialize;

use crate::arch::Arch;
use crate::bels::BelId;
use crate::common::split_range_nicely;
use crate::pins::{COMB_BEL_TYPE, FF_CELL_TYPE, lut_input_count};
use super::*;
#[allow(unused)]
use crate::log::*;

/// Distinct data nets an ALM half can take through its E/F bypass.
const BYPASS_NETS_PER_HALF: usize = 2;
/// A LUT leaves its E/F pins free only when it uses at most this many inputs.
const BYPASS_MAX_LUT_INPUTS: usize = 4;

/// Aggregate of one LAB's staged contents.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct LabUsage {
    /// Distinct control signals per category in first-use order
    pub signals: EnumMap<CtrlCategory, Vec<ControlSig>>,
    /// First category whose signal count is over capacity
    pub overflow: Option<CtrlCategory>,
    pub alm_legal: Vec<bool>,
}

impl LabUsage {
    pub fn is_ctrlset_legal(&self) -> bool {
        self.overflow.is_none()
    }

    pub fn is_legal(&self) -> bool {
        self.is_ctrlset_legal() && self.alm_legal.iter().all(|legal| *legal)
    }
}

pub fn compute_lab_usage(lab: &LabInfo, capacity: &CtrlSetCapacity) -> LabUsage {
    let mut usage = LabUsage::default();

    for alm in &lab.alms {
        for ff in alm.binding.ffs.iter().flatten() {
            for category in CtrlCategory::ALL {
                if let Some(sig) = ff.ctrlset.get(category) {
                    let signals = &mut usage.signals[category];
                    if !signals.contains(&sig) {
                        signals.push(sig);
                    }
                }
            }
        }
        usage.alm_legal.push(is_alm_binding_legal(&alm.binding));
    }

    usage.overflow = CtrlCategory::ALL.into_iter()
        .find(|category| usage.signals[*category].len() > capacity.get(*category));

    usage
}

/* Both flip-flops of a half hang off the same clk, ena and aclr selects */
fn half_ctrlsets_agree(a: &CtrlSet, b: &CtrlSet) -> bool {
    CtrlCategory::ALL.into_iter()
        .filter(|category| category.is_per_half())
        .all(|category| a.get(category) == b.get(category))
}

/// Checks the rules local to one ALM, independent of the rest of the LAB.
pub fn is_alm_binding_legal(binding: &AlmBinding) -> bool {
    if binding.luts.iter().flatten().any(|lut| lut.inputs.len() > LUT_MAX_INPUTS) {
        return false;
    }
    let wide = binding.requires_wide();

    let mut nets: HashSet<NetId> = binding.luts.iter()
        .flatten()
        .flat_map(|lut| lut.inputs.iter().map(|input| input.net))
        .collect();

    for half in 0 .. LUTS_PER_ALM {
        let ffs = &binding.ffs[2 * half .. 2 * half + 2];
        if let [Some(a), Some(b)] = ffs {
            if !half_ctrlsets_agree(&a.ctrlset, &b.ctrlset) {
                return false;
            }
        }

        let lut = binding.luts[half].as_ref();
        let comb_out = lut.and_then(|lut| lut.comb_out);
        let mut bypass = HashSet::new();
        for ff in ffs.iter().flatten() {
            if let Some(datain) = ff.datain {
                if Some(datain) != comb_out {
                    bypass.insert(datain);
                }
            }
            if let Some(sdata) = ff.sdata {
                bypass.insert(sdata);
            }
        }
        if bypass.is_empty() {
            continue;
        }

        /* An empty LUT is a route-through, otherwise E and F have to be spare */
        let lut_inputs = lut.map(|lut| lut.inputs.len()).unwrap_or(0);
        if wide || lut_inputs > BYPASS_MAX_LUT_INPUTS || bypass.len() > BYPASS_NETS_PER_HALF {
            return false;
        }
        nets.extend(bypass);
    }

    let max_nets = if wide { LUT_MAX_INPUTS } else { ALM_INPUT_PINS };
    nets.len() <= max_nets
}

impl Arch {
    /// Whether the staged contents of a LAB fit. The aggregate is cached until
    /// the next proposal touching this LAB. A missing LAB is never legal.
    pub fn check_legal(&mut self, lab: u32) -> bool {
        let capacity = self.capacity.clone();
        let Ok(lab_info) = self.lab_mut(lab) else {
            return false;
        };
        let usage = match &lab_info.usage {
            Some(usage) => usage.clone(),
            None => compute_lab_usage(lab_info, &capacity),
        };
        let legal = usage.is_legal();
        if let Some(category) = usage.overflow {
            dbg_log!(DBG_EXTRA, "LAB {} is over its {} capacity", lab, category);
        }
        lab_info.usage = Some(usage);
        legal
    }

    pub fn is_alm_legal(&self, lab: u32, alm: u8) -> bool {
        let Some(lab_info) = self.lab(lab) else {
            return false;
        };
        match &lab_info.usage {
            Some(usage) => usage.alm_legal.get(alm as usize).copied().unwrap_or(false),
            None => lab_info.alms.get(alm as usize)
                .map(|alm| is_alm_binding_legal(&alm.binding))
                .unwrap_or(false),
        }
    }

    pub fn is_lab_ctrlset_legal(&self, lab: u32) -> bool {
        let Some(lab_info) = self.lab(lab) else {
            return false;
        };
        match &lab_info.usage {
            Some(usage) => usage.is_ctrlset_legal(),
            None => compute_lab_usage(lab_info, &self.capacity).is_ctrlset_legal(),
        }
    }

    /// Checks every LAB, splitting the work over `threads` threads. Returns the
    /// indices of illegal LABs.
    pub fn check_all(&mut self, threads: usize) -> Vec<u32> {
        let lab_cnt = self.labs.len();
        let threads = threads.max(1);

        let usages: Vec<LabUsage> = if threads == 1 {
            self.labs.iter().map(|lab| compute_lab_usage(lab, &self.capacity)).collect()
        } else {
            let labs = &self.labs;
            let capacity = &self.capacity;
            thread::scope(|scope| {
                let handles: Vec<_> = split_range_nicely(0 .. lab_cnt, threads)
                    .map(|range| scope.spawn(move || {
                        labs[range].iter()
                            .map(|lab| compute_lab_usage(lab, capacity))
                            .collect::<Vec<_>>()
                    }))
                    .collect();
                handles.into_iter()
                    .flat_map(|handle| handle.join()
                        .unwrap_or_else(|panic| std::panic::resume_unwind(panic)))
                    .collect()
            })
        };

        let mut illegal = Vec::new();
        for (idx, (lab, usage)) in self.labs.iter_mut().zip(usages).enumerate() {
            if !usage.is_legal() {
                illegal.push(idx as u32);
            }
            lab.usage = Some(usage);
        }
        dbg_log!(
            DBG_INFO,
            "Checked {} LABs on {} thread(s), {} illegal",
            lab_cnt, threads, illegal.len()
        );
        illegal
    }
}

/// Whether cells of this type go to a LUT half.
pub fn is_comb_cell(cell_type: &str) -> bool {
    lut_input_count(cell_type).is_some()
}

impl Arch {
    /// Placer-facing check of a single bel. LAB bels are valid while their ALM
    /// and the LAB's control sets are legal, other bels always are.
    pub fn is_bel_location_valid(&self, bel: BelId) -> bool {
        if self.bels.bel(bel).is_none() {
            return false;
        }
        match self.bels.lab_data(bel) {
            Some(data) => self.is_alm_legal(data.lab, data.alm)
                && self.is_lab_ctrlset_legal(data.lab),
            None => true,
        }
    }

    pub fn is_valid_bel_for_cell_type(&self, cell_type: &str, bel: BelId) -> bool {
        let Some(info) = self.bels.bel(bel) else {
            return false;
        };
        let bel_type = self.str(info.bel_type);
        if is_comb_cell(cell_type) {
            bel_type == COMB_BEL_TYPE
        } else if cell_type == FF_CELL_TYPE {
            bel_type == FF_CELL_TYPE
        } else {
            bel_type == cell_type
        }
    }
}
