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

use std::path::PathBuf;
use std::fs::File;
use std::collections::{BTreeMap, HashSet};
use std::io::Write;

use enum_map::EnumMap;
use serde::Serialize;

use crate::arch::Arch;
use crate::lab::{CtrlCategory, LabState};

#[derive(Default)]
struct ExportChecker {
    export: HashSet<String>,
    export_all: bool,
}

impl ExportChecker {
    fn new(arg_list: &Option<Vec<String>>) -> Self {
        let mut checker = Self::default();
        for arg in arg_list.iter().flatten() {
            if arg == ":all" {
                checker.export_all = true;
            } else {
                checker.export.insert(arg.clone());
            }
        }
        checker
    }

    fn should_export(&self, name: &str) -> bool {
        self.export_all || self.export.contains(name)
    }
}

pub trait Exporter<D> {
    /// Calls `exporter` only if `name` was selected for export.
    fn ignore_or_export<'s, F>(&'s mut self, name: &str, exporter: F)
        -> std::io::Result<()>
    where
        F: FnOnce() -> D + 's;

    fn flush(&mut self) -> std::io::Result<()>;
}

/// Collects everything into a single JSON object keyed by name.
pub struct CompoundJsonExporter<D> where D: Serialize {
    filename: PathBuf,
    data: BTreeMap<String, D>,
    checker: ExportChecker,
}

impl<D> CompoundJsonExporter<D> where D: Serialize {
    /// `arg_list` names the entries to export, `:all` selects everything.
    pub fn new(arg_list: &Option<Vec<String>>, filename: PathBuf) -> Self {
        Self {
            filename,
            data: BTreeMap::new(),
            checker: ExportChecker::new(arg_list),
        }
    }
}

impl<D> Exporter<D> for CompoundJsonExporter<D> where D: Serialize {
    fn ignore_or_export<'s, F>(&'s mut self, name: &str, exporter: F)
        -> std::io::Result<()>
    where
        F: FnOnce() -> D + 's
    {
        if self.checker.should_export(name) {
            let data = exporter();
            self.data.insert(name.into(), data);
        }
        Ok(())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        let data = serde_json::to_string_pretty(&self.data)?;
        let mut file = File::create(&self.filename)?;
        file.write_all(data.as_bytes())
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct AlmReport {
    pub alm: u8,
    pub legal: bool,
    pub luts: usize,
    pub ffs: usize,
    pub wide: bool,
}

/// Legality summary of one LAB, control signals are given by wire name.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct LabReport {
    pub x: u8,
    pub y: u8,
    pub state: LabState,
    pub legal: bool,
    pub overflow: Option<CtrlCategory>,
    pub signals: EnumMap<CtrlCategory, Vec<String>>,
    pub alms: Vec<AlmReport>,
}

impl LabReport {
    /// Name under which the report of the LAB at `x`, `y` is exported.
    pub fn export_name(x: u8, y: u8) -> String {
        format!("LAB_X{}Y{}", x, y)
    }

    /// Report from the cached legality state, `None` if the LAB wasn't checked.
    pub fn new(arch: &Arch, lab: u32) -> Option<Self> {
        let info = arch.lab(lab)?;
        let usage = info.usage.as_ref()?;

        let mut signals: EnumMap<CtrlCategory, Vec<String>> = EnumMap::default();
        for (category, sigs) in &usage.signals {
            signals[category] = sigs.iter()
                .map(|sig| {
                    let name = arch.wire_name(sig.wire).unwrap_or_else(|| "?".to_string());
                    if sig.inverted { format!("!{}", name) } else { name }
                })
                .collect();
        }

        let alms = info.alms.iter()
            .zip(&usage.alm_legal)
            .enumerate()
            .filter(|(_, (alm, _))| !alm.binding.is_empty())
            .map(|(idx, (alm, legal))| AlmReport {
                alm: idx as u8,
                legal: *legal,
                luts: alm.binding.luts.iter().flatten().count(),
                ffs: alm.binding.ffs.iter().flatten().count(),
                wide: alm.l6_mode,
            })
            .collect();

        Some(Self {
            x: info.x,
            y: info.y,
            state: info.state,
            legal: usage.is_legal(),
            overflow: usage.overflow,
            signals,
            alms,
        })
    }
}
