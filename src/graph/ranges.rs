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

//! Lazy iteration over the routing graph. None of these ranges materialize pips;
//! each element is built from a stored adjacency entry plus a fixed anchor.

use std::collections::hash_map;
use std::iter::FusedIterator;
use std::slice;

use super::*;

/// Pips uphill or downhill of a single wire. The anchor wire is fixed, the other end
/// walks the anchor's adjacency list.
#[derive(Clone, Debug)]
pub struct UpDownhillPipRange<'g> {
    base: slice::Iter<'g, WireId>,
    other_wire: WireId,
    is_uphill: bool,
}

impl<'g> UpDownhillPipRange<'g> {
    pub fn new(wires: &'g [WireId], other_wire: WireId, is_uphill: bool) -> Self {
        Self { base: wires.iter(), other_wire, is_uphill }
    }
}

impl<'g> Iterator for UpDownhillPipRange<'g> {
    type Item = PipId;

    fn next(&mut self) -> Option<PipId> {
        let wire = *self.base.next()?;
        Some(if self.is_uphill {
            PipId { src: wire, dst: self.other_wire }
        } else {
            PipId { src: self.other_wire, dst: wire }
        })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.base.size_hint()
    }
}

impl<'g> ExactSizeIterator for UpDownhillPipRange<'g> {}
impl<'g> FusedIterator for UpDownhillPipRange<'g> {}

/// Every pip in the graph, visiting each wire in storage order and yielding its
/// uphill pips. Uphill is the canonical direction: walking both lists would report
/// every pip twice.
///
/// Storage order is not stable across graph rebuilds; only "each pip exactly once
/// per traversal" is guaranteed.
#[derive(Clone, Debug)]
pub struct AllPipRange<'g, I = hash_map::Iter<'g, WireId, WireInfo>> {
    base: I,
    /* Wire currently being drained and what is left of its uphill list */
    current: Option<(WireId, slice::Iter<'g, WireId>)>,
}

impl<'g> AllPipRange<'g> {
    pub fn new(wires: &'g HashMap<WireId, WireInfo>) -> Self {
        Self::over(wires.iter())
    }
}

impl<'g, I> AllPipRange<'g, I> where I: Iterator<Item = (&'g WireId, &'g WireInfo)> {
    /// Walks wires in the order produced by `base`.
    pub fn over(base: I) -> Self {
        Self { base, current: None }
    }
}

impl<'g, I> Iterator for AllPipRange<'g, I> where
    I: Iterator<Item = (&'g WireId, &'g WireInfo)>
{
    type Item = PipId;

    fn next(&mut self) -> Option<PipId> {
        loop {
            if let Some((dst, uphill)) = &mut self.current {
                if let Some(src) = uphill.next() {
                    return Some(PipId { src: *src, dst: *dst });
                }
            }
            /* Current wire exhausted (or never started), wires without uphill
             * pips are skipped by going around the loop again */
            match self.base.next() {
                Some((wire, info)) => {
                    self.current = Some((*wire, info.wires_uphill.iter()));
                },
                None => {
                    self.current = None;
                    return None;
                },
            }
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let pending = self.current.as_ref().map(|(_, it)| it.len()).unwrap_or(0);
        match self.base.size_hint() {
            (_, Some(0)) => (pending, Some(pending)),
            _ => (pending, None),
        }
    }
}

impl<'g, I> FusedIterator for AllPipRange<'g, I> where
    I: FusedIterator<Item = (&'g WireId, &'g WireInfo)>
{}

/// Every wire in the graph, each exactly once.
#[derive(Clone, Debug)]
pub struct AllWireRange<'g> {
    base: hash_map::Keys<'g, WireId, WireInfo>,
}

impl<'g> AllWireRange<'g> {
    pub fn new(wires: &'g HashMap<WireId, WireInfo>) -> Self {
        Self { base: wires.keys() }
    }
}

impl<'g> Iterator for AllWireRange<'g> {
    type Item = WireId;

    fn next(&mut self) -> Option<WireId> {
        self.base.next().copied()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.base.size_hint()
    }
}

impl<'g> ExactSizeIterator for AllWireRange<'g> {}
impl<'g> FusedIterator for AllWireRange<'g> {}

impl RoutingGraph {
    /// Pips leaving `wire`. Unknown wires yield an empty range.
    pub fn pips_downhill<'g>(&'g self, wire: WireId) -> UpDownhillPipRange<'g> {
        let downhill = self.wire_map().get(&wire)
            .map(|info| info.wires_downhill.as_slice())
            .unwrap_or(&[]);
        UpDownhillPipRange::new(downhill, wire, false)
    }

    /// Pips entering `wire`. Unknown wires yield an empty range.
    pub fn pips_uphill<'g>(&'g self, wire: WireId) -> UpDownhillPipRange<'g> {
        let uphill = self.wire_map().get(&wire)
            .map(|info| info.wires_uphill.as_slice())
            .unwrap_or(&[]);
        UpDownhillPipRange::new(uphill, wire, true)
    }

    pub fn pips<'g>(&'g self) -> AllPipRange<'g> {
        AllPipRange::new(self.wire_map())
    }

    pub fn wires<'g>(&'g self) -> AllWireRange<'g> {
        AllWireRange::new(self.wire_map())
    }
}
