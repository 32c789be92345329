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

//! Routing graph store.
//!
//! Wires are kept in a single map keyed by their device-wide position. Pips are
//! never stored: a pip `src -> dst` exists iff `dst` is listed in the downhill
//! list of `src` (and, equivalently, `src` in the uphill list of `dst`). The
//! graph only hands out pips synthesized from those lists, see [`ranges`].

use std::collections::HashMap;
use bimap::BiHashMap;
use serde::{Serialize, Deserialize};
use crate::bels::BelId;
use crate::strings::{IdString, IdStrings};

pub mod ranges;

pub use self::ranges::*;

/// Wire types at and above this value denote wires created by the device model
/// itself rather than reported by the geometry oracle.
pub const SYNTHETIC_TYPE_BASE: u32 = 128;
/// First component of every synthetic wire name.
pub const SYNTHETIC_PREFIX: &'static str = "WIRE";

pub const MAX_X: u32 = 0x7f;
pub const MAX_Y: u32 = 0x7f;
pub const MAX_Z: u32 = 0x3ff;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GraphError {
    #[error("synthetic wire `{0}` already exists")]
    DuplicateName(String),
    #[error("wire position {0:?} is out of range")]
    PositionOutOfRange(WirePos),
    #[error("unknown native wire type {0}")]
    UnknownWireType(u8),
    #[error("wire type name `{0}` is invalid or already registered")]
    BadWireTypeName(String),
    #[error("no room left for synthetic wires at X{0}Y{1}")]
    TileFull(u8, u8),
    #[error("malformed adjacency: {0}")]
    MalformedAdjacency(String),
}

/// Decoded wire position. `ty` selects the native wire type (or a synthetic
/// bank when `ty >= SYNTHETIC_TYPE_BASE`), `z` distinguishes wires of the same
/// type within a tile.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub struct WirePos {
    pub ty: u8,
    pub x: u8,
    pub y: u8,
    pub z: u16,
}

impl WirePos {
    pub fn new(ty: u8, x: u8, y: u8, z: u16) -> Self {
        Self { ty, x, y, z }
    }

    pub fn in_range(&self) -> bool {
        (self.x as u32) <= MAX_X && (self.y as u32) <= MAX_Y && (self.z as u32) <= MAX_Z
    }
}

/// Device-wide wire handle, packed as `ty << 24 | x << 17 | y << 10 | z`.
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Debug, Serialize, Deserialize)]
pub struct WireId(u32);

impl Default for WireId {
    fn default() -> Self {
        Self::INVALID
    }
}

impl WireId {
    /// Type 0 is reserved, so this never names a real wire.
    pub const INVALID: Self = Self(0);

    pub fn from_pos(pos: WirePos) -> Result<Self, GraphError> {
        if !pos.in_range() {
            return Err(GraphError::PositionOutOfRange(pos));
        }
        Ok(Self(
            ((pos.ty as u32) << 24) | ((pos.x as u32) << 17) | ((pos.y as u32) << 10)
                | pos.z as u32
        ))
    }

    pub fn pos(self) -> WirePos {
        WirePos {
            ty: (self.0 >> 24) as u8,
            x: ((self.0 >> 17) & MAX_X) as u8,
            y: ((self.0 >> 10) & MAX_Y) as u8,
            z: (self.0 & MAX_Z) as u16,
        }
    }

    pub fn is_synthetic(self) -> bool {
        (self.0 >> 24) >= SYNTHETIC_TYPE_BASE
    }

    pub fn raw(self) -> u32 {
        self.0
    }
}

/// A pip, synthesized on demand from a wire's adjacency entry.
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Debug, Serialize, Deserialize)]
pub struct PipId {
    pub src: WireId,
    pub dst: WireId,
}

/// Logic-element pin attached to a wire.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub struct BelPin {
    pub bel: BelId,
    pub pin: IdString,
}

#[derive(Clone, Debug, Default)]
pub struct WireInfo {
    /* Only set for synthetic wires, native ones are named after their position */
    pub name_override: Option<IdString>,
    pub wires_downhill: Vec<WireId>,
    pub wires_uphill: Vec<WireId>,
    pub bel_pins: Vec<BelPin>,
    pub flags: u64,
}

/// Key of the synthetic wire name table: `WIRE.<x>.<y>.<name>`.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub struct SyntheticName {
    pub x: u8,
    pub y: u8,
    pub name: IdString,
}

/// Parses a native wire name (`<TYPE>.<x>.<y>.<z>`) given a type-name lookup.
pub fn parse_native_name<F>(name: &str, type_lookup: F) -> Option<WirePos> where
    F: FnOnce(&str) -> Option<u8>
{
    let mut parts = name.split('.');
    let ty = parts.next()?;
    let x = parts.next()?.parse::<u8>().ok()?;
    let y = parts.next()?.parse::<u8>().ok()?;
    let z = parts.next()?.parse::<u16>().ok()?;
    if parts.next().is_some() || ty == SYNTHETIC_PREFIX {
        return None;
    }
    let pos = WirePos::new(type_lookup(ty)?, x, y, z);
    pos.in_range().then(|| pos)
}

#[derive(Default, Clone, Debug)]
pub struct RoutingGraph {
    wires: HashMap<WireId, WireInfo>,
    /* Native type index <-> type name */
    type_names: BiHashMap<u8, IdString>,
    synthetic_names: BiHashMap<SyntheticName, WireId>,
    /* Next free synthetic slot per tile */
    synthetic_next: HashMap<(u8, u8), u32>,
    pip_count: usize,
}

impl RoutingGraph {
    pub fn new() -> Self {
        Default::default()
    }

    /// Registers the name of a native wire type. Type 0 is reserved and types at or
    /// above `SYNTHETIC_TYPE_BASE` belong to synthetic wires.
    pub fn register_wire_type(&mut self, strings: &mut IdStrings, ty: u8, name: &str)
        -> Result<(), GraphError>
    {
        if ty == 0 || ty as u32 >= SYNTHETIC_TYPE_BASE {
            return Err(GraphError::UnknownWireType(ty));
        }
        let bad_name = name.is_empty() || name == SYNTHETIC_PREFIX || name.contains('.');
        let name_id = strings.intern(name);
        if bad_name || self.type_names.contains_right(&name_id)
            || self.type_names.contains_left(&ty)
        {
            return Err(GraphError::BadWireTypeName(name.to_string()));
        }
        self.type_names.insert(ty, name_id);
        Ok(())
    }

    pub fn wire_type_by_name(&self, strings: &IdStrings, name: &str) -> Option<u8> {
        strings.find(name)
            .and_then(|id| self.type_names.get_by_right(&id))
            .copied()
    }

    /// Creates a wire.
    ///
    /// Without a `name`, `pos` must describe a native wire; the existing handle is
    /// returned if that wire was already added. With a `name`, a synthetic wire is
    /// created in the tile at `pos.x`, `pos.y` (`pos.ty` and `pos.z` are ignored and
    /// chosen by the graph). Synthetic names must be unique within a tile.
    pub fn add_wire(
        &mut self,
        strings: &mut IdStrings,
        pos: WirePos,
        name: Option<&str>,
        flags: u64
    )
        -> Result<WireId, GraphError>
    {
        let name = match name {
            Some(name) => name,
            None => {
                if !self.type_names.contains_left(&pos.ty) {
                    return Err(GraphError::UnknownWireType(pos.ty));
                }
                let id = WireId::from_pos(pos)?;
                self.wires.entry(id).or_insert_with(|| WireInfo {
                    flags,
                    .. Default::default()
                });
                return Ok(id);
            }
        };

        if (pos.x as u32) > MAX_X || (pos.y as u32) > MAX_Y {
            return Err(GraphError::PositionOutOfRange(pos));
        }
        let name_id = strings.intern(name);
        let key = SyntheticName { x: pos.x, y: pos.y, name: name_id };
        if self.synthetic_names.contains_left(&key) {
            return Err(GraphError::DuplicateName(
                format!("{}.{}.{}.{}", SYNTHETIC_PREFIX, pos.x, pos.y, name)
            ));
        }

        let slot = self.synthetic_next.entry((pos.x, pos.y)).or_insert(0);
        let ty = SYNTHETIC_TYPE_BASE + (*slot >> 10);
        if ty > u8::MAX as u32 {
            return Err(GraphError::TileFull(pos.x, pos.y));
        }
        let id = WireId::from_pos(
            WirePos::new(ty as u8, pos.x, pos.y, (*slot & MAX_Z) as u16)
        )?;
        *slot += 1;

        self.wires.insert(id, WireInfo {
            name_override: Some(name_id),
            flags,
            .. Default::default()
        });
        self.synthetic_names.insert(key, id);

        Ok(id)
    }

    /// Adds a pip from `src` to `dst`, updating both adjacency lists. Adding an
    /// existing pip again returns it unchanged.
    pub fn add_pip(&mut self, src: WireId, dst: WireId) -> Result<PipId, GraphError> {
        /* Validate both ends first, so that a failure never leaves one list updated */
        for wire in [src, dst] {
            if !self.wires.contains_key(&wire) {
                return Err(GraphError::MalformedAdjacency(
                    format!("pip {:?} -> {:?} refers to missing wire {:?}", src, dst, wire)
                ));
            }
        }

        let pip = PipId { src, dst };
        if self.wires_connected(src, dst) {
            return Ok(pip);
        }

        if let Some(info) = self.wires.get_mut(&src) {
            info.wires_downhill.push(dst);
        }
        if let Some(info) = self.wires.get_mut(&dst) {
            info.wires_uphill.push(src);
        }
        self.pip_count += 1;

        Ok(pip)
    }

    pub fn add_bel_pin(&mut self, wire: WireId, bel_pin: BelPin) -> Result<(), GraphError> {
        match self.wires.get_mut(&wire) {
            Some(info) => {
                info.bel_pins.push(bel_pin);
                Ok(())
            },
            None => Err(GraphError::MalformedAdjacency(
                format!("bel pin attached to missing wire {:?}", wire)
            )),
        }
    }

    pub fn wires_connected(&self, src: WireId, dst: WireId) -> bool {
        self.wires.get(&src)
            .map(|info| info.wires_downhill.contains(&dst))
            .unwrap_or(false)
    }

    pub fn wire(&self, wire: WireId) -> Option<&WireInfo> {
        self.wires.get(&wire)
    }

    pub fn contains_wire(&self, wire: WireId) -> bool {
        self.wires.contains_key(&wire)
    }

    pub fn wire_bel_pins(&self, wire: WireId) -> &[BelPin] {
        self.wires.get(&wire)
            .map(|info| info.bel_pins.as_slice())
            .unwrap_or(&[])
    }

    pub fn wire_count(&self) -> usize {
        self.wires.len()
    }

    pub fn pip_count(&self) -> usize {
        self.pip_count
    }

    pub fn wire_name(&self, strings: &IdStrings, wire: WireId) -> Option<String> {
        if !self.wires.contains_key(&wire) {
            return None;
        }
        if wire.is_synthetic() {
            let key = self.synthetic_names.get_by_right(&wire)?;
            return Some(format!(
                "{}.{}.{}.{}",
                SYNTHETIC_PREFIX, key.x, key.y, strings.get(key.name)
            ));
        }
        let pos = wire.pos();
        let ty = self.type_names.get_by_left(&pos.ty)?;
        Some(format!("{}.{:03}.{:03}.{:04}", strings.get(*ty), pos.x, pos.y, pos.z))
    }

    pub fn wire_by_name(&self, strings: &IdStrings, name: &str) -> Option<WireId> {
        let synthetic = name.strip_prefix(SYNTHETIC_PREFIX)
            .and_then(|rest| rest.strip_prefix('.'));
        if let Some(rest) = synthetic {
            let mut parts = rest.splitn(3, '.');
            let x = parts.next()?.parse::<u8>().ok()?;
            let y = parts.next()?.parse::<u8>().ok()?;
            let name = strings.find(parts.next()?)?;
            return self.synthetic_names.get_by_left(&SyntheticName { x, y, name }).copied();
        }

        let pos = parse_native_name(name, |ty| self.wire_type_by_name(strings, ty))?;
        let id = WireId::from_pos(pos).ok()?;
        self.wires.contains_key(&id).then(|| id)
    }

    pub fn pip_name(&self, strings: &IdStrings, pip: PipId) -> Option<String> {
        if !self.wires_connected(pip.src, pip.dst) {
            return None;
        }
        Some(format!(
            "{}->{}",
            self.wire_name(strings, pip.src)?,
            self.wire_name(strings, pip.dst)?
        ))
    }

    pub fn pip_by_name(&self, strings: &IdStrings, name: &str) -> Option<PipId> {
        let (src, dst) = name.split_once("->")?;
        let src = self.wire_by_name(strings, src)?;
        let dst = self.wire_by_name(strings, dst)?;
        self.wires_connected(src, dst).then(|| PipId { src, dst })
    }

    /// Verifies that the downhill and uphill views of every pip agree. A failure
    /// means the graph was corrupted during construction.
    pub fn check_consistency(&self) -> Result<(), GraphError> {
        let mut downhill_total = 0;
        let mut uphill_total = 0;

        for (wire, info) in &self.wires {
            downhill_total += info.wires_downhill.len();
            uphill_total += info.wires_uphill.len();

            for dst in &info.wires_downhill {
                let back = self.wires.get(dst)
                    .map(|d| d.wires_uphill.contains(wire))
                    .unwrap_or(false);
                if !back {
                    return Err(GraphError::MalformedAdjacency(
                        format!("{:?} lists {:?} downhill without the uphill entry", wire, dst)
                    ));
                }
            }
            for src in &info.wires_uphill {
                if !self.wires_connected(*src, *wire) {
                    return Err(GraphError::MalformedAdjacency(
                        format!("{:?} lists {:?} uphill without the downhill entry", wire, src)
                    ));
                }
            }
        }

        if downhill_total != uphill_total || downhill_total != self.pip_count {
            return Err(GraphError::MalformedAdjacency(format!(
                "{} downhill entries, {} uphill entries, {} pips",
                downhill_total, uphill_total, self.pip_count
            )));
        }

        Ok(())
    }

    /* Used by the iterators in `ranges` */
    pub(crate) fn wire_map(&self) -> &HashMap<WireId, WireInfo> {
        &self.wires
    }
}
