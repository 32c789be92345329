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

/// Interned string handle. Only meaningful together with the `IdStrings`
/// context that created it.
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Debug, Serialize, Deserialize)]
pub struct IdString(u32);

impl IdString {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/* Unlike the per-process tables in `pins`, the string pool grows while the device
 * model is being built, so it is owned by the model instead of being a global. */
#[derive(Default, Clone, Debug)]
pub struct IdStrings {
    strings: Vec<String>,
    revmap: HashMap<String, IdString>,
}

impl IdStrings {
    pub fn new() -> Self {
        Default::default()
    }

    /// Get an identifier for a provided string. Creates a new identifier if the
    /// string was not registered. Returns an existing identifier if the string has been
    /// already registered.
    pub fn intern(&mut self, s: &str) -> IdString {
        if let Some(id) = self.revmap.get(s) {
            return *id;
        }

        let id = IdString(self.strings.len() as u32);
        self.strings.push(s.to_string());
        self.revmap.insert(s.to_string(), id);
        id
    }

    /// Look a string up without registering it.
    pub fn find(&self, s: &str) -> Option<IdString> {
        self.revmap.get(s).copied()
    }

    pub fn get<'s>(&'s self, id: IdString) -> &'s str {
        &self.strings[id.index()]
    }

    pub fn len(&self) -> usize {
        self.strings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strings.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interning_is_idempotent() {
        let mut strings = IdStrings::new();
        let a = strings.intern("LAB_CLK0");
        let b = strings.intern("LAB_CLK1");
        let a2 = strings.intern("LAB_CLK0");

        assert_eq!(a, a2);
        assert_ne!(a, b);
        assert_eq!(strings.len(), 2);
        assert_eq!(strings.get(b), "LAB_CLK1");
        assert_eq!(strings.find("LAB_CLK2"), None);
    }
}
