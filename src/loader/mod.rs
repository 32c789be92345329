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

pub mod device;
pub mod packing;

pub use self::device::*;
pub use self::packing::*;

use std::path::Path;
use std::fs::File;
use std::io::{BufReader, Read};
use memmap2::Mmap;
use flate2::read::GzDecoder;
use serde::de::DeserializeOwned;

#[derive(Debug, thiserror::Error)]
pub enum OpenError {
    #[error("can't open file: {0}")]
    CantOpenFile(#[from] std::io::Error),
    #[error("malformed JSON document: {0}")]
    Json(#[from] serde_json::Error),
    #[error("malformed YAML document: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("invalid document: {0}")]
    Invalid(String),
}

pub struct OpenOpts {
    pub raw: bool,
}

impl Default for OpenOpts {
    fn default() -> Self {
        Self {
            raw: false
        }
    }
}

#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum Format {
    Json,
    Yaml,
}

impl Format {
    /// JSON for `.json` and `.json.gz` files, YAML for anything else.
    pub fn of_path(path: &Path) -> Self {
        let name = path.file_name()
            .and_then(|name| name.to_str())
            .unwrap_or("");
        let name = name.strip_suffix(".gz").unwrap_or(name);
        if name.ends_with(".json") {
            Format::Json
        } else {
            Format::Yaml
        }
    }
}

pub fn parse_document<T>(data: &[u8], format: Format) -> Result<T, OpenError> where
    T: DeserializeOwned
{
    Ok(match format {
        Format::Json => serde_json::from_slice(data)?,
        Format::Yaml => serde_yaml::from_slice(data)?,
    })
}

/// Reads a gzip-compressed document, or with `opts.raw` an uncompressed one
/// through a memory mapping.
pub fn read_document<T, P>(path: P, opts: &OpenOpts) -> Result<T, OpenError> where
    T: DeserializeOwned,
    P: AsRef<Path>,
{
    let format = Format::of_path(path.as_ref());
    let file = File::open(path.as_ref())?;

    /* RAW mode is much faster to load in debug builds. The file has to be
     * decompressed with gzip beforehand. */
    if opts.raw {
        /* UNSAFE DUE TO A POTENTIAL UB WHEN A FILE IS CHANGED! */
        let mmapped = unsafe { Mmap::map(&file) }?;
        parse_document(&mmapped, format)
    } else {
        let mut data = Vec::new();
        GzDecoder::new(BufReader::new(file)).read_to_end(&mut data)?;
        parse_document(&data, format)
    }
}
