// Copyright 2025 Dmitry Tantsur <dtantsur@protonmail.com>
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use std::borrow::Cow;
use std::collections::HashMap;
use std::ops::{Deref, DerefMut};

use serde::{Deserialize, Serialize};
use serde_json::Value;

#[inline]
fn subfield<'m>(map: &'m HashMap<String, Value>, key: &str) -> Option<&'m String> {
    match map.get(key) {
        Some(Value::String(s)) if !s.is_empty() => Some(s),
        _ => None,
    }
}

macro_rules! info_map {
    ($(#[$attr:meta])* $name:ident) => {
        $(#[$attr])*
        #[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
        pub struct $name(pub HashMap<String, Value>);

        impl Deref for $name {
            type Target = HashMap<String, Value>;

            fn deref(&self) -> &Self::Target {
                &self.0
            }
        }

        impl DerefMut for $name {
            fn deref_mut(&mut self) -> &mut Self::Target {
                &mut self.0
            }
        }
    };
}

macro_rules! info_string_field {
    ($(#[$attr:meta])* $func:ident, $set_func:ident, $with_func:ident -> $const:expr) => {
        $(#[$attr])*
        pub fn $func(&self) -> Option<&String> {
            subfield(&self.0, $const)
        }

        $(#[$attr])*
        pub fn $set_func<S: Into<String>>(&mut self, value: S) {
            let _ = self
                .0
                .insert($const.into(), Value::String(value.into()));
        }

        $(#[$attr])*
        pub fn $with_func<S: Into<String>>(mut self, value: S) -> Self {
            self.$set_func(value);
            self
        }
    }
}

info_map! {
    /// Driver-specific information.
    DriverInfo
}

/// Common image checksums.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageChecksum<'s> {
    /// MD5 checksum (the default, but not recommended).
    MD5(Cow<'s, str>),
    /// SHA256 checksum.
    SHA256(Cow<'s, str>),
    /// SHA512 checksum.
    SHA512(Cow<'s, str>),
}

impl<'s> ImageChecksum<'s> {
    /// Checksum with the algorithm given by name.
    ///
    /// An empty algorithm means MD5, unknown algorithms yield `None`.
    pub fn with_algorithm(algo: &str, value: &'s str) -> Option<ImageChecksum<'s>> {
        let value = Cow::Borrowed(value);
        match algo {
            "" | "md5" => Some(ImageChecksum::MD5(value)),
            "sha256" => Some(ImageChecksum::SHA256(value)),
            "sha512" => Some(ImageChecksum::SHA512(value)),
            _ => None,
        }
    }

    /// Name of the algorithm.
    pub fn algorithm(&self) -> &'static str {
        match self {
            ImageChecksum::MD5(..) => "md5",
            ImageChecksum::SHA256(..) => "sha256",
            ImageChecksum::SHA512(..) => "sha512",
        }
    }

    /// Checksum value.
    pub fn value(&self) -> &str {
        match self {
            ImageChecksum::MD5(s) | ImageChecksum::SHA256(s) | ImageChecksum::SHA512(s) => s,
        }
    }
}

info_map! {
    /// Instance-specific information.
    InstanceInfo
}

impl InstanceInfo {
    info_string_field! {
        #[doc = "ISO image to boot in case of the ramdisk deploy"]
        boot_iso, set_boot_iso, with_boot_iso -> "boot_iso"
    }

    /// Checksum of the image (if the algorithm is supported)
    pub fn image_checksum(&self) -> Option<ImageChecksum<'_>> {
        match subfield(&self.0, "image_os_hash_algo") {
            Some(algo) => {
                let value = subfield(&self.0, "image_os_hash_value")?;
                ImageChecksum::with_algorithm(algo, value)
            }
            None => {
                let value = subfield(&self.0, "image_checksum")?;
                Some(ImageChecksum::MD5(Cow::Borrowed(value.as_str())))
            }
        }
    }

    info_string_field! {
        #[doc = "Image to write to disk in case of a normal deployment"]
        image_source, set_image_source, with_image_source -> "image_source"
    }
}

info_map! {
    /// Node properties.
    Properties
}

impl Properties {
    info_string_field! {
        #[doc = "Capabilities of the node"]
        capabilities, set_capabilities, with_capabilities -> "capabilities"
    }
}
