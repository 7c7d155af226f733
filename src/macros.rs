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

//! Macros shared by the protocol modules.

/// Define an enumeration of string values used on the wire.
///
/// The `= Default` form maps unrecognized values to the given variant,
/// the plain form rejects them.
macro_rules! protocol_enum {
    (
        @define
        $(#[$attr:meta])*
        enum $name:ident {
            $($(#[$iattr:meta])* $item:ident = $val:literal),+
        }
    ) => {
        $(#[$attr])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum $name {
            $($(#[$iattr])* $item),+
        }

        impl $name {
            /// String representation used on the wire.
            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$item => $val),+
                }
            }
        }

        impl ::std::fmt::Display for $name {
            fn fmt(&self, f: &mut ::std::fmt::Formatter<'_>) -> ::std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl ::serde::ser::Serialize for $name {
            fn serialize<S>(&self, serializer: S) -> ::std::result::Result<S::Ok, S::Error>
            where
                S: ::serde::ser::Serializer,
            {
                serializer.serialize_str(self.as_str())
            }
        }

        impl From<$name> for ::serde_json::Value {
            fn from(value: $name) -> ::serde_json::Value {
                ::serde_json::Value::String(value.as_str().into())
            }
        }
    };

    (
        $(#[$attr:meta])*
        enum $name:ident = $default:ident {
            $($(#[$iattr:meta])* $item:ident = $val:literal),+ $(,)?
        }
    ) => {
        protocol_enum! {
            @define $(#[$attr])* enum $name { $($(#[$iattr])* $item = $val),+ }
        }

        impl<'de> ::serde::de::Deserialize<'de> for $name {
            fn deserialize<D>(deserializer: D) -> ::std::result::Result<$name, D::Error>
            where
                D: ::serde::de::Deserializer<'de>,
            {
                let value: String = ::serde::de::Deserialize::deserialize(deserializer)?;
                Ok(match value.as_str() {
                    $($val => $name::$item,)+
                    _ => $name::$default,
                })
            }
        }
    };

    (
        $(#[$attr:meta])*
        enum $name:ident {
            $($(#[$iattr:meta])* $item:ident = $val:literal),+ $(,)?
        }
    ) => {
        protocol_enum! {
            @define $(#[$attr])* enum $name { $($(#[$iattr])* $item = $val),+ }
        }

        impl<'de> ::serde::de::Deserialize<'de> for $name {
            fn deserialize<D>(deserializer: D) -> ::std::result::Result<$name, D::Error>
            where
                D: ::serde::de::Deserializer<'de>,
            {
                let value: String = ::serde::de::Deserialize::deserialize(deserializer)?;
                match value.as_str() {
                    $($val => Ok($name::$item),)+
                    other => Err(<D::Error as ::serde::de::Error>::custom(format!(
                        "unexpected {} value {:?}",
                        stringify!($name),
                        other
                    ))),
                }
            }
        }
    };
}

/// Build a map of desired options for the node updater.
///
/// Values are converted with `serde_json::Value::from`, so `None` becomes
/// `null` which requests removal of the option.
macro_rules! options {
    ($($key:expr => $value:expr),* $(,)?) => {{
        #[allow(unused_mut)]
        let mut opts = ::serde_json::Map::new();
        $(
            let _ = opts.insert(String::from($key), ::serde_json::Value::from($value));
        )*
        opts
    }};
}
