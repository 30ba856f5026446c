//! Internal declarative macros.

/// Declares a closed string vocabulary.
///
/// Generates the enum plus `ALL`, `as_str`, `Display`, a trimmed
/// case-insensitive `FromStr` whose error lists the allowed values, and a
/// `TryFrom<String>` used by serde for deserialization. Serialization uses
/// the wire names.
macro_rules! string_enum {
    (
        $(#[$meta:meta])*
        $vis:vis enum $name:ident ($field:literal) {
            $(
                $(#[doc = $doc:literal])*
                $variant:ident => $wire:literal
            ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, Hash, ::serde::Serialize, ::serde::Deserialize,
        )]
        #[serde(try_from = "String")]
        $vis enum $name {
            $(
                $(#[doc = $doc])*
                #[serde(rename = $wire)]
                $variant,
            )+
        }

        impl $name {
            /// Every value in declaration order.
            pub const ALL: &'static [Self] = &[$(Self::$variant),+];

            /// Returns the wire name.
            #[inline]
            #[must_use]
            pub const fn as_str(self) -> &'static str {
                match self {
                    $(Self::$variant => $wire,)+
                }
            }
        }

        impl ::std::fmt::Display for $name {
            fn fmt(&self, f: &mut ::std::fmt::Formatter<'_>) -> ::std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl ::std::str::FromStr for $name {
            type Err = $crate::error::Error;

            fn from_str(s: &str) -> ::std::result::Result<Self, Self::Err> {
                let trimmed = s.trim();
                if trimmed.is_empty() {
                    return Err($crate::error::Error::validation(
                        $field,
                        concat!($field, " cannot be empty"),
                    ));
                }

                Self::ALL
                    .iter()
                    .copied()
                    .find(|value| value.as_str().eq_ignore_ascii_case(trimmed))
                    .ok_or_else(|| {
                        let mut allowed: Vec<&str> = Self::ALL.iter().map(|v| v.as_str()).collect();
                        allowed.sort_unstable();
                        $crate::error::Error::validation(
                            $field,
                            format!(
                                "Invalid {} '{}'. Must be one of: {}",
                                $field,
                                trimmed,
                                allowed.join(", ")
                            ),
                        )
                    })
            }
        }

        impl ::std::convert::TryFrom<String> for $name {
            type Error = $crate::error::Error;

            fn try_from(value: String) -> ::std::result::Result<Self, Self::Error> {
                value.parse()
            }
        }
    };
}

/// Declares an event record whose deserialization runs its `normalize`
/// check.
///
/// The fields are read into a private unchecked mirror, moved into the
/// record, and the record is rejected if `normalize` fails. Serialization
/// is the plain derive.
macro_rules! validated_record {
    (
        $(#[$meta:meta])*
        $vis:vis struct $name:ident {
            $(
                $(#[$field_meta:meta])*
                $field:ident: $ty:ty
            ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(::serde::Serialize)]
        $vis struct $name {
            $(
                $(#[$field_meta])*
                $field: $ty,
            )+
        }

        impl<'de> ::serde::Deserialize<'de> for $name {
            fn deserialize<D>(deserializer: D) -> ::std::result::Result<Self, D::Error>
            where
                D: ::serde::Deserializer<'de>,
            {
                #[derive(::serde::Deserialize)]
                struct Unchecked {
                    $(
                        $(#[$field_meta])*
                        $field: $ty,
                    )+
                }

                let Unchecked { $($field),+ } = Unchecked::deserialize(deserializer)?;
                let mut record = $name { $($field),+ };
                record
                    .normalize()
                    .map_err(<D::Error as ::serde::de::Error>::custom)?;
                Ok(record)
            }
        }
    };
}
