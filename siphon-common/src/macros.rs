/// Implements `Serialize` and `Deserialize` through the type's `Display` and `FromStr` impls.
///
/// The type is written as a plain string. The `$expectation` text shows up in deserialization
/// errors for non-string input, while parse failures report the `FromStr` error itself.
///
/// # Example
///
/// ```
/// use std::fmt;
/// use std::str::FromStr;
///
/// struct Tag(String);
///
/// impl fmt::Display for Tag {
///     fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
///         write!(f, "#{}", self.0)
///     }
/// }
///
/// impl FromStr for Tag {
///     type Err = &'static str;
///
///     fn from_str(s: &str) -> Result<Self, Self::Err> {
///         s.strip_prefix('#').map(|t| Tag(t.to_owned())).ok_or("missing hash")
///     }
/// }
///
/// siphon_common::impl_str_serde!(Tag, "a hash tag");
/// ```
#[macro_export]
macro_rules! impl_str_serde {
    ($type:ty, $expectation:expr) => {
        impl ::serde::Serialize for $type {
            fn serialize<S>(&self, serializer: S) -> ::std::result::Result<S::Ok, S::Error>
            where
                S: ::serde::Serializer,
            {
                serializer.collect_str(self)
            }
        }

        impl<'de> ::serde::Deserialize<'de> for $type {
            fn deserialize<D>(deserializer: D) -> ::std::result::Result<Self, D::Error>
            where
                D: ::serde::Deserializer<'de>,
            {
                struct StrVisitor;

                impl ::serde::de::Visitor<'_> for StrVisitor {
                    type Value = $type;

                    fn expecting(&self, f: &mut ::std::fmt::Formatter<'_>) -> ::std::fmt::Result {
                        f.write_str($expectation)
                    }

                    fn visit_str<E>(self, value: &str) -> ::std::result::Result<$type, E>
                    where
                        E: ::serde::de::Error,
                    {
                        value.parse().map_err(E::custom)
                    }
                }

                deserializer.deserialize_str(StrVisitor)
            }
        }
    };
}
