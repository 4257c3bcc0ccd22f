//! Macro for implementing Display and FromStr for state enums
//!
//! Scheduler and lifecycle states are logged as structured fields and read
//! back from diagnostics, so each one needs a stable lowercase name.
//!
//! # Example
//!
//! ```rust
//! use metricbuf_domain::impl_state_conversions;
//!
//! #[derive(Debug, Clone, Copy, PartialEq, Eq)]
//! pub enum Phase {
//!     Warmup,
//!     Steady,
//! }
//!
//! impl_state_conversions!(Phase {
//!     Warmup => "warmup",
//!     Steady => "steady",
//! });
//!
//! assert_eq!(Phase::Steady.to_string(), "steady");
//! assert_eq!("WARMUP".parse::<Phase>(), Ok(Phase::Warmup));
//! ```

/// Implements Display and FromStr traits for state enums
///
/// - Display writes the given lowercase name
/// - FromStr parses case-insensitively and reports the enum name on failure
#[macro_export]
macro_rules! impl_state_conversions {
    ($enum_name:ident { $($variant:ident => $str:expr),+ $(,)? }) => {
        impl ::std::fmt::Display for $enum_name {
            fn fmt(&self, f: &mut ::std::fmt::Formatter<'_>) -> ::std::fmt::Result {
                match self {
                    $(Self::$variant => f.write_str($str),)+
                }
            }
        }

        impl ::std::str::FromStr for $enum_name {
            type Err = ::std::string::String;

            fn from_str(s: &str) -> ::std::result::Result<Self, Self::Err> {
                match s.to_lowercase().as_str() {
                    $($str => ::std::result::Result::Ok(Self::$variant),)+
                    _ => ::std::result::Result::Err(::std::format!(
                        "Invalid {}: {}",
                        ::std::stringify!($enum_name),
                        s
                    )),
                }
            }
        }
    };
}
