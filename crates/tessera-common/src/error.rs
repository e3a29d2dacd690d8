//! Error conversion macros
//!
//! Crate error enums stay `thiserror`-derived; these macros cover the
//! conversions `#[from]` cannot express, such as foreign error types that
//! must be flattened into a `String` payload.

/// Implement `From<Source>` for a single-field error variant
///
/// # Example
///
/// ```ignore
/// use tessera_common::impl_error_from;
///
/// #[derive(Debug)]
/// enum StoreError {
///     Io(std::io::Error),
///     Parse(String),
/// }
///
/// impl_error_from!(std::io::Error => StoreError::Io);
/// impl_error_from!(std::num::ParseIntError => StoreError::Parse, |e| e.to_string());
/// ```
#[macro_export]
macro_rules! impl_error_from {
    ($source:ty => $target:ident::$variant:ident) => {
        impl From<$source> for $target {
            fn from(err: $source) -> Self {
                $target::$variant(err)
            }
        }
    };

    ($source:ty => $target:ident::$variant:ident, |$e:ident| $transform:expr) => {
        impl From<$source> for $target {
            fn from($e: $source) -> Self {
                $target::$variant($transform)
            }
        }
    };
}
