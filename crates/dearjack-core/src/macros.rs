//! Parameter list macro.

/// Build an ordered list of `(name, ParamValue)` pairs.
///
/// # Example
/// ```
/// use dearjack_core::{params, ParamValue};
///
/// let initial = params! {
///     "frequency" => 220.0,
///     "amplitude" => 0.25,
/// };
/// assert_eq!(initial[0], ("frequency".to_string(), ParamValue::Float(220.0)));
/// ```
#[macro_export]
macro_rules! params {
    ($($key:expr => $value:expr),* $(,)?) => {{
        #[allow(unused_mut)]
        let mut list: ::std::vec::Vec<(::std::string::String, $crate::ParamValue)> =
            ::std::vec::Vec::new();
        $(
            list.push(($key.to_string(), $crate::ParamValue::from($value)));
        )*
        list
    }};
}
