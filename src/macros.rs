//! The [`cbor!`] literal-construction macro.

/// Build a [`crate::Value`] tree from a JSON-like literal.
///
/// Maps use `key => value` pairs and preserve insertion order; the
/// profile's sort mode decides the emitted order at encode time.
/// Negative literals need parentheses (`(-1)`), as in other
/// token-tree-based literal macros.
///
/// ```
/// use polycbor::{cbor, Value};
///
/// let doc = cbor!({
///     "name" => "polycbor",
///     "ints" => [1, (-2), 3],
///     "ok" => true,
///     "gap" => null,
/// });
/// assert!(matches!(doc, Value::Map(_)));
/// ```
#[macro_export]
macro_rules! cbor {
    (null) => {
        $crate::Value::Null
    };
    (undefined) => {
        $crate::Value::Undefined
    };
    ([ $($elem:tt),* $(,)? ]) => {
        $crate::Value::Array(vec![ $( $crate::cbor!($elem) ),* ])
    };
    ({ $($key:tt => $value:tt),* $(,)? }) => {
        $crate::Value::Map(vec![ $( ($crate::cbor!($key), $crate::cbor!($value)) ),* ])
    };
    ($other:expr) => {
        $crate::Value::from($other)
    };
}
