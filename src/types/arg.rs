//! Arguments of a single output call and their textual rendering

use serde::Serialize;
use std::borrow::Cow;
use std::fmt;

/// One argument passed to an output channel
#[derive(Debug, Clone, PartialEq)]
pub enum LogArg {
    /// Plain text, rendered verbatim
    Text(String),
    /// Structured value, pretty-printed unless it is a string
    Value(serde_json::Value),
    /// A value that could not be serialized; rendered as its type name
    Opaque(&'static str),
}

impl LogArg {
    /// Capture any serializable value.
    ///
    /// Serialization failures never propagate: the argument degrades to the
    /// name of its type.
    pub fn structured<T: Serialize + ?Sized>(value: &T) -> Self {
        match serde_json::to_value(value) {
            Ok(value) => LogArg::Value(value),
            Err(_) => LogArg::Opaque(std::any::type_name::<T>()),
        }
    }

    /// Capture a value through its pretty `Debug` representation
    pub fn debug<T: fmt::Debug + ?Sized>(value: &T) -> Self {
        LogArg::Text(format!("{:#?}", value))
    }

    /// Textual form used in the captured message
    pub fn render(&self) -> Cow<'_, str> {
        match self {
            LogArg::Text(text) => Cow::Borrowed(text),
            LogArg::Value(serde_json::Value::String(text)) => Cow::Borrowed(text),
            LogArg::Value(value) => Cow::Owned(
                serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string()),
            ),
            LogArg::Opaque(type_name) => Cow::Borrowed(type_name),
        }
    }
}

impl fmt::Display for LogArg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}

/// Join rendered arguments with a single space
pub fn render_args(args: &[LogArg]) -> String {
    let mut message = String::new();
    for (i, arg) in args.iter().enumerate() {
        if i > 0 {
            message.push(' ');
        }
        message.push_str(&arg.render());
    }
    message
}

impl From<&str> for LogArg {
    fn from(text: &str) -> Self {
        LogArg::Text(text.to_string())
    }
}

impl From<String> for LogArg {
    fn from(text: String) -> Self {
        LogArg::Text(text)
    }
}

impl From<&String> for LogArg {
    fn from(text: &String) -> Self {
        LogArg::Text(text.clone())
    }
}

impl From<serde_json::Value> for LogArg {
    fn from(value: serde_json::Value) -> Self {
        LogArg::Value(value)
    }
}

macro_rules! impl_from_display {
    ($($ty:ty),* $(,)?) => {
        $(
            impl From<$ty> for LogArg {
                fn from(value: $ty) -> Self {
                    LogArg::Text(value.to_string())
                }
            }
        )*
    };
}

impl_from_display!(bool, char, i8, i16, i32, i64, i128, isize, u8, u16, u32, u64, u128, usize, f32, f64);

/// Build a `[LogArg; N]` from heterogeneous values
///
/// ```
/// use logship::log_args;
///
/// let args = log_args!["retry", 3, serde_json::json!({"backoff_ms": 250})];
/// assert_eq!(args.len(), 3);
/// ```
#[macro_export]
macro_rules! log_args {
    ($($arg:expr),* $(,)?) => {
        [$($crate::types::LogArg::from($arg)),*]
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::ser::Error as _;
    use serde_json::json;

    struct Unserializable;

    impl Serialize for Unserializable {
        fn serialize<S: serde::Serializer>(&self, _serializer: S) -> Result<S::Ok, S::Error> {
            Err(S::Error::custom("cannot serialize"))
        }
    }

    #[test]
    fn test_text_and_scalars_render_verbatim() {
        let args = log_args!["user", 42, true, 1.5];
        assert_eq!(render_args(&args), "user 42 true 1.5");
    }

    #[test]
    fn test_objects_are_pretty_printed() {
        let args = [LogArg::from("payload"), LogArg::from(json!({"id": 7}))];
        assert_eq!(render_args(&args), "payload {\n  \"id\": 7\n}");
    }

    #[test]
    fn test_structured_string_is_not_quoted() {
        assert_eq!(LogArg::structured("plain").render(), "plain");
        assert_eq!(LogArg::structured(&Option::<u8>::None).render(), "null");
    }

    #[test]
    fn test_serialization_failure_degrades_to_type_name() {
        let arg = LogArg::structured(&Unserializable);
        assert!(matches!(arg, LogArg::Opaque(_)));
        assert!(arg.render().ends_with("Unserializable"));
    }

    #[test]
    fn test_debug_fallback() {
        let arg = LogArg::debug(&vec![1, 2]);
        assert!(arg.render().contains('1'));
        assert!(arg.render().contains('\n'));
    }

    #[test]
    fn test_empty_args_render_empty_message() {
        assert_eq!(render_args(&[]), "");
    }
}
