//! Property-path navigation over [`Value`] trees.
//!
//! Paths are the dotted/bracketed form used inside markers:
//! `Customer.Address.City`, `Orders[0].Id`, `Prices[key]`.

use crate::value::Value;

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Step {
    /// `.name` access on a map.
    Field(String),
    /// `[key]` access on a list (digits) or map (name).
    Index(String),
}

fn is_name_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_' || c == '@'
}

fn is_name_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '@'
}

/// Parse a path into its steps; `None` for anything the grammar does not
/// cover.
pub(crate) fn parse_path(path: &str) -> Option<Vec<Step>> {
    let mut steps = Vec::new();
    let mut chars = path.chars().peekable();

    loop {
        // a field name
        let mut name = String::new();
        match chars.peek() {
            Some(&c) if is_name_start(c) => {}
            _ => return None,
        }
        while let Some(&c) = chars.peek() {
            if is_name_char(c) {
                name.push(c);
                chars.next();
            } else {
                break;
            }
        }
        steps.push(Step::Field(name));

        // any number of [key] suffixes
        while chars.peek() == Some(&'[') {
            chars.next();
            let mut key = String::new();
            loop {
                match chars.next() {
                    Some(']') => break,
                    Some(c) if is_name_char(c) => key.push(c),
                    _ => return None,
                }
            }
            if key.is_empty() {
                return None;
            }
            steps.push(Step::Index(key));
        }

        match chars.next() {
            None => return Some(steps),
            Some('.') => continue,
            Some(_) => return None,
        }
    }
}

/// Navigate `root` along `path`.
///
/// `None` means the path does not resolve (a missing key, or a step that
/// does not apply); `Some(Value::Null)` is an explicit null. Any further
/// step on null stays null, and an out-of-range list index yields null.
pub(crate) fn resolve_path(root: &Value, path: &str) -> Option<Value> {
    let steps = parse_path(path)?;
    resolve_steps(root, &steps)
}

pub(crate) fn resolve_steps(root: &Value, steps: &[Step]) -> Option<Value> {
    let mut current = root;
    for (position, step) in steps.iter().enumerate() {
        match (current, step) {
            (Value::Null, _) => return Some(Value::Null),
            (Value::Map(map), Step::Field(name)) => current = map.get(name)?,
            (Value::Map(map), Step::Index(key)) => current = map.get(key)?,
            (Value::List(items), Step::Index(key)) => {
                let index: usize = key.parse().ok()?;
                match items.get(index) {
                    Some(item) => current = item,
                    None => return Some(Value::Null),
                }
            }
            // on a list, only the @count metadata name resolves; any
            // other field fails
            (Value::List(items), Step::Field(name)) if name == "@count" => {
                return if position + 1 == steps.len() {
                    Some(Value::Int(items.len() as i64))
                } else {
                    None
                };
            }
            _ => return None,
        }
    }
    Some(current.clone())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn data() -> Value {
        Value::parse_data(
            r#"{
                "Customer": { "Address": { "City": "Berlin" }, "Tags": ["a", "b"] },
                "Orders": [ { "Id": 1 }, { "Id": 2 } ],
                "Empty": null
            }"#,
        )
        .unwrap()
    }

    #[test]
    fn test_parse_path() {
        assert_eq!(
            parse_path("a.b"),
            Some(vec![
                Step::Field("a".to_owned()),
                Step::Field("b".to_owned())
            ])
        );
        assert_eq!(
            parse_path("a[0].b"),
            Some(vec![
                Step::Field("a".to_owned()),
                Step::Index("0".to_owned()),
                Step::Field("b".to_owned())
            ])
        );
        assert_eq!(parse_path(""), None);
        assert_eq!(parse_path("a..b"), None);
        assert_eq!(parse_path("a["), None);
        assert_eq!(parse_path("a[]"), None);
        assert_eq!(parse_path("a b"), None);
    }

    #[test]
    fn test_nested_field() {
        assert_eq!(
            resolve_path(&data(), "Customer.Address.City"),
            Some(Value::String("Berlin".to_owned()))
        );
    }

    #[test]
    fn test_list_index() {
        assert_eq!(resolve_path(&data(), "Orders[1].Id"), Some(Value::Int(2)));
        assert_eq!(resolve_path(&data(), "Customer.Tags[0]"), Some(Value::String("a".to_owned())));
    }

    #[test]
    fn test_out_of_range_is_null() {
        assert_eq!(resolve_path(&data(), "Orders[9]"), Some(Value::Null));
        assert_eq!(resolve_path(&data(), "Orders[9].Id"), Some(Value::Null));
    }

    #[test]
    fn test_missing_key_fails() {
        assert_eq!(resolve_path(&data(), "Customer.Phone"), None);
        assert_eq!(resolve_path(&data(), "Nope"), None);
    }

    #[test]
    fn test_step_on_null_is_null() {
        assert_eq!(resolve_path(&data(), "Empty.anything"), Some(Value::Null));
    }

    #[test]
    fn test_field_on_list_fails() {
        assert_eq!(resolve_path(&data(), "Orders.Id"), None);
    }

    #[test]
    fn test_count_metadata_on_list() {
        assert_eq!(resolve_path(&data(), "Orders.@count"), Some(Value::Int(2)));
        assert_eq!(resolve_path(&data(), "Customer.Tags.@count"), Some(Value::Int(2)));
        // @count is a leaf: stepping past it fails
        assert_eq!(resolve_path(&data(), "Orders.@count.x"), None);
        // the other metadata names need an iteration position and do not
        // resolve on a bare list
        assert_eq!(resolve_path(&data(), "Orders.@index"), None);
        assert_eq!(resolve_path(&data(), "Orders.@first"), None);
    }

    #[test]
    fn test_bracket_key_on_map() {
        assert_eq!(
            resolve_path(&data(), "Customer[Address].City"),
            Some(Value::String("Berlin".to_owned()))
        );
    }
}
