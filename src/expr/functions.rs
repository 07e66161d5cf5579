//! Builtin expression functions

use super::{is_truthy, loose_eq, number_value, value_to_number, value_to_string};
use crate::error::{Error, Result};
use base64::Engine as _;
use chrono::Utc;
use serde_json::Value;

/// Invoke a builtin function over already-evaluated arguments
pub fn call_function(name: &str, args: &[Value]) -> Result<Value> {
    match name {
        "to_string" => {
            let arg = single(name, args)?;
            Ok(Value::String(value_to_string(arg)))
        }
        "to_number" => {
            let arg = single(name, args)?;
            Ok(value_to_number(arg).map_or(Value::Null, number_value))
        }
        "url_encode" => {
            let arg = single(name, args)?;
            Ok(Value::String(
                urlencoding::encode(&value_to_string(arg)).into_owned(),
            ))
        }
        "base64" => {
            let arg = single(name, args)?;
            Ok(Value::String(
                base64::engine::general_purpose::STANDARD.encode(value_to_string(arg)),
            ))
        }
        "count" => {
            let null = Value::Null;
            let arg = args.first().unwrap_or(&null);
            let count = match arg {
                Value::Array(arr) => arr.len(),
                Value::String(s) => s.len(),
                _ => 0,
            };
            Ok(Value::Number(count.into()))
        }
        "max" => {
            let max = args
                .iter()
                .filter_map(value_to_number)
                .fold(None::<f64>, |acc, n| Some(acc.map_or(n, |a| a.max(n))));
            Ok(max.map_or(Value::Null, number_value))
        }
        "now" => Ok(Value::Number(Utc::now().timestamp_millis().into())),
        "not" => {
            let arg = single(name, args)?;
            Ok(Value::Bool(!is_truthy(arg)))
        }
        "find_in" => {
            if args.len() != 3 {
                return Err(Error::expression("find_in expects (array, key, value)"));
            }
            let (arr, key, needle) = (&args[0], &args[1], &args[2]);
            let key = value_to_string(key);
            let found = match arr {
                Value::Array(items) => items
                    .iter()
                    .find(|item| item.get(&key).is_some_and(|v| loose_eq(v, needle)))
                    .cloned(),
                _ => None,
            };
            Ok(found.unwrap_or(Value::Null))
        }
        _ => Err(Error::expression(format!("unknown function: {name}"))),
    }
}

fn single<'a>(name: &str, args: &'a [Value]) -> Result<&'a Value> {
    args.first()
        .ok_or_else(|| Error::expression(format!("{name} expects one argument")))
}
