use std::time::{SystemTime, UNIX_EPOCH};

use super::{
    array::Array,
    callable::{NativeFn, NativeFunction},
    ExecutionErrorKind, Interpreter, Value,
};

fn native(name: &'static str, alias: &'static str, arity: usize, function: NativeFn) -> NativeFunction {
    NativeFunction {
        name,
        alias,
        arity,
        function,
    }
}

/// Every function installed in the global environment of a new interpreter.
pub fn all() -> Vec<NativeFunction> {
    vec![
        native("clock", "시간", 0, clock),
        native("read_input", "읽기", 0, read_input),
        native("split", "분리", 2, split),
        native("length", "길이", 1, length),
        native("substring", "부분문자열", 3, substring),
        native("contains", "포함", 2, contains),
        native("parse_int", "정수파싱", 1, parse_int),
        native("array", "배열", 0, array),
        native("array_size", "배열크기", 1, array_size),
        native("array_push", "배열추가", 2, array_push),
        native("array_get", "배열읽기", 2, array_get),
        native("array_set", "배열쓰기", 3, array_set),
    ]
}

fn error(function: &'static str, message: impl Into<String>) -> ExecutionErrorKind {
    ExecutionErrorKind::Native {
        function,
        message: message.into(),
    }
}

fn arguments<'a, const N: usize>(
    function: &'static str,
    args: &'a [Value],
) -> Result<&'a [Value; N], ExecutionErrorKind> {
    args.try_into()
        .map_err(|_| error(function, format!("expected {} arguments but got {}", N, args.len())))
}

fn string<'a>(function: &'static str, value: &'a Value) -> Result<&'a str, ExecutionErrorKind> {
    match value {
        Value::String(s) => Ok(s),
        other => Err(error(function, format!("expected a string but got {}", other))),
    }
}

fn number(function: &'static str, value: &Value) -> Result<f64, ExecutionErrorKind> {
    match value {
        Value::Number(n) => Ok(*n),
        other => Err(error(function, format!("expected a number but got {}", other))),
    }
}

fn array_argument<'a>(function: &'static str, value: &'a Value) -> Result<&'a Array, ExecutionErrorKind> {
    match value {
        Value::Array(array) => Ok(array),
        other => Err(error(function, format!("expected an array but got {}", other))),
    }
}

fn clock(_: &mut Interpreter, _: &[Value]) -> Result<Value, ExecutionErrorKind> {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(|e| error("clock", e.to_string()))?;
    Ok(Value::Number(now.as_secs_f64()))
}

/// Prompts with `>> ` and reads one line, without its line terminator.
/// End of input reads as the empty string.
fn read_input(interpreter: &mut Interpreter, _: &[Value]) -> Result<Value, ExecutionErrorKind> {
    {
        let mut stdout = interpreter.stdout.borrow_mut();
        write!(stdout, ">> ")?;
        stdout.flush()?;
    }

    let mut line = String::new();
    interpreter.stdin.borrow_mut().read_line(&mut line)?;
    let line = line
        .strip_suffix('\n')
        .map(|l| l.strip_suffix('\r').unwrap_or(l))
        .unwrap_or(line.as_str());
    Ok(Value::String(line.to_string()))
}

/// Splits on the literal delimiter. An empty delimiter yields each character.
fn split(_: &mut Interpreter, args: &[Value]) -> Result<Value, ExecutionErrorKind> {
    let [text, delimiter] = arguments::<2>("split", args)?;
    let text = string("split", text)?;
    let delimiter = string("split", delimiter)?;

    let parts = Array::new();
    if delimiter.is_empty() {
        for c in text.chars() {
            parts.push(Value::String(c.to_string()));
        }
    } else {
        for part in text.split(delimiter) {
            parts.push(Value::String(part.to_string()));
        }
    }
    Ok(Value::Array(parts))
}

fn length(_: &mut Interpreter, args: &[Value]) -> Result<Value, ExecutionErrorKind> {
    let [text] = arguments::<1>("length", args)?;
    let text = string("length", text)?;
    Ok(Value::Number(text.chars().count() as f64))
}

/// Characters in `[start, end)`. Fractional indices are truncated.
fn substring(_: &mut Interpreter, args: &[Value]) -> Result<Value, ExecutionErrorKind> {
    let [text, start, end] = arguments::<3>("substring", args)?;
    let text = string("substring", text)?;
    let start = number("substring", start)?.trunc();
    let end = number("substring", end)?.trunc();

    let len = text.chars().count() as f64;
    if start < 0.0 || end > len || start > end {
        return Err(error(
            "substring",
            format!("range {}..{} is out of bounds for length {}", start, end, len),
        ));
    }

    let (start, end) = (start as usize, end as usize);
    Ok(Value::String(
        text.chars().skip(start).take(end - start).collect(),
    ))
}

fn contains(_: &mut Interpreter, args: &[Value]) -> Result<Value, ExecutionErrorKind> {
    let [text, part] = arguments::<2>("contains", args)?;
    let text = string("contains", text)?;
    let part = string("contains", part)?;
    Ok(Value::Boolean(text.contains(part)))
}

/// Parses a base 10 integer with an optional sign, limited to 32 bits.
fn parse_int(_: &mut Interpreter, args: &[Value]) -> Result<Value, ExecutionErrorKind> {
    let [text] = arguments::<1>("parse_int", args)?;
    let text = string("parse_int", text)?;
    text.parse::<i32>()
        .map(|n| Value::Number(n as f64))
        .map_err(|e| error("parse_int", format!("cannot parse '{}': {}", text, e)))
}

fn array(_: &mut Interpreter, _: &[Value]) -> Result<Value, ExecutionErrorKind> {
    Ok(Value::Array(Array::new()))
}

fn array_size(_: &mut Interpreter, args: &[Value]) -> Result<Value, ExecutionErrorKind> {
    let [array] = arguments::<1>("array_size", args)?;
    Ok(Value::Number(array_argument("array_size", array)?.len() as f64))
}

fn array_push(_: &mut Interpreter, args: &[Value]) -> Result<Value, ExecutionErrorKind> {
    let [array, value] = arguments::<2>("array_push", args)?;
    array_argument("array_push", array)?.push(value.clone());
    Ok(Value::Nil)
}

fn array_get(_: &mut Interpreter, args: &[Value]) -> Result<Value, ExecutionErrorKind> {
    let [array, index] = arguments::<2>("array_get", args)?;
    let array = array_argument("array_get", array)?;
    array.get(number("array_get", index)?)
}

fn array_set(_: &mut Interpreter, args: &[Value]) -> Result<Value, ExecutionErrorKind> {
    let [array, index, value] = arguments::<3>("array_set", args)?;
    let array = array_argument("array_set", array)?;
    array.set(number("array_set", index)?, value.clone())?;
    Ok(value.clone())
}
