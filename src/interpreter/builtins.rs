//! Built-in function implementations
//!
//! This module provides the host library: C functions that are always
//! declared and are executed by the engine rather than defined in user code.
//!
//! # Supported Built-ins
//!
//! - `printf(format, ...)`: Formatted output to the captured terminal
//! - `puts(s)`, `putchar(c)`: Unformatted output
//! - `malloc(size)`, `calloc(n, size)`, `free(ptr)`: Heap management
//! - `strlen`, `strcmp`, `strcpy`, `memset`: String and byte helpers
//! - `abs(n)`
//!
//! # Implementation Notes
//!
//! - `printf` supports flags `-+ 0#`, width and precision (including `*`),
//!   length modifiers `hh h l ll z`, and conversions `d i u x X o c s f F
//!   e E g G p %`
//! - Arguments arrive already converted to the parameter types declared by
//!   [`signature`]; variadic arguments carry their promoted values
//! - A user definition with the same name replaces the built-in

use crate::interpreter::engine::Interpreter;
use crate::interpreter::errors::RuntimeError;
use crate::memory::value::Value;
use crate::sema::types::{CType, FunctionType, IntKind};

/// Names of all host library functions
pub const BUILTIN_NAMES: [&str; 11] = [
    "printf", "puts", "putchar", "malloc", "calloc", "free", "strlen", "strcmp", "strcpy", "memset", "abs",
];

/// Prototype of a host library function
pub fn signature(name: &str) -> Option<FunctionType> {
    let int = CType::int();
    let char_ptr = CType::Int(IntKind::Char).pointer_to();
    let void_ptr = CType::Void.pointer_to();
    let size_t = CType::Int(IntKind::ULong);

    let (ret, params, variadic) = match name {
        "printf" => (int, vec![char_ptr], true),
        "puts" => (int, vec![char_ptr], false),
        "putchar" => (int.clone(), vec![int], false),
        "malloc" => (void_ptr, vec![size_t], false),
        "calloc" => (void_ptr, vec![size_t.clone(), size_t], false),
        "free" => (CType::Void, vec![void_ptr], false),
        "strlen" => (size_t, vec![char_ptr], false),
        "strcmp" => (int, vec![char_ptr.clone(), char_ptr], false),
        "strcpy" => (char_ptr.clone(), vec![char_ptr.clone(), char_ptr], false),
        "memset" => (void_ptr.clone(), vec![void_ptr, int, size_t], false),
        "abs" => (int.clone(), vec![int], false),
        _ => return None,
    };
    Some(FunctionType { ret, params, variadic })
}

fn arg(args: &[Value], index: usize) -> Result<&Value, RuntimeError> {
    args.get(index).ok_or_else(|| RuntimeError::InvalidFormat {
        message: "not enough arguments for format string".to_string(),
    })
}

fn pointer_arg(args: &[Value], index: usize) -> u64 {
    args.get(index).and_then(Value::as_pointer).unwrap_or(0)
}

fn int_arg(args: &[Value], index: usize) -> i64 {
    args.get(index).and_then(Value::as_int).unwrap_or(0)
}

impl Interpreter<'_> {
    pub(crate) fn call_builtin(&mut self, name: &str, args: &[Value]) -> Result<Value, RuntimeError> {
        match name {
            "printf" => {
                let format = self.program.memory.read_c_string(pointer_arg(args, 0))?;
                let output = self.format_printf(&format, &args[1.min(args.len())..])?;
                self.engine.terminal.print(&output);
                Ok(Value::Int(output.len() as i64))
            }
            "puts" => {
                let text = self.program.memory.read_c_string(pointer_arg(args, 0))?;
                self.engine.terminal.print(&text);
                self.engine.terminal.put_byte(b'\n');
                Ok(Value::Int(text.len() as i64 + 1))
            }
            "putchar" => {
                let c = int_arg(args, 0);
                self.engine.terminal.put_byte(c as u8);
                Ok(Value::Int(c as u8 as i64))
            }
            "malloc" => {
                let size = int_arg(args, 0) as u64 as usize;
                Ok(Value::Pointer(self.program.memory.malloc(size)?))
            }
            "calloc" => {
                let count = int_arg(args, 0) as u64;
                let size = int_arg(args, 1) as u64;
                let total = count.checked_mul(size).ok_or(RuntimeError::OutOfMemory {
                    requested: usize::MAX,
                    limit: 0,
                })?;
                // malloc memory is already zeroed
                Ok(Value::Pointer(self.program.memory.malloc(total as usize)?))
            }
            "free" => {
                self.program.memory.free(pointer_arg(args, 0))?;
                Ok(Value::Void)
            }
            "strlen" => {
                let text = self.program.memory.read_c_string(pointer_arg(args, 0))?;
                Ok(Value::Int(text.len() as i64))
            }
            "strcmp" => {
                let a = self.program.memory.read_c_string(pointer_arg(args, 0))?;
                let b = self.program.memory.read_c_string(pointer_arg(args, 1))?;
                let ordering = a.cmp(&b) as i64;
                Ok(Value::Int(ordering))
            }
            "strcpy" => {
                let dest = pointer_arg(args, 0);
                let mut text = self.program.memory.read_c_string(pointer_arg(args, 1))?;
                text.push(0);
                self.program.memory.write(dest, &text)?;
                Ok(Value::Pointer(dest))
            }
            "memset" => {
                let dest = pointer_arg(args, 0);
                let byte = int_arg(args, 1) as u8;
                let count = int_arg(args, 2) as u64 as usize;
                self.program.memory.write(dest, &vec![byte; count])?;
                Ok(Value::Pointer(dest))
            }
            "abs" => Ok(Value::Int(IntKind::Int.wrap(int_arg(args, 0).wrapping_abs()))),
            other => Err(RuntimeError::UndefinedFunction { name: other.to_string() }),
        }
    }

    fn format_printf(&self, format: &[u8], args: &[Value]) -> Result<Vec<u8>, RuntimeError> {
        let mut output = Vec::new();
        let mut arg_index = 0;
        let mut i = 0;

        while i < format.len() {
            let ch = format[i];
            i += 1;
            if ch != b'%' {
                output.push(ch);
                continue;
            }

            let mut spec = Spec::default();
            while let Some(&flag) = format.get(i) {
                match flag {
                    b'-' => spec.left = true,
                    b'+' => spec.plus = true,
                    b' ' => spec.space = true,
                    b'0' => spec.zero = true,
                    b'#' => spec.alternate = true,
                    _ => break,
                }
                i += 1;
            }

            if format.get(i) == Some(&b'*') {
                i += 1;
                let width = arg(args, arg_index)?.as_int().unwrap_or(0);
                arg_index += 1;
                if width < 0 {
                    spec.left = true;
                }
                spec.width = width.unsigned_abs() as usize;
            } else {
                spec.width = read_number(format, &mut i);
            }

            if format.get(i) == Some(&b'.') {
                i += 1;
                if format.get(i) == Some(&b'*') {
                    i += 1;
                    let precision = arg(args, arg_index)?.as_int().unwrap_or(0);
                    arg_index += 1;
                    spec.precision = (precision >= 0).then_some(precision as usize);
                } else {
                    spec.precision = Some(read_number(format, &mut i));
                }
            }

            let mut length = Length::Default;
            while let Some(&modifier) = format.get(i) {
                length = match (modifier, length) {
                    (b'h', Length::Short) => Length::Char,
                    (b'h', _) => Length::Short,
                    (b'l', _) | (b'z', _) => Length::Long,
                    _ => break,
                };
                i += 1;
            }

            let Some(&conversion) = format.get(i) else {
                return Err(RuntimeError::InvalidFormat {
                    message: "incomplete conversion specification".to_string(),
                });
            };
            i += 1;

            if conversion == b'%' {
                output.push(b'%');
                continue;
            }
            let value = arg(args, arg_index)?;
            arg_index += 1;

            let text = match conversion {
                b'd' | b'i' => {
                    let n = length.signed(value.as_int().unwrap_or(0));
                    spec.signed_integer(n)
                }
                b'u' | b'x' | b'X' | b'o' => {
                    let n = length.unsigned(value.as_int().unwrap_or(0));
                    spec.unsigned_integer(n, conversion)
                }
                b'c' => spec.pad(vec![value.as_int().unwrap_or(0) as u8], false),
                b's' => {
                    let mut text = self.program.memory.read_c_string(value.as_pointer().unwrap_or(0))?;
                    if let Some(precision) = spec.precision {
                        text.truncate(precision);
                    }
                    spec.pad(text, false)
                }
                b'f' | b'F' | b'e' | b'E' | b'g' | b'G' => {
                    let f = value.as_float().unwrap_or_else(|| value.as_int().unwrap_or(0) as f64);
                    spec.float(f, conversion)
                }
                b'p' => {
                    let text = format!("0x{:x}", value.as_pointer().unwrap_or(0));
                    spec.pad(text.into_bytes(), false)
                }
                other => {
                    return Err(RuntimeError::InvalidFormat {
                        message: format!("unknown conversion '%{}'", other as char),
                    })
                }
            };
            output.extend_from_slice(&text);
        }

        Ok(output)
    }
}

fn read_number(format: &[u8], i: &mut usize) -> usize {
    let mut n = 0usize;
    while let Some(digit) = format.get(*i).filter(|b| b.is_ascii_digit()) {
        n = n.saturating_mul(10).saturating_add((digit - b'0') as usize);
        *i += 1;
    }
    n
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Length {
    Char,
    Short,
    Default,
    Long,
}

impl Length {
    fn signed(self, raw: i64) -> i64 {
        match self {
            Length::Char => IntKind::SChar.wrap(raw),
            Length::Short => IntKind::Short.wrap(raw),
            Length::Default => IntKind::Int.wrap(raw),
            Length::Long => raw,
        }
    }

    fn unsigned(self, raw: i64) -> u64 {
        match self {
            Length::Char => IntKind::UChar.wrap(raw) as u64,
            Length::Short => IntKind::UShort.wrap(raw) as u64,
            Length::Default => IntKind::UInt.wrap(raw) as u64,
            Length::Long => raw as u64,
        }
    }
}

/// One parsed `%` conversion specification
#[derive(Debug, Default)]
struct Spec {
    left: bool,
    plus: bool,
    space: bool,
    zero: bool,
    alternate: bool,
    width: usize,
    precision: Option<usize>,
}

impl Spec {
    /// Apply field width. `numeric` allows zero padding after the sign.
    fn pad(&self, body: Vec<u8>, numeric: bool) -> Vec<u8> {
        if body.len() >= self.width {
            return body;
        }
        let fill = self.width - body.len();
        if self.left {
            let mut out = body;
            out.extend(std::iter::repeat(b' ').take(fill));
            return out;
        }
        if numeric && self.zero && self.precision.is_none() {
            let sign_len = body
                .iter()
                .take_while(|b| matches!(b, b'-' | b'+' | b' '))
                .count();
            let prefix_len = if body[sign_len..].starts_with(b"0x") || body[sign_len..].starts_with(b"0X") {
                sign_len + 2
            } else {
                sign_len
            };
            let mut out = body[..prefix_len].to_vec();
            out.extend(std::iter::repeat(b'0').take(fill));
            out.extend_from_slice(&body[prefix_len..]);
            return out;
        }
        let mut out: Vec<u8> = std::iter::repeat(b' ').take(fill).collect();
        out.extend(body);
        out
    }

    fn sign_prefix(&self, negative: bool) -> &'static str {
        if negative {
            "-"
        } else if self.plus {
            "+"
        } else if self.space {
            " "
        } else {
            ""
        }
    }

    fn digits_with_precision(&self, digits: String) -> String {
        match self.precision {
            Some(0) if digits == "0" => String::new(),
            Some(p) if digits.len() < p => format!("{}{}", "0".repeat(p - digits.len()), digits),
            _ => digits,
        }
    }

    fn signed_integer(&self, n: i64) -> Vec<u8> {
        let digits = self.digits_with_precision(n.unsigned_abs().to_string());
        let body = format!("{}{}", self.sign_prefix(n < 0), digits);
        self.pad(body.into_bytes(), true)
    }

    fn unsigned_integer(&self, n: u64, conversion: u8) -> Vec<u8> {
        let digits = match conversion {
            b'x' => format!("{:x}", n),
            b'X' => format!("{:X}", n),
            b'o' => format!("{:o}", n),
            _ => n.to_string(),
        };
        let digits = self.digits_with_precision(digits);
        let body = match conversion {
            b'x' if self.alternate && n != 0 => format!("0x{}", digits),
            b'X' if self.alternate && n != 0 => format!("0X{}", digits),
            b'o' if self.alternate && !digits.starts_with('0') => format!("0{}", digits),
            _ => digits,
        };
        self.pad(body.into_bytes(), true)
    }

    fn float(&self, f: f64, conversion: u8) -> Vec<u8> {
        let upper = conversion.is_ascii_uppercase();
        let precision = self.precision.unwrap_or(6);

        let body = if f.is_nan() {
            "nan".to_string()
        } else if f.is_infinite() {
            "inf".to_string()
        } else {
            match conversion.to_ascii_lowercase() {
                b'f' => format!("{:.*}", precision, f.abs()),
                b'e' => exponent_form(f.abs(), precision),
                _ => general_form(f.abs(), precision, self.alternate),
            }
        };
        let body = if upper { body.to_ascii_uppercase() } else { body };
        let negative = f.is_sign_negative() && !f.is_nan();
        let text = format!("{}{}", self.sign_prefix(negative), body);
        self.pad(text.into_bytes(), f.is_finite())
    }
}

/// `%e` rendering: one leading digit, `precision` fraction digits and an
/// exponent of at least two digits
fn exponent_form(f: f64, precision: usize) -> String {
    let rendered = format!("{:.*e}", precision, f);
    let (mantissa, exponent) = rendered.split_once('e').unwrap_or((&rendered, "0"));
    let exponent: i32 = exponent.parse().unwrap_or(0);
    let sign = if exponent < 0 { '-' } else { '+' };
    format!("{}e{}{:02}", mantissa, sign, exponent.abs())
}

/// `%g` rendering
fn general_form(f: f64, precision: usize, alternate: bool) -> String {
    let p = precision.max(1);
    let exponent = if f == 0.0 {
        0
    } else {
        let rendered = format!("{:.*e}", p - 1, f);
        rendered
            .split_once('e')
            .and_then(|(_, e)| e.parse::<i32>().ok())
            .unwrap_or(0)
    };

    let text = if exponent < -4 || exponent >= p as i32 {
        exponent_form(f, p - 1)
    } else {
        format!("{:.*}", (p as i32 - 1 - exponent).max(0) as usize, f)
    };
    if alternate {
        return text;
    }
    strip_fraction_zeros(&text)
}

fn strip_fraction_zeros(text: &str) -> String {
    let (mantissa, exponent) = match text.find('e') {
        Some(pos) => (&text[..pos], &text[pos..]),
        None => (text, ""),
    };
    if !mantissa.contains('.') {
        return text.to_string();
    }
    let trimmed = mantissa.trim_end_matches('0').trim_end_matches('.');
    format!("{}{}", trimmed, exponent)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec() -> Spec {
        Spec::default()
    }

    #[test]
    fn test_signatures() {
        let printf = signature("printf").unwrap();
        assert!(printf.variadic);
        assert_eq!(printf.params.len(), 1);
        assert_eq!(signature("malloc").unwrap().ret, CType::Void.pointer_to());
        assert!(signature("scanf").is_none());
        assert!(BUILTIN_NAMES.iter().all(|name| signature(name).is_some()));
    }

    #[test]
    fn test_integer_conversions() {
        assert_eq!(spec().signed_integer(-42), b"-42");
        let padded = Spec {
            width: 5,
            zero: true,
            ..Spec::default()
        };
        assert_eq!(padded.signed_integer(-42), b"-0042");
        let left = Spec {
            width: 4,
            left: true,
            ..Spec::default()
        };
        assert_eq!(left.signed_integer(7), b"7   ");
        let alt = Spec {
            alternate: true,
            ..Spec::default()
        };
        assert_eq!(alt.unsigned_integer(255, b'x'), b"0xff");
        assert_eq!(Length::Default.unsigned(-1), 4294967295);
    }

    #[test]
    fn test_float_conversions() {
        assert_eq!(spec().float(3.5, b'f'), b"3.500000");
        let p2 = Spec {
            precision: Some(2),
            ..Spec::default()
        };
        assert_eq!(p2.float(-1.005, b'f'), b"-1.00");
        assert_eq!(spec().float(1234.5, b'e'), b"1.234500e+03");
        assert_eq!(spec().float(0.0001, b'g'), b"0.0001");
        assert_eq!(spec().float(1e-5, b'g'), b"1e-05");
        assert_eq!(spec().float(100.0, b'g'), b"100");
    }

    #[test]
    fn test_strip_fraction_zeros() {
        assert_eq!(strip_fraction_zeros("1.500"), "1.5");
        assert_eq!(strip_fraction_zeros("2.000e+10"), "2e+10");
        assert_eq!(strip_fraction_zeros("10"), "10");
    }
}
