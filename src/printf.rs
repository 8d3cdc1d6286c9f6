//! The `_Printf` formatting engine behind `sprintf`, `vsprintf` and `diPrintf`.
//!
//! Output is pushed through a caller-supplied callback in chunks, the way the libultra engine
//! does it. Conversions follow C: flags `-+ #0`, `*` or numeric width and precision, the
//! `h`/`hh`/`l`/`ll`/`L` length modifiers and `d i u o x X c s p f F e E g G %`.

/// Marks a run of layout padding in debug text. The following byte is the number of glyph cells
/// to advance.
pub const SPACING_CODE: u8 = 0x81;

/// A single variadic argument.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Arg<'a> {
    Int(i64),
    Uint(u64),
    Float(f64),
    Char(char),
    Str(&'a str),
}

macro_rules! impl_from_arg {
    ($variant:ident, $target:ty, $($source:ty),+) => {
        $(
            impl From<$source> for Arg<'_> {
                fn from(value: $source) -> Self {
                    Arg::$variant(value as $target)
                }
            }
        )+
    };
}

impl_from_arg!(Int, i64, i8, i16, i32, i64, isize);
impl_from_arg!(Uint, u64, u8, u16, u32, u64, usize);
impl_from_arg!(Float, f64, f32, f64);

impl From<char> for Arg<'_> {
    fn from(value: char) -> Self {
        Arg::Char(value)
    }
}

impl<'a> From<&'a str> for Arg<'a> {
    fn from(value: &'a str) -> Self {
        Arg::Str(value)
    }
}

impl<'a> From<&'a String> for Arg<'a> {
    fn from(value: &'a String) -> Self {
        Arg::Str(value)
    }
}

impl From<bool> for Arg<'_> {
    fn from(value: bool) -> Self {
        Arg::Int(value as i64)
    }
}

/// Why a format call gave up. All of these surface as `-1` to C-style callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Failure {
    /// The output callback refused more bytes.
    Overflow,
    MissingArgument,
    WrongArgument(u8),
    BadConversion(u8),
}

#[derive(Debug, Default, Clone, Copy)]
struct Spec {
    left: bool,
    plus: bool,
    space: bool,
    alt: bool,
    zero: bool,
    width: usize,
    precision: Option<usize>,
    wide: bool,
    conversion: u8,
}

/// Formatting state shared by every print routine.
#[derive(Debug, Default, Clone)]
pub struct Formatter {
    spacing_codes: bool,
}

impl Formatter {
    /// While enabled, space padding is emitted as spacing codes instead of space characters.
    pub fn set_spacing_codes(&mut self, enabled: bool) {
        self.spacing_codes = enabled;
    }

    pub fn spacing_codes(&self) -> bool {
        self.spacing_codes
    }

    /// Formats `fmt` with `args`, passing output to `prout`. Returns the number of bytes
    /// produced, or `-1` if formatting failed.
    pub fn printf(
        &self,
        prout: &mut dyn FnMut(&[u8]) -> bool,
        fmt: &str,
        args: &[Arg],
    ) -> i32 {
        self.format(prout, fmt, args, true)
    }

    /// The engine the game shipped with, which has no floating point support. Float conversions
    /// consume their argument but produce no output.
    pub fn printf_without_floats(
        &self,
        prout: &mut dyn FnMut(&[u8]) -> bool,
        fmt: &str,
        args: &[Arg],
    ) -> i32 {
        self.format(prout, fmt, args, false)
    }

    fn format(
        &self,
        prout: &mut dyn FnMut(&[u8]) -> bool,
        fmt: &str,
        args: &[Arg],
        floats: bool,
    ) -> i32 {
        let mut run = Run {
            prout,
            written: 0,
            spacing_codes: self.spacing_codes,
            floats,
            args: args.iter(),
        };

        match run.format(fmt.as_bytes()) {
            Ok(()) => i32::try_from(run.written).unwrap_or(i32::MAX),
            Err(failure) => {
                log::trace!("format of {fmt:?} failed: {failure:?}");
                -1
            }
        }
    }
}

/// Runs `engine` with an output callback that copies into `dst`, then NUL-terminates the result.
/// The last byte of `dst` is kept for the terminator, so output that doesn't fit makes the engine
/// fail. Returns whatever the engine returned.
pub fn sprintf(
    dst: &mut [u8],
    engine: impl FnOnce(&mut dyn FnMut(&[u8]) -> bool) -> i32,
) -> i32 {
    let capacity = dst.len().saturating_sub(1);
    let mut len = 0;

    let ret = engine(&mut |bytes: &[u8]| {
        let end = len + bytes.len();

        if end > capacity {
            return false;
        }

        dst[len..end].copy_from_slice(bytes);
        len = end;
        true
    });

    if ret >= 0 {
        if let Some(terminator) = dst.get_mut(len) {
            *terminator = 0;
        }
    }

    ret
}

struct Run<'p, 'a, 'b> {
    prout: &'p mut dyn FnMut(&[u8]) -> bool,
    written: usize,
    spacing_codes: bool,
    floats: bool,
    args: std::slice::Iter<'b, Arg<'a>>,
}

impl<'a> Run<'_, 'a, '_> {
    fn put(&mut self, bytes: &[u8]) -> Result<(), Failure> {
        if bytes.is_empty() {
            return Ok(());
        }

        if !(self.prout)(bytes) {
            return Err(Failure::Overflow);
        }

        self.written += bytes.len();
        Ok(())
    }

    fn pad(&mut self, count: usize, byte: u8) -> Result<(), Failure> {
        if byte == b' ' && self.spacing_codes {
            let mut remaining = count;

            while remaining > 0 {
                let cells = remaining.min(u8::MAX as usize);
                self.put(&[SPACING_CODE, cells as u8])?;
                remaining -= cells;
            }

            return Ok(());
        }

        for _ in 0..count {
            self.put(&[byte])?;
        }

        Ok(())
    }

    fn next_arg(&mut self) -> Result<Arg<'a>, Failure> {
        self.args.next().copied().ok_or(Failure::MissingArgument)
    }

    fn format(&mut self, fmt: &[u8]) -> Result<(), Failure> {
        let mut i = 0;

        while i < fmt.len() {
            let literal_start = i;

            while i < fmt.len() && fmt[i] != b'%' {
                i += 1;
            }

            self.put(&fmt[literal_start..i])?;

            if i >= fmt.len() {
                break;
            }

            // Skip the '%'.
            i += 1;

            let spec = self.parse_spec(fmt, &mut i)?;
            self.convert(spec)?;
        }

        Ok(())
    }

    fn parse_number(fmt: &[u8], i: &mut usize) -> usize {
        let mut value = 0usize;

        while let Some(digit) = fmt.get(*i).filter(|b| b.is_ascii_digit()) {
            value = value.saturating_mul(10).saturating_add((digit - b'0') as usize);
            *i += 1;
        }

        value
    }

    fn star(&mut self) -> Result<i64, Failure> {
        match self.next_arg()? {
            Arg::Int(value) => Ok(value),
            Arg::Uint(value) => Ok(value as i64),
            _ => Err(Failure::WrongArgument(b'*')),
        }
    }

    fn parse_spec(&mut self, fmt: &[u8], i: &mut usize) -> Result<Spec, Failure> {
        let mut spec = Spec::default();

        while let Some(flag) = fmt.get(*i) {
            match flag {
                b'-' => spec.left = true,
                b'+' => spec.plus = true,
                b' ' => spec.space = true,
                b'#' => spec.alt = true,
                b'0' => spec.zero = true,
                _ => break,
            }

            *i += 1;
        }

        if fmt.get(*i) == Some(&b'*') {
            *i += 1;
            let width = self.star()?;

            // A negative width means left-justify.
            if width < 0 {
                spec.left = true;
            }

            spec.width = width.unsigned_abs() as usize;
        } else {
            spec.width = Self::parse_number(fmt, i);
        }

        if fmt.get(*i) == Some(&b'.') {
            *i += 1;

            if fmt.get(*i) == Some(&b'*') {
                *i += 1;
                let precision = self.star()?;

                // A negative precision is taken as if it were omitted.
                spec.precision = usize::try_from(precision).ok();
            } else {
                spec.precision = Some(Self::parse_number(fmt, i));
            }
        }

        match fmt.get(*i) {
            Some(b'h') => {
                *i += 1;

                if fmt.get(*i) == Some(&b'h') {
                    *i += 1;
                }
            }
            Some(b'l') => {
                *i += 1;

                if fmt.get(*i) == Some(&b'l') {
                    *i += 1;
                    spec.wide = true;
                }
            }
            Some(b'L') => {
                *i += 1;
                spec.wide = true;
            }
            _ => {}
        }

        spec.conversion = *fmt.get(*i).ok_or(Failure::BadConversion(0))?;
        *i += 1;

        Ok(spec)
    }

    fn convert(&mut self, spec: Spec) -> Result<(), Failure> {
        match spec.conversion {
            b'%' => self.put(b"%"),
            b'd' | b'i' => self.signed(spec),
            b'u' | b'o' | b'x' | b'X' => self.unsigned(spec),
            b'p' => self.pointer(spec),
            b'c' => self.character(spec),
            b's' => self.string(spec),
            b'f' | b'F' | b'e' | b'E' | b'g' | b'G' => self.float(spec),
            other => Err(Failure::BadConversion(other)),
        }
    }

    /// Writes `prefix` and `body` as one field, with `zeros` leading zeros between them, padded
    /// to the field width.
    fn field(&mut self, spec: Spec, prefix: &[u8], zeros: usize, body: &[u8]) -> Result<(), Failure> {
        let len = prefix.len() + zeros + body.len();
        let padding = spec.width.saturating_sub(len);

        if !spec.left {
            self.pad(padding, b' ')?;
        }

        self.put(prefix)?;
        self.pad(zeros, b'0')?;
        self.put(body)?;

        if spec.left {
            self.pad(padding, b' ')?;
        }

        Ok(())
    }

    /// Lays out an integer's digits, honouring precision and the `0` flag.
    fn integer(&mut self, spec: Spec, prefix: &[u8], digits: &str, is_zero: bool) -> Result<(), Failure> {
        // An explicit zero precision prints nothing for a zero value.
        let digits = if is_zero && spec.precision == Some(0) {
            ""
        } else {
            digits
        };

        let mut zeros = spec
            .precision
            .map_or(0, |precision| precision.saturating_sub(digits.len()));

        if spec.zero && !spec.left && spec.precision.is_none() {
            zeros = spec.width.saturating_sub(prefix.len() + digits.len());
        }

        self.field(spec, prefix, zeros, digits.as_bytes())
    }

    fn sign(spec: Spec, negative: bool) -> &'static [u8] {
        if negative {
            b"-"
        } else if spec.plus {
            b"+"
        } else if spec.space {
            b" "
        } else {
            b""
        }
    }

    fn signed(&mut self, spec: Spec) -> Result<(), Failure> {
        let value = match self.next_arg()? {
            Arg::Int(value) => value,
            Arg::Uint(value) => value as i64,
            Arg::Char(value) => value as i64,
            _ => return Err(Failure::WrongArgument(spec.conversion)),
        };

        // Without `ll` the argument is a 32-bit int.
        let value = if spec.wide { value } else { value as i32 as i64 };

        let digits = value.unsigned_abs().to_string();
        self.integer(spec, Self::sign(spec, value < 0), &digits, value == 0)
    }

    fn unsigned(&mut self, spec: Spec) -> Result<(), Failure> {
        let value = match self.next_arg()? {
            Arg::Int(value) => value as u64,
            Arg::Uint(value) => value,
            Arg::Char(value) => value as u64,
            _ => return Err(Failure::WrongArgument(spec.conversion)),
        };

        let value = if spec.wide { value } else { value as u32 as u64 };

        let (prefix, mut digits): (&[u8], String) = match spec.conversion {
            b'o' => (b"", format!("{value:o}")),
            b'x' if spec.alt && value != 0 => (b"0x", format!("{value:x}")),
            b'x' => (b"", format!("{value:x}")),
            b'X' if spec.alt && value != 0 => (b"0X", format!("{value:X}")),
            b'X' => (b"", format!("{value:X}")),
            _ => (b"", value.to_string()),
        };

        if spec.conversion == b'o' && spec.alt && !digits.starts_with('0') {
            digits.insert(0, '0');

            // The alternate form always shows the leading zero.
            return self.field(spec, prefix, 0, digits.as_bytes());
        }

        self.integer(spec, prefix, &digits, value == 0)
    }

    fn pointer(&mut self, spec: Spec) -> Result<(), Failure> {
        let value = match self.next_arg()? {
            Arg::Int(value) => value as u32,
            Arg::Uint(value) => value as u32,
            _ => return Err(Failure::WrongArgument(b'p')),
        };

        self.field(spec, b"0x", 0, format!("{value:08x}").as_bytes())
    }

    fn character(&mut self, spec: Spec) -> Result<(), Failure> {
        let mut buf = [0u8; 4];

        let bytes: &[u8] = match self.next_arg()? {
            Arg::Char(value) => value.encode_utf8(&mut buf).as_bytes(),
            Arg::Int(value) => {
                buf[0] = value as u8;
                &buf[..1]
            }
            Arg::Uint(value) => {
                buf[0] = value as u8;
                &buf[..1]
            }
            _ => return Err(Failure::WrongArgument(b'c')),
        };

        let bytes = bytes.to_vec();
        self.field(spec, b"", 0, &bytes)
    }

    fn string(&mut self, spec: Spec) -> Result<(), Failure> {
        let value = match self.next_arg()? {
            Arg::Str(value) => value,
            _ => return Err(Failure::WrongArgument(b's')),
        };

        let bytes = value.as_bytes();
        let bytes = match spec.precision {
            Some(precision) => &bytes[..precision.min(bytes.len())],
            None => bytes,
        };

        self.field(spec, b"", 0, bytes)
    }

    fn float(&mut self, spec: Spec) -> Result<(), Failure> {
        let value = match self.next_arg()? {
            Arg::Float(value) => value,
            _ => return Err(Failure::WrongArgument(spec.conversion)),
        };

        if !self.floats {
            return Ok(());
        }

        let upper = spec.conversion.is_ascii_uppercase();
        let prefix = Self::sign(spec, value.is_sign_negative() && !value.is_nan());

        if !value.is_finite() {
            let body = match (value.is_nan(), upper) {
                (true, false) => "nan",
                (true, true) => "NAN",
                (false, false) => "inf",
                (false, true) => "INF",
            };

            // Zero padding never applies to infinities and NaNs.
            return self.field(spec, prefix, 0, body.as_bytes());
        }

        let precision = spec.precision.unwrap_or(6);
        let magnitude = value.abs();

        let body = match spec.conversion.to_ascii_lowercase() {
            b'f' => fixed(magnitude, precision, spec.alt),
            b'e' => exponential(magnitude, precision, spec.alt, upper),
            _ => general(magnitude, precision, spec.alt, upper),
        };

        let zeros = if spec.zero && !spec.left {
            spec.width.saturating_sub(prefix.len() + body.len())
        } else {
            0
        };

        self.field(spec, prefix, zeros, body.as_bytes())
    }
}

fn fixed(value: f64, precision: usize, alt: bool) -> String {
    let mut text = format!("{value:.precision$}");

    if alt && precision == 0 {
        text.push('.');
    }

    text
}

/// Splits Rust's `1.5e3` exponent notation into mantissa and exponent.
fn split_exponent(value: f64, precision: usize) -> (String, i32) {
    let text = format!("{value:.precision$e}");

    match text.split_once('e') {
        Some((mantissa, exponent)) => (mantissa.to_string(), exponent.parse().unwrap_or(0)),
        None => (text, 0),
    }
}

fn exponential(value: f64, precision: usize, alt: bool, upper: bool) -> String {
    let (mut mantissa, exponent) = split_exponent(value, precision);

    if alt && precision == 0 {
        mantissa.push('.');
    }

    let sign = if exponent < 0 { '-' } else { '+' };
    let e = if upper { 'E' } else { 'e' };

    format!("{mantissa}{e}{sign}{:02}", exponent.unsigned_abs())
}

fn general(value: f64, precision: usize, alt: bool, upper: bool) -> String {
    let precision = precision.max(1);

    let exponent = if value == 0.0 {
        0
    } else {
        split_exponent(value, precision - 1).1
    };

    let mut text = if exponent < -4 || exponent >= precision as i32 {
        exponential(value, precision - 1, alt, upper)
    } else {
        fixed(value, (precision as i32 - 1 - exponent) as usize, alt)
    };

    if !alt {
        strip_trailing_zeros(&mut text);
    }

    text
}

/// Removes trailing zeros from the fractional part, and the point if nothing is left after it.
fn strip_trailing_zeros(text: &mut String) {
    let (mantissa_end, exponent) = match text.find(&['e', 'E'][..]) {
        Some(index) => (index, text[index..].to_string()),
        None => (text.len(), String::new()),
    };

    let mantissa = &text[..mantissa_end];

    if !mantissa.contains('.') {
        return;
    }

    let trimmed = mantissa.trim_end_matches('0').trim_end_matches('.');
    *text = format!("{trimmed}{exponent}");
}
