//! Field and type option records, and the tag-string parser that produces
//! them.
//!
//! # Grammar
//!
//! A tag is a comma-separated list of `key[=value]` tokens:
//!
//! ```text
//! tag     := token (',' token)*
//! token   := 'optional' | 'skip' | 'bytearr' | 'export'
//!          | 'compact' | 'not_enum'
//!          | 'bytes=' ('1'|'2'|'4'|'8')
//!          | 'len='   ('2'|'4')
//!          | 'elem'  '[' tag ']'
//!          | 'key'   '[' tag ']'
//!          | 'value' '[' tag ']'
//! ```
//!
//! The empty tag means defaults. `optional`, `skip`, `bytearr`, and `export`
//! are only meaningful on a struct field; the bracketed sub-tags recurse into
//! collection elements and map keys/values. Unknown keys, duplicate keys,
//! and contradictory combinations (`compact` with `bytes=`) are
//! configuration errors, reported the first time the owning type is encoded
//! or decoded.
//!
//! `len=N` is a ceiling, not a wire width: lengths are always ULEB128 on the
//! wire, but a field capped at `len=2` refuses collections longer than
//! 65535 entries on both encode and decode.

use crate::error::{Error, Result};

/// Wire width for an integer re-encoded under the `bytes=N` option.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntWidth {
    /// One byte.
    B1,
    /// Two bytes, little-endian.
    B2,
    /// Four bytes, little-endian.
    B4,
    /// Eight bytes, little-endian.
    B8,
}

impl IntWidth {
    /// The number of bytes this width occupies on the wire.
    #[must_use]
    pub fn bytes(self) -> usize {
        match self {
            Self::B1 => 1,
            Self::B2 => 2,
            Self::B4 => 4,
            Self::B8 => 8,
        }
    }
}

/// Ceiling applied to a sequence or map length under the `len=N` option.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LenLimit {
    /// No ceiling beyond the format's own u64 range.
    #[default]
    Uleb,
    /// At most `0xFFFF` entries.
    U16,
    /// At most `0xFFFF_FFFF` entries.
    U32,
}

impl LenLimit {
    pub(crate) fn check(self, len: usize, what: &str) -> Result<()> {
        let limit = match self {
            Self::Uleb => return Ok(()),
            Self::U16 => 0xFFFF,
            Self::U32 => 0xFFFF_FFFF,
        };
        if len > limit {
            return Err(Error::out_of_range(format!("{what} length {len} exceeds limit {limit}")));
        }
        Ok(())
    }
}

/// Options applying to a value position: the value itself, a collection
/// element, or a map key or value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TypeOptions {
    /// Re-encode an integer at this width; the value must fit losslessly.
    pub underlying_int: Option<IntWidth>,
    /// Encode an integer as ULEB128 regardless of its declared width.
    pub compact: bool,
    /// Ceiling for sequence or map lengths.
    pub len_limit: LenLimit,
    /// Suppress enum dispatch for a trait-object value (encode-only).
    pub not_enum: bool,
    /// Options applied to each element of a sequence.
    pub elem: Option<Box<ElemOptions>>,
    /// Options applied to each map key.
    pub key: Option<Box<TypeOptions>>,
    /// Options applied to each map value.
    pub value: Option<Box<TypeOptions>>,
}

/// Element options: value options plus opaque-blob framing per element.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ElemOptions {
    /// Value options for the element.
    pub opts: TypeOptions,
    /// Length-prefix each element's encoding as an opaque byte string.
    pub as_byte_array: bool,
}

/// Options applying to a struct field: value options plus the field-only
/// flags.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FieldOptions {
    /// Value options for the field.
    pub opts: TypeOptions,
    /// Precede the field with a presence byte; absent fields decode to null.
    pub optional: bool,
    /// Leave the field out of the encoding entirely.
    pub skip: bool,
    /// Length-prefix the field's encoding as an opaque byte string.
    pub as_byte_array: bool,
    /// Accepted for compatibility; field visibility never blocks the
    /// generated codec, so this is a no-op.
    pub export: bool,
}

impl TypeOptions {
    /// Parses a tag in value position. Field-only keys are rejected.
    ///
    /// # Errors
    ///
    /// Configuration errors for unknown or duplicate keys, bad values,
    /// unbalanced brackets, or field-only keys.
    pub fn parse(tag: &str) -> Result<Self> {
        let mut opts = Self::default();
        for tok in split_tokens(tag)? {
            apply_type_token(&mut opts, tok)?;
        }
        opts.validate()?;
        Ok(opts)
    }

    /// Merges `tag` over `self`: every knob the tag sets wins, everything
    /// else keeps the type-level default. The integer knobs displace each
    /// other (a tag's `bytes=` silences a type-level `compact`, and vice
    /// versa) so the merged record never holds a contradictory pair.
    #[must_use]
    pub fn overridden_by(&self, tag: &Self) -> Self {
        let (compact, underlying_int) = if tag.compact {
            (true, None)
        } else if tag.underlying_int.is_some() {
            (false, tag.underlying_int)
        } else {
            (self.compact, self.underlying_int)
        };
        Self {
            underlying_int,
            compact,
            len_limit: if tag.len_limit == LenLimit::Uleb { self.len_limit } else { tag.len_limit },
            not_enum: tag.not_enum || self.not_enum,
            elem: tag.elem.clone().or_else(|| self.elem.clone()),
            key: tag.key.clone().or_else(|| self.key.clone()),
            value: tag.value.clone().or_else(|| self.value.clone()),
        }
    }

    fn validate(&self) -> Result<()> {
        if self.compact && self.underlying_int.is_some() {
            return Err(Error::config("`compact` conflicts with `bytes=`"));
        }
        Ok(())
    }
}

impl FieldOptions {
    /// Parses a tag in field position.
    ///
    /// # Errors
    ///
    /// Configuration errors for unknown or duplicate keys, bad values,
    /// unbalanced brackets, or contradictory combinations.
    pub fn parse(tag: &str) -> Result<Self> {
        let mut out = Self::default();
        for tok in split_tokens(tag)? {
            match tok {
                "optional" => set_flag(&mut out.optional, tok)?,
                "skip" => set_flag(&mut out.skip, tok)?,
                "bytearr" => set_flag(&mut out.as_byte_array, tok)?,
                "export" => set_flag(&mut out.export, tok)?,
                _ => apply_type_token(&mut out.opts, tok)?,
            }
        }
        out.opts.validate()?;
        Ok(out)
    }
}

fn set_flag(flag: &mut bool, key: &str) -> Result<()> {
    if *flag {
        return Err(Error::config(format!("duplicate tag key `{key}`")));
    }
    *flag = true;
    Ok(())
}

/// Splits a tag on top-level commas, leaving bracketed sub-tags intact.
fn split_tokens(tag: &str) -> Result<Vec<&str>> {
    let mut tokens = Vec::new();
    let mut depth = 0usize;
    let mut start = 0usize;
    for (i, c) in tag.char_indices() {
        match c {
            '[' => depth += 1,
            ']' => {
                depth = depth
                    .checked_sub(1)
                    .ok_or_else(|| Error::config(format!("unbalanced `]` in tag {tag:?}")))?;
            }
            ',' if depth == 0 => {
                tokens.push(tag[start..i].trim());
                start = i + 1;
            }
            _ => {}
        }
    }
    if depth != 0 {
        return Err(Error::config(format!("unbalanced `[` in tag {tag:?}")));
    }
    tokens.push(tag[start..].trim());
    Ok(tokens.into_iter().filter(|t| !t.is_empty()).collect())
}

fn apply_type_token(opts: &mut TypeOptions, tok: &str) -> Result<()> {
    if let Some(inner) = bracketed(tok, "elem") {
        if opts.elem.is_some() {
            return Err(Error::config("duplicate tag key `elem`"));
        }
        opts.elem = Some(Box::new(parse_elem(inner?)?));
        return Ok(());
    }
    if let Some(inner) = bracketed(tok, "key") {
        if opts.key.is_some() {
            return Err(Error::config("duplicate tag key `key`"));
        }
        opts.key = Some(Box::new(parse_nested(inner?)?));
        return Ok(());
    }
    if let Some(inner) = bracketed(tok, "value") {
        if opts.value.is_some() {
            return Err(Error::config("duplicate tag key `value`"));
        }
        opts.value = Some(Box::new(parse_nested(inner?)?));
        return Ok(());
    }
    if let Some(v) = tok.strip_prefix("bytes=") {
        if opts.underlying_int.is_some() {
            return Err(Error::config("duplicate tag key `bytes`"));
        }
        opts.underlying_int = Some(match v {
            "1" => IntWidth::B1,
            "2" => IntWidth::B2,
            "4" => IntWidth::B4,
            "8" => IntWidth::B8,
            _ => return Err(Error::config(format!("invalid integer width `bytes={v}`"))),
        });
        return Ok(());
    }
    if let Some(v) = tok.strip_prefix("len=") {
        if opts.len_limit != LenLimit::Uleb {
            return Err(Error::config("duplicate tag key `len`"));
        }
        opts.len_limit = match v {
            "2" => LenLimit::U16,
            "4" => LenLimit::U32,
            _ => return Err(Error::config(format!("invalid length limit `len={v}`"))),
        };
        return Ok(());
    }
    match tok {
        "compact" => set_flag(&mut opts.compact, tok),
        "not_enum" => set_flag(&mut opts.not_enum, tok),
        "optional" | "skip" | "bytearr" | "export" => {
            Err(Error::config(format!("`{tok}` is only valid in field position")))
        }
        _ => Err(Error::config(format!("unknown tag key `{tok}`"))),
    }
}

/// Returns the bracketed payload if `tok` starts with `key[`; the inner
/// result reports a missing closing bracket.
fn bracketed<'a>(tok: &'a str, key: &str) -> Option<Result<&'a str>> {
    let rest = tok.strip_prefix(key)?;
    let inner = rest.strip_prefix('[')?;
    Some(
        inner
            .strip_suffix(']')
            .ok_or_else(|| Error::config(format!("missing `]` after `{key}[`"))),
    )
}

fn parse_elem(inner: &str) -> Result<ElemOptions> {
    let mut out = ElemOptions::default();
    for tok in split_tokens(inner)? {
        if tok == "bytearr" {
            set_flag(&mut out.as_byte_array, tok)?;
        } else {
            apply_type_token(&mut out.opts, tok)?;
        }
    }
    out.opts.validate()?;
    Ok(out)
}

fn parse_nested(inner: &str) -> Result<TypeOptions> {
    let mut opts = TypeOptions::default();
    for tok in split_tokens(inner)? {
        apply_type_token(&mut opts, tok)?;
    }
    opts.validate()?;
    Ok(opts)
}
