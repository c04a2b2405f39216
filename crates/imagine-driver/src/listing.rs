//! Program listing files
//!
//! Two on-disk forms of a pre-assembled program:
//!
//! - **Text listing**: one or more hex words per line, `0x` optional,
//!   separated by whitespace or commas. `#` and `//` start a comment.
//!   Lines starting with `.` set the program configuration:
//!
//!   ```text
//!   .reg_width 16
//!   .lanes 16
//!   0x18C00000, 0x04000000,   // clear r0
//!   04010000
//!   ```
//!
//!   Directives: `.frac_width`, `.max_rows`, `.max_cols`, `.reg_width`,
//!   `.id_width`, `.lanes`. Missing ones keep [`ProgramConfig::default`].
//!
//! - **Binary**: little-endian `u32` words, nothing else. The caller
//!   supplies the configuration.
//!
//! Whether a parsed program suits the engine is checked by
//! [`check_compatible`](crate::check_compatible).

use crate::error::{ImagineError, Result};
use imagine_chip::{InstructionWord, Program, ProgramConfig};
use std::io::Write;
use std::path::Path;
use tracing::debug;

/// Parse a text listing.
///
/// # Errors
///
/// Returns [`ImagineError::ProgramParse`] with the 1-based line of the first
/// bad token or directive.
pub fn parse_listing(name: &str, text: &str) -> Result<Program> {
    let mut config = ProgramConfig::default();
    let mut words = Vec::new();

    for (idx, raw_line) in text.lines().enumerate() {
        let line_no = idx + 1;
        let line = strip_comment(raw_line).trim();
        if line.is_empty() {
            continue;
        }

        if let Some(directive) = line.strip_prefix('.') {
            apply_directive(&mut config, directive, line_no)?;
            continue;
        }

        for token in line
            .split(|c: char| c == ',' || c.is_whitespace())
            .filter(|t| !t.is_empty())
        {
            words.push(InstructionWord::from_raw(parse_word(token, line_no)?));
        }
    }

    debug!("Parsed listing '{name}': {} words", words.len());
    Ok(Program::new(name, words, config))
}

/// Read a text listing. The program is named after the file stem.
///
/// # Errors
///
/// I/O errors, or the errors of [`parse_listing`].
pub fn read_listing(path: impl AsRef<Path>) -> Result<Program> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path)?;
    parse_listing(&stem(path), &text)
}

/// Decode a binary program.
///
/// # Errors
///
/// Returns [`ImagineError::ProgramParse`] if the length is not a whole
/// number of words.
pub fn parse_binary(name: &str, bytes: &[u8], config: ProgramConfig) -> Result<Program> {
    if bytes.len() % 4 != 0 {
        return Err(ImagineError::parse(
            0,
            format!("{} bytes is not a whole number of 32-bit words", bytes.len()),
        ));
    }
    let raw: Vec<u32> = bytemuck::pod_collect_to_vec(bytes);
    debug!("Parsed binary '{name}': {} words", raw.len());
    Ok(Program::new(
        name,
        raw.into_iter().map(|w| InstructionWord::from_raw(u32::from_le(w))),
        config,
    ))
}

/// Read a binary program. The program is named after the file stem.
///
/// # Errors
///
/// I/O errors, or the errors of [`parse_binary`].
pub fn read_binary(path: impl AsRef<Path>, config: ProgramConfig) -> Result<Program> {
    let path = path.as_ref();
    let bytes = std::fs::read(path)?;
    parse_binary(&stem(path), &bytes, config)
}

/// Write a program as a text listing, one word per line with its decoded
/// form as a comment. [`parse_listing`] reads it back unchanged.
///
/// # Errors
///
/// Propagates write errors.
pub fn write_listing(program: &Program, mut out: impl Write) -> Result<()> {
    let cfg = program.config();
    writeln!(out, "# {}: {} words", program.name(), program.len())?;
    writeln!(out, ".frac_width {}", cfg.frac_width)?;
    writeln!(out, ".max_rows {}", cfg.max_rows)?;
    writeln!(out, ".max_cols {}", cfg.max_cols)?;
    writeln!(out, ".reg_width {}", cfg.reg_width)?;
    writeln!(out, ".id_width {}", cfg.id_width)?;
    writeln!(out, ".lanes {}", cfg.lanes_per_block)?;
    for word in program.words() {
        let text = word.to_string();
        let decoded = text.get(10..).unwrap_or("").trim_start();
        if decoded.is_empty() {
            writeln!(out, "{:#010x},", word.raw())?;
        } else {
            writeln!(out, "{:#010x},  // {decoded}", word.raw())?;
        }
    }
    Ok(())
}

fn strip_comment(line: &str) -> &str {
    let cut = [line.find('#'), line.find("//")]
        .into_iter()
        .flatten()
        .min()
        .unwrap_or(line.len());
    &line[..cut]
}

fn parse_word(token: &str, line: usize) -> Result<u32> {
    let digits = token
        .strip_prefix("0x")
        .or_else(|| token.strip_prefix("0X"))
        .unwrap_or(token);
    u32::from_str_radix(digits, 16)
        .map_err(|_| ImagineError::parse(line, format!("'{token}' is not a 32-bit hex word")))
}

fn apply_directive(config: &mut ProgramConfig, directive: &str, line: usize) -> Result<()> {
    let mut parts = directive.split_whitespace();
    let key = parts.next().unwrap_or("");
    let value = parts
        .next()
        .ok_or_else(|| ImagineError::parse(line, format!(".{key} needs a value")))?;
    if parts.next().is_some() {
        return Err(ImagineError::parse(line, format!(".{key} takes one value")));
    }
    let number = |v: &str| -> Result<usize> {
        v.parse()
            .map_err(|_| ImagineError::parse(line, format!(".{key}: '{v}' is not a number")))
    };
    let narrow = |v: usize| -> Result<u32> {
        u32::try_from(v).map_err(|_| ImagineError::parse(line, format!(".{key}: {v} too large")))
    };

    match key {
        "frac_width" => config.frac_width = narrow(number(value)?)?,
        "max_rows" => config.max_rows = number(value)?,
        "max_cols" => config.max_cols = number(value)?,
        "reg_width" => config.reg_width = number(value)?,
        "id_width" => config.id_width = narrow(number(value)?)?,
        "lanes" => config.lanes_per_block = number(value)?,
        other => {
            return Err(ImagineError::parse(
                line,
                format!("unknown directive '.{other}'"),
            ))
        }
    }
    Ok(())
}

fn stem(path: &Path) -> String {
    path.file_stem()
        .map_or_else(|| "program".to_string(), |s| s.to_string_lossy().into_owned())
}
