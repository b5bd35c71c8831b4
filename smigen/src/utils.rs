//! Utilities.

/// Number of letters available for alphabetic port identifiers.
pub const PORT_ID_CHAR_LIMIT: usize = 26;

/// Returns the Verilog bit slice covering `width * scaling` bits, e.g. `[ 63:0]` for `(8, 8)`.
///
/// The upper index is right aligned to three characters so that port and wire lists line up.
pub fn bit_slice_from_scaled_width(width: usize, scaling: usize) -> String {
    format!("[{:3}:0]", (width * scaling).saturating_sub(1))
}

/// Returns the alphabetic identifier for the `index`-th port of a fixed-arity component (`A`, `B`, `C`, ...).
pub fn port_id_char(index: usize) -> Option<char> {
    (index < PORT_ID_CHAR_LIMIT).then(|| char::from(b'A' + index as u8))
}

/// Returns the numeric identifier for the `index`-th port of a dynamic-arity component.
pub fn port_id_num(prefix: &str, index: usize) -> String { format!("{}{}", prefix, index) }

/// Indents every line in the string. Empty lines are kept empty.
pub fn indent(str: String, indent: usize) -> String {
    str.lines()
        .map(|l| if l.is_empty() { String::new() } else { format!("{}{}", " ".repeat(indent), l) })
        .collect::<Vec<_>>()
        .join("\n")
}
