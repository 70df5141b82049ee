//! Human-readable output of node values.
//!
//! Neither format is read back by the update math: the results report feeds
//! plotting and reporting tools, the keyword file is included by the
//! reservoir simulator deck.

use std::io::Write;

use crate::error::Result;

/// Write one `<name> <value>` line per parameter, in index order.
///
/// Values use the shortest representation that parses back to the same
/// `f64`.
///
/// ```
/// let mut out = Vec::new();
/// enkf_node::report::write_results(&mut out, ["F1", "F2"], &[0.5, 1.25]).unwrap();
/// assert_eq!(String::from_utf8(out).unwrap(), "F1 0.5\nF2 1.25\n");
/// ```
pub fn write_results<'a>(
    writer: &mut dyn Write,
    names: impl IntoIterator<Item = &'a str>,
    values: &[f64],
) -> Result<()> {
    for (name, value) in names.into_iter().zip(values) {
        writeln!(writer, "{name} {value}")?;
    }
    Ok(())
}

/// Write an Eclipse `MULTFLT` include keyword.
///
/// ```text
/// MULTFLT
///  'F1'  0.5 /
///  'F2'  1.25 /
/// /
/// ```
pub fn write_multflt_keyword<'a>(
    writer: &mut dyn Write,
    names: impl IntoIterator<Item = &'a str>,
    values: &[f64],
) -> Result<()> {
    writeln!(writer, "MULTFLT")?;
    for (name, value) in names.into_iter().zip(values) {
        writeln!(writer, " '{name}'  {value} /")?;
    }
    writeln!(writer, "/")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_results_preserve_precision() {
        let mut out = Vec::new();
        let value = 0.1 + 0.2;
        write_results(&mut out, ["FAULT_A"], &[value]).unwrap();
        let text = String::from_utf8(out).unwrap();
        let (name, printed) = text.trim_end().split_once(' ').unwrap();
        assert_eq!(name, "FAULT_A");
        assert_eq!(printed.parse::<f64>().unwrap(), value);
    }

    #[test]
    fn test_keyword_layout() {
        let mut out = Vec::new();
        write_multflt_keyword(&mut out, ["F1", "F2"], &[0.5, 1.25]).unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "MULTFLT\n 'F1'  0.5 /\n 'F2'  1.25 /\n/\n"
        );
    }
}
