//! Tab separated text report
//!
//! One line per measurement:
//!
//! ```text
//! 0 <TAB> mu_y <TAB> mu_x <TAB> delta_mu_y <TAB> delta_mu_x <TAB> sigma_y <TAB> sigma_x <TAB> Q <TAB> img
//! ```
//!
//! Every field after the leading constant is right-aligned in a column of
//! width 10. Floats use six significant digits, switching to exponent form
//! for very small or large magnitudes.

use std::io::Write;

use crate::{
    error::{Result, StreamError},
    record::ResultRecord,
};

use super::ResultSink;

pub const FIELD_WIDTH: usize = 10;
const SIGNIFICANT_DIGITS: i32 = 6;

/// Writes measurements as text lines to any writer
#[derive(Debug)]
pub struct TsvReport<W: Write> {
    writer: W,
    lines: u64,
}

impl<W: Write> TsvReport<W> {
    pub fn new(writer: W) -> Self {
        Self { writer, lines: 0 }
    }

    /// Lines written so far
    pub fn lines(&self) -> u64 {
        self.lines
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write> ResultSink for TsvReport<W> {
    fn report(&mut self, record: &ResultRecord) -> Result<()> {
        if !record.is_measurement() {
            return Ok(());
        }
        writeln!(self.writer, "{}", format_line(record))
            .map_err(|e| StreamError::from_io(e, "Failed to write report line"))?;
        self.lines += 1;
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        self.writer
            .flush()
            .map_err(|e| StreamError::from_io(e, "Failed to flush report"))
    }
}

/// Render one record as a report line, without the newline
pub fn format_line(record: &ResultRecord) -> String {
    let w = FIELD_WIDTH;
    format!(
        "0\t{:>w$}\t{:>w$}\t{:>w$}\t{:>w$}\t{:>w$}\t{:>w$}\t{:>w$}\t{:>w$}",
        format_float(record.mu_y),
        format_float(record.mu_x),
        format_float(record.delta_mu_y),
        format_float(record.delta_mu_x),
        format_float(record.sigma_y),
        format_float(record.sigma_x),
        format_float(record.q),
        record.img,
        w = w
    )
}

/// Shortest "general" rendering with six significant digits
pub fn format_float(value: f32) -> String {
    if value.is_nan() {
        return "nan".to_string();
    }
    if value.is_infinite() {
        return if value > 0.0 { "inf" } else { "-inf" }.to_string();
    }
    if value == 0.0 {
        return if value.is_sign_negative() { "-0" } else { "0" }.to_string();
    }

    // Exponent after rounding to the target precision
    let sci = format!("{:.*e}", (SIGNIFICANT_DIGITS - 1) as usize, value);
    let (mantissa, exponent) = match sci.split_once('e') {
        Some(parts) => parts,
        None => return sci,
    };
    let exponent: i32 = exponent.parse().unwrap_or(0);

    if exponent < -4 || exponent >= SIGNIFICANT_DIGITS {
        let sign = if exponent < 0 { '-' } else { '+' };
        format!(
            "{}e{}{:02}",
            trim_fraction(mantissa),
            sign,
            exponent.abs()
        )
    } else {
        let decimals = (SIGNIFICANT_DIGITS - 1 - exponent).max(0) as usize;
        trim_fraction(&format!("{:.*}", decimals, value)).to_string()
    }
}

fn trim_fraction(s: &str) -> &str {
    if s.contains('.') {
        s.trim_end_matches('0').trim_end_matches('.')
    } else {
        s
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(img: i32) -> ResultRecord {
        ResultRecord {
            img,
            q: 1500.0,
            mu_x: 10.25,
            mu_y: 3.5,
            sigma_x: 102.0,
            sigma_y: 0.125,
            delta_mu_x: 0.0,
            delta_mu_y: 12345.5,
        }
    }

    #[test]
    fn test_format_float() {
        assert_eq!(format_float(0.0), "0");
        assert_eq!(format_float(3.5), "3.5");
        assert_eq!(format_float(102.0), "102");
        assert_eq!(format_float(1.0 / 3.0), "0.333333");
        assert_eq!(format_float(123456.0), "123456");
        assert_eq!(format_float(1234567.0), "1.23457e+06");
        assert_eq!(format_float(0.00001), "1e-05");
        assert_eq!(format_float(-2.25), "-2.25");
    }

    #[test]
    fn test_line_layout() {
        let line = format_line(&record(7));
        let fields: Vec<&str> = line.split('\t').collect();
        assert_eq!(fields.len(), 9);
        assert_eq!(fields[0], "0");
        assert!(fields[1..].iter().all(|f| f.len() == FIELD_WIDTH));
        assert_eq!(fields[1].trim(), "3.5");
        assert_eq!(fields[2].trim(), "10.25");
        assert_eq!(fields[3].trim(), "12345.5");
        assert_eq!(fields[5].trim(), "0.125");
        assert_eq!(fields[7].trim(), "1500");
        assert_eq!(fields[8], "         7");
    }

    #[test]
    fn test_boundary_records_suppressed() {
        let mut report = TsvReport::new(Vec::new());
        report.report(&record(0)).unwrap();
        report.report(&ResultRecord::end_of_image()).unwrap();
        report.report(&ResultRecord::last_pixel()).unwrap();
        report.report(&record(1)).unwrap();
        report.finish().unwrap();

        assert_eq!(report.lines(), 2);
        let text = String::from_utf8(report.into_inner()).unwrap();
        assert_eq!(text.lines().count(), 2);
        assert!(text.lines().all(|l| l.starts_with("0\t")));
    }
}
