//! Reply grammars
//!
//! Fixed-pattern parsers for the replies the host consumes. A reply that
//! does not match yields `None` (or an empty listing); the caller keeps
//! whatever it knew before.

use printkit_core::{Position, SdFileEntry, Temperature, TemperatureReport};
use regex::Regex;
use std::sync::OnceLock;

/// File extensions accepted from an SD listing
pub const SD_EXTENSIONS: [&str; 3] = [".gcode", ".gco", ".g"];

const LISTING_BEGIN: &str = "Begin file list";
const LISTING_END: &str = "End file list";

/// Parse `T:<cur> /<tgt> B:<cur> /<tgt>`
pub fn parse_temperatures(reply: &str) -> Option<TemperatureReport> {
    static TEMPERATURE_REGEX: OnceLock<Regex> = OnceLock::new();
    let regex = TEMPERATURE_REGEX.get_or_init(|| {
        Regex::new(r"T:([0-9.]+) /([0-9.]+) B:([0-9.]+) /([0-9.]+)")
            .expect("invalid regex pattern")
    });
    captures_to_report(regex, reply)
}

/// Like [`parse_temperatures`] but also accepts an indexed tool (`T0:`)
pub fn parse_indexed_temperatures(reply: &str) -> Option<TemperatureReport> {
    static INDEXED_REGEX: OnceLock<Regex> = OnceLock::new();
    let regex = INDEXED_REGEX.get_or_init(|| {
        Regex::new(r"T[0-9]*:([0-9.]+) /([0-9.]+) B:([0-9.]+) /([0-9.]+)")
            .expect("invalid regex pattern")
    });
    captures_to_report(regex, reply)
}

fn captures_to_report(regex: &Regex, reply: &str) -> Option<TemperatureReport> {
    let caps = regex.captures(reply)?;
    let value = |i: usize| caps.get(i)?.as_str().parse::<f64>().ok();
    Some(TemperatureReport {
        nozzle: Temperature::new(value(1)?, value(2)?),
        bed: Temperature::new(value(3)?, value(4)?),
    })
}

/// Parse `X:<v> Y:<v> Z:<v>`
pub fn parse_position(reply: &str) -> Option<Position> {
    static POSITION_REGEX: OnceLock<Regex> = OnceLock::new();
    let regex = POSITION_REGEX.get_or_init(|| {
        Regex::new(r"X:([0-9.\-]+)\s+Y:([0-9.\-]+)\s+Z:([0-9.\-]+)")
            .expect("invalid regex pattern")
    });
    let caps = regex.captures(reply)?;
    let value = |i: usize| caps.get(i)?.as_str().parse::<f64>().ok();
    Some(Position::new(value(1)?, value(2)?, value(3)?))
}

/// Extract G-code files from an SD listing
///
/// Skips the exact `Begin file list` / `End file list` marker lines and
/// takes the first token of each line that ends in a G-code extension.
pub fn parse_sd_listing(listing: &str) -> Vec<SdFileEntry> {
    listing
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .filter(|line| !is_listing_marker(line))
        .filter_map(|line| {
            line.split_whitespace()
                .find(|token| is_gcode_name(token))
                .map(|name| SdFileEntry::new(name, line))
        })
        .collect()
}

fn is_listing_marker(line: &str) -> bool {
    line.eq_ignore_ascii_case(LISTING_BEGIN) || line.eq_ignore_ascii_case(LISTING_END)
}

/// Check a file name for an accepted G-code extension (case-insensitive)
pub fn is_gcode_name(name: &str) -> bool {
    let lower = name.to_ascii_lowercase();
    SD_EXTENSIONS
        .iter()
        .any(|ext| lower.len() > ext.len() && lower.ends_with(ext))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_temperature_reply() {
        let report = parse_temperatures("ok T:200.0 /205.0 B:59.5 /60.0 @:0").unwrap();
        assert_eq!(report.nozzle, Temperature::new(200.0, 205.0));
        assert_eq!(report.bed, Temperature::new(59.5, 60.0));
    }

    #[test]
    fn test_temperature_miss() {
        assert!(parse_temperatures("ok").is_none());
        assert!(parse_temperatures("T0:200.0 /205.0 B:59.5 /60.0").is_none());
        assert!(parse_indexed_temperatures("T0:200.0 /205.0 B:59.5 /60.0").is_some());
    }

    #[test]
    fn test_position_reply() {
        let pos = parse_position("X:10.00 Y:20.00 Z:0.20 E:0.00 Count X:800").unwrap();
        assert_eq!(pos.to_string(), "X10.00 Y20.00 Z0.20");
        let pos = parse_position("X:-1.50 Y:0.00 Z:3.00").unwrap();
        assert_eq!(pos.x, -1.5);
    }

    #[test]
    fn test_sd_listing_skips_markers() {
        let entries = parse_sd_listing("Begin file list\n4 file1.gcode\nEnd file list\nok\n");
        let names: Vec<_> = entries.iter().map(|e| e.filename.as_str()).collect();
        assert_eq!(names, vec!["file1.gcode"]);
        assert_eq!(entries[0].raw_line, "4 file1.gcode");
    }

    #[test]
    fn test_sd_listing_keeps_marker_lookalikes() {
        let entries = parse_sd_listing(
            "Begin file list\nEndcap.gcode 120\nBeginner_cube.gcode 88\nEND FILE LIST\n",
        );
        let names: Vec<_> = entries.iter().map(|e| e.filename.as_str()).collect();
        assert_eq!(names, vec!["Endcap.gcode", "Beginner_cube.gcode"]);
    }

    #[test]
    fn test_sd_listing_extensions() {
        let entries = parse_sd_listing("BENCHY.GCO 2431117\nnotes.txt 12\npart.g 9\n.g 1\n");
        let names: Vec<_> = entries.iter().map(|e| e.filename.as_str()).collect();
        assert_eq!(names, vec!["BENCHY.GCO", "part.g"]);
    }
}
