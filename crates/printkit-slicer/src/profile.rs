//! Slicer profile rendering
//!
//! Renders a `PrinterProfile` as the `key = value` ini the slicer loads
//! with `--load`. The start and end G-code are scaled to the bed: the
//! purge move starts 5% in from the origin and the finished part is
//! presented at 95% of the bed depth.

use printkit_core::{PrinterProfile, SupportStyle};
use std::fmt::Write;

/// Per-job choices that are not part of the saved profile
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SliceOptions {
    /// Print a brim of the profile's width
    pub brim: bool,
    /// Generate supports in this style
    pub support: Option<SupportStyle>,
}

const SAFE_Z: f64 = 2.0;

fn flag(value: bool) -> u8 {
    u8::from(value)
}

/// Render the ini text for one job
pub fn render_ini(profile: &PrinterProfile, options: &SliceOptions) -> String {
    let p = profile;
    let mut ini = String::new();

    // Writing to a String cannot fail
    let _ = writeln!(ini, "gcode_flavor = {}", p.firmware.gcode_flavor());
    let _ = writeln!(
        ini,
        "bed_shape = 0x0,{x}x0,{x}x{y},0x{y}",
        x = p.bed_x,
        y = p.bed_y
    );
    let _ = writeln!(ini, "max_print_height = {}", p.bed_z);
    let _ = writeln!(ini, "nozzle_diameter = {}", p.nozzle_size);
    let _ = writeln!(ini, "filament_diameter = {}", p.filament_diameter);
    let _ = writeln!(ini, "use_relative_e_distances = {}", flag(p.use_relative_e));
    let _ = writeln!(ini, "travel_speed = {}", p.travel_speed);
    let _ = writeln!(ini, "perimeter_speed = {}", p.perimeter_speed);
    let _ = writeln!(ini, "first_layer_speed = {}", p.first_layer_speed);
    let _ = writeln!(ini, "retract_length = {}", p.retract_length);
    let _ = writeln!(ini, "retract_before_travel = {}", p.retract_min_travel);
    let _ = writeln!(ini, "temperature = {}", p.nozzle_temp);
    let _ = writeln!(ini, "bed_temperature = {}", p.bed_temp);
    let _ = writeln!(ini, "max_fan_speed = {}", p.fan_speed);
    let _ = writeln!(ini, "layer_height = {}", p.layer_height);
    let _ = writeln!(ini, "fill_density = {}%", p.infill_density);
    let _ = writeln!(
        ini,
        "elefant_foot_compensation = {}",
        p.elephant_foot_compensation
    );
    let _ = writeln!(ini, "seam_position = {}", p.seam_position);
    let _ = writeln!(ini, "wipe = {}", flag(p.wipe_on_retract));
    let brim = if options.brim { p.brim_width } else { 0.0 };
    let _ = writeln!(ini, "brim_width = {}", brim);

    match options.support {
        Some(style) => {
            let spacing = match style {
                SupportStyle::Organic => p.support_spacing_organic,
                SupportStyle::Grid => p.support_spacing_grid,
            };
            let _ = writeln!(ini, "support_material = 1");
            let _ = writeln!(ini, "support_material_style = {}", style);
            let _ = writeln!(ini, "support_material_contact_distance = {}", p.support_gap);
            let _ = writeln!(ini, "support_material_spacing = {}", spacing);
        }
        None => {
            let _ = writeln!(ini, "support_material = 0");
        }
    }

    let _ = writeln!(ini, "start_gcode = {}", start_gcode(p));
    let _ = writeln!(ini, "end_gcode = {}", end_gcode(p));
    ini
}

/// Home, lift, move to the purge corner, then wait for both heaters.
/// Lines are joined with a literal `\n` as the ini format expects.
fn start_gcode(p: &PrinterProfile) -> String {
    [
        "G28 ; Home axes".to_string(),
        format!("G1 Z{} F3000", SAFE_Z),
        format!("G1 X{} Y{} F5000", p.bed_x / 20.0, p.bed_y / 20.0),
        "M109 S[temperature]".to_string(),
        "M190 S[bed_temperature]".to_string(),
    ]
    .join("\\n")
}

fn end_gcode(p: &PrinterProfile) -> String {
    [
        "M104 S0".to_string(),
        "M140 S0".to_string(),
        "G91".to_string(),
        "G1 E-1 F2700".to_string(),
        "G1 Z10".to_string(),
        "G90".to_string(),
        format!("G1 X0 Y{}", p.bed_y * 19.0 / 20.0),
        "M84".to_string(),
    ]
    .join("\\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use printkit_core::FirmwareKind;

    fn value<'a>(ini: &'a str, key: &str) -> Option<&'a str> {
        ini.lines()
            .find_map(|line| line.strip_prefix(key)?.strip_prefix(" = "))
    }

    #[test]
    fn test_default_profile_rendering() {
        let ini = render_ini(&PrinterProfile::default(), &SliceOptions::default());
        assert_eq!(value(&ini, "gcode_flavor"), Some("marlin"));
        assert_eq!(value(&ini, "bed_shape"), Some("0x0,220x0,220x220,0x220"));
        assert_eq!(value(&ini, "temperature"), Some("205"));
        assert_eq!(value(&ini, "fill_density"), Some("20%"));
        assert_eq!(value(&ini, "brim_width"), Some("0"));
        assert_eq!(value(&ini, "support_material"), Some("0"));
        assert!(value(&ini, "support_material_style").is_none());
    }

    #[test]
    fn test_brim_and_support_only_when_enabled() {
        let mut profile = PrinterProfile::default();
        profile.firmware = FirmwareKind::Klipper;
        let options = SliceOptions {
            brim: true,
            support: Some(SupportStyle::Grid),
        };
        let ini = render_ini(&profile, &options);
        assert_eq!(value(&ini, "gcode_flavor"), Some("klipper"));
        assert_eq!(value(&ini, "brim_width"), Some("5"));
        assert_eq!(value(&ini, "support_material"), Some("1"));
        assert_eq!(value(&ini, "support_material_style"), Some("grid"));
        assert_eq!(value(&ini, "support_material_spacing"), Some("2.5"));
    }

    #[test]
    fn test_purge_moves_scale_with_bed() {
        let mut profile = PrinterProfile::default();
        profile.bed_x = 300.0;
        profile.bed_y = 200.0;
        let ini = render_ini(&profile, &SliceOptions::default());
        let start = value(&ini, "start_gcode").unwrap();
        assert!(start.contains("G1 X15 Y10 F5000"));
        assert!(start.contains("\\nM109 S[temperature]"));
        let end = value(&ini, "end_gcode").unwrap();
        assert!(end.contains("G1 X0 Y190"));
    }
}
