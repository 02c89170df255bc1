use std::io::{self, Write};

use crate::types::{RawReading, Reading};

pub const CSV_HEADER: &str = "time,aX,aY,aZ,gX,gY,gZ,pc0,pc1,pc2";

/// 单行 CSV：加速度保持原始 g 单位，主成分为 m/s²
pub fn csv_row(reading: &Reading) -> String {
    let a = reading.acceleration();
    let g = reading.angular_velocity();
    let pc = reading.principal_components();
    format!(
        "{},{},{},{},{},{},{},{},{},{}",
        reading.time(),
        a.x,
        a.y,
        a.z,
        g.x,
        g.y,
        g.z,
        pc.x,
        pc.y,
        pc.z
    )
}

/// Header plus one row per reading, in arrival order
pub fn write_readings_csv<W: Write>(writer: &mut W, readings: &[Reading]) -> io::Result<usize> {
    writeln!(writer, "{}", CSV_HEADER)?;
    for reading in readings {
        writeln!(writer, "{}", csv_row(reading))?;
    }
    writer.flush()?;
    Ok(readings.len())
}

/// Raw reading from an exported row (`time,aX,aY,aZ,gX,gY,gZ[,pc..]`).
/// Header, blank and malformed lines give `None`.
pub fn parse_csv_row(line: &str) -> Option<RawReading> {
    let mut fields = line.trim().split(',').map(str::trim);
    let time = fields.next()?.parse::<u32>().ok()?;
    let mut values = [0f64; 6];
    for value in values.iter_mut() {
        *value = fields.next()?.parse::<f64>().ok()?;
    }
    let [ax, ay, az, gx, gy, gz] = values;
    Some(RawReading::from_fields(time, ax, ay, az, gx, gy, gz))
}
