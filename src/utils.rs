use chrono::{DateTime, SecondsFormat, Utc};

/// 将设备毫秒时间格式化为 MM:SS.mmm（设备时钟从上电开始计时）
pub fn format_device_time(time_ms: u32) -> String {
    let minutes = time_ms / 60_000;
    let seconds = (time_ms / 1000) % 60;
    let ms = time_ms % 1000;
    format!("{:02}:{:02}.{:03}", minutes, seconds, ms)
}

/// 导出文件名用的时间戳，不含冒号，兼容各类文件系统
pub fn format_file_stamp(timestamp: &DateTime<Utc>) -> String {
    timestamp.format("%Y-%m-%dT%H-%M-%S%.3fZ").to_string()
}

/// RFC 3339 UTC timestamp with millisecond precision, as used in GPX
pub fn format_rfc3339(timestamp: &DateTime<Utc>) -> String {
    timestamp.to_rfc3339_opts(SecondsFormat::Millis, true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn device_time_wraps_minutes() {
        assert_eq!(format_device_time(0), "00:00.000");
        assert_eq!(format_device_time(61_234), "01:01.234");
    }

    #[test]
    fn stamps_are_filesystem_friendly() {
        let t = Utc.with_ymd_and_hms(2024, 3, 9, 7, 5, 1).unwrap();
        assert_eq!(format_file_stamp(&t), "2024-03-09T07-05-01.000Z");
        assert_eq!(format_rfc3339(&t), "2024-03-09T07:05:01.000Z");
    }
}
