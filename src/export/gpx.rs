//! GPX 1.1 track log. Positions are placeholders; each point carries the
//! cadence in a Garmin TrackPointExtension.

use std::io::{self, Write};

use crate::types::SessionElement;
use crate::utils::format_rfc3339;

const GPX_NS: &str = "http://www.topografix.com/GPX/1/1";
const GPXTPX_NS: &str = "http://www.garmin.com/xmlschemas/TrackPointExtension/v1";
const XSI_NS: &str = "http://www.w3.org/2001/XMLSchema-instance";
const SCHEMA_LOCATION: &str = "http://www.topografix.com/GPX/1/1 http://www.topografix.com/GPX/1/1/gpx.xsd \
http://www.garmin.com/xmlschemas/TrackPointExtension/v1 http://www.garmin.com/xmlschemas/TrackPointExtensionv1.xsd";

/// XML 属性转义
fn escape_attr(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

fn write_track_point<W: Write>(writer: &mut W, element: &SessionElement) -> io::Result<()> {
    writeln!(writer, "      <trkpt lat=\"0\" lon=\"0\">")?;
    writeln!(writer, "        <time>{}</time>", format_rfc3339(&element.timestamp))?;
    writeln!(writer, "        <extensions>")?;
    writeln!(writer, "          <gpxtpx:TrackPointExtension>")?;
    writeln!(writer, "            <gpxtpx:cad>{}</gpxtpx:cad>", element.cadence.round() as i64)?;
    writeln!(writer, "          </gpxtpx:TrackPointExtension>")?;
    writeln!(writer, "        </extensions>")?;
    writeln!(writer, "      </trkpt>")
}

/// One `trkpt` per element
pub fn write_gpx<W: Write>(writer: &mut W, creator: &str, elements: &[SessionElement]) -> io::Result<usize> {
    writeln!(writer, "<?xml version=\"1.0\" encoding=\"UTF-8\"?>")?;
    writeln!(
        writer,
        "<gpx xmlns=\"{}\" xmlns:gpxtpx=\"{}\" xmlns:xsi=\"{}\" xsi:schemaLocation=\"{}\" version=\"1.1\" creator=\"{}\">",
        GPX_NS,
        GPXTPX_NS,
        XSI_NS,
        SCHEMA_LOCATION,
        escape_attr(creator)
    )?;
    writeln!(writer, "  <trk>")?;
    writeln!(writer, "    <trkseg>")?;
    for element in elements {
        write_track_point(writer, element)?;
    }
    writeln!(writer, "    </trkseg>")?;
    writeln!(writer, "  </trk>")?;
    writeln!(writer, "</gpx>")?;
    writer.flush()?;
    Ok(elements.len())
}
