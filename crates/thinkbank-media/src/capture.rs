//! Capture metadata (GPS position, capture time) from embedded EXIF.
//!
//! Only the fields the asset record keeps are read. Images without EXIF are
//! common (PNG, screenshots) and yield `None` without logging above DEBUG.

use std::io::Cursor;

use chrono::NaiveDateTime;
use exif::{Field, In, Reader, Tag, Value};
use tracing::debug;

use thinkbank_core::CaptureMetadata;

const EXIF_DATETIME_FORMAT: &str = "%Y:%m:%d %H:%M:%S";

/// Read capture metadata from any container kamadak-exif understands
/// (JPEG, HEIF, PNG, WebP, TIFF).
pub fn read_capture_metadata(data: &[u8]) -> Option<CaptureMetadata> {
    let mut cursor = Cursor::new(data);
    let exif = match Reader::new().read_from_container(&mut cursor) {
        Ok(exif) => exif,
        Err(e) => {
            debug!(subsystem = "media", component = "capture", error = %e, "No EXIF block");
            return None;
        }
    };
    let meta = capture_from_fields(exif.fields());
    if meta.is_empty() {
        None
    } else {
        Some(meta)
    }
}

/// Fold EXIF fields into [`CaptureMetadata`].
pub(crate) fn capture_from_fields<'a>(fields: impl Iterator<Item = &'a Field>) -> CaptureMetadata {
    let mut lat = None;
    let mut lat_ref = None;
    let mut lon = None;
    let mut lon_ref = None;
    let mut original = None;
    let mut fallback = None;

    for field in fields {
        match field.tag {
            Tag::GPSLatitude => lat = field_as_dms(field),
            Tag::GPSLatitudeRef => lat_ref = field_as_string(field),
            Tag::GPSLongitude => lon = field_as_dms(field),
            Tag::GPSLongitudeRef => lon_ref = field_as_string(field),
            Tag::DateTimeOriginal => original = field_as_string(field),
            Tag::DateTime if field.ifd_num == In::PRIMARY => fallback = field_as_string(field),
            _ => {}
        }
    }

    CaptureMetadata {
        latitude: lat.map(|v| signed(v, lat_ref.as_deref(), "S")),
        longitude: lon.map(|v| signed(v, lon_ref.as_deref(), "W")),
        captured_at: original
            .or(fallback)
            .as_deref()
            .and_then(parse_exif_datetime),
    }
}

fn signed(value: f64, reference: Option<&str>, negative: &str) -> f64 {
    match reference {
        Some(r) if r.eq_ignore_ascii_case(negative) => -value,
        _ => value,
    }
}

fn field_as_string(field: &Field) -> Option<String> {
    match &field.value {
        Value::Ascii(vecs) => vecs
            .first()
            .map(|v| String::from_utf8_lossy(v).trim().to_string())
            .filter(|s| !s.is_empty()),
        _ => None,
    }
}

fn field_as_dms(field: &Field) -> Option<f64> {
    match &field.value {
        Value::Rational(v) if v.len() >= 3 => {
            let d = v[0].to_f64();
            let m = v[1].to_f64();
            let s = v[2].to_f64();
            let deg = d + m / 60.0 + s / 3600.0;
            deg.is_finite().then_some(deg)
        }
        _ => None,
    }
}

/// Parse `YYYY:MM:DD HH:MM:SS`. EXIF carries no zone; the value is taken as UTC.
pub(crate) fn parse_exif_datetime(s: &str) -> Option<chrono::DateTime<chrono::Utc>> {
    NaiveDateTime::parse_from_str(s.trim(), EXIF_DATETIME_FORMAT)
        .ok()
        .map(|naive| naive.and_utc())
}

#[cfg(test)]
mod tests {
    use super::*;
    use exif::Rational;

    fn ascii(tag: Tag, s: &str) -> Field {
        Field {
            tag,
            ifd_num: In::PRIMARY,
            value: Value::Ascii(vec![s.as_bytes().to_vec()]),
        }
    }

    fn dms(tag: Tag, d: u32, m: u32, s: u32) -> Field {
        Field {
            tag,
            ifd_num: In::PRIMARY,
            value: Value::Rational(vec![
                Rational { num: d, denom: 1 },
                Rational { num: m, denom: 1 },
                Rational { num: s, denom: 1 },
            ]),
        }
    }

    #[test]
    fn test_southern_western_hemisphere_negated() {
        let fields = vec![
            dms(Tag::GPSLatitude, 33, 51, 36),
            ascii(Tag::GPSLatitudeRef, "S"),
            dms(Tag::GPSLongitude, 70, 39, 0),
            ascii(Tag::GPSLongitudeRef, "W"),
        ];
        let meta = capture_from_fields(fields.iter());
        let (lat, lon) = meta.coordinates().unwrap();
        assert!((lat + 33.86).abs() < 1e-9);
        assert!((lon + 70.65).abs() < 1e-9);
    }

    #[test]
    fn test_datetime_original_preferred() {
        let fields = vec![
            ascii(Tag::DateTime, "2020:01:01 00:00:00"),
            ascii(Tag::DateTimeOriginal, "2023:07:14 18:30:05"),
        ];
        let meta = capture_from_fields(fields.iter());
        assert_eq!(
            meta.captured_at.unwrap().to_rfc3339(),
            "2023-07-14T18:30:05+00:00"
        );
        assert!(meta.latitude.is_none());
    }

    #[test]
    fn test_datetime_fallback() {
        let fields = vec![ascii(Tag::DateTime, "2021:02:03 04:05:06")];
        let meta = capture_from_fields(fields.iter());
        assert!(meta.captured_at.is_some());
    }

    #[test]
    fn test_malformed_datetime_ignored() {
        assert!(parse_exif_datetime("0000:00:00 00:00:00").is_none());
        assert!(parse_exif_datetime("yesterday").is_none());
    }

    #[test]
    fn test_no_exif_returns_none() {
        assert!(read_capture_metadata(b"not an image").is_none());
        assert!(read_capture_metadata(&[]).is_none());
    }
}
