//! IRONdb Rollup Backend
//!
//! Request dialect of the IRONdb rollup API:
//!
//! ```text
//! GET /rollup/<uuid>/<metric>?start_ts=1556290800&end_ts=1556294400&rollup_span=60s&type=average
//! ```
//!
//! Responses are JSON arrays of `[ts_seconds, value...]` rows.

use regex::Regex;
use serde_json::Value;
use std::sync::OnceLock;

use super::{Backend, Codec, OriginError, UpstreamRequest};
use crate::engine::ProxyError;
use crate::timeseries::{Extent, Point, Series, TimeRangeQuery};

/// Range start parameter
pub const UP_START: &str = "start_ts";
/// Range end parameter
pub const UP_END: &str = "end_ts";
/// Rollup span (step) parameter
pub const UP_SPAN: &str = "rollup_span";

/// IRONdb rollup API dialect
#[derive(Debug, Clone, Default)]
pub struct IronDbBackend;

impl IronDbBackend {
    pub fn new() -> Self {
        Self
    }
}

/// Latest accepted timestamp, 9999-12-31T23:59:59.999Z in milliseconds
///
/// Timestamps and spans stay within this bound so step arithmetic on them
/// cannot overflow.
pub const MAX_TIMESTAMP_MILLIS: i64 = 253_402_300_799_999;

/// Parse an IRONdb timestamp into unix milliseconds
///
/// Accepts whole seconds, seconds with a fraction (millisecond precision),
/// or RFC 3339. Values beyond year 9999 in either direction are rejected.
pub fn parse_timestamp(raw: &str) -> Option<i64> {
    parse_timestamp_unbounded(raw.trim())
        .filter(|millis| (-MAX_TIMESTAMP_MILLIS..=MAX_TIMESTAMP_MILLIS).contains(millis))
}

fn parse_timestamp_unbounded(raw: &str) -> Option<i64> {

    if let Some((secs, frac)) = raw.split_once('.') {
        let secs: i64 = secs.parse::<u64>().ok()?.try_into().ok()?;
        if frac.is_empty() || !frac.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        let mut millis: String = frac.chars().take(3).collect();
        while millis.len() < 3 {
            millis.push('0');
        }
        let millis: i64 = millis.parse().ok()?;
        return secs.checked_mul(1000)?.checked_add(millis);
    }

    if let Ok(secs) = raw.parse::<i64>() {
        return secs.checked_mul(1000);
    }

    chrono::DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|dt| dt.timestamp_millis())
}

/// Format unix milliseconds the way IRONdb expects (`secs.millis`)
pub fn format_timestamp(millis: i64) -> String {
    format!("{}.{:03}", millis.div_euclid(1000), millis.rem_euclid(1000))
}

fn duration_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^(\d+(?:\.\d+)?)(ms|s|m|h|d)?$").expect("duration pattern is valid")
    })
}

/// Parse a rollup span into milliseconds
///
/// Bare numbers are seconds. Returns None for zero or malformed spans.
pub fn parse_duration(raw: &str) -> Option<i64> {
    let caps = duration_regex().captures(raw.trim())?;
    let amount: f64 = caps[1].parse().ok()?;
    let unit_ms = match caps.get(2).map(|m| m.as_str()) {
        Some("ms") => 1.0,
        None | Some("s") => 1000.0,
        Some("m") => 60_000.0,
        Some("h") => 3_600_000.0,
        Some("d") => 86_400_000.0,
        Some(_) => return None,
    };

    let millis = (amount * unit_ms).round();
    if millis < 1.0 || millis > MAX_TIMESTAMP_MILLIS as f64 {
        return None;
    }
    Some(millis as i64)
}

/// Path plus sorted non-range parameters
fn statement(request: &UpstreamRequest) -> String {
    let mut params: Vec<&(String, String)> = request
        .params
        .iter()
        .filter(|(k, _)| k != UP_START && k != UP_END && k != UP_SPAN)
        .collect();
    if params.is_empty() {
        return request.path.clone();
    }

    params.sort();
    let query: Vec<String> = params.iter().map(|(k, v)| format!("{}={}", k, v)).collect();
    format!("{}?{}", request.path, query.join("&"))
}

fn required<'a>(request: &'a UpstreamRequest, name: &str) -> Result<&'a str, ProxyError> {
    match request.get(name) {
        Some(value) if !value.is_empty() => Ok(value),
        _ => Err(ProxyError::MissingParameter(name.to_string())),
    }
}

fn invalid(name: &str, value: &str) -> ProxyError {
    ProxyError::InvalidParameter {
        name: name.to_string(),
        value: value.to_string(),
    }
}

/// Flatten a JSON row cell into optional values
fn flatten_cell(cell: &Value, out: &mut Vec<Option<f64>>) -> Result<(), OriginError> {
    match cell {
        Value::Null => out.push(None),
        Value::Number(n) => out.push(n.as_f64()),
        Value::Array(items) => {
            for item in items {
                flatten_cell(item, out)?;
            }
        }
        other => {
            return Err(OriginError::Decode(format!(
                "unsupported rollup value: {}",
                other
            )))
        }
    }
    Ok(())
}

fn encode_value(value: Option<f64>) -> Value {
    value
        .and_then(serde_json::Number::from_f64)
        .map(Value::Number)
        .unwrap_or(Value::Null)
}

impl Codec for IronDbBackend {
    fn decode(&self, raw: &[u8]) -> Result<Series, OriginError> {
        let rows: Vec<Vec<Value>> =
            serde_json::from_slice(raw).map_err(|e| OriginError::Decode(e.to_string()))?;

        let mut points = Vec::with_capacity(rows.len());
        for row in rows {
            let (ts, cells) = row
                .split_first()
                .ok_or_else(|| OriginError::Decode("empty rollup row".to_string()))?;
            let secs = ts
                .as_f64()
                .ok_or_else(|| OriginError::Decode(format!("invalid timestamp: {}", ts)))?;

            let mut values = Vec::with_capacity(cells.len());
            for cell in cells {
                flatten_cell(cell, &mut values)?;
            }
            points.push(Point::with_values((secs * 1000.0).round() as i64, values));
        }

        Ok(Series::from_points(points))
    }

    fn encode(&self, series: &Series) -> Result<Vec<u8>, OriginError> {
        let rows: Vec<Vec<Value>> = series
            .points
            .iter()
            .map(|point| {
                let ts = if point.timestamp % 1000 == 0 {
                    Value::from(point.timestamp / 1000)
                } else {
                    Value::from(point.timestamp as f64 / 1000.0)
                };
                std::iter::once(ts)
                    .chain(point.values.iter().map(|v| encode_value(*v)))
                    .collect()
            })
            .collect();

        serde_json::to_vec(&rows).map_err(|e| OriginError::Encode(e.to_string()))
    }
}

impl Backend for IronDbBackend {
    fn name(&self) -> &str {
        "irondb"
    }

    fn parse_time_range_query(
        &self,
        request: &UpstreamRequest,
    ) -> Result<TimeRangeQuery, ProxyError> {
        let raw = required(request, UP_START)?;
        let start = parse_timestamp(raw).ok_or_else(|| invalid(UP_START, raw))?;

        let raw = required(request, UP_END)?;
        let end = parse_timestamp(raw).ok_or_else(|| invalid(UP_END, raw))?;

        let raw = required(request, UP_SPAN)?;
        let step = parse_duration(raw).ok_or_else(|| invalid(UP_SPAN, raw))?;

        let extent = Extent::try_new(start, end).ok_or(ProxyError::InvalidRange)?;

        Ok(TimeRangeQuery {
            statement: statement(request),
            extent,
            step,
        })
    }

    fn set_extent(&self, request: &mut UpstreamRequest, _query: &TimeRangeQuery, extent: &Extent) {
        request.set(UP_START, format_timestamp(extent.start));
        request.set(UP_END, format_timestamp(extent.end));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rollup(start: &str, end: &str, span: &str) -> UpstreamRequest {
        UpstreamRequest::new("/rollup/00000000-0000-0000-0000-000000000001/cpu")
            .param(UP_START, start)
            .param(UP_END, end)
            .param(UP_SPAN, span)
            .param("type", "average")
    }

    #[test]
    fn test_parse_timestamp() {
        assert_eq!(parse_timestamp("1556290800"), Some(1_556_290_800_000));
        assert_eq!(parse_timestamp("1556290800.25"), Some(1_556_290_800_250));
        assert_eq!(parse_timestamp("1556290800.123456"), Some(1_556_290_800_123));
        assert_eq!(parse_timestamp("2019-04-26T15:00:00Z"), Some(1_556_290_800_000));
        assert_eq!(parse_timestamp("yesterday"), None);
        assert_eq!(parse_timestamp("12."), None);
    }

    #[test]
    fn test_parse_timestamp_bounds() {
        assert_eq!(parse_timestamp("253402300799"), Some(253_402_300_799_000));
        assert_eq!(parse_timestamp("253402300799.999"), Some(MAX_TIMESTAMP_MILLIS));
        assert_eq!(parse_timestamp("-253402300799"), Some(-253_402_300_799_000));
        assert_eq!(parse_timestamp("253402300800"), None);
        assert_eq!(parse_timestamp("-253402300800"), None);
        // Fits in i64 milliseconds but not on the step grid
        assert_eq!(parse_timestamp("9223372036854775"), None);
        assert_eq!(parse_duration("9223372036854775"), None);
    }

    #[test]
    fn test_out_of_range_end_is_invalid() {
        let backend = IronDbBackend::new();

        assert!(matches!(
            backend.parse_time_range_query(&rollup("0", "9223372036854775", "10s")),
            Err(ProxyError::InvalidParameter { name, value })
                if name == UP_END && value == "9223372036854775"
        ));
    }

    #[test]
    fn test_format_timestamp() {
        assert_eq!(format_timestamp(1_556_290_800_000), "1556290800.000");
        assert_eq!(format_timestamp(1_556_290_800_250), "1556290800.250");
    }

    #[test]
    fn test_parse_duration() {
        assert_eq!(parse_duration("60"), Some(60_000));
        assert_eq!(parse_duration("60s"), Some(60_000));
        assert_eq!(parse_duration("5m"), Some(300_000));
        assert_eq!(parse_duration("1h"), Some(3_600_000));
        assert_eq!(parse_duration("250ms"), Some(250));
        assert_eq!(parse_duration("0.5"), Some(500));
        assert_eq!(parse_duration("0"), None);
        assert_eq!(parse_duration("fast"), None);
    }

    #[test]
    fn test_parse_time_range_query() {
        let backend = IronDbBackend::new();
        let trq = backend
            .parse_time_range_query(&rollup("1556290800", "1556294400", "60s"))
            .unwrap();

        assert_eq!(trq.extent, Extent::new(1_556_290_800_000, 1_556_294_400_000));
        assert_eq!(trq.step, 60_000);
        assert_eq!(
            trq.statement,
            "/rollup/00000000-0000-0000-0000-000000000001/cpu?type=average"
        );
    }

    #[test]
    fn test_statement_ignores_range_and_param_order() {
        let backend = IronDbBackend::new();
        let a = UpstreamRequest::new("/rollup/x")
            .param("b", "2")
            .param("a", "1")
            .param(UP_START, "0")
            .param(UP_END, "60")
            .param(UP_SPAN, "60");
        let b = UpstreamRequest::new("/rollup/x")
            .param("a", "1")
            .param(UP_START, "600")
            .param(UP_END, "6000")
            .param(UP_SPAN, "60")
            .param("b", "2");

        let a = backend.parse_time_range_query(&a).unwrap();
        let b = backend.parse_time_range_query(&b).unwrap();
        assert_eq!(a.statement, b.statement);
    }

    #[test]
    fn test_missing_parameters() {
        let backend = IronDbBackend::new();

        let mut req = rollup("1", "2", "1");
        req.remove(UP_START);
        assert!(matches!(
            backend.parse_time_range_query(&req),
            Err(ProxyError::MissingParameter(name)) if name == UP_START
        ));

        let mut req = rollup("1", "2", "1");
        req.remove(UP_END);
        assert!(matches!(
            backend.parse_time_range_query(&req),
            Err(ProxyError::MissingParameter(name)) if name == UP_END
        ));

        let mut req = rollup("1", "2", "1");
        req.remove(UP_SPAN);
        assert!(matches!(
            backend.parse_time_range_query(&req),
            Err(ProxyError::MissingParameter(name)) if name == UP_SPAN
        ));
    }

    #[test]
    fn test_invalid_parameters() {
        let backend = IronDbBackend::new();

        assert!(matches!(
            backend.parse_time_range_query(&rollup("soon", "2", "1")),
            Err(ProxyError::InvalidParameter { name, value }) if name == UP_START && value == "soon"
        ));
        assert!(matches!(
            backend.parse_time_range_query(&rollup("1", "2", "0s")),
            Err(ProxyError::InvalidParameter { name, .. }) if name == UP_SPAN
        ));
        assert!(matches!(
            backend.parse_time_range_query(&rollup("20", "10", "1")),
            Err(ProxyError::InvalidRange)
        ));
    }

    #[test]
    fn test_set_extent_rewrites_range_only() {
        let backend = IronDbBackend::new();
        let mut req = rollup("1556290800", "1556294400", "60s");
        let trq = backend.parse_time_range_query(&req).unwrap();

        backend.set_extent(&mut req, &trq, &Extent::new(1_556_294_460_000, 1_556_298_000_000));

        assert_eq!(req.get(UP_START), Some("1556294460.000"));
        assert_eq!(req.get(UP_END), Some("1556298000.000"));
        assert_eq!(req.get(UP_SPAN), Some("60s"));
        assert_eq!(req.get("type"), Some("average"));
    }

    #[test]
    fn test_fast_forward_request() {
        let backend = IronDbBackend::new();
        let req = rollup("1556290800", "1556294400", "60s");
        let trq = backend.parse_time_range_query(&req).unwrap();

        let ff = backend.fast_forward_request(&req, &trq, &Extent::new(1_000_000, 1_060_000));

        assert_eq!(ff.get(UP_START), Some("1000.000"));
        assert_eq!(ff.get(UP_END), Some("1060.000"));
        // Original untouched
        assert_eq!(req.get(UP_START), Some("1556290800"));
    }

    #[test]
    fn test_decode() {
        let backend = IronDbBackend::new();
        let series = backend
            .decode(br#"[[1556290860, 2.5], [1556290800, null], [1556290920.5, [1, 2]]]"#)
            .unwrap();

        assert_eq!(series.len(), 3);
        assert_eq!(series.points[0], Point::with_values(1_556_290_800_000, vec![None]));
        assert_eq!(series.points[1], Point::new(1_556_290_860_000, 2.5));
        assert_eq!(
            series.points[2],
            Point::with_values(1_556_290_920_500, vec![Some(1.0), Some(2.0)])
        );
    }

    #[test]
    fn test_decode_rejects_garbage() {
        let backend = IronDbBackend::new();
        assert!(matches!(backend.decode(b"not json"), Err(OriginError::Decode(_))));
        assert!(matches!(backend.decode(b"[[]]"), Err(OriginError::Decode(_))));
        assert!(matches!(
            backend.decode(br#"[[1, {"a": 1}]]"#),
            Err(OriginError::Decode(_))
        ));
    }

    #[test]
    fn test_encode() {
        let backend = IronDbBackend::new();
        let series = Series::from_points(vec![
            Point::new(1_556_290_800_000, 2.5),
            Point::with_values(1_556_290_860_500, vec![None]),
        ]);

        let body = backend.encode(&series).unwrap();
        assert_eq!(
            String::from_utf8(body).unwrap(),
            "[[1556290800,2.5],[1556290860.5,null]]"
        );
    }
}
