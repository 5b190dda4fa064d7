//! Listening-port declarations (`"80,8000-8010"`)

use forgeport_core::{Error, Result};
use std::ops::RangeInclusive;

const MIN_PORT: u32 = 1;
const MAX_PORT: u32 = 65535;

fn parse_port(range: &str, raw: &str) -> Result<u16> {
    let port: u32 = raw
        .trim()
        .parse()
        .map_err(|_| Error::invalid_port_range(range, format!("'{}' is not a port number", raw)))?;
    if !(MIN_PORT..=MAX_PORT).contains(&port) {
        return Err(Error::invalid_port_range(
            range,
            format!("port {} is outside {}-{}", port, MIN_PORT, MAX_PORT),
        ));
    }
    Ok(port as u16)
}

/// Parse a comma list of ports and `start-end` ranges.
///
/// An empty declaration is valid and yields no ranges.
pub fn parse_port_range(range: &str) -> Result<Vec<RangeInclusive<u16>>> {
    let trimmed = range.trim();
    if trimmed.is_empty() {
        return Ok(Vec::new());
    }

    let mut ranges = Vec::new();
    for part in trimmed.split(',') {
        let part = part.trim();
        if part.is_empty() {
            return Err(Error::invalid_port_range(range, "empty entry"));
        }
        match part.split_once('-') {
            Some((start, end)) => {
                let start = parse_port(range, start)?;
                let end = parse_port(range, end)?;
                if start > end {
                    return Err(Error::invalid_port_range(
                        range,
                        format!("range {}-{} is reversed", start, end),
                    ));
                }
                ranges.push(start..=end);
            }
            None => {
                let port = parse_port(range, part)?;
                ranges.push(port..=port);
            }
        }
    }
    Ok(ranges)
}

/// Validate a declaration, returning it normalized without whitespace
pub fn validate_port_range(range: &str) -> Result<String> {
    let ranges = parse_port_range(range)?;
    Ok(ranges
        .iter()
        .map(|r| {
            if r.start() == r.end() {
                r.start().to_string()
            } else {
                format!("{}-{}", r.start(), r.end())
            }
        })
        .collect::<Vec<_>>()
        .join(","))
}
