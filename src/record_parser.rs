//! Parses one framed line of the board's wire format,
//! `<sensor_id>,<timestamp_ms>,<x>,<y>,<z>`, into a [`SensorReading`].

use nom::{
    character::complete::{char, space0, u8 as channel},
    combinator::{all_consuming, map, verify},
    number::complete::double,
    sequence::{delimited, preceded, tuple},
    Finish, IResult,
};

use crate::error::ParseError;
use crate::reading::{SensorId, SensorReading, SENSOR_SLOTS};

fn field<'a, O>(
    inner: impl FnMut(&'a str) -> IResult<&'a str, O>,
) -> impl FnMut(&'a str) -> IResult<&'a str, O> {
    delimited(space0, inner, space0)
}

fn parse_sensor_id(s: &str) -> IResult<&str, SensorId> {
    verify(field(channel), |id: &SensorId| *id < SENSOR_SLOTS)(s)
}

fn parse_reading(s: &str) -> IResult<&str, SensorReading> {
    map(
        all_consuming(tuple((
            parse_sensor_id,
            preceded(char(','), field(double)),
            preceded(char(','), field(double)),
            preceded(char(','), field(double)),
            preceded(char(','), field(double)),
        ))),
        |(sensor_id, timestamp_ms, x, y, z)| SensorReading {
            sensor_id,
            timestamp_ms,
            x,
            y,
            z,
        },
    )(s)
}

/// Parse a trimmed line.
///
/// An empty line is not an error; it yields `Ok(None)` and is skipped.
/// Anything else that is not exactly five well-formed fields with a sensor id
/// in `0..8` is a [`ParseError::MalformedRecord`] carrying the raw line.
pub fn parse_line(line: &str) -> Result<Option<SensorReading>, ParseError> {
    if line.is_empty() {
        return Ok(None);
    }
    match parse_reading(line).finish() {
        Ok((_remaining, reading)) => Ok(Some(reading)),
        Err(_) => Err(ParseError::MalformedRecord {
            line: line.to_owned(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn malformed(line: &str) -> Result<Option<SensorReading>, ParseError> {
        Err(ParseError::MalformedRecord {
            line: line.to_owned(),
        })
    }

    #[test]
    fn parses_well_formed_line() {
        let reading = parse_line("3,1500.0,0.1,0.2,9.8").unwrap().unwrap();
        assert_eq!(
            reading,
            SensorReading {
                sensor_id: 3,
                timestamp_ms: 1500.0,
                x: 0.1,
                y: 0.2,
                z: 9.8,
            }
        );
        assert!((reading.timestamp_secs() - 1.5).abs() < 1e-12);
    }

    #[test]
    fn accepts_integers_negatives_and_padding() {
        let reading = parse_line("0, 250 ,-0.5,1e-2, -9.81").unwrap().unwrap();
        assert_eq!(reading.sensor_id, 0);
        assert_eq!(reading.timestamp_ms, 250.0);
        assert_eq!(reading.x, -0.5);
        assert_eq!(reading.y, 0.01);
        assert_eq!(reading.z, -9.81);
    }

    #[test]
    fn empty_line_is_ignored() {
        assert_eq!(parse_line(""), Ok(None));
    }

    #[test]
    fn bad_timestamp_is_malformed() {
        assert_eq!(parse_line("3,abc,0.1,0.2,9.8"), malformed("3,abc,0.1,0.2,9.8"));
    }

    #[test]
    fn wrong_field_count_is_malformed() {
        assert_eq!(parse_line("3,1500.0,0.1,0.2"), malformed("3,1500.0,0.1,0.2"));
        assert_eq!(
            parse_line("3,1500.0,0.1,0.2,9.8,7"),
            malformed("3,1500.0,0.1,0.2,9.8,7")
        );
    }

    #[test]
    fn non_integer_sensor_id_is_malformed() {
        assert_eq!(parse_line("a,1.0,0,0,0"), malformed("a,1.0,0,0,0"));
        assert_eq!(parse_line("-1,1.0,0,0,0"), malformed("-1,1.0,0,0,0"));
        assert_eq!(parse_line("1.5,1.0,0,0,0"), malformed("1.5,1.0,0,0,0"));
    }

    #[test]
    fn sensor_id_outside_slots_is_malformed() {
        assert_eq!(parse_line("8,1.0,0,0,0"), malformed("8,1.0,0,0,0"));
        assert!(parse_line("7,1.0,0,0,0").unwrap().is_some());
    }
}
