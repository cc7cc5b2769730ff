//! Military Grid Reference System decoding.
//!
//! A reference such as `29SNB1234` names a grid cell; decoding returns the
//! south-west corner of that cell on the WGS84 ellipsoid, going through the
//! UTM easting/northing of the cell.

use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

use crate::error::GeobioError;

static MGRS_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\d{1,2})([C-HJ-NP-X])([A-HJ-NP-Z])([A-HJ-NP-V])(\d*)$").unwrap()
});

const BAND_LETTERS: &str = "CDEFGHJKLMNPQRSTUVWX";
const ROW_LETTERS: &str = "ABCDEFGHJKLMNPQRSTUV";
const BAND_TOLERANCE_DEG: f64 = 0.5;

const WGS84_A: f64 = 6_378_137.0;
const WGS84_ECC_SQUARED: f64 = 0.006_694_38;
const UTM_SCALE: f64 = 0.9996;
const FALSE_EASTING: f64 = 500_000.0;
const FALSE_NORTHING_SOUTH: f64 = 10_000_000.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LatLon {
    pub lat: f64,
    pub lon: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Utm {
    pub zone: u8,
    pub band: char,
    pub easting: f64,
    pub northing: f64,
}

impl Utm {
    fn is_southern(&self) -> bool {
        self.band < 'N'
    }
}

/// Converts one MGRS reference to latitude/longitude in degrees.
pub fn to_lat_lon(reference: &str) -> Result<LatLon, GeobioError> {
    let utm = to_utm(reference)?;
    let position = utm_to_lat_lon(&utm);

    let (lower, upper) = band_bounds(utm.band);
    if position.lat < lower - BAND_TOLERANCE_DEG || position.lat > upper + BAND_TOLERANCE_DEG {
        return Err(GeobioError::conversion(
            reference,
            format!(
                "latitude {:.4} falls outside band {} ({lower}..{upper})",
                position.lat, utm.band
            ),
        ));
    }
    Ok(position)
}

pub fn to_utm(reference: &str) -> Result<Utm, GeobioError> {
    let compact: String = reference
        .chars()
        .filter(|ch| !ch.is_whitespace())
        .collect::<String>()
        .to_ascii_uppercase();
    if compact.is_empty() {
        return Err(GeobioError::conversion(reference, "empty reference"));
    }

    let captures = MGRS_PATTERN
        .captures(&compact)
        .ok_or_else(|| GeobioError::conversion(reference, "not a UTM-based MGRS reference"))?;

    let zone: u8 = captures[1]
        .parse()
        .map_err(|_| GeobioError::conversion(reference, "invalid zone number"))?;
    if !(1..=60).contains(&zone) {
        return Err(GeobioError::conversion(
            reference,
            format!("zone {zone} outside 1..=60"),
        ));
    }

    let band = first_char(&captures[2]);
    let column = first_char(&captures[3]);
    let row = first_char(&captures[4]);
    let digits = &captures[5];
    if digits.len() % 2 != 0 || digits.len() > 10 {
        return Err(GeobioError::conversion(
            reference,
            format!("expected an even number of up to 10 digits, got {}", digits.len()),
        ));
    }

    let set = hundred_km_set(zone);
    let column_easting = column_to_easting(column, set)
        .ok_or_else(|| {
            GeobioError::conversion(reference, format!("column letter {column} not valid in zone {zone}"))
        })?;
    let mut row_northing = row_to_northing(row, set)
        .ok_or_else(|| GeobioError::conversion(reference, format!("invalid row letter {row}")))?;

    let min_northing = band_min_northing(band)
        .ok_or_else(|| GeobioError::conversion(reference, format!("invalid band letter {band}")))?;
    while row_northing < min_northing {
        row_northing += 2_000_000.0;
    }

    let (easting_digits, northing_digits) = digits.split_at(digits.len() / 2);
    let precision = easting_digits.len() as i32;
    let scale = 10f64.powi(5 - precision);
    let easting_offset = parse_digits(easting_digits) * scale;
    let northing_offset = parse_digits(northing_digits) * scale;

    Ok(Utm {
        zone,
        band,
        easting: column_easting + easting_offset,
        northing: row_northing + northing_offset,
    })
}

/// Inverse transverse Mercator projection of a UTM position.
pub fn utm_to_lat_lon(utm: &Utm) -> LatLon {
    let ecc = WGS84_ECC_SQUARED;
    let ecc_prime = ecc / (1.0 - ecc);
    let e1 = (1.0 - (1.0 - ecc).sqrt()) / (1.0 + (1.0 - ecc).sqrt());

    let x = utm.easting - FALSE_EASTING;
    let mut y = utm.northing;
    if utm.is_southern() {
        y -= FALSE_NORTHING_SOUTH;
    }
    let long_origin = f64::from(utm.zone - 1) * 6.0 - 180.0 + 3.0;

    let m = y / UTM_SCALE;
    let mu = m / (WGS84_A * (1.0 - ecc / 4.0 - 3.0 * ecc * ecc / 64.0 - 5.0 * ecc.powi(3) / 256.0));
    let phi1 = mu
        + (3.0 * e1 / 2.0 - 27.0 * e1.powi(3) / 32.0) * (2.0 * mu).sin()
        + (21.0 * e1 * e1 / 16.0 - 55.0 * e1.powi(4) / 32.0) * (4.0 * mu).sin()
        + (151.0 * e1.powi(3) / 96.0) * (6.0 * mu).sin();

    let sin_phi1 = phi1.sin();
    let cos_phi1 = phi1.cos();
    let tan_phi1 = phi1.tan();
    let n1 = WGS84_A / (1.0 - ecc * sin_phi1 * sin_phi1).sqrt();
    let t1 = tan_phi1 * tan_phi1;
    let c1 = ecc_prime * cos_phi1 * cos_phi1;
    let r1 = WGS84_A * (1.0 - ecc) / (1.0 - ecc * sin_phi1 * sin_phi1).powf(1.5);
    let d = x / (n1 * UTM_SCALE);

    let lat = phi1
        - (n1 * tan_phi1 / r1)
            * (d * d / 2.0
                - (5.0 + 3.0 * t1 + 10.0 * c1 - 4.0 * c1 * c1 - 9.0 * ecc_prime) * d.powi(4) / 24.0
                + (61.0 + 90.0 * t1 + 298.0 * c1 + 45.0 * t1 * t1 - 252.0 * ecc_prime - 3.0 * c1 * c1)
                    * d.powi(6)
                    / 720.0);
    let lon = (d - (1.0 + 2.0 * t1 + c1) * d.powi(3) / 6.0
        + (5.0 - 2.0 * c1 + 28.0 * t1 - 3.0 * c1 * c1 + 8.0 * ecc_prime + 24.0 * t1 * t1) * d.powi(5)
            / 120.0)
        / cos_phi1;

    LatLon {
        lat: lat.to_degrees(),
        lon: long_origin + lon.to_degrees(),
    }
}

fn first_char(value: &str) -> char {
    value.chars().next().unwrap_or_default()
}

fn parse_digits(value: &str) -> f64 {
    if value.is_empty() {
        return 0.0;
    }
    value.parse::<u32>().map(f64::from).unwrap_or(0.0)
}

// Zones cycle through six 100 km lettering sets.
fn hundred_km_set(zone: u8) -> u8 {
    match zone % 6 {
        0 => 6,
        set => set,
    }
}

fn column_to_easting(column: char, set: u8) -> Option<f64> {
    let letters = match set % 3 {
        1 => "ABCDEFGH",
        2 => "JKLMNPQR",
        _ => "STUVWXYZ",
    };
    letters
        .find(column)
        .map(|index| (index as f64 + 1.0) * 100_000.0)
}

fn row_to_northing(row: char, set: u8) -> Option<f64> {
    let index = ROW_LETTERS.find(row)?;
    // even sets start their row lettering at F
    let offset = if set % 2 == 0 { 5 } else { 0 };
    let shifted = (index + ROW_LETTERS.len() - offset) % ROW_LETTERS.len();
    Some(shifted as f64 * 100_000.0)
}

fn band_min_northing(band: char) -> Option<f64> {
    let northing = match band {
        'C' => 1_100_000.0,
        'D' => 2_000_000.0,
        'E' => 2_800_000.0,
        'F' => 3_700_000.0,
        'G' => 4_600_000.0,
        'H' => 5_500_000.0,
        'J' => 6_400_000.0,
        'K' => 7_300_000.0,
        'L' => 8_200_000.0,
        'M' => 9_100_000.0,
        'N' => 0.0,
        'P' => 800_000.0,
        'Q' => 1_700_000.0,
        'R' => 2_600_000.0,
        'S' => 3_500_000.0,
        'T' => 4_400_000.0,
        'U' => 5_300_000.0,
        'V' => 6_200_000.0,
        'W' => 7_000_000.0,
        'X' => 7_900_000.0,
        _ => return None,
    };
    Some(northing)
}

fn band_bounds(band: char) -> (f64, f64) {
    let index = BAND_LETTERS.find(band).unwrap_or(0) as f64;
    let lower = -80.0 + 8.0 * index;
    let upper = if band == 'X' { 84.0 } else { lower + 8.0 };
    (lower, upper)
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn decode_utm_square() {
        let utm = to_utm("29SNB1234").unwrap();
        assert_eq!(utm.zone, 29);
        assert_eq!(utm.band, 'S');
        assert_eq!(utm.easting, 512_000.0);
        assert_eq!(utm.northing, 4_134_000.0);
    }

    #[test]
    fn decode_southern_alentejo_cell() {
        let position = to_lat_lon("29SNB1234").unwrap();
        assert!(position.lat > 37.3 && position.lat < 37.4, "lat {}", position.lat);
        assert!(position.lon > -8.9 && position.lon < -8.8, "lon {}", position.lon);
    }

    #[test]
    fn whitespace_and_case_are_ignored() {
        let compact = to_lat_lon("29SNB1234").unwrap();
        let spaced = to_lat_lon(" 29s nb 12 34 ").unwrap();
        assert_eq!(compact, spaced);
    }

    #[test]
    fn even_zone_row_offset() {
        // zone 30 belongs to set 6, whose rows start at F
        let utm = to_utm("30TWK0000").unwrap();
        assert_eq!(utm.easting, 500_000.0);
        assert_eq!(utm.northing, 4_400_000.0);
    }

    #[test]
    fn central_meridian_on_equator() {
        let position = utm_to_lat_lon(&Utm {
            zone: 31,
            band: 'N',
            easting: 500_000.0,
            northing: 0.0,
        });
        assert!(position.lat.abs() < 1e-9);
        assert!((position.lon - 3.0).abs() < 1e-9);
    }

    #[test]
    fn southern_hemisphere_is_negative() {
        let position = to_lat_lon("23KPQ0000").unwrap();
        assert!(position.lat < 0.0);
    }

    #[test]
    fn reject_malformed_references() {
        assert_matches!(to_lat_lon("invalid"), Err(GeobioError::Conversion { .. }));
        assert_matches!(to_lat_lon(""), Err(GeobioError::Conversion { .. }));
        assert_matches!(to_lat_lon("29SNB123"), Err(GeobioError::Conversion { .. }));
        assert_matches!(to_lat_lon("61SNB1234"), Err(GeobioError::Conversion { .. }));
        assert_matches!(to_lat_lon("0SNB1234"), Err(GeobioError::Conversion { .. }));
    }

    #[test]
    fn reject_column_outside_zone_set() {
        // zone 29 uses columns J..R
        assert_matches!(to_lat_lon("29SAB1234"), Err(GeobioError::Conversion { .. }));
    }

    #[test]
    fn reject_polar_bands() {
        assert_matches!(to_lat_lon("ZAF1234"), Err(GeobioError::Conversion { .. }));
    }
}
