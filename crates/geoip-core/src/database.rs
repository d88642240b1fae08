//! In-memory country range database.
//!
//! The database is a pair of sorted, non-overlapping range tables, one for
//! IPv4 (`u32`) and one for IPv6 (`u128`). Lookups are a binary search.
//!
//! The on-disk format is the GeoIP country CSV, one range per line:
//!
//! ```text
//! "1.0.0.0","1.0.0.255","16777216","16777471","AU","Australia"
//! ```
//!
//! A compact four-column form (`start,end,code,name`) is accepted as well.
//! Fields go through the `csv` reader, so quoted fields may contain commas.
//! Blank lines, lines starting with `#` and a leading UTF-8 BOM are ignored.

use std::collections::HashMap;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::path::Path;

use csv::{ReaderBuilder, StringRecord, Trim};
use serde::Deserialize;
use tracing::{debug, info};

use crate::error::{GeoIpError, GeoIpResult, LookupError};
use crate::locator::GeoLocator;
use crate::types::GeoRecord;

#[derive(Debug, Clone, PartialEq, Eq)]
struct Country {
    code: String,
    name: String,
}

/// `start,end,start_num,end_num,code,name`
#[derive(Debug, Deserialize)]
struct WhoisRow {
    start: IpAddr,
    end: IpAddr,
    _start_num: String,
    _end_num: String,
    code: String,
    name: String,
}

/// `start,end,code,name`
#[derive(Debug, Deserialize)]
struct CountryRow {
    start: IpAddr,
    end: IpAddr,
    code: String,
    name: String,
}

impl From<WhoisRow> for CountryRow {
    fn from(row: WhoisRow) -> Self {
        Self {
            start: row.start,
            end: row.end,
            code: row.code,
            name: row.name,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Range<T> {
    start: T,
    end: T,
    country: usize,
    line: usize,
}

/// Country lookup table loaded from a CSV file.
///
/// # Examples
///
/// ```
/// use geoip_core::{CountryDatabase, GeoLocator};
///
/// let db = CountryDatabase::from_csv(
///     "\"8.8.8.0\",\"8.8.8.255\",\"134744064\",\"134744319\",\"US\",\"United States\"\n",
/// )
/// .unwrap();
/// let record = db.lookup_str("8.8.8.8").unwrap().unwrap();
/// assert_eq!(record.code, "US");
/// ```
#[derive(Debug, Clone, Default)]
pub struct CountryDatabase {
    countries: Vec<Country>,
    v4: Vec<Range<u32>>,
    v6: Vec<Range<u128>>,
}

impl CountryDatabase {
    /// Load a database file from disk.
    ///
    /// # Errors
    ///
    /// Returns [`GeoIpError::DatabaseIo`] when the file cannot be read and
    /// [`GeoIpError::DatabaseFormat`] when its contents are invalid.
    pub fn load(path: impl AsRef<Path>) -> GeoIpResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| GeoIpError::DatabaseIo {
            path: path.to_path_buf(),
            source,
        })?;
        let db = Self::from_csv(&text)?;
        info!(
            path = %path.display(),
            ipv4_ranges = db.v4.len(),
            ipv6_ranges = db.v6.len(),
            countries = db.countries.len(),
            "loaded country database"
        );
        Ok(db)
    }

    /// Parse a database from CSV text.
    ///
    /// # Errors
    ///
    /// Returns [`GeoIpError::DatabaseFormat`] naming the first bad line.
    pub fn from_csv(text: &str) -> GeoIpResult<Self> {
        let text = text.strip_prefix('\u{feff}').unwrap_or(text);
        let mut builder = ReaderBuilder::new();
        builder
            .has_headers(false)
            .comment(Some(b'#'))
            .flexible(true)
            .trim(Trim::All);

        let mut db = Self::default();
        let mut interned: HashMap<(String, String), usize> = HashMap::new();
        let mut record = StringRecord::new();

        // One reader per line keeps error line numbers exact across skipped lines.
        for (idx, raw) in text.lines().enumerate() {
            let line = idx + 1;
            if raw.trim().is_empty() {
                continue;
            }

            let mut reader = builder.from_reader(raw.as_bytes());
            match reader.read_record(&mut record) {
                Ok(true) => {}
                Ok(false) => continue,
                Err(e) => return Err(format_error(line, &e)),
            }

            let row = match record.len() {
                6 => record.deserialize::<WhoisRow>(None).map(CountryRow::from),
                4 => record.deserialize::<CountryRow>(None),
                n => {
                    return Err(GeoIpError::DatabaseFormat {
                        line,
                        reason: format!("expected 4 or 6 fields, found {n}"),
                    });
                }
            }
            .map_err(|e| format_error(line, &e))?;

            if !is_country_code(&row.code) {
                return Err(GeoIpError::DatabaseFormat {
                    line,
                    reason: format!("invalid country code '{}'", row.code),
                });
            }

            let countries = &mut db.countries;
            let country = *interned
                .entry((row.code, row.name))
                .or_insert_with_key(|(code, name)| {
                    countries.push(Country {
                        code: code.clone(),
                        name: name.clone(),
                    });
                    countries.len() - 1
                });

            match (row.start, row.end) {
                (IpAddr::V4(s), IpAddr::V4(e)) => {
                    db.v4.push(make_range(u32::from(s), u32::from(e), country, line)?);
                }
                (IpAddr::V6(s), IpAddr::V6(e)) => {
                    db.v6.push(make_range(u128::from(s), u128::from(e), country, line)?);
                }
                _ => {
                    return Err(GeoIpError::DatabaseFormat {
                        line,
                        reason: "range mixes IPv4 and IPv6 addresses".to_owned(),
                    });
                }
            }
        }

        sort_and_check(&mut db.v4)?;
        sort_and_check(&mut db.v6)?;
        debug!(
            ipv4_ranges = db.v4.len(),
            ipv6_ranges = db.v6.len(),
            "parsed country database"
        );
        Ok(db)
    }

    /// Total number of ranges.
    #[must_use]
    pub fn len(&self) -> usize {
        self.v4.len() + self.v6.len()
    }

    /// Whether the database has no ranges.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn record(&self, start: IpAddr, end: IpAddr, country: usize) -> GeoRecord {
        let c = &self.countries[country];
        GeoRecord {
            range_start: start,
            range_end: end,
            code: c.code.clone(),
            name: c.name.clone(),
        }
    }
}

impl GeoLocator for CountryDatabase {
    fn lookup(&self, ip: IpAddr) -> Result<Option<GeoRecord>, LookupError> {
        let record = match ip {
            IpAddr::V4(v4) => self.lookup_v4(v4),
            IpAddr::V6(v6) => match v6.to_ipv4_mapped() {
                Some(v4) => self.lookup_v4(v4),
                None => self.lookup_v6(v6),
            },
        };
        Ok(record)
    }
}

impl CountryDatabase {
    fn lookup_v4(&self, ip: Ipv4Addr) -> Option<GeoRecord> {
        find(&self.v4, u32::from(ip)).map(|r| {
            self.record(
                Ipv4Addr::from(r.start).into(),
                Ipv4Addr::from(r.end).into(),
                r.country,
            )
        })
    }

    fn lookup_v6(&self, ip: Ipv6Addr) -> Option<GeoRecord> {
        find(&self.v6, u128::from(ip)).map(|r| {
            self.record(
                Ipv6Addr::from(r.start).into(),
                Ipv6Addr::from(r.end).into(),
                r.country,
            )
        })
    }
}

fn find<T: Ord + Copy>(ranges: &[Range<T>], ip: T) -> Option<&Range<T>> {
    let idx = ranges.partition_point(|r| r.start <= ip);
    let candidate = ranges.get(idx.checked_sub(1)?)?;
    (ip <= candidate.end).then_some(candidate)
}

fn make_range<T: Ord>(start: T, end: T, country: usize, line: usize) -> GeoIpResult<Range<T>> {
    if start > end {
        return Err(GeoIpError::DatabaseFormat {
            line,
            reason: "range start is after range end".to_owned(),
        });
    }
    Ok(Range {
        start,
        end,
        country,
        line,
    })
}

fn sort_and_check<T: Ord + Copy>(ranges: &mut [Range<T>]) -> GeoIpResult<()> {
    ranges.sort_unstable_by_key(|r| r.start);
    for pair in ranges.windows(2) {
        if pair[1].start <= pair[0].end {
            return Err(GeoIpError::DatabaseFormat {
                line: pair[1].line,
                reason: format!("range overlaps the range on line {}", pair[0].line),
            });
        }
    }
    Ok(())
}

/// Two ASCII letters or digits (`US`, `A1`).
fn is_country_code(code: &str) -> bool {
    code.len() == 2 && code.bytes().all(|b| b.is_ascii_alphanumeric())
}

fn format_error(line: usize, err: &csv::Error) -> GeoIpError {
    let reason = match err.kind() {
        csv::ErrorKind::Deserialize { err, .. } => match err.field() {
            Some(field) => format!("field {}: {}", field + 1, err.kind()),
            None => err.kind().to_string(),
        },
        _ => err.to_string(),
    };
    GeoIpError::DatabaseFormat { line, reason }
}
