//! Mapping from an anchor time to the expected forecast frame names.
//!
//! Frame names double as remote resource names and local file names, e.g.
//! `dewa20240501_1200+Szeged.png`. Because the date is written as
//! `YYYYMMDD` followed by a zero-padded hour, sorting the names sorts the
//! frames chronologically.

use std::fmt;

use chrono::{Datelike, Local, NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};

use crate::{MethuError, Result};

pub const DEFAULT_PREFIX: &str = "dewa";
pub const DEFAULT_LOCATION: &str = "Szeged";
pub const DEFAULT_EXTENSION: &str = "png";
pub const HOURS_PER_DAY: u8 = 24;

/// Reference point from which frame identifiers are derived.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnchorTime {
    pub date: NaiveDate,
    pub time: Option<NaiveTime>,
}

impl AnchorTime {
    pub fn new(date: NaiveDate) -> Self {
        Self { date, time: None }
    }

    pub fn with_time(date: NaiveDate, time: NaiveTime) -> Self {
        Self {
            date,
            time: Some(time),
        }
    }

    /// Anchor for the current local wall-clock time.
    pub fn now() -> Self {
        let now = Local::now().naive_local();
        Self::with_time(now.date(), now.time())
    }

    /// Calendar day before the anchor date.
    pub fn yesterday(&self) -> Option<NaiveDate> {
        self.date.pred_opt()
    }
}

/// Which hour slots of which days are expected on the remote side.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SlotConfig {
    pub hours: Vec<u8>,
    pub include_yesterday: bool,
}

impl SlotConfig {
    /// Every hour of today and yesterday.
    pub fn full_days() -> Self {
        Self {
            hours: (0..HOURS_PER_DAY).collect(),
            include_yesterday: true,
        }
    }

    /// Midnight and noon of today and yesterday.
    pub fn twice_daily() -> Self {
        Self {
            hours: vec![0, 12],
            include_yesterday: true,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if let Some(hour) = self.hours.iter().find(|h| **h >= HOURS_PER_DAY) {
            return Err(MethuError::Configuration(format!(
                "naming.hours contains {hour}, hours must be below {HOURS_PER_DAY}"
            )));
        }
        Ok(())
    }
}

impl Default for SlotConfig {
    fn default() -> Self {
        Self::full_days()
    }
}

/// Unique name of one snapshot: date, hour slot and location.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FrameIdentifier {
    name: String,
    date: NaiveDate,
    hour: u8,
}

impl FrameIdentifier {
    pub fn as_str(&self) -> &str {
        &self.name
    }

    pub fn date(&self) -> NaiveDate {
        self.date
    }

    pub fn hour(&self) -> u8 {
        self.hour
    }
}

impl fmt::Display for FrameIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

impl AsRef<str> for FrameIdentifier {
    fn as_ref(&self) -> &str {
        &self.name
    }
}

/// Naming convention shared by the remote source and the local store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameNaming {
    prefix: String,
    location: String,
    extension: String,
    slots: SlotConfig,
}

impl FrameNaming {
    pub fn new(
        prefix: impl Into<String>,
        location: impl Into<String>,
        extension: impl Into<String>,
        slots: SlotConfig,
    ) -> Result<Self> {
        slots.validate()?;
        Ok(Self {
            prefix: prefix.into(),
            location: location.into(),
            extension: extension.into(),
            slots,
        })
    }

    pub fn slots(&self) -> &SlotConfig {
        &self.slots
    }

    pub fn identifier(&self, date: NaiveDate, hour: u8) -> FrameIdentifier {
        let name = format!(
            "{}{:04}{:02}{:02}_{:02}00+{}.{}",
            self.prefix,
            date.year(),
            date.month(),
            date.day(),
            hour,
            self.location,
            self.extension
        );
        FrameIdentifier { name, date, hour }
    }

    /// Expected identifiers for `anchor`: today's slots first, then
    /// yesterday's, each in configured hour order, without duplicates.
    pub fn identifiers(&self, anchor: AnchorTime) -> Vec<FrameIdentifier> {
        let mut days = vec![anchor.date];
        if self.slots.include_yesterday {
            days.extend(anchor.yesterday());
        }

        let mut hours: Vec<u8> = Vec::with_capacity(self.slots.hours.len());
        for hour in &self.slots.hours {
            if !hours.contains(hour) {
                hours.push(*hour);
            }
        }

        days.into_iter()
            .flat_map(|day| hours.iter().map(move |hour| (day, *hour)))
            .map(|(day, hour)| self.identifier(day, hour))
            .collect()
    }
}

impl Default for FrameNaming {
    fn default() -> Self {
        Self {
            prefix: DEFAULT_PREFIX.into(),
            location: DEFAULT_LOCATION.into(),
            extension: DEFAULT_EXTENSION.into(),
            slots: SlotConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    fn may_first() -> AnchorTime {
        AnchorTime::new(NaiveDate::from_ymd_opt(2024, 5, 1).expect("valid date"))
    }

    #[test]
    fn twice_daily_sequence_matches_remote_names() {
        let naming = FrameNaming::new(
            DEFAULT_PREFIX,
            DEFAULT_LOCATION,
            DEFAULT_EXTENSION,
            SlotConfig::twice_daily(),
        )
        .expect("valid naming");

        let names: Vec<String> = naming
            .identifiers(may_first())
            .iter()
            .map(|id| id.to_string())
            .collect();

        assert_eq!(
            names,
            vec![
                "dewa20240501_0000+Szeged.png",
                "dewa20240501_1200+Szeged.png",
                "dewa20240430_0000+Szeged.png",
                "dewa20240430_1200+Szeged.png",
            ]
        );
    }

    #[test]
    fn full_days_yield_forty_eight_unique_names() {
        let ids = FrameNaming::default().identifiers(may_first());
        assert_eq!(ids.len(), 48);
        let unique: HashSet<_> = ids.iter().map(|id| id.as_str()).collect();
        assert_eq!(unique.len(), 48);
        assert_eq!(ids[23].as_str(), "dewa20240501_2300+Szeged.png");
        assert_eq!(ids[24].as_str(), "dewa20240430_0000+Szeged.png");
    }

    #[test]
    fn year_boundary_uses_previous_calendar_day() {
        let anchor = AnchorTime::new(NaiveDate::from_ymd_opt(2025, 1, 1).expect("valid date"));
        let naming = FrameNaming::new("dewa", "Szeged", "png", SlotConfig::twice_daily())
            .expect("valid naming");
        let ids = naming.identifiers(anchor);
        assert_eq!(ids[2].as_str(), "dewa20241231_0000+Szeged.png");
        assert_eq!(ids[2].date(), NaiveDate::from_ymd_opt(2024, 12, 31).expect("date"));
    }

    #[test]
    fn empty_hours_produce_empty_sequence() {
        let slots = SlotConfig {
            hours: Vec::new(),
            include_yesterday: true,
        };
        let naming = FrameNaming::new("dewa", "Szeged", "png", slots).expect("valid naming");
        assert!(naming.identifiers(may_first()).is_empty());
    }

    #[test]
    fn duplicate_hours_are_collapsed() {
        let slots = SlotConfig {
            hours: vec![12, 0, 12],
            include_yesterday: false,
        };
        let naming = FrameNaming::new("dewa", "Szeged", "png", slots).expect("valid naming");
        let ids = naming.identifiers(may_first());
        assert_eq!(ids.len(), 2);
        assert_eq!(ids[0].hour(), 12);
        assert_eq!(ids[1].hour(), 0);
    }

    #[test]
    fn out_of_range_hour_is_rejected() {
        let slots = SlotConfig {
            hours: vec![0, 24],
            include_yesterday: false,
        };
        assert!(FrameNaming::new("dewa", "Szeged", "png", slots).is_err());
    }
}
