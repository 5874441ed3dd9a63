use crate::core::units::{steps_per_day, DAYS_PER_LEAP_YEAR, DAYS_PER_YEAR};
use chrono::{Datelike, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};
use serde_valid::Validate;

/// The calendar year a building model's annual series are laid out against.
#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Serialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct Calendar {
    #[validate(minimum = 1)]
    #[validate(maximum = 9999)]
    year: i32,
    /// timestep of the host model, in steps per hour
    #[serde(default = "default_timesteps_per_hour")]
    #[validate(minimum = 1)]
    timesteps_per_hour: usize,
}

fn default_timesteps_per_hour() -> usize {
    1
}

impl Default for Calendar {
    fn default() -> Self {
        Self {
            year: 2019,
            timesteps_per_hour: 1,
        }
    }
}

impl Calendar {
    pub fn new(year: i32, timesteps_per_hour: usize) -> Self {
        Self {
            year,
            timesteps_per_hour,
        }
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn timesteps_per_hour(&self) -> usize {
        self.timesteps_per_hour
    }

    pub fn is_leap(&self) -> bool {
        (self.year % 4 == 0 && self.year % 100 != 0) || self.year % 400 == 0
    }

    pub fn days_in_year(&self) -> u32 {
        if self.is_leap() {
            DAYS_PER_LEAP_YEAR
        } else {
            DAYS_PER_YEAR
        }
    }

    /// Number of values an annual series on this calendar holds at the given resolution.
    pub fn series_length(&self, timesteps_per_hour: usize) -> usize {
        self.days_in_year() as usize * steps_per_day(timesteps_per_hour)
    }

    pub fn day(&self, day_of_year: u32) -> Option<CalendarDay> {
        NaiveDate::from_yo_opt(self.year, day_of_year).map(|date| CalendarDay { day_of_year, date })
    }

    pub(crate) fn iter(&self) -> CalendarIterator {
        CalendarIterator {
            calendar: *self,
            next_day_of_year: 1,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CalendarDay {
    /// 1-based day of the year
    pub day_of_year: u32,
    pub date: NaiveDate,
}

impl CalendarDay {
    /// 0-based index of this day within an annual series
    pub fn index(&self) -> usize {
        (self.day_of_year - 1) as usize
    }

    pub fn month(&self) -> u32 {
        self.date.month()
    }

    pub fn weekday(&self) -> Weekday {
        self.date.weekday()
    }

    pub fn is_weekend(&self) -> bool {
        matches!(self.weekday(), Weekday::Sat | Weekday::Sun)
    }
}

#[derive(Clone, Debug)]
pub struct CalendarIterator {
    calendar: Calendar,
    next_day_of_year: u32,
}

impl Iterator for CalendarIterator {
    type Item = CalendarDay;

    fn next(&mut self) -> Option<Self::Item> {
        if self.next_day_of_year > self.calendar.days_in_year() {
            return None;
        }
        let day = self.calendar.day(self.next_day_of_year)?;
        self.next_day_of_year += 1;
        Some(day)
    }
}
