use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Form field prefix used by the admin challenge editor, one field per rank:
/// `first_blood_bonus[0]`, `first_blood_bonus[1]`, ...
pub const FORM_FIELD_PREFIX: &str = "first_blood_bonus";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScheduleParseError {
    #[error("bonus for rank {rank} is not an integer: {value:?}")]
    InvalidEntry { rank: usize, value: String },
}

/// Bonus points per solve rank. `None` entries are ranks that explicitly get
/// no bonus while later ranks still may.
///
/// Stored as a JSON array such as `[30, null, 10]`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BonusSchedule(Vec<Option<i32>>);

impl BonusSchedule {
    /// Builds a schedule, dropping trailing "no bonus" entries.
    pub fn new(mut entries: Vec<Option<i32>>) -> Self {
        while matches!(entries.last(), Some(None)) {
            entries.pop();
        }
        Self(entries)
    }

    pub fn empty() -> Self {
        Self::default()
    }

    /// Bonus for the 1-based `rank`, or `None` when the rank is a gap or lies
    /// past the end of the schedule.
    pub fn bonus_for_rank(&self, rank: u32) -> Option<i32> {
        let index = usize::try_from(rank).ok()?.checked_sub(1)?;
        self.0.get(index).copied().flatten()
    }

    pub fn entries(&self) -> &[Option<i32>] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Reads indexed editor fields (`first_blood_bonus[0]`, ...) until the
    /// first missing index. Empty values mean "no bonus".
    ///
    /// Returns `Ok(None)` when the form carries no schedule field at all, so
    /// the caller can leave the stored schedule untouched.
    pub fn from_form_fields(
        fields: &HashMap<String, String>,
    ) -> Result<Option<Self>, ScheduleParseError> {
        if !fields.keys().any(|key| key.starts_with(FORM_FIELD_PREFIX)) {
            return Ok(None);
        }

        let mut entries = Vec::new();
        for index in 0.. {
            let key = format!("{}[{}]", FORM_FIELD_PREFIX, index);
            let Some(raw) = fields.get(&key) else {
                break;
            };
            entries.push(parse_entry(index + 1, raw)?);
        }

        Ok(Some(Self::new(entries)))
    }

    /// Parses a comma separated list, e.g. `30,20,,10`.
    pub fn parse_list(input: &str) -> Result<Self, ScheduleParseError> {
        if input.trim().is_empty() {
            return Ok(Self::empty());
        }

        let entries = input
            .split(',')
            .enumerate()
            .map(|(index, raw)| parse_entry(index + 1, raw))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self::new(entries))
    }
}

fn parse_entry(rank: usize, raw: &str) -> Result<Option<i32>, ScheduleParseError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    trimmed
        .parse::<i32>()
        .map(Some)
        .map_err(|_| ScheduleParseError::InvalidEntry {
            rank,
            value: raw.to_string(),
        })
}

impl FromStr for BonusSchedule {
    type Err = ScheduleParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse_list(s)
    }
}

impl fmt::Display for BonusSchedule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rendered: Vec<String> = self
            .0
            .iter()
            .map(|entry| entry.map(|v| v.to_string()).unwrap_or_default())
            .collect();
        write!(f, "[{}]", rendered.join(","))
    }
}

impl From<Vec<Option<i32>>> for BonusSchedule {
    fn from(entries: Vec<Option<i32>>) -> Self {
        Self::new(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn form(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_trailing_gaps_are_trimmed() {
        let schedule = BonusSchedule::new(vec![Some(30), None, Some(10), None, None]);
        assert_eq!(schedule.entries(), &[Some(30), None, Some(10)]);
        assert_eq!(schedule.len(), 3);
    }

    #[test]
    fn test_bonus_for_rank_handles_gaps_and_overflow() {
        let schedule = BonusSchedule::new(vec![Some(30), None, Some(10)]);
        assert_eq!(schedule.bonus_for_rank(0), None);
        assert_eq!(schedule.bonus_for_rank(1), Some(30));
        assert_eq!(schedule.bonus_for_rank(2), None);
        assert_eq!(schedule.bonus_for_rank(3), Some(10));
        assert_eq!(schedule.bonus_for_rank(4), None);
    }

    #[test]
    fn test_parse_form_fields_until_first_missing_index() {
        let fields = form(&[
            ("name", "warmup"),
            ("first_blood_bonus[0]", "30"),
            ("first_blood_bonus[1]", ""),
            ("first_blood_bonus[2]", "10"),
            ("first_blood_bonus[4]", "5"),
        ]);
        let schedule = BonusSchedule::from_form_fields(&fields).unwrap().unwrap();
        assert_eq!(schedule.entries(), &[Some(30), None, Some(10)]);
    }

    #[test]
    fn test_form_without_schedule_fields() {
        let fields = form(&[("name", "warmup"), ("state", "visible")]);
        assert_eq!(BonusSchedule::from_form_fields(&fields).unwrap(), None);
    }

    #[test]
    fn test_form_with_only_empty_entries_is_empty_schedule() {
        let fields = form(&[("first_blood_bonus[0]", ""), ("first_blood_bonus[1]", "")]);
        let schedule = BonusSchedule::from_form_fields(&fields).unwrap().unwrap();
        assert!(schedule.is_empty());
    }

    #[test]
    fn test_parse_list() {
        let schedule: BonusSchedule = "300, 200,,50,".parse().unwrap();
        assert_eq!(schedule.entries(), &[Some(300), Some(200), None, Some(50)]);
        assert_eq!(schedule.to_string(), "[300,200,,50]");
    }

    #[test]
    fn test_parse_list_rejects_garbage() {
        let err = BonusSchedule::parse_list("30,abc").unwrap_err();
        assert_eq!(
            err,
            ScheduleParseError::InvalidEntry {
                rank: 2,
                value: "abc".to_string()
            }
        );
    }

    #[test]
    fn test_json_representation() {
        let schedule = BonusSchedule::new(vec![Some(30), None, Some(10)]);
        let json = serde_json::to_string(&schedule).unwrap();
        assert_eq!(json, "[30,null,10]");
        let back: BonusSchedule = serde_json::from_str(&json).unwrap();
        assert_eq!(back, schedule);
    }
}
