//! Month-scoped merge of scheduled cards and calendar tasks.

use chrono::{Datelike, NaiveDate};

use crate::error::AppError;
use crate::models::calendar::CalendarItem;
use crate::models::card::CardRecord;
use crate::models::task::CalendarTask;

pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Inclusive `YYYY-MM-DD` bounds of one calendar month.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonthRange {
    pub start: String,
    pub end: String,
}

impl MonthRange {
    /// Parse a `YYYY-MM` key.
    pub fn parse(month_key: &str) -> Result<Self, AppError> {
        let invalid = || AppError::validation("month format must be YYYY-MM");

        let (year_raw, month_raw) = month_key.trim().split_once('-').ok_or_else(invalid)?;
        let year: i32 = year_raw.parse().map_err(|_| invalid())?;
        let month: u32 = month_raw.parse().map_err(|_| invalid())?;
        if year <= 0 || !(1..=12).contains(&month) {
            return Err(invalid());
        }

        let first = NaiveDate::from_ymd_opt(year, month, 1).ok_or_else(invalid)?;
        // Day zero of the following month.
        let next_first = if month == 12 {
            NaiveDate::from_ymd_opt(year + 1, 1, 1)
        } else {
            NaiveDate::from_ymd_opt(year, month + 1, 1)
        }
        .ok_or_else(invalid)?;
        let last = next_first.pred_opt().ok_or_else(invalid)?;

        Ok(Self {
            start: first.format(DATE_FORMAT).to_string(),
            end: format!("{:04}-{:02}-{:02}", last.year(), last.month(), last.day()),
        })
    }

    /// Plain string comparison; sound because dates are fixed-width and zero-padded.
    pub fn contains(&self, date: &str) -> bool {
        date >= self.start.as_str() && date <= self.end.as_str()
    }
}

/// Both record kinds projected, filtered to `range`, ordered by date.
///
/// Within a date, cards come before tasks and each keeps its store order.
pub fn merge_month(
    cards: &[CardRecord],
    tasks: &[CalendarTask],
    range: &MonthRange,
) -> Vec<CalendarItem> {
    let mut items: Vec<CalendarItem> = cards
        .iter()
        .filter_map(CalendarItem::from_card)
        .chain(tasks.iter().map(CalendarItem::from_task))
        .filter(|item| range.contains(item.scheduled_date()))
        .collect();
    items.sort_by(|a, b| a.scheduled_date().cmp(b.scheduled_date()));
    items
}

/// Validate a `YYYY-MM-DD` date coming from a client.
pub fn parse_scheduled_date(raw: &str) -> Result<String, AppError> {
    let date = NaiveDate::parse_from_str(raw.trim(), DATE_FORMAT)
        .map_err(|_| AppError::validation("scheduled_date must be YYYY-MM-DD"))?;
    Ok(date.format(DATE_FORMAT).to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{sample_card, sample_task};

    #[test]
    fn test_month_range_leap_february() {
        let range = MonthRange::parse("2024-02").unwrap();
        assert_eq!(range.start, "2024-02-01");
        assert_eq!(range.end, "2024-02-29");
    }

    #[test]
    fn test_month_range_december_and_common_february() {
        assert_eq!(MonthRange::parse("2023-12").unwrap().end, "2023-12-31");
        assert_eq!(MonthRange::parse("2023-02").unwrap().end, "2023-02-28");
        assert_eq!(MonthRange::parse("2024-4").unwrap().start, "2024-04-01");
    }

    #[test]
    fn test_month_range_rejects_bad_keys() {
        for key in ["", "2024", "2024-13", "2024-00", "abcd-01", "0-05", "2024-xx"] {
            assert!(
                matches!(MonthRange::parse(key), Err(AppError::Validation(_))),
                "{key} should be rejected"
            );
        }
    }

    #[test]
    fn test_merge_filters_to_month() {
        let cards: Vec<CardRecord> = ["2024-01-31", "2024-02-01"]
            .iter()
            .enumerate()
            .map(|(i, date)| sample_card(&format!("c{i}"), "u1", Some(*date)))
            .collect();
        let tasks = vec![
            sample_task("t0", "u1", "2024-02-29"),
            sample_task("t1", "u1", "2024-03-01"),
        ];

        let range = MonthRange::parse("2024-02").unwrap();
        let items = merge_month(&cards, &tasks, &range);
        let ids: Vec<&str> = items.iter().map(CalendarItem::id).collect();
        assert_eq!(ids, vec!["c1", "t0"]);
    }

    #[test]
    fn test_merge_skips_unscheduled_cards_and_sorts() {
        let cards = vec![
            sample_card("late", "u1", Some("2024-02-20")),
            sample_card("none", "u1", None),
            sample_card("early", "u1", Some("2024-02-03")),
        ];
        let tasks = vec![sample_task("mid", "u1", "2024-02-10")];
        let range = MonthRange::parse("2024-02").unwrap();
        let ids: Vec<String> = merge_month(&cards, &tasks, &range)
            .iter()
            .map(|item| item.id().to_string())
            .collect();
        assert_eq!(ids, vec!["early", "mid", "late"]);
    }

    #[test]
    fn test_calendar_item_serializes_kind_tag() {
        let card = sample_card("c1", "u1", Some("2024-02-03"));
        let item = CalendarItem::from_card(&card).unwrap();
        let json = serde_json::to_value(&item).unwrap();
        assert_eq!(json["kind"], "card");
        assert_eq!(json["card_id"], "c1");
        assert_eq!(json["checklist_done"], false);

        let task = sample_task("t1", "u1", "2024-02-03");
        let json = serde_json::to_value(CalendarItem::from_task(&task)).unwrap();
        assert_eq!(json["kind"], "task");
        assert_eq!(json["task_id"], "t1");
    }

    #[test]
    fn test_parse_scheduled_date() {
        assert_eq!(parse_scheduled_date("2024-02-29").unwrap(), "2024-02-29");
        assert!(parse_scheduled_date("2023-02-29").is_err());
        assert!(parse_scheduled_date("tomorrow").is_err());
    }
}
