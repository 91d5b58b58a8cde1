use chrono::{Datelike, Months, NaiveDate};

pub fn first_day_of_month(date: NaiveDate) -> NaiveDate {
    date.with_day(1).unwrap_or(date)
}

pub fn next_month_start(date: NaiveDate) -> NaiveDate {
    first_day_of_month(date)
        .checked_add_months(Months::new(1))
        .unwrap_or(NaiveDate::MAX)
}

pub fn last_day_of_month(date: NaiveDate) -> NaiveDate {
    next_month_start(date).pred_opt().unwrap_or(date)
}

/// `anchor_day` in the month of `month`, clamped to the month's last day.
pub fn clamped_due_date(month: NaiveDate, anchor_day: u32) -> NaiveDate {
    let last = last_day_of_month(month);
    let day = anchor_day.clamp(1, last.day());
    month.with_day(day).unwrap_or(last)
}

/// One due date per calendar month from `start_on`'s month through
/// `end_on`'s month inclusive, each on `anchor_day`.
///
/// Each month is clamped on its own, so a day-31 anchor yields Feb 28 and
/// then Mar 31 again. The first month's date may precede `start_on`.
pub fn monthly_due_dates(anchor_day: u32, start_on: NaiveDate, end_on: NaiveDate) -> Vec<NaiveDate> {
    let last_month = first_day_of_month(end_on);

    let mut due_dates = Vec::new();
    let mut cursor = first_day_of_month(start_on);
    while cursor <= last_month {
        due_dates.push(clamped_due_date(cursor, anchor_day));
        let next = next_month_start(cursor);
        if next <= cursor {
            break;
        }
        cursor = next;
    }
    due_dates
}
