//! Dense daily reconstruction.
//!
//! Accounts and net worth are both stored as one row per calendar day even
//! though the ledger only reports sparse events. [`Timeline`] keeps the rows
//! of one entity and, whenever an event lands on a later day, synthesizes
//! every missing day with a caller supplied carry-forward constructor.
//!
//! Events must arrive in ascending date order: the timeline only ever looks
//! back at its last row.

use chrono::NaiveDate;

use crate::{EngineError, ResultEngine};

/// A row that belongs to exactly one calendar day.
pub trait DailyRow {
    fn day(&self) -> NaiveDate;
}

/// Gap-free sequence of daily rows for one entity.
#[derive(Clone, Debug)]
pub struct Timeline<T> {
    rows: Vec<T>,
}

impl<T> Default for Timeline<T> {
    fn default() -> Self {
        Self { rows: Vec::new() }
    }
}

impl<T: DailyRow> Timeline<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the row for `day`, creating it and any missing day before it.
    ///
    /// `carry` receives the day to create and the previous row (`None` for the
    /// very first row) and returns the new row's starting state.
    pub fn day_mut<F>(&mut self, day: NaiveDate, mut carry: F) -> ResultEngine<&mut T>
    where
        F: FnMut(NaiveDate, Option<&T>) -> T,
    {
        match self.rows.last().map(DailyRow::day) {
            None => self.rows.push(carry(day, None)),
            Some(last) if day < last => {
                return Err(EngineError::OutOfOrder {
                    previous: last,
                    next: day,
                });
            }
            Some(mut current) => {
                while current < day {
                    let Some(next) = current.succ_opt() else {
                        break;
                    };
                    let row = carry(next, self.rows.last());
                    self.rows.push(row);
                    current = next;
                }
            }
        }

        let last = self.rows.len() - 1;
        Ok(&mut self.rows[last])
    }

    /// Carry the last row forward up to and including `end`.
    ///
    /// An empty timeline stays empty.
    pub fn extend_through<F>(&mut self, end: NaiveDate, carry: F) -> ResultEngine<()>
    where
        F: FnMut(NaiveDate, Option<&T>) -> T,
    {
        if let Some(last) = self.rows.last()
            && last.day() < end
        {
            self.day_mut(end, carry)?;
        }
        Ok(())
    }

    pub fn last(&self) -> Option<&T> {
        self.rows.last()
    }

    pub fn rows(&self) -> &[T] {
        &self.rows
    }

    pub fn rows_mut(&mut self) -> &mut [T] {
        &mut self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn into_rows(self) -> Vec<T> {
        self.rows
    }
}

/// Rebuild a dense timeline from sparse, date-ordered events.
///
/// Each event is folded into the row of its day with `apply`; days without
/// events are produced by `carry`. When `end` is later than the last event
/// the final state is carried forward through `end`. No events means no rows.
pub fn reconstruct<E, T, C, A>(
    events: impl IntoIterator<Item = E>,
    end: Option<NaiveDate>,
    day_of: impl Fn(&E) -> NaiveDate,
    mut carry: C,
    mut apply: A,
) -> ResultEngine<Vec<T>>
where
    T: DailyRow,
    C: FnMut(NaiveDate, Option<&T>) -> T,
    A: FnMut(&mut T, &E),
{
    let mut timeline = Timeline::new();
    for event in events {
        let row = timeline.day_mut(day_of(&event), &mut carry)?;
        apply(row, &event);
    }
    if let Some(end) = end {
        timeline.extend_through(end, &mut carry)?;
    }
    Ok(timeline.into_rows())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Clone, Debug, PartialEq)]
    struct Balance {
        day: NaiveDate,
        amount: i64,
    }

    impl DailyRow for Balance {
        fn day(&self) -> NaiveDate {
            self.day
        }
    }

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, d).unwrap()
    }

    fn carry(day: NaiveDate, last: Option<&Balance>) -> Balance {
        Balance {
            day,
            amount: last.map_or(0, |b| b.amount),
        }
    }

    fn rebuild(events: &[(u32, i64)], end: Option<NaiveDate>) -> Vec<Balance> {
        reconstruct(
            events.iter().copied(),
            end,
            |(d, _)| day(*d),
            carry,
            |row: &mut Balance, (_, amount)| row.amount += amount,
        )
        .unwrap()
    }

    #[test]
    fn fills_gaps_with_carried_balance() {
        let rows = rebuild(&[(1, 100), (10, 500), (15, 400)], None);

        assert_eq!(rows.len(), 15);
        assert_eq!(rows[0].amount, 100);
        assert_eq!(rows[2].amount, 100);
        assert_eq!(rows[9].amount, 600);
        assert_eq!(rows[11].amount, 600);
        assert_eq!(rows[14].amount, 1000);
        for (offset, row) in rows.iter().enumerate() {
            assert_eq!(row.day, day(1 + offset as u32));
        }
    }

    #[test]
    fn same_day_events_share_a_row() {
        let rows = rebuild(&[(3, 10), (3, 15), (4, -5)], None);

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0], Balance { day: day(3), amount: 25 });
        assert_eq!(rows[1], Balance { day: day(4), amount: 20 });
    }

    #[test]
    fn extends_through_end_date() {
        let rows = rebuild(&[(1, 100)], Some(day(5)));

        assert_eq!(rows.len(), 5);
        assert!(rows.iter().all(|row| row.amount == 100));
    }

    #[test]
    fn no_events_no_rows() {
        assert!(rebuild(&[], Some(day(5))).is_empty());
    }

    #[test]
    fn rejects_events_out_of_order() {
        let mut timeline = Timeline::new();
        timeline.day_mut(day(5), carry).unwrap();

        let err = timeline.day_mut(day(2), carry).unwrap_err();
        assert_eq!(
            err,
            EngineError::OutOfOrder {
                previous: day(5),
                next: day(2)
            }
        );
    }
}
