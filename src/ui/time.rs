use iced::widget::{pick_list, row, text};
use iced::{Alignment, Element};

use crate::state::data::TimePeriod;
use crate::Message;

/// Year / month selector
///
/// Holds the current selection only; the search reads it once through
/// [`TimeSelector::period`] when it is submitted.
pub struct TimeSelector {
    years: Vec<i32>,
    months: Vec<u32>,
    selected: TimePeriod,
}

impl TimeSelector {
    pub fn new(years: Vec<i32>) -> Self {
        let selected = TimePeriod {
            year: years.first().copied().unwrap_or(TimePeriod::default().year),
            month: 1,
        };
        Self { years, months: (1..=12).collect(), selected }
    }

    pub fn select_year(&mut self, year: i32) {
        if self.years.contains(&year) {
            self.selected.year = year;
        }
    }

    pub fn select_month(&mut self, month: u32) {
        if let Some(period) = TimePeriod::new(self.selected.year, month) {
            self.selected = period;
        }
    }

    /// Snapshot of the current selection
    pub fn period(&self) -> TimePeriod {
        self.selected
    }

    pub fn view(&self) -> Element<Message> {
        row![
            text("Year: "),
            pick_list(self.years.as_slice(), Some(self.selected.year), Message::YearSelected),
            text("Month: "),
            pick_list(self.months.as_slice(), Some(self.selected.month), Message::MonthSelected),
        ]
        .spacing(10)
        .align_y(Alignment::Center)
        .into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_to_first_year_january() {
        let selector = TimeSelector::new((2018..=2024).collect());
        assert_eq!(selector.period(), TimePeriod::new(2018, 1).unwrap());
    }

    #[test]
    fn test_selection_is_snapshotted() {
        let mut selector = TimeSelector::new((2018..=2024).collect());
        selector.select_year(2024);
        selector.select_month(10);
        let submitted = selector.period();

        selector.select_month(11);
        assert_eq!(submitted, TimePeriod::new(2024, 10).unwrap());
        assert_eq!(selector.period().month, 11);
    }

    #[test]
    fn test_out_of_range_choices_ignored() {
        let mut selector = TimeSelector::new((2018..=2024).collect());
        selector.select_year(1999);
        selector.select_month(13);
        assert_eq!(selector.period(), TimePeriod::new(2018, 1).unwrap());
    }
}
