//! Выбор мест при покупке: та же сетка, только для чтения, поверх нее
//! два слоя состояния - уже проданные позиции и текущий выбор
//! пользователя. Сетку этот режим не изменяет никогда.

use std::collections::HashSet;

use serde::Serialize;

use super::grid::{Cell, CellKind, Grid, GridError};

/// Состояние продаваемого места в сеансе выбора.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeatState {
    /// Продано: из этого состояния в рамках сеанса выхода нет.
    Unavailable,
    Available,
    Selected,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToggleOutcome {
    Added,
    Removed,
    /// Позиция не участвует в выборе: продана, сломана, проход, пусто.
    Blocked,
}

/// Строка для создания билета: позиция + цена, которую нам сообщили.
#[derive(Debug, Clone, PartialEq, Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeatChoice {
    pub row: u32,
    pub column: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seat_number: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seat_label: Option<String>,
    pub fare: f64,
}

/// Текущий выбор с промежуточной суммой - информационные значения для
/// создателя билета, цены сюда приходят извне и не пересчитываются.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Checkout {
    pub seats: Vec<SeatChoice>,
    pub subtotal: f64,
}

pub struct SeatPicker {
    grid: Grid,
    booked: HashSet<(u32, u32)>,
    selected: Vec<(u32, u32)>,
}

impl SeatPicker {
    /// Сетка - собственная копия (рейс и так держит снимок планировки),
    /// список проданных позиций приходит извне и считается истиной.
    pub fn new(grid: Grid, booked: impl IntoIterator<Item = (u32, u32)>) -> Self {
        SeatPicker {
            grid,
            booked: booked.into_iter().collect(),
            selected: Vec::new(),
        }
    }

    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    /// Порядок выбора сохраняется - так места лягут в билет.
    pub fn selected(&self) -> &[(u32, u32)] {
        &self.selected
    }

    pub fn is_booked(&self, row: u32, column: u32) -> bool {
        self.booked.contains(&(row, column))
    }

    /// None - позиция в выборе не участвует (проход, сломанное, пусто).
    pub fn state_of(&self, row: u32, column: u32) -> Result<Option<SeatState>, GridError> {
        let Some(cell) = self.grid.cell_at(row, column)? else {
            return Ok(None);
        };
        if cell.kind != CellKind::Seat {
            return Ok(None);
        }
        let state = if self.booked.contains(&(row, column)) {
            SeatState::Unavailable
        } else if self.selected.contains(&(row, column)) {
            SeatState::Selected
        } else {
            SeatState::Available
        };
        Ok(Some(state))
    }

    /// Единственный переход автомата: Available <-> Selected.
    /// Проданные и неучаствующие позиции выбор не меняют.
    pub fn toggle(&mut self, row: u32, column: u32) -> Result<ToggleOutcome, GridError> {
        match self.state_of(row, column)? {
            None | Some(SeatState::Unavailable) => Ok(ToggleOutcome::Blocked),
            Some(SeatState::Selected) => {
                self.selected.retain(|p| *p != (row, column));
                Ok(ToggleOutcome::Removed)
            }
            Some(SeatState::Available) => {
                self.selected.push((row, column));
                Ok(ToggleOutcome::Added)
            }
        }
    }

    /// Сброс выбора (отправка формы или уход со страницы).
    pub fn clear(&mut self) {
        self.selected.clear();
    }

    /// Снимок выбора для создателя билета. Цену каждой позиции
    /// сообщает вызывающая сторона, сумма - просто сумма этих цен.
    pub fn checkout<F>(&self, fare_for: F) -> Checkout
    where
        F: Fn(&Cell) -> f64,
    {
        let mut seats = Vec::with_capacity(self.selected.len());
        let mut subtotal = 0.0;
        for &(row, column) in &self.selected {
            if let Ok(Some(cell)) = self.grid.cell_at(row, column) {
                let fare = fare_for(cell);
                subtotal += fare;
                seats.push(SeatChoice {
                    row,
                    column,
                    seat_number: cell.seat_number,
                    seat_label: cell.seat_label.clone(),
                    fare,
                });
            }
        }
        Checkout { seats, subtotal }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// 1x3, все три позиции - места с номерами 1..3.
    fn picker(booked: &[(u32, u32)]) -> SeatPicker {
        let mut grid = Grid::new(1, 3);
        for column in 0..3 {
            grid.insert_seat(0, column, None).unwrap();
        }
        SeatPicker::new(grid, booked.iter().copied())
    }

    #[test]
    fn booked_position_never_enters_selection() {
        let mut picker = picker(&[(0, 0)]);
        for _ in 0..3 {
            assert_eq!(picker.toggle(0, 0).unwrap(), ToggleOutcome::Blocked);
        }
        assert!(picker.selected().is_empty());

        assert_eq!(picker.toggle(0, 1).unwrap(), ToggleOutcome::Added);
        assert_eq!(picker.selected(), &[(0, 1)]);
        assert_eq!(picker.toggle(0, 1).unwrap(), ToggleOutcome::Removed);
        assert!(picker.selected().is_empty());
    }

    #[test]
    fn double_toggle_is_identity_on_membership() {
        let mut picker = picker(&[]);
        picker.toggle(0, 2).unwrap();
        picker.toggle(0, 0).unwrap();
        picker.toggle(0, 2).unwrap();
        picker.toggle(0, 2).unwrap();
        assert_eq!(picker.state_of(0, 2).unwrap(), Some(SeatState::Selected));
        assert_eq!(picker.state_of(0, 0).unwrap(), Some(SeatState::Selected));
        assert_eq!(picker.selected().len(), 2);
    }

    #[test]
    fn multi_select_keeps_activation_order() {
        let mut picker = picker(&[]);
        picker.toggle(0, 2).unwrap();
        picker.toggle(0, 0).unwrap();
        assert_eq!(picker.selected(), &[(0, 2), (0, 0)]);
    }

    #[test]
    fn aisle_broken_and_empty_are_inert() {
        let mut grid = Grid::new(2, 3);
        grid.toggle_aisle_column(1).unwrap();
        grid.insert_seat(0, 0, None).unwrap();
        grid.toggle_broken(0, 0).unwrap();
        let mut picker = SeatPicker::new(grid, []);

        assert_eq!(picker.toggle(0, 1).unwrap(), ToggleOutcome::Blocked); // проход
        assert_eq!(picker.toggle(0, 0).unwrap(), ToggleOutcome::Blocked); // сломанное
        assert_eq!(picker.toggle(1, 0).unwrap(), ToggleOutcome::Blocked); // пусто
        assert!(picker.selected().is_empty());
        assert_eq!(picker.state_of(0, 1).unwrap(), None);
    }

    #[test]
    fn toggle_out_of_bounds_is_an_error() {
        let mut picker = picker(&[]);
        assert!(picker.toggle(1, 0).is_err());
        assert!(picker.selected().is_empty());
    }

    #[test]
    fn checkout_forwards_supplied_fares_and_sums() {
        let mut picker = picker(&[]);
        picker.toggle(0, 0).unwrap();
        picker.toggle(0, 2).unwrap();

        // Цены приходят извне: у колонки 2 индивидуальный тариф.
        let checkout = picker.checkout(|cell| if cell.column == 2 { 750.0 } else { 500.0 });
        assert_eq!(checkout.seats.len(), 2);
        assert_eq!(checkout.seats[0].seat_number, Some(1));
        assert_eq!(checkout.seats[0].fare, 500.0);
        assert_eq!(checkout.seats[1].fare, 750.0);
        assert_eq!(checkout.subtotal, 1250.0);
    }

    #[test]
    fn clear_resets_selection() {
        let mut picker = picker(&[]);
        picker.toggle(0, 0).unwrap();
        picker.clear();
        assert!(picker.selected().is_empty());
        assert_eq!(picker.state_of(0, 0).unwrap(), Some(SeatState::Available));
    }
}
