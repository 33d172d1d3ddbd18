//! editor.rs
//!
//! Сеанс правки схемы салона.
//!
//! Все режимы правки собраны в явный конечный автомат `EditMode`:
//! пока активен один режим, второй открыть нельзя, а структурные
//! операции заблокированы. Текст набирается в буфер и попадает в
//! сетку только при подтверждении - отмена в любой момент оставляет
//! сетку ровно такой, какой она была до входа в режим.

use std::collections::BTreeMap;

use thiserror::Error;

use super::grid::{Cell, CellKind, Grid, GridError, SavedLayout};

#[derive(Debug, Error, Clone, PartialEq)]
pub enum EditorError {
    #[error(transparent)]
    Grid(#[from] GridError),
    #[error("сначала завершите или отмените текущую правку")]
    ModeActive,
    #[error("нет активной правки")]
    NoActiveEdit,
    #[error("позиция ({row},{column}) не редактируется в этом режиме")]
    NotEditable { row: u32, column: u32 },
}

/// Мини-язык быстрого ввода в диалоге добавления ряда.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SeatToken {
    /// Пустая строка или маркер прохода `XY`: позицию пропускаем.
    Skip,
    /// `XX` - сломанное место.
    Broken,
    /// Любой другой текст - место с этой подписью.
    Label(String),
}

impl SeatToken {
    pub fn parse(input: &str) -> SeatToken {
        let text = input.trim();
        if text.is_empty() || text.eq_ignore_ascii_case("xy") {
            // Колонки-проходы материализуются сами, маркер избыточен.
            SeatToken::Skip
        } else if text.eq_ignore_ascii_case("xx") {
            SeatToken::Broken
        } else {
            SeatToken::Label(text.to_string())
        }
    }
}

/// Режимы сеанса. Переходы - только через begin/confirm/cancel.
#[derive(Debug, Clone, PartialEq)]
pub enum EditMode {
    Idle,
    /// Поштучная правка: двойной клик по позиции.
    Cell { row: u32, column: u32 },
    /// Массовая правка одного ряда.
    Row {
        row: u32,
        buffer: BTreeMap<(u32, u32), String>,
    },
    /// Массовая правка всей сетки.
    All { buffer: BTreeMap<(u32, u32), String> },
    /// Диалог добавления ряда: по полю на каждую не-проходную колонку.
    AppendRow { fields: BTreeMap<u32, String> },
}

pub struct EditorSession {
    grid: Grid,
    mode: EditMode,
}

impl EditorSession {
    pub fn new(grid: Grid) -> Self {
        EditorSession {
            grid,
            mode: EditMode::Idle,
        }
    }

    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    pub fn mode(&self) -> &EditMode {
        &self.mode
    }

    pub fn into_grid(self) -> Grid {
        self.grid
    }

    pub fn export(&self) -> SavedLayout {
        self.grid.export()
    }

    fn ensure_idle(&self) -> Result<(), EditorError> {
        if self.mode == EditMode::Idle {
            Ok(())
        } else {
            Err(EditorError::ModeActive)
        }
    }

    /// Отмена любого режима. Буферы выбрасываются, сетка не тронута.
    pub fn cancel(&mut self) {
        self.mode = EditMode::Idle;
    }

    // === Поштучная правка ===

    /// Открывает поле ввода на позиции и возвращает его начальный
    /// текст (подпись, номер или пустую строку для пустой позиции).
    pub fn begin_cell_edit(&mut self, row: u32, column: u32) -> Result<String, EditorError> {
        self.ensure_idle()?;
        if self.grid.is_aisle_column(column) {
            return Err(EditorError::NotEditable { row, column });
        }
        let prefill = match self.grid.cell_at(row, column)? {
            Some(cell) if cell.kind == CellKind::Aisle => {
                return Err(EditorError::NotEditable { row, column })
            }
            Some(cell) => cell.display_name(),
            None => String::new(),
        };
        self.mode = EditMode::Cell { row, column };
        Ok(prefill)
    }

    /// Подтверждение поштучной правки:
    /// - пусто + непустой текст -> новое место с этой подписью;
    /// - пусто + пустой текст -> ничего не создается;
    /// - место + непустой текст -> обновить подпись;
    /// - место + пустой текст -> снять подпись (место остается).
    pub fn confirm_cell_edit(&mut self, text: &str) -> Result<(), EditorError> {
        let (row, column) = match self.mode {
            EditMode::Cell { row, column } => (row, column),
            _ => return Err(EditorError::NoActiveEdit),
        };
        self.mode = EditMode::Idle;

        let trimmed = text.trim();
        let exists = self.grid.cell_at(row, column)?.is_some();
        if exists {
            if trimmed.is_empty() {
                self.grid.clear_label(row, column)?;
            } else {
                self.grid.set_label(row, column, trimmed)?;
            }
        } else if !trimmed.is_empty() {
            self.grid.insert_seat(row, column, Some(trimmed.to_string()))?;
        }
        Ok(())
    }

    // === Массовая правка ===

    /// Снимок текущего текста всех редактируемых позиций диапазона.
    fn snapshot(&self, rows: std::ops::Range<u32>) -> BTreeMap<(u32, u32), String> {
        let mut buffer = BTreeMap::new();
        for row in rows {
            for column in 0..self.grid.column_count() {
                if self.grid.is_aisle_column(column) {
                    continue;
                }
                let text = match self.grid.cell_at(row, column) {
                    Ok(Some(cell)) if cell.kind != CellKind::Aisle => cell.display_name(),
                    _ => String::new(),
                };
                buffer.insert((row, column), text);
            }
        }
        buffer
    }

    pub fn begin_row_edit(&mut self, row: u32) -> Result<(), EditorError> {
        self.ensure_idle()?;
        if row >= self.grid.row_count() {
            return Err(GridError::OutOfBounds {
                row,
                column: 0,
                rows: self.grid.row_count(),
                columns: self.grid.column_count(),
            }
            .into());
        }
        let buffer = self.snapshot(row..row + 1);
        self.mode = EditMode::Row { row, buffer };
        Ok(())
    }

    pub fn begin_grid_edit(&mut self) -> Result<(), EditorError> {
        self.ensure_idle()?;
        let buffer = self.snapshot(0..self.grid.row_count());
        self.mode = EditMode::All { buffer };
        Ok(())
    }

    /// Правка текста в буфере активного массового режима.
    pub fn set_buffer_text(
        &mut self,
        row: u32,
        column: u32,
        text: &str,
    ) -> Result<(), EditorError> {
        let buffer = match &mut self.mode {
            EditMode::Row { buffer, .. } | EditMode::All { buffer } => buffer,
            _ => return Err(EditorError::NoActiveEdit),
        };
        match buffer.get_mut(&(row, column)) {
            Some(slot) => {
                *slot = text.to_string();
                Ok(())
            }
            None => Err(EditorError::NotEditable { row, column }),
        }
    }

    /// Подтверждение массовой правки: обход буфера по порядку ключей,
    /// правила те же, что и у поштучной. Новые места получают номера
    /// последовательно в порядке обхода буфера.
    pub fn confirm_bulk_edit(&mut self) -> Result<(), EditorError> {
        let buffer = match std::mem::replace(&mut self.mode, EditMode::Idle) {
            EditMode::Row { buffer, .. } => buffer,
            EditMode::All { buffer } => buffer,
            other => {
                self.mode = other;
                return Err(EditorError::NoActiveEdit);
            }
        };

        for ((row, column), text) in buffer {
            let trimmed = text.trim();
            let exists = self.grid.cell_at(row, column)?.is_some();
            if exists {
                if trimmed.is_empty() {
                    self.grid.clear_label(row, column)?;
                } else {
                    self.grid.set_label(row, column, trimmed)?;
                }
            } else if !trimmed.is_empty() {
                self.grid.insert_seat(row, column, Some(trimmed.to_string()))?;
            }
        }
        Ok(())
    }

    // === Добавление ряда ===

    pub fn begin_append_row(&mut self) -> Result<(), EditorError> {
        self.ensure_idle()?;
        let fields = (0..self.grid.column_count())
            .filter(|c| !self.grid.is_aisle_column(*c))
            .map(|c| (c, String::new()))
            .collect();
        self.mode = EditMode::AppendRow { fields };
        Ok(())
    }

    pub fn set_append_field(&mut self, column: u32, text: &str) -> Result<(), EditorError> {
        let EditMode::AppendRow { fields } = &mut self.mode else {
            return Err(EditorError::NoActiveEdit);
        };
        match fields.get_mut(&column) {
            Some(slot) => {
                *slot = text.to_string();
                Ok(())
            }
            None => Err(EditorError::NotEditable { row: 0, column }),
        }
    }

    /// Подтверждение: поля разбираются мини-языком, ряд добавляется
    /// снизу, число рядов растет на 1. Колонки-проходы не спрашивались
    /// и заполняются ячейками прохода автоматически.
    pub fn confirm_append_row(&mut self) -> Result<(), EditorError> {
        let fields = match std::mem::replace(&mut self.mode, EditMode::Idle) {
            EditMode::AppendRow { fields } => fields,
            other => {
                self.mode = other;
                return Err(EditorError::NoActiveEdit);
            }
        };

        let row = self.grid.row_count();
        let mut next = self.grid.next_seat_number();
        let mut new_cells = Vec::new();
        for column in 0..self.grid.column_count() {
            if self.grid.is_aisle_column(column) {
                new_cells.push(Cell {
                    row,
                    column,
                    kind: CellKind::Aisle,
                    seat_number: None,
                    seat_label: None,
                    fare: None,
                });
                continue;
            }
            let text = fields.get(&column).map(String::as_str).unwrap_or("");
            let (kind, seat_label) = match SeatToken::parse(text) {
                SeatToken::Skip => continue,
                SeatToken::Broken => (CellKind::Broken, None),
                SeatToken::Label(label) => (CellKind::Seat, Some(label)),
            };
            new_cells.push(Cell {
                row,
                column,
                kind,
                seat_number: Some(next),
                seat_label,
                fare: None,
            });
            next += 1;
        }
        self.grid.extend_with_row(new_cells);
        Ok(())
    }

    // === Структурные и контекстные действия (только из Idle) ===

    pub fn set_row_count(&mut self, rows: u32) -> Result<(), EditorError> {
        self.ensure_idle()?;
        self.grid.set_row_count(rows);
        Ok(())
    }

    pub fn set_column_count(&mut self, columns: u32) -> Result<(), EditorError> {
        self.ensure_idle()?;
        self.grid.set_column_count(columns);
        Ok(())
    }

    pub fn toggle_aisle_column(&mut self, column: u32) -> Result<bool, EditorError> {
        self.ensure_idle()?;
        Ok(self.grid.toggle_aisle_column(column)?)
    }

    pub fn toggle_broken(&mut self, row: u32, column: u32) -> Result<(), EditorError> {
        self.ensure_idle()?;
        Ok(self.grid.toggle_broken(row, column)?)
    }

    pub fn make_aisle(&mut self, row: u32, column: u32) -> Result<(), EditorError> {
        self.ensure_idle()?;
        Ok(self.grid.make_aisle(row, column)?)
    }

    pub fn remove_cell(&mut self, row: u32, column: u32) -> Result<(), EditorError> {
        self.ensure_idle()?;
        Ok(self.grid.remove_cell(row, column)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session_2x3_with_aisle() -> EditorSession {
        let mut grid = Grid::new(2, 3);
        grid.toggle_aisle_column(1).unwrap();
        EditorSession::new(grid)
    }

    #[test]
    fn token_parse() {
        assert_eq!(SeatToken::parse(""), SeatToken::Skip);
        assert_eq!(SeatToken::parse("  "), SeatToken::Skip);
        assert_eq!(SeatToken::parse("xy"), SeatToken::Skip);
        assert_eq!(SeatToken::parse("XY"), SeatToken::Skip);
        assert_eq!(SeatToken::parse("xx"), SeatToken::Broken);
        assert_eq!(SeatToken::parse("XX"), SeatToken::Broken);
        assert_eq!(SeatToken::parse(" A1 "), SeatToken::Label("A1".into()));
    }

    #[test]
    fn cell_edit_creates_seat_with_label() {
        // Двойной клик по пустой (0,0), ввод "A1".
        let mut session = session_2x3_with_aisle();
        let prefill = session.begin_cell_edit(0, 0).unwrap();
        assert_eq!(prefill, "");
        session.confirm_cell_edit("A1").unwrap();

        let cell = session.grid().cell_at(0, 0).unwrap().unwrap();
        assert_eq!(cell.kind, CellKind::Seat);
        assert_eq!(cell.seat_label.as_deref(), Some("A1"));
        assert_eq!(cell.seat_number, Some(1));
        // Проход не задет.
        assert_eq!(
            session.grid().cell_at(1, 1).unwrap().unwrap().kind,
            CellKind::Aisle
        );
    }

    #[test]
    fn cell_edit_empty_text_on_empty_position_is_noop() {
        let mut session = session_2x3_with_aisle();
        session.begin_cell_edit(0, 0).unwrap();
        session.confirm_cell_edit("   ").unwrap();
        assert!(session.grid().cell_at(0, 0).unwrap().is_none());
    }

    #[test]
    fn cell_edit_empty_text_clears_label_only() {
        let mut session = session_2x3_with_aisle();
        session.begin_cell_edit(0, 0).unwrap();
        session.confirm_cell_edit("A1").unwrap();

        let prefill = session.begin_cell_edit(0, 0).unwrap();
        assert_eq!(prefill, "A1");
        session.confirm_cell_edit("").unwrap();

        // "Снять подпись", а не "удалить место".
        let cell = session.grid().cell_at(0, 0).unwrap().unwrap();
        assert_eq!(cell.seat_label, None);
        assert_eq!(cell.seat_number, Some(1));
    }

    #[test]
    fn aisle_position_is_not_editable() {
        let mut session = session_2x3_with_aisle();
        assert_eq!(
            session.begin_cell_edit(0, 1),
            Err(EditorError::NotEditable { row: 0, column: 1 })
        );
        assert_eq!(session.mode(), &EditMode::Idle);
    }

    #[test]
    fn second_bulk_mode_is_rejected() {
        let mut session = session_2x3_with_aisle();
        session.begin_row_edit(0).unwrap();
        assert_eq!(session.begin_grid_edit(), Err(EditorError::ModeActive));
        assert_eq!(session.begin_row_edit(1), Err(EditorError::ModeActive));
        // Первый буфер жив и подтверждается как ни в чем не бывало.
        session.set_buffer_text(0, 0, "B1").unwrap();
        session.confirm_bulk_edit().unwrap();
        assert_eq!(
            session.grid().cell_at(0, 0).unwrap().unwrap().seat_label.as_deref(),
            Some("B1")
        );
    }

    #[test]
    fn structural_ops_blocked_while_editing() {
        let mut session = session_2x3_with_aisle();
        session.begin_grid_edit().unwrap();
        assert_eq!(session.set_row_count(5), Err(EditorError::ModeActive));
        assert_eq!(session.toggle_aisle_column(0), Err(EditorError::ModeActive));
        assert_eq!(session.remove_cell(0, 1), Err(EditorError::ModeActive));
    }

    #[test]
    fn cancel_restores_grid_exactly() {
        // Вход в режим и отмена не оставляют следов.
        let mut session = session_2x3_with_aisle();
        session.begin_cell_edit(0, 0).unwrap();
        session.confirm_cell_edit("A1").unwrap();
        let before = session.grid().clone();

        session.begin_row_edit(0).unwrap();
        session.set_buffer_text(0, 0, "ZZZ").unwrap();
        session.set_buffer_text(0, 2, "C3").unwrap();
        session.cancel();
        assert_eq!(session.grid(), &before);

        session.begin_append_row().unwrap();
        session.set_append_field(0, "D1").unwrap();
        session.cancel();
        assert_eq!(session.grid(), &before);

        session.begin_cell_edit(0, 2).unwrap();
        session.cancel();
        assert_eq!(session.grid(), &before);
    }

    #[test]
    fn bulk_edit_creates_updates_and_clears() {
        let mut session = session_2x3_with_aisle();
        session.begin_cell_edit(0, 0).unwrap();
        session.confirm_cell_edit("A1").unwrap();

        session.begin_grid_edit().unwrap();
        session.set_buffer_text(0, 0, "").unwrap(); // было A1 -> снять подпись
        session.set_buffer_text(0, 2, "A2").unwrap(); // пусто -> новое место
        session.set_buffer_text(1, 0, "B1").unwrap(); // пусто -> новое место
        session.confirm_bulk_edit().unwrap();

        let grid = session.grid();
        let a = grid.cell_at(0, 0).unwrap().unwrap();
        assert_eq!(a.seat_label, None);
        assert_eq!(a.seat_number, Some(1));
        // Новые места нумеруются в порядке обхода буфера.
        assert_eq!(grid.cell_at(0, 2).unwrap().unwrap().seat_number, Some(2));
        assert_eq!(grid.cell_at(1, 0).unwrap().unwrap().seat_number, Some(3));
        // Пустой текст на пустой позиции (1,2) места не создал.
        assert!(grid.cell_at(1, 2).unwrap().is_none());
    }

    #[test]
    fn bulk_buffer_excludes_aisle_positions() {
        let mut session = session_2x3_with_aisle();
        session.begin_row_edit(0).unwrap();
        assert_eq!(
            session.set_buffer_text(0, 1, "oops"),
            Err(EditorError::NotEditable { row: 0, column: 1 })
        );
    }

    #[test]
    fn append_row_parses_tokens_and_grows_grid() {
        // Ввод ["B1","XX"] на сетке 1x2 без проходов.
        let mut grid = Grid::new(1, 2);
        grid.insert_seat(0, 0, Some("A1".into())).unwrap();
        let mut session = EditorSession::new(grid);

        session.begin_append_row().unwrap();
        session.set_append_field(0, "B1").unwrap();
        session.set_append_field(1, "XX").unwrap();
        session.confirm_append_row().unwrap();

        let grid = session.grid();
        assert_eq!(grid.row_count(), 2);
        let b1 = grid.cell_at(1, 0).unwrap().unwrap();
        assert_eq!(b1.kind, CellKind::Seat);
        assert_eq!(b1.seat_label.as_deref(), Some("B1"));
        let broken = grid.cell_at(1, 1).unwrap().unwrap();
        assert_eq!(broken.kind, CellKind::Broken);
        assert_eq!(broken.seat_label, None);
    }

    #[test]
    fn append_row_fills_aisle_columns_automatically() {
        let mut session = session_2x3_with_aisle();
        session.begin_append_row().unwrap();
        // Поля есть только для колонок 0 и 2.
        assert_eq!(
            session.set_append_field(1, "x"),
            Err(EditorError::NotEditable { row: 0, column: 1 })
        );
        session.set_append_field(0, "C1").unwrap();
        session.confirm_append_row().unwrap();

        let grid = session.grid();
        assert_eq!(grid.row_count(), 3);
        assert_eq!(grid.cell_at(2, 1).unwrap().unwrap().kind, CellKind::Aisle);
        assert_eq!(
            grid.cell_at(2, 0).unwrap().unwrap().seat_label.as_deref(),
            Some("C1")
        );
        // "XY"/пустые поля ячеек не создают.
        assert!(grid.cell_at(2, 2).unwrap().is_none());
    }

    #[test]
    fn confirm_without_begin_is_an_error() {
        let mut session = session_2x3_with_aisle();
        assert_eq!(session.confirm_cell_edit("A1"), Err(EditorError::NoActiveEdit));
        assert_eq!(session.confirm_bulk_edit(), Err(EditorError::NoActiveEdit));
        assert_eq!(session.confirm_append_row(), Err(EditorError::NoActiveEdit));
    }
}
