use std::collections::{BTreeSet, HashMap};

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum GridError {
    #[error("позиция ({row},{column}) вне сетки {rows}x{columns}")]
    OutOfBounds {
        row: u32,
        column: u32,
        rows: u32,
        columns: u32,
    },
    #[error("в позиции ({row},{column}) нет места")]
    NoSeat { row: u32, column: u32 },
}

/// Тип ячейки. Позиция, отсутствующая в списке - "пусто", это не Aisle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CellKind {
    /// Обычное место, продается.
    Seat,
    /// Сломанное место: занимает позицию и номер, но не продается.
    Broken,
    /// Проход: позиция без номера, никогда не выбирается.
    Aisle,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cell {
    pub row: u32,
    pub column: u32,
    pub kind: CellKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seat_number: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seat_label: Option<String>,
    /// Индивидуальная цена места; если нет - действует цена рейса.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fare: Option<f64>,
}

impl Cell {
    fn aisle(row: u32, column: u32) -> Self {
        Cell {
            row,
            column,
            kind: CellKind::Aisle,
            seat_number: None,
            seat_label: None,
            fare: None,
        }
    }

    fn seat(row: u32, column: u32, seat_number: u32, seat_label: Option<String>) -> Self {
        Cell {
            row,
            column,
            kind: CellKind::Seat,
            seat_number: Some(seat_number),
            seat_label,
            fare: None,
        }
    }

    pub fn is_seat(&self) -> bool {
        self.kind != CellKind::Aisle
    }

    /// Что показывать пользователю: подпись, иначе номер.
    pub fn display_name(&self) -> String {
        match (&self.seat_label, self.seat_number) {
            (Some(label), _) => label.clone(),
            (None, Some(number)) => number.to_string(),
            (None, None) => String::new(),
        }
    }
}

/// Формат хранения и обмена: то, что лежит в JSONB и ходит в API.
/// Все поля кроме размеров опциональны - пустая планировка валидна.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GridDoc {
    #[serde(default)]
    pub row_count: u32,
    #[serde(default)]
    pub column_count: u32,
    #[serde(default)]
    pub aisle_columns: Vec<u32>,
    #[serde(default)]
    pub cells: Vec<Cell>,
}

/// Результат сохранения: нормализованный документ + емкость для учета.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SavedLayout {
    #[serde(flatten)]
    pub doc: GridDoc,
    pub total_seats: u32,
}

/// Рабочее представление сетки: список ячеек - источник истины,
/// индекс по (ряд, колонка) перестраивается при каждой мутации.
#[derive(Debug, Clone, PartialEq)]
pub struct Grid {
    row_count: u32,
    column_count: u32,
    aisle_columns: BTreeSet<u32>,
    cells: Vec<Cell>,
    index: HashMap<(u32, u32), usize>,
}

impl Grid {
    pub fn new(row_count: u32, column_count: u32) -> Self {
        Grid {
            row_count,
            column_count,
            aisle_columns: BTreeSet::new(),
            cells: Vec::new(),
            index: HashMap::new(),
        }
    }

    /// Загрузка из хранимого документа. Терпима к мусору: дубликаты
    /// позиций схлопываются (последняя запись выигрывает), все, что
    /// вне текущих размеров - отбрасывается.
    pub fn from_doc(doc: GridDoc) -> Self {
        let mut grid = Grid::new(doc.row_count, doc.column_count);
        grid.aisle_columns = doc
            .aisle_columns
            .into_iter()
            .filter(|c| *c < doc.column_count)
            .collect();
        for cell in doc.cells {
            if cell.row < grid.row_count && cell.column < grid.column_count {
                grid.put(cell);
            }
        }
        grid
    }

    pub fn to_doc(&self) -> GridDoc {
        GridDoc {
            row_count: self.row_count,
            column_count: self.column_count,
            aisle_columns: self.aisle_columns.iter().copied().collect(),
            cells: self.cells.clone(),
        }
    }

    pub fn row_count(&self) -> u32 {
        self.row_count
    }

    pub fn column_count(&self) -> u32 {
        self.column_count
    }

    pub fn aisle_columns(&self) -> &BTreeSet<u32> {
        &self.aisle_columns
    }

    pub fn cells(&self) -> &[Cell] {
        &self.cells
    }

    pub fn is_aisle_column(&self, column: u32) -> bool {
        self.aisle_columns.contains(&column)
    }

    /// Сетка без единой ячейки - сюда можно подтянуть шаблон.
    pub fn has_no_cells(&self) -> bool {
        self.cells.is_empty()
    }

    fn check_bounds(&self, row: u32, column: u32) -> Result<(), GridError> {
        if row >= self.row_count || column >= self.column_count {
            return Err(GridError::OutOfBounds {
                row,
                column,
                rows: self.row_count,
                columns: self.column_count,
            });
        }
        Ok(())
    }

    /// Что занимает позицию: ячейка или "пусто" (None).
    pub fn cell_at(&self, row: u32, column: u32) -> Result<Option<&Cell>, GridError> {
        self.check_bounds(row, column)?;
        Ok(self.index.get(&(row, column)).map(|i| &self.cells[*i]))
    }

    /// Полная 2D-развертка в порядке обхода ряд-за-рядом - ее рисуют
    /// все экраны. Чистая функция, можно звать на каждый рендер.
    pub fn view(&self) -> Vec<Vec<Option<&Cell>>> {
        (0..self.row_count)
            .map(|r| {
                (0..self.column_count)
                    .map(|c| self.index.get(&(r, c)).map(|i| &self.cells[*i]))
                    .collect()
            })
            .collect()
    }

    fn rebuild_index(&mut self) {
        self.index = self
            .cells
            .iter()
            .enumerate()
            .map(|(i, cell)| ((cell.row, cell.column), i))
            .collect();
    }

    /// Вставка или замена ячейки в ее позиции.
    fn put(&mut self, cell: Cell) {
        let key = (cell.row, cell.column);
        match self.index.get(&key) {
            Some(i) => self.cells[*i] = cell,
            None => {
                self.cells.push(cell);
                self.index.insert(key, self.cells.len() - 1);
            }
        }
    }

    fn take(&mut self, row: u32, column: u32) -> Option<Cell> {
        let i = self.index.remove(&(row, column))?;
        let cell = self.cells.remove(i);
        self.rebuild_index();
        Some(cell)
    }

    // === Структурные операции ===

    /// Меняет число рядов; ячейки за новой границей отбрасываются.
    /// Колонки и проходы не трогает.
    pub fn set_row_count(&mut self, rows: u32) {
        self.row_count = rows;
        self.cells.retain(|c| c.row < rows);
        self.rebuild_index();
    }

    /// Меняет число колонок; отбрасывает и ячейки, и отметки проходов
    /// за новой границей.
    pub fn set_column_count(&mut self, columns: u32) {
        self.column_count = columns;
        self.cells.retain(|c| c.column < columns);
        self.aisle_columns.retain(|c| *c < columns);
        self.rebuild_index();
    }

    /// Переключает колонку между проходом и обычной. Обе ветки -
    /// полная замена ячеек колонки, никаких частичных обновлений.
    /// Возвращает true, если колонка стала проходом.
    pub fn toggle_aisle_column(&mut self, column: u32) -> Result<bool, GridError> {
        if column >= self.column_count {
            return Err(GridError::OutOfBounds {
                row: 0,
                column,
                rows: self.row_count,
                columns: self.column_count,
            });
        }
        if self.aisle_columns.remove(&column) {
            // Проход выключен: ячейки прохода удаляются, позиции
            // остаются пустыми, места сами не появляются.
            self.cells.retain(|c| c.column != column);
            self.rebuild_index();
            Ok(false)
        } else {
            self.aisle_columns.insert(column);
            self.cells.retain(|c| c.column != column);
            self.rebuild_index();
            for row in 0..self.row_count {
                self.put(Cell::aisle(row, column));
            }
            Ok(true)
        }
    }

    /// Добавляет готовый ряд снизу (используется подтверждением
    /// диалога добавления ряда) и увеличивает число рядов на 1.
    pub(crate) fn extend_with_row(&mut self, new_cells: Vec<Cell>) {
        let row = self.row_count;
        self.row_count += 1;
        for mut cell in new_cells {
            cell.row = row;
            if cell.column < self.column_count {
                self.put(cell);
            }
        }
    }

    // === Поячеечные операции ===

    /// Следующий свободный номер места: максимум по всей сетке + 1.
    pub fn next_seat_number(&self) -> u32 {
        self.cells
            .iter()
            .filter_map(|c| c.seat_number)
            .max()
            .map_or(1, |n| n + 1)
    }

    /// Создает место в пустой позиции. Занятая позиция - замена не
    /// выполняется, пути создания всегда проверяют занятость заранее.
    pub fn insert_seat(
        &mut self,
        row: u32,
        column: u32,
        seat_label: Option<String>,
    ) -> Result<(), GridError> {
        self.check_bounds(row, column)?;
        if self.index.contains_key(&(row, column)) {
            return Ok(());
        }
        let number = self.next_seat_number();
        self.put(Cell::seat(row, column, number, seat_label));
        Ok(())
    }

    pub fn set_label(&mut self, row: u32, column: u32, label: &str) -> Result<(), GridError> {
        self.check_bounds(row, column)?;
        let i = *self
            .index
            .get(&(row, column))
            .ok_or(GridError::NoSeat { row, column })?;
        self.cells[i].seat_label = Some(label.to_string());
        Ok(())
    }

    /// Снимает пользовательскую подпись; место и номер остаются.
    pub fn clear_label(&mut self, row: u32, column: u32) -> Result<(), GridError> {
        self.check_bounds(row, column)?;
        let i = *self
            .index
            .get(&(row, column))
            .ok_or(GridError::NoSeat { row, column })?;
        self.cells[i].seat_label = None;
        Ok(())
    }

    /// Место <-> сломанное место; позиция, номер и подпись сохраняются.
    pub fn toggle_broken(&mut self, row: u32, column: u32) -> Result<(), GridError> {
        self.check_bounds(row, column)?;
        let i = *self
            .index
            .get(&(row, column))
            .ok_or(GridError::NoSeat { row, column })?;
        match self.cells[i].kind {
            CellKind::Seat => self.cells[i].kind = CellKind::Broken,
            CellKind::Broken => self.cells[i].kind = CellKind::Seat,
            CellKind::Aisle => return Err(GridError::NoSeat { row, column }),
        }
        Ok(())
    }

    /// Превращает позицию в проход. Распространяется на всю колонку,
    /// чтобы отметка колонки-прохода не расходилась с ячейками.
    pub fn make_aisle(&mut self, row: u32, column: u32) -> Result<(), GridError> {
        self.check_bounds(row, column)?;
        if self.is_aisle_column(column) {
            return Ok(());
        }
        self.toggle_aisle_column(column)?;
        Ok(())
    }

    /// Убирает ячейку, позиция снова становится пустой.
    pub fn remove_cell(&mut self, row: u32, column: u32) -> Result<(), GridError> {
        self.check_bounds(row, column)?;
        self.take(row, column);
        Ok(())
    }

    // === Нумерация и сохранение ===

    /// Разворачивает неявно-пустые позиции в явные ячейки: в колонках-
    /// проходах - проход, иначе место-заготовка без подписи.
    fn expand(&mut self) {
        for row in 0..self.row_count {
            for column in 0..self.column_count {
                if self.index.contains_key(&(row, column)) {
                    continue;
                }
                let cell = if self.is_aisle_column(column) {
                    Cell::aisle(row, column)
                } else {
                    Cell::seat(row, column, 0, None)
                };
                self.put(cell);
            }
        }
    }

    /// Детерминированная перенумерация: обход ряд-за-рядом, номера
    /// 1..k всем не-проходам, проходы номера не получают и не
    /// расходуют. Частичной перенумерации не существует: расхождения
    /// чинит только полный проход.
    pub fn renumber(&mut self) {
        let mut next = 1u32;
        for row in 0..self.row_count {
            for column in 0..self.column_count {
                let Some(&i) = self.index.get(&(row, column)) else {
                    continue;
                };
                if self.cells[i].kind == CellKind::Aisle {
                    self.cells[i].seat_number = None;
                } else {
                    self.cells[i].seat_number = Some(next);
                    next += 1;
                }
            }
        }
    }

    /// Каноническая форма перед сохранением: полная развертка,
    /// перенумерация, ячейки в порядке обхода.
    pub fn normalized(&self) -> Grid {
        let mut grid = self.clone();
        grid.expand();
        grid.cells.sort_by_key(|c| (c.row, c.column));
        grid.rebuild_index();
        grid.renumber();
        grid
    }

    /// Что уходит в хранилище: нормализованный документ и емкость -
    /// число продаваемых мест (сломанные и проходы не считаются).
    pub fn export(&self) -> SavedLayout {
        let grid = self.normalized();
        let total_seats = grid
            .cells
            .iter()
            .filter(|c| c.kind == CellKind::Seat)
            .count() as u32;
        SavedLayout {
            doc: grid.to_doc(),
            total_seats,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn grid_2x3() -> Grid {
        Grid::new(2, 3)
    }

    #[test]
    fn toggle_aisle_column_fills_whole_column() {
        let mut grid = grid_2x3();
        grid.toggle_aisle_column(1).unwrap();

        assert_eq!(grid.aisle_columns().iter().copied().collect::<Vec<_>>(), vec![1]);
        assert_eq!(grid.cells().len(), 2);
        for row in 0..2 {
            let cell = grid.cell_at(row, 1).unwrap().unwrap();
            assert_eq!(cell.kind, CellKind::Aisle);
            assert_eq!(cell.seat_number, None);
        }
        assert!(grid.cell_at(0, 0).unwrap().is_none());
        assert!(grid.cell_at(0, 2).unwrap().is_none());
    }

    #[test]
    fn toggle_aisle_column_off_leaves_positions_empty() {
        let mut grid = grid_2x3();
        grid.toggle_aisle_column(1).unwrap();
        grid.toggle_aisle_column(1).unwrap();

        assert!(grid.aisle_columns().is_empty());
        assert!(grid.has_no_cells());
    }

    #[test]
    fn toggle_aisle_column_replaces_existing_seats() {
        let mut grid = grid_2x3();
        grid.insert_seat(0, 1, Some("A1".into())).unwrap();
        grid.toggle_aisle_column(1).unwrap();

        let cell = grid.cell_at(0, 1).unwrap().unwrap();
        assert_eq!(cell.kind, CellKind::Aisle);
        assert_eq!(cell.seat_label, None);
    }

    #[test]
    fn shrinking_rows_discards_out_of_range_cells() {
        let mut grid = Grid::new(3, 2);
        grid.insert_seat(0, 0, None).unwrap();
        grid.insert_seat(2, 1, None).unwrap();
        grid.set_row_count(1);

        assert_eq!(grid.row_count(), 1);
        assert_eq!(grid.cells().len(), 1);
        assert!(grid.cells().iter().all(|c| c.row < 1));
        // Индекс не должен помнить удаленную позицию.
        assert!(grid.cell_at(0, 1).unwrap().is_none());
    }

    #[test]
    fn shrinking_columns_drops_aisle_marks_too() {
        // После сужения до одной колонки колонка-проход 1 исчезает
        // вместе со своими ячейками.
        let mut grid = grid_2x3();
        grid.toggle_aisle_column(1).unwrap();
        grid.insert_seat(0, 0, Some("A1".into())).unwrap();
        grid.set_column_count(1);

        assert!(grid.aisle_columns().is_empty());
        assert_eq!(grid.cells().len(), 1);
        let survivor = grid.cell_at(0, 0).unwrap().unwrap();
        assert_eq!(survivor.seat_label.as_deref(), Some("A1"));
    }

    #[test]
    fn cell_at_rejects_out_of_bounds() {
        let grid = grid_2x3();
        let err = grid.cell_at(2, 0).unwrap_err();
        assert_eq!(
            err,
            GridError::OutOfBounds { row: 2, column: 0, rows: 2, columns: 3 }
        );
    }

    #[test]
    fn insert_seat_numbers_scan_whole_grid() {
        let mut grid = grid_2x3();
        grid.insert_seat(1, 2, None).unwrap();
        grid.insert_seat(0, 0, None).unwrap();

        assert_eq!(grid.cell_at(1, 2).unwrap().unwrap().seat_number, Some(1));
        assert_eq!(grid.cell_at(0, 0).unwrap().unwrap().seat_number, Some(2));
    }

    #[test]
    fn make_aisle_propagates_to_whole_column() {
        let mut grid = grid_2x3();
        grid.insert_seat(0, 2, None).unwrap();
        grid.make_aisle(0, 2).unwrap();

        assert!(grid.is_aisle_column(2));
        for row in 0..2 {
            assert_eq!(grid.cell_at(row, 2).unwrap().unwrap().kind, CellKind::Aisle);
        }
    }

    #[test]
    fn toggle_broken_keeps_number_and_label() {
        let mut grid = grid_2x3();
        grid.insert_seat(0, 0, Some("A1".into())).unwrap();
        grid.toggle_broken(0, 0).unwrap();

        let cell = grid.cell_at(0, 0).unwrap().unwrap();
        assert_eq!(cell.kind, CellKind::Broken);
        assert_eq!(cell.seat_number, Some(1));
        assert_eq!(cell.seat_label.as_deref(), Some("A1"));

        grid.toggle_broken(0, 0).unwrap();
        assert_eq!(grid.cell_at(0, 0).unwrap().unwrap().kind, CellKind::Seat);
    }

    #[test]
    fn export_expands_and_numbers_full_rectangle() {
        // Одно явное место на сетке 1x2: после сохранения обе позиции
        // заполнены и пронумерованы подряд.
        let mut grid = Grid::new(1, 2);
        grid.insert_seat(0, 0, None).unwrap();

        let saved = grid.export();
        assert_eq!(saved.total_seats, 2);
        assert_eq!(saved.doc.cells.len(), 2);
        assert_eq!(saved.doc.cells[0].seat_number, Some(1));
        assert_eq!(saved.doc.cells[1].seat_number, Some(2));
    }

    #[test]
    fn export_skips_aisles_in_numbering_and_capacity() {
        let mut grid = grid_2x3();
        grid.toggle_aisle_column(1).unwrap();
        assert!(grid.toggle_broken(0, 0).is_err()); // пустая позиция, сетка не меняется
        let saved = grid.export();

        // 2 ряда x 3 колонки, из них колонка 1 - проход: 4 места.
        assert_eq!(saved.total_seats, 4);
        let numbers: Vec<Option<u32>> = saved.doc.cells.iter().map(|c| c.seat_number).collect();
        assert_eq!(
            numbers,
            vec![Some(1), None, Some(2), Some(3), None, Some(4)]
        );
    }

    #[test]
    fn broken_seats_consume_numbers_but_not_capacity() {
        let mut grid = Grid::new(1, 2);
        grid.insert_seat(0, 0, None).unwrap();
        grid.toggle_broken(0, 0).unwrap();

        let saved = grid.export();
        assert_eq!(saved.total_seats, 1);
        assert_eq!(saved.doc.cells[0].seat_number, Some(1));
        assert_eq!(saved.doc.cells[1].seat_number, Some(2));
    }

    #[test]
    fn from_doc_tolerates_missing_and_garbage() {
        let doc: GridDoc = serde_json::from_str(r#"{"rowCount":2,"columnCount":2}"#).unwrap();
        let grid = Grid::from_doc(doc);
        assert!(grid.has_no_cells());

        // Дубликат позиции: выигрывает последняя запись.
        let doc = GridDoc {
            row_count: 1,
            column_count: 1,
            aisle_columns: vec![5],
            cells: vec![
                Cell::seat(0, 0, 1, Some("old".into())),
                Cell::seat(0, 0, 1, Some("new".into())),
                Cell::seat(7, 7, 2, None),
            ],
        };
        let grid = Grid::from_doc(doc);
        assert!(grid.aisle_columns().is_empty());
        assert_eq!(grid.cells().len(), 1);
        assert_eq!(
            grid.cell_at(0, 0).unwrap().unwrap().seat_label.as_deref(),
            Some("new")
        );
    }

    proptest! {
        // Повторная нормализация ничего не меняет, номера ровно 1..k
        // в порядке обхода.
        #[test]
        fn renumber_is_deterministic(
            rows in 1u32..6,
            columns in 1u32..6,
            aisle in proptest::collection::vec(0u32..6, 0..3),
            seats in proptest::collection::vec((0u32..6, 0u32..6), 0..12),
        ) {
            let mut grid = Grid::new(rows, columns);
            for column in aisle {
                if column < columns {
                    let _ = grid.toggle_aisle_column(column);
                }
            }
            for (row, column) in seats {
                if row < rows && column < columns && !grid.is_aisle_column(column) {
                    let _ = grid.insert_seat(row, column, None);
                }
            }

            let once = grid.normalized();
            let twice = once.normalized();
            prop_assert_eq!(&once, &twice);

            let numbers: Vec<u32> = once
                .cells()
                .iter()
                .filter(|c| c.is_seat())
                .filter_map(|c| c.seat_number)
                .collect();
            let expected: Vec<u32> = (1..=numbers.len() as u32).collect();
            prop_assert_eq!(numbers, expected);
        }

        // После любой пары структурных операций все ячейки в границах.
        #[test]
        fn structural_ops_never_leave_cells_out_of_range(
            rows in 1u32..6,
            columns in 1u32..6,
            new_rows in 0u32..6,
            new_columns in 0u32..6,
        ) {
            let mut grid = Grid::new(rows, columns);
            for row in 0..rows {
                for column in 0..columns {
                    let _ = grid.insert_seat(row, column, None);
                }
            }
            grid.set_row_count(new_rows);
            grid.set_column_count(new_columns);

            prop_assert!(grid.cells().iter().all(|c| c.row < new_rows && c.column < new_columns));
            prop_assert!(grid.aisle_columns().iter().all(|c| *c < new_columns));
        }
    }
}
