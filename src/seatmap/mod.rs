//! seatmap
//!
//! Модуль схемы салона: прямоугольная сетка мест (ряды x колонки),
//! из которой собираются шаблоны (seat plan), планировки автобусов
//! и посадочные схемы рейсов.
//!
//! Ключевые компоненты:
//! 1.  **Grid**: плоский список позиционированных ячеек + индекс по
//!     (ряд, колонка). Структурные операции (размеры, колонки-проходы),
//!     нумерация мест и развертка перед сохранением.
//! 2.  **EditorSession**: конечный автомат режимов правки (поштучная,
//!     построчная, по всей сетке, добавление ряда). Отмена режима
//!     возвращает сетку ровно в исходное состояние.
//! 3.  **SeatPicker**: режим выбора мест при покупке - накладывает
//!     проданные и выбранные места поверх сетки, не изменяя её.
//!
//! Модуль не делает I/O: загрузку и сохранение выполняют контроллеры
//! через `GridDoc`.

pub mod editor;
pub mod grid;
pub mod selection;

pub use editor::{EditMode, EditorError, EditorSession, SeatToken};
pub use grid::{Cell, CellKind, Grid, GridDoc, GridError, SavedLayout};
pub use selection::{Checkout, SeatChoice, SeatPicker, SeatState, ToggleOutcome};
