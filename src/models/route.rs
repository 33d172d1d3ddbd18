use serde::{Deserialize, Serialize};
use sqlx::FromRow;

// Маршрут перевозчика: откуда, куда, вид транспорта
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct TransitRoute {
    pub id: i64,
    pub company_id: i64,
    pub name: String,
    pub origin_stoppage_id: i64,
    pub destination_stoppage_id: i64,
    #[serde(rename = "type")]
    #[sqlx(rename = "type")]
    pub transport_kind: String,
    pub is_active: bool,
}

// Промежуточная остановка маршрута с плоским тарифом до нее
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct RouteStop {
    pub id: i64,
    pub route_id: i64,
    pub stoppage_id: i64,
    pub position: i32,
    pub fare: f64,
}
