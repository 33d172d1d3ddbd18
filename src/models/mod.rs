pub mod bus;
pub mod company;
pub mod route;
pub mod schedule;
pub mod seat_plan;
pub mod staff;
pub mod stoppage;
pub mod ticket;
pub mod user;

pub use bus::Bus;
pub use company::Company;
pub use route::{RouteStop, TransitRoute};
pub use schedule::Schedule;
pub use seat_plan::SeatPlan;
pub use staff::Staff;
pub use stoppage::Stoppage;
pub use ticket::{Ticket, TicketSeat};
pub use user::User;
