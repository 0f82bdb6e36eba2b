pub use super::delivery::Entity as Delivery;
pub use super::items::Entity as Items;
pub use super::orders::Entity as Orders;
pub use super::payment::Entity as Payment;
