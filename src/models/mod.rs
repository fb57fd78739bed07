// Models module - Database entity representations

pub mod creator;
pub mod donation_point;

pub use creator::{Creator, CreatorQuery, CreatorUpdate, NewCreator};
pub use donation_point::{DonationPoint, NewPoint, PointStatus, PointUpdate};
