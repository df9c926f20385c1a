pub mod admission;
pub mod health;
pub mod matches;
pub mod rescore;
