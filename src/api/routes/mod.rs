pub mod advisory;
pub mod health;
pub mod history;
pub mod manual;
pub mod stats;
