pub mod category;
pub mod db;
pub mod error;
pub mod matches;
pub mod model;
pub mod report;
pub mod skill;
