pub mod assessment;
pub mod catalog;
pub mod employee;
pub mod period;
pub mod report;
pub mod snapshot;
