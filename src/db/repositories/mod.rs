pub mod assessment_repository;
pub mod employee_repository;
pub mod snapshot_repository;
