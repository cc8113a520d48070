pub mod aggregation;
pub mod analytics_service;
pub mod assessment_service;
pub mod comparison;
pub mod employee_service;
pub mod grading;
pub mod report_service;
pub mod scoring;
