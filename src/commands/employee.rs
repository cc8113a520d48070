use crate::models::employee::{EmployeeRecord, EmployeeRemoval};

use super::{run, AppState, CommandResult};

pub fn employees_list(state: &AppState, department: Option<&str>) -> CommandResult<Vec<EmployeeRecord>> {
    run(|| state.employees().list(department))
}

pub fn employee_get(state: &AppState, name: &str) -> CommandResult<Option<EmployeeRecord>> {
    run(|| state.employees().find(name))
}

pub fn departments_list(state: &AppState) -> CommandResult<Vec<String>> {
    run(|| state.employees().departments())
}

pub fn employee_remove(state: &AppState, name: &str) -> CommandResult<EmployeeRemoval> {
    run(|| state.employees().remove(name))
}
