pub mod attendance;
pub mod compliance;
pub mod employee;
pub mod leave;
pub mod master;
pub mod org;
pub mod payroll;
pub mod recruitment;
pub mod talent;
