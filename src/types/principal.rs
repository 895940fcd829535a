//! Caller identity threaded through every operation

use super::error::EconomyError;

/// Citizen identifier assigned by the identity subsystem
pub type OwnerId = u32;

/// What the authenticated caller is allowed to do
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Role {
    #[default]
    Citizen,
    /// Leader of an official department; may submit that department's payroll
    DepartmentLead { department: String },
    /// Government official; approves payroll and performs administrative overrides
    Government,
}

/// Already-authenticated caller of an engine operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub owner: OwnerId,
    pub role: Role,
}

impl Principal {
    pub fn citizen(owner: OwnerId) -> Self {
        Principal {
            owner,
            role: Role::Citizen,
        }
    }

    pub fn government(owner: OwnerId) -> Self {
        Principal {
            owner,
            role: Role::Government,
        }
    }

    pub fn department_lead(owner: OwnerId, department: impl Into<String>) -> Self {
        Principal {
            owner,
            role: Role::DepartmentLead {
                department: department.into(),
            },
        }
    }

    pub fn require_government(&self, action: &str) -> Result<(), EconomyError> {
        match self.role {
            Role::Government => Ok(()),
            _ => Err(EconomyError::forbidden(self.owner, action)),
        }
    }

    /// Leads may submit only for their own department; government may submit for any
    pub fn require_payroll_submitter(&self, department: &str) -> Result<(), EconomyError> {
        match &self.role {
            Role::Government => Ok(()),
            Role::DepartmentLead { department: own } if own.eq_ignore_ascii_case(department) => {
                Ok(())
            }
            _ => Err(EconomyError::forbidden(
                self.owner,
                &format!("submit payroll for {}", department),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_government_required_for_admin() {
        assert!(Principal::government(1).require_government("set fund").is_ok());
        assert!(Principal::citizen(2).require_government("set fund").is_err());
        assert!(Principal::department_lead(3, "Police")
            .require_government("set fund")
            .is_err());
    }

    #[test]
    fn test_lead_submits_only_own_department() {
        let lead = Principal::department_lead(3, "Police");
        assert!(lead.require_payroll_submitter("police").is_ok());
        assert!(lead.require_payroll_submitter("Medical").is_err());
        assert!(Principal::government(1).require_payroll_submitter("Medical").is_ok());
        assert!(Principal::citizen(4).require_payroll_submitter("Police").is_err());
    }
}
