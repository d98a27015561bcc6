//! Search filters for the identity queries.
//!
//! Every caller-supplied value goes through [`escape`] before it lands in a
//! filter, so `*`, parentheses and backslashes cannot widen a search.

pub const ACCOUNT: &str = "sAMAccountName";
pub const EMPLOYEE_ID: &str = "employeeID";
pub const DEPARTMENT: &str = "department";
pub const MEMBER_OF: &str = "memberOf";
pub const MAIL: &str = "mail";

/// Escape a filter assertion value (RFC 4515).
#[must_use]
pub fn escape(value: &str) -> String {
    value
        .replace('\\', "\\5c")
        .replace('*', "\\2a")
        .replace('(', "\\28")
        .replace(')', "\\29")
        .replace('\0', "\\00")
}

/// `(sAMAccountName=<account>)`
#[must_use]
pub fn account(account: &str) -> String {
    format!("({ACCOUNT}={})", escape(account))
}

/// Both assertions must hold on the same entry.
#[must_use]
pub fn account_with(account: &str, attribute: &str, value: &str) -> String {
    format!(
        "(&({ACCOUNT}={})({attribute}={}))",
        escape(account),
        escape(value)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escape_leaves_plain_values_alone() {
        assert_eq!(escape("alice"), "alice");
        assert_eq!(escape("John Doe"), "John Doe");
    }

    #[test]
    fn escape_special_characters() {
        assert_eq!(escape("a*"), "a\\2a");
        assert_eq!(escape("(admin)"), "\\28admin\\29");
        assert_eq!(escape("a\\b"), "a\\5cb");
        assert_eq!(escape("a\0b"), "a\\00b");
    }

    #[test]
    fn escape_handles_backslash_before_other_escapes() {
        // a pre-escaped value must not be decoded back into a wildcard
        assert_eq!(escape("\\2a"), "\\5c2a");
    }

    #[test]
    fn account_filter() {
        assert_eq!(account("bob"), "(sAMAccountName=bob)");
        assert_eq!(account("*"), "(sAMAccountName=\\2a)");
    }

    #[test]
    fn conjunction_filter_escapes_both_values() {
        assert_eq!(
            account_with("bob", EMPLOYEE_ID, "E123"),
            "(&(sAMAccountName=bob)(employeeID=E123))"
        );
        assert_eq!(
            account_with("bob", EMPLOYEE_ID, "*)(objectClass=*"),
            "(&(sAMAccountName=bob)(employeeID=\\2a\\29\\28objectClass=\\2a))"
        );
    }
}
