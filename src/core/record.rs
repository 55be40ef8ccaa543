use crate::core::descriptor::Descriptor;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Account {
    pub username: String,
    pub full_name: String,
}

impl Account {
    pub fn new(username: impl Into<String>, full_name: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            full_name: full_name.into(),
        }
    }

    /// `"Full Name (username)"`, the label a login session carries.
    pub fn display_name(&self) -> String {
        format!("{} ({})", self.full_name, self.username)
    }
}

/// An account together with every descriptor enrolled for it, oldest first.
#[derive(Debug, Clone, PartialEq)]
pub struct EnrollmentRecord {
    pub account: Account,
    pub descriptors: Vec<Descriptor>,
}

impl EnrollmentRecord {
    pub fn username(&self) -> &str {
        &self.account.username
    }
}
