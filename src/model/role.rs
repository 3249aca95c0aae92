use std::fmt;

/// Trust roles a context can act in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    /// Creates new cards
    Producer,
    /// Takes ownership of created cards and installs operational keys
    Manager,
    /// Verifies a card's identity at the point of use
    Authenticator,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::Producer => "producer",
            Role::Manager => "manager",
            Role::Authenticator => "authenticator",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
