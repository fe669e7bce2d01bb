use std::fmt;

/// LDAP result codes returned by the protocol-facing operations.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResultCode {
    Success = 0,
    OperationsError = 1,
    NoSuchObject = 32,
    InvalidCredentials = 49,
    InsufficientAccessRights = 50,
    UnwillingToPerform = 53,
}

impl ResultCode {
    pub fn code(self) -> u8 {
        self as u8
    }

    pub fn is_success(self) -> bool {
        self == Self::Success
    }

    /// Name as it appears in RFC 4511.
    pub fn name(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::OperationsError => "operationsError",
            Self::NoSuchObject => "noSuchObject",
            Self::InvalidCredentials => "invalidCredentials",
            Self::InsufficientAccessRights => "insufficientAccessRights",
            Self::UnwillingToPerform => "unwillingToPerform",
        }
    }
}

impl fmt::Display for ResultCode {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        write!(f, "{} ({})", self.name(), self.code())
    }
}
