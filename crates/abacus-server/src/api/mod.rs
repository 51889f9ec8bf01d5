//! Request variants: the method table and per-method handlers.

pub mod interests;
pub mod score;

/// The methods this API serves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    /// `online_score`: additive score over supplied identity fields.
    OnlineScore,
    /// `clients_interests`: interest lists per client id.
    ClientsInterests,
}

impl Method {
    /// Resolves a wire method name.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "online_score" => Some(Self::OnlineScore),
            "clients_interests" => Some(Self::ClientsInterests),
            _ => None,
        }
    }

    /// The wire name of this method.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::OnlineScore => "online_score",
            Self::ClientsInterests => "clients_interests",
        }
    }
}
