use std::fmt;

/// A tagged union over the ways a downstream request identifies which
/// environment it belongs to (§4.1). Distinct variants never collide even
/// if the underlying string happens to match across credential kinds — an
/// SDK key and a mobile key are never interchangeable lookups.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Credential {
    SdkKey(String),
    MobileKey(String),
    EnvironmentId(String),
    AutoConfigKey(String),
}

impl Credential {
    pub fn as_str(&self) -> &str {
        match self {
            Credential::SdkKey(s)
            | Credential::MobileKey(s)
            | Credential::EnvironmentId(s)
            | Credential::AutoConfigKey(s) => s,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Credential::SdkKey(_) => "sdkKey",
            Credential::MobileKey(_) => "mobileKey",
            Credential::EnvironmentId(_) => "envId",
            Credential::AutoConfigKey(_) => "autoConfigKey",
        }
    }
}

impl fmt::Display for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind(), self.as_str())
    }
}
