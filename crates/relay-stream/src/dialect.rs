use relay_domain::DataKind;

/// One of the four downstream SSE dialects described in §4.6. Each shares
/// the same subscription to a store's change bus but shapes what it
/// replays and forwards differently.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    /// `/all` — full dataset, flags and segments.
    ServerAll,
    /// `/flags` — flags only, segments never emitted.
    ServerFlagsOnly,
    /// `/mping` — content-less `ping`, client re-fetches via REST.
    MobilePing,
    /// `/ping/{envId}` — content-less `ping`, client re-fetches via REST.
    JsPing,
}

impl Dialect {
    /// Whether this dialect forwards a `ChangeNotification` for `kind` at
    /// all. Ping dialects forward every kind (they carry no payload, just
    /// a nudge to re-fetch); `ServerFlagsOnly` forwards only flags.
    pub fn includes(&self, kind: DataKind) -> bool {
        match self {
            Dialect::ServerAll | Dialect::MobilePing | Dialect::JsPing => true,
            Dialect::ServerFlagsOnly => kind == DataKind::Flags,
        }
    }

    pub fn is_ping(&self) -> bool {
        matches!(self, Dialect::MobilePing | Dialect::JsPing)
    }
}
