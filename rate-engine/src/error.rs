use time::OffsetDateTime;

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum EngineError {
    #[error("unrecognized timezone '{0}'")]
    InvalidTimezone(String),
    #[error("invalid range: to ({to}) is before from ({from})")]
    InvalidRange { from: OffsetDateTime, to: OffsetDateTime },
    #[error("range {from} to {to} is longer than the allowed maximum")]
    RangeTooLong { from: OffsetDateTime, to: OffsetDateTime },
    #[error("invalid pagination: page={page}, page_size={page_size}")]
    InvalidPagination { page: u32, page_size: u32 },
    #[error("unknown rule set id '{0}'")]
    UnknownRuleSetId(String),
    #[error("rule set '{0}' has no windows")]
    EmptyRuleSet(String),
    #[error("instant {0} cannot be represented")]
    InstantOutOfRange(OffsetDateTime),
}

pub type Result<T, E = EngineError> = std::result::Result<T, E>;
