use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// --- Owner ---

/// The entity a piece of content belongs to: a founder or a company,
/// never both. The storage layer maps this onto two nullable foreign keys
/// guarded by a CHECK constraint; everything above the SQL boundary works
/// with this sum type so an ownerless or doubly-owned record cannot be
/// represented.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "id", rename_all = "snake_case")]
pub enum Owner {
    Founder(Uuid),
    Company(Uuid),
}

impl Owner {
    pub fn founder_id(&self) -> Option<Uuid> {
        match self {
            Owner::Founder(id) => Some(*id),
            Owner::Company(_) => None,
        }
    }

    pub fn company_id(&self) -> Option<Uuid> {
        match self {
            Owner::Founder(_) => None,
            Owner::Company(id) => Some(*id),
        }
    }

    pub fn id(&self) -> Uuid {
        match self {
            Owner::Founder(id) | Owner::Company(id) => *id,
        }
    }
}

impl std::fmt::Display for Owner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Owner::Founder(id) => write!(f, "founder:{id}"),
            Owner::Company(id) => write!(f, "company:{id}"),
        }
    }
}

// --- Time window ---

/// Half-open interval `[start, end)` over UTC timestamps.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimeWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeWindow {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { start, end }
    }

    /// Window spanning `[start_date 00:00, end_date 00:00)` UTC. The end
    /// date is exclusive, matching how periods hand off between runs.
    pub fn from_dates(start_date: NaiveDate, end_date: NaiveDate) -> Self {
        Self {
            start: start_date.and_hms_opt(0, 0, 0).expect("valid midnight").and_utc(),
            end: end_date.and_hms_opt(0, 0, 0).expect("valid midnight").and_utc(),
        }
    }

    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        at >= self.start && at < self.end
    }
}
