//! Liveness tracking for the notification pipeline.
//!
//! Each pipeline stage owns one [`Category`] and touches it whenever it
//! completes a unit of work. The health endpoint reads a [`HealthReport`]
//! snapshot; a category whose last touch is older than its threshold is
//! reported unhealthy so an external supervisor can restart the process.
//!
//! | Category | Touched by | Threshold |
//! |----------|------------|-----------|
//! | `poll` | feed poller, every completed long-poll | 30s |
//! | `externalCall` | reference-data cache, every successful fetch | 60s |
//! | `delivery` | notification sender, every delivered message | 60s |

use parking_lot::Mutex;
use serde::Serialize;
use std::time::{Duration, Instant};

/// A pipeline stage tracked by the health monitor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    Poll,
    ExternalCall,
    Delivery,
}

impl Category {
    pub const ALL: [Category; 3] = [Category::Poll, Category::ExternalCall, Category::Delivery];

    /// Maximum time since the last touch before the category is unhealthy.
    pub const fn threshold(self) -> Duration {
        match self {
            Self::Poll => Duration::from_secs(30),
            Self::ExternalCall => Duration::from_secs(60),
            Self::Delivery => Duration::from_secs(60),
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Poll => "poll",
            Self::ExternalCall => "externalCall",
            Self::Delivery => "delivery",
        }
    }

    const fn index(self) -> usize {
        match self {
            Self::Poll => 0,
            Self::ExternalCall => 1,
            Self::Delivery => 2,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Healthy,
    Unhealthy,
}

impl Status {
    pub fn is_healthy(self) -> bool {
        self == Status::Healthy
    }
}

/// Health of a single category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CategoryReport {
    pub status: Status,
    /// Milliseconds since the category was last touched.
    pub age: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthDetails {
    pub poll: CategoryReport,
    pub external_call: CategoryReport,
    pub delivery: CategoryReport,
}

/// Point-in-time health snapshot, serialized as the health endpoint body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct HealthReport {
    pub status: Status,
    pub details: HealthDetails,
}

impl HealthReport {
    pub fn category(&self, category: Category) -> CategoryReport {
        match category {
            Category::Poll => self.details.poll,
            Category::ExternalCall => self.details.external_call,
            Category::Delivery => self.details.delivery,
        }
    }
}

/// Shared liveness state.
///
/// Constructed once at startup and handed to every component as
/// `Arc<HealthMonitor>`. All timestamps start at construction time and only
/// ever move forward.
#[derive(Debug)]
pub struct HealthMonitor {
    last_touch: Mutex<[Instant; 3]>,
}

impl Default for HealthMonitor {
    fn default() -> Self {
        Self::new()
    }
}

impl HealthMonitor {
    pub fn new() -> Self {
        Self::starting_at(Instant::now())
    }

    /// Create a monitor whose categories were all last touched at `start`.
    pub fn starting_at(start: Instant) -> Self {
        Self {
            last_touch: Mutex::new([start; 3]),
        }
    }

    /// Record activity for a category now.
    pub fn touch(&self, category: Category) {
        self.touch_at(category, Instant::now());
    }

    /// Record activity for a category at `at`. Older instants are ignored.
    pub fn touch_at(&self, category: Category, at: Instant) {
        let mut last_touch = self.last_touch.lock();
        let slot = &mut last_touch[category.index()];
        if at > *slot {
            *slot = at;
        }
    }

    pub fn snapshot(&self) -> HealthReport {
        self.snapshot_at(Instant::now())
    }

    /// Evaluate every category against `now`.
    ///
    /// A category is unhealthy only when its age strictly exceeds the
    /// threshold; at exactly the threshold it is still healthy.
    pub fn snapshot_at(&self, now: Instant) -> HealthReport {
        let last_touch = *self.last_touch.lock();

        let category_report = |category: Category| {
            let age = now.saturating_duration_since(last_touch[category.index()]);
            let status = if age > category.threshold() {
                Status::Unhealthy
            } else {
                Status::Healthy
            };
            CategoryReport {
                status,
                age: age.as_millis() as u64,
            }
        };

        let details = HealthDetails {
            poll: category_report(Category::Poll),
            external_call: category_report(Category::ExternalCall),
            delivery: category_report(Category::Delivery),
        };

        let mut report = HealthReport {
            status: Status::Healthy,
            details,
        };
        if Category::ALL
            .iter()
            .any(|c| !report.category(*c).status.is_healthy())
        {
            report.status = Status::Unhealthy;
        }
        report
    }
}
