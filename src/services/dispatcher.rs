use crate::config::ZonePolicy;
use crate::db::Database;
use crate::event_record::{EventKind, EventRecord};
use crate::services::alerts::AlertService;
use crate::services::entry_exit::EntryExitCorrelator;
use crate::services::intrusion::IntrusionHandler;
use crate::services::occupancy::OccupancyHandler;
use crate::services::violation::ViolationHandler;
use log::{error, warn};
use std::fmt::{Display, Formatter};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Occupancy,
    Violation,
    Intrusion,
    EntryExit,
}

impl Display for Route {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Occupancy => write!(f, "occupancy"),
            Self::Violation => write!(f, "violation"),
            Self::Intrusion => write!(f, "intrusion"),
            Self::EntryExit => write!(f, "entry_exit"),
        }
    }
}

/// Handlers a record is routed to, in invocation order
pub fn routes(record: &EventRecord) -> Vec<Route> {
    let vehicle = record.is_vehicle_or_unset();
    let mut routes = Vec::new();

    match record.kind {
        EventKind::RegionEntrance if vehicle => {
            routes.extend([Route::Occupancy, Route::Violation, Route::Intrusion])
        }
        EventKind::RegionExit if vehicle => routes.push(Route::Occupancy),
        EventKind::FieldDetection if vehicle => {
            routes.extend([Route::Violation, Route::Intrusion])
        }
        EventKind::LineDetection if vehicle => routes.push(Route::Violation),
        EventKind::AccessControl if record.plate_number().is_some() => {
            routes.push(Route::EntryExit)
        }
        _ => {}
    }

    routes
}

/// Outcome of routing one record
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DispatchReport {
    pub routes: Vec<Route>,
    pub failed: Vec<Route>,
}

/// Fans a record out to the policy handlers. Each handler runs its own unit of work.
pub struct Dispatcher {
    db: Arc<dyn Database>,
    occupancy: OccupancyHandler,
    violation: ViolationHandler,
    intrusion: IntrusionHandler,
    entry_exit: EntryExitCorrelator,
}

impl Dispatcher {
    pub fn new(
        db: Arc<dyn Database>,
        occupancy: OccupancyHandler,
        violation: ViolationHandler,
        intrusion: IntrusionHandler,
        entry_exit: EntryExitCorrelator,
    ) -> Self {
        Self {
            db,
            occupancy,
            violation,
            intrusion,
            entry_exit,
        }
    }

    /// Standard handler set sharing one policy and alert sink
    pub fn with_policy(
        db: Arc<dyn Database>,
        policy: Arc<ZonePolicy>,
        alerts: Arc<AlertService>,
    ) -> Self {
        Self::new(
            db,
            OccupancyHandler::new(policy.clone(), alerts.clone()),
            ViolationHandler::new(policy.clone(), alerts.clone()),
            IntrusionHandler::new(policy, alerts.clone()),
            EntryExitCorrelator::new(alerts),
        )
    }

    pub async fn dispatch(&self, record: &EventRecord) -> DispatchReport {
        let db = self.db.as_ref();
        let mut report = DispatchReport {
            routes: routes(record),
            failed: Vec::new(),
        };

        if report.routes.is_empty() && record.kind == EventKind::AccessControl {
            warn!(
                "[{}] Access-control event without plate number, dropped",
                record.camera_id
            );
        }

        for route in report.routes.clone() {
            let result = match route {
                Route::Occupancy => self.occupancy.handle(db, record).await.map(|_| ()),
                Route::Violation => self.violation.handle(db, record).await.map(|_| ()),
                Route::Intrusion => self.intrusion.handle(db, record).await.map(|_| ()),
                Route::EntryExit => self.entry_exit.handle(db, record).await.map(|_| ()),
            };

            if let Err(e) = result {
                error!(
                    "[{}] {} handler failed for {} event: {:#}",
                    record.camera_id, route, record.kind, e
                );
                report.failed.push(route);
            }
        }

        report
    }
}
