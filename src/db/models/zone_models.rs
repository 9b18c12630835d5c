use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Vehicle count for one parking zone
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct ZoneOccupancy {
    pub id: Uuid,
    pub zone_id: String,
    pub camera_id: String,
    pub current_count: i32,
    pub max_capacity: i32,
    pub last_updated: DateTime<Utc>,
}

impl ZoneOccupancy {
    pub fn new(zone_id: &str, camera_id: &str, max_capacity: i32) -> Self {
        Self {
            id: Uuid::new_v4(),
            zone_id: zone_id.to_string(),
            camera_id: camera_id.to_string(),
            current_count: 0,
            max_capacity,
            last_updated: Utc::now(),
        }
    }

    /// Add `delta` vehicles, never going below zero
    pub fn apply_delta(&mut self, delta: i32) {
        self.current_count = self.current_count.saturating_add(delta).max(0);
        self.last_updated = Utc::now();
    }

    /// Fill ratio, `None` for zones without a usable capacity
    pub fn ratio(&self) -> Option<f64> {
        if self.max_capacity > 0 {
            Some(f64::from(self.current_count) / f64::from(self.max_capacity))
        } else {
            None
        }
    }
}

/// Zone occupancy as reported by the API
#[derive(Debug, Clone, Serialize)]
pub struct ZoneOccupancyView {
    #[serde(flatten)]
    pub zone: ZoneOccupancy,
    pub occupancy_percent: f64,
    pub is_full: bool,
}

impl From<ZoneOccupancy> for ZoneOccupancyView {
    fn from(zone: ZoneOccupancy) -> Self {
        let occupancy_percent = zone
            .ratio()
            .map(|ratio| (ratio * 1000.0).round() / 10.0)
            .unwrap_or(0.0);
        let is_full = zone.current_count >= zone.max_capacity;
        Self {
            zone,
            occupancy_percent,
            is_full,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn count_is_floored_at_zero() {
        let mut zone = ZoneOccupancy::new("zone-1", "CAM-02", 10);
        zone.apply_delta(-1);
        assert_eq!(zone.current_count, 0);
        zone.apply_delta(1);
        zone.apply_delta(1);
        zone.apply_delta(-1);
        assert_eq!(zone.current_count, 1);
    }

    #[test]
    fn view_reports_percent_and_full_flag() {
        let mut zone = ZoneOccupancy::new("zone-1", "CAM-02", 3);
        zone.current_count = 2;
        let view = ZoneOccupancyView::from(zone.clone());
        assert_eq!(view.occupancy_percent, 66.7);
        assert!(!view.is_full);

        zone.max_capacity = 0;
        let view = ZoneOccupancyView::from(zone);
        assert_eq!(view.occupancy_percent, 0.0);
        assert!(view.is_full);
    }
}
