#[cfg(test)]
mod tests {
    use crate::api::rest::{router, AppState};
    use crate::config::{CameraConfig, CameraDirectory, StreamingConfig, ZonePolicy};
    use crate::db::models::{Alert, AlertKind, NewAlert};
    use crate::db::{Database, MemoryDatabase};
    use crate::services::{AlertService, Dispatcher, EventPipeline, SnapshotStore};
    use anyhow::Result;
    use axum::body::Body;
    use axum::extract::ConnectInfo;
    use axum::http::{Method, Request, StatusCode};
    use axum::Router;
    use serde_json::{json, Value};
    use std::net::SocketAddr;
    use std::sync::Arc;
    use tempfile::TempDir;
    use tower::ServiceExt;

    const ZONE_1_ENTRANCE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<EventNotificationAlert version="2.0" xmlns="http://www.isapi.org/ver20/XMLSchema">
<channelID>1</channelID>
<dateTime>2024-05-01T08:00:00Z</dateTime>
<eventType>regionEntrance</eventType>
<eventState>active</eventState>
<DetectionRegionList><DetectionRegionEntry>
<regionID>zone-1</regionID><detectionTarget>vehicle</detectionTarget>
</DetectionRegionEntry></DetectionRegionList>
</EventNotificationAlert>"#;

    struct TestApp {
        app: Router,
        db: Arc<MemoryDatabase>,
        _snapshots: TempDir,
    }

    fn test_app() -> Result<TestApp> {
        let db = Arc::new(MemoryDatabase::new());
        let directory = Arc::new(CameraDirectory::new(vec![CameraConfig {
            id: "CAM-02".to_string(),
            address: "10.1.13.20".to_string(),
            username: None,
            password: None,
            gate: None,
            stream: false,
        }])?);
        let snapshots = tempfile::tempdir()?;
        let store = SnapshotStore::new(snapshots.path());
        let dispatcher = Arc::new(Dispatcher::with_policy(
            db.clone(),
            Arc::new(ZonePolicy::default()),
            Arc::new(AlertService::with_log()),
        ));
        let pipeline = Arc::new(EventPipeline::new(
            db.clone(),
            directory.clone(),
            dispatcher,
            store.clone(),
        ));

        let state = AppState {
            db: db.clone(),
            pipeline,
            directory,
            snapshots: store,
            streaming: StreamingConfig::default(),
        };

        Ok(TestApp {
            app: router(state),
            db,
            _snapshots: snapshots,
        })
    }

    fn request(method: Method, uri: &str, body: Body) -> Result<Request<Body>> {
        Ok(Request::builder().method(method).uri(uri).body(body)?)
    }

    fn json_request(method: Method, uri: &str, body: Value) -> Result<Request<Body>> {
        Ok(Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))?)
    }

    fn from_camera(body: &str, content_type: &str, peer: &str) -> Result<Request<Body>> {
        let mut request = Request::builder()
            .method(Method::POST)
            .uri("/api/v1/events/camera")
            .header("content-type", content_type)
            .body(Body::from(body.to_string()))?;
        let addr: SocketAddr = peer.parse()?;
        request.extensions_mut().insert(ConnectInfo(addr));
        Ok(request)
    }

    async fn send(app: &Router, request: Request<Body>) -> Result<(StatusCode, Value)> {
        let response = app.clone().oneshot(request).await?;
        let status = response.status();
        let bytes = hyper::body::to_bytes(response.into_body()).await?;
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes)?
        };
        Ok((status, body))
    }

    #[tokio::test]
    async fn empty_webhook_body_is_rejected() -> Result<()> {
        let t = test_app()?;
        let (status, body) = send(
            &t.app,
            request(Method::POST, "/api/v1/events/camera", Body::empty())?,
        )
        .await?;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body, json!({"status": "ignored", "reason": "empty body"}));
        Ok(())
    }

    #[tokio::test]
    async fn malformed_webhook_body_is_still_acknowledged() -> Result<()> {
        let t = test_app()?;
        let (status, body) = send(
            &t.app,
            from_camera("<EventNotificationAlert><eventType>", "application/xml", "10.1.13.20:80")?,
        )
        .await?;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "error");
        assert!(body["detail"].is_string());
        Ok(())
    }

    #[tokio::test]
    async fn webhook_event_updates_occupancy() -> Result<()> {
        let t = test_app()?;
        let (status, body) = send(
            &t.app,
            from_camera(ZONE_1_ENTRANCE, "application/xml", "10.1.13.20:54321")?,
        )
        .await?;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
        assert_eq!(body["camera_id"], "CAM-02");

        let (status, zone) = send(
            &t.app,
            request(Method::GET, "/api/v1/occupancy/zone-1", Body::empty())?,
        )
        .await?;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(zone["current_count"], 1);
        assert_eq!(zone["camera_id"], "CAM-02");
        assert_eq!(zone["occupancy_percent"], 10.0);
        assert_eq!(zone["is_full"], false);

        let (_, events) = send(
            &t.app,
            request(Method::GET, "/api/v1/events?camera_id=CAM-02", Body::empty())?,
        )
        .await?;
        assert_eq!(events.as_array().map(Vec::len), Some(1));
        Ok(())
    }

    #[tokio::test]
    async fn unknown_zone_is_not_found() -> Result<()> {
        let t = test_app()?;
        let (status, _) = send(
            &t.app,
            request(Method::GET, "/api/v1/occupancy/nowhere", Body::empty())?,
        )
        .await?;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _) = send(
            &t.app,
            request(Method::PUT, "/api/v1/occupancy/nowhere/reset", Body::empty())?,
        )
        .await?;
        assert_eq!(status, StatusCode::NOT_FOUND);
        Ok(())
    }

    #[tokio::test]
    async fn capacity_update_creates_and_resizes_zone() -> Result<()> {
        let t = test_app()?;
        let (status, body) = send(
            &t.app,
            json_request(
                Method::PUT,
                "/api/v1/occupancy/row-9/capacity",
                json!({"max_capacity": 40}),
            )?,
        )
        .await?;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["max_capacity"], 40);
        assert_eq!(body["status"], "updated");

        let (status, _) = send(
            &t.app,
            json_request(
                Method::PUT,
                "/api/v1/occupancy/row-9/capacity",
                json!({"max_capacity": 0}),
            )?,
        )
        .await?;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (_, zones) = send(&t.app, request(Method::GET, "/api/v1/occupancy", Body::empty())?)
            .await?;
        assert_eq!(zones[0]["zone_id"], "row-9");
        assert_eq!(zones[0]["camera_id"], "manual");
        assert_eq!(zones[0]["max_capacity"], 40);
        Ok(())
    }

    #[tokio::test]
    async fn reset_sets_count_to_zero() -> Result<()> {
        let t = test_app()?;
        for port in [1000, 1001] {
            send(
                &t.app,
                from_camera(ZONE_1_ENTRANCE, "application/xml", &format!("10.1.13.20:{}", port))?,
            )
            .await?;
        }

        let (status, body) = send(
            &t.app,
            request(Method::PUT, "/api/v1/occupancy/zone-1/reset", Body::empty())?,
        )
        .await?;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["current_count"], 0);
        assert_eq!(body["status"], "reset");
        Ok(())
    }

    #[tokio::test]
    async fn vehicle_registration_and_lookup() -> Result<()> {
        let t = test_app()?;
        let vehicle = json!({
            "plate_number": "EMP-7",
            "owner_name": "R. Staff",
            "vehicle_type": "employee",
            "employee_id": "E-7"
        });

        let (status, body) = send(
            &t.app,
            json_request(Method::POST, "/api/v1/vehicles", vehicle.clone())?,
        )
        .await?;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["plate_number"], "EMP-7");

        let (status, _) = send(
            &t.app,
            json_request(Method::POST, "/api/v1/vehicles", vehicle)?,
        )
        .await?;
        assert_eq!(status, StatusCode::CONFLICT);

        let (_, known) = send(
            &t.app,
            request(Method::GET, "/api/v1/vehicles/lookup/EMP-7", Body::empty())?,
        )
        .await?;
        assert_eq!(known["registered"], true);
        assert_eq!(known["owner"], "R. Staff");
        assert_eq!(known["type"], "employee");

        let (_, unknown) = send(
            &t.app,
            request(Method::GET, "/api/v1/vehicles/lookup/ABC-1234", Body::empty())?,
        )
        .await?;
        assert_eq!(unknown, json!({"plate": "ABC-1234", "registered": false}));

        let (_, visitors) = send(
            &t.app,
            request(Method::GET, "/api/v1/vehicles?vehicle_type=visitor", Body::empty())?,
        )
        .await?;
        assert_eq!(visitors, json!([]));
        Ok(())
    }

    #[tokio::test]
    async fn invalid_vehicle_type_is_rejected() -> Result<()> {
        let t = test_app()?;
        let (status, body) = send(
            &t.app,
            json_request(
                Method::POST,
                "/api/v1/vehicles",
                json!({"plate_number": "X-1", "owner_name": "A", "vehicle_type": "truck"}),
            )?,
        )
        .await?;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["message"].is_string());
        Ok(())
    }

    #[tokio::test]
    async fn resolve_alert() -> Result<()> {
        let t = test_app()?;
        let alert = {
            let mut session = t.db.session().await?;
            let alert = session
                .insert_alert(&Alert::from(NewAlert {
                    kind: AlertKind::Violation,
                    camera_id: "CAM-02".to_string(),
                    zone_id: Some("loading-bay".to_string()),
                    event_type: Some("fielddetection".to_string()),
                    description: "Vehicle in restricted zone: loading-bay".to_string(),
                }))
                .await?;
            session.commit().await?;
            alert
        };

        let (_, open) = send(
            &t.app,
            request(
                Method::GET,
                "/api/v1/alerts?alert_type=violation&resolved=false",
                Body::empty(),
            )?,
        )
        .await?;
        assert_eq!(open.as_array().map(Vec::len), Some(1));

        let (status, resolved) = send(
            &t.app,
            request(
                Method::PUT,
                &format!("/api/v1/alerts/{}/resolve", alert.id),
                Body::empty(),
            )?,
        )
        .await?;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(resolved["is_resolved"], true);
        assert!(resolved["resolved_at"].is_string());

        let (_, open) = send(
            &t.app,
            request(Method::GET, "/api/v1/alerts?resolved=false", Body::empty())?,
        )
        .await?;
        assert_eq!(open, json!([]));

        let (status, _) = send(
            &t.app,
            request(
                Method::PUT,
                &format!("/api/v1/alerts/{}/resolve", uuid::Uuid::new_v4()),
                Body::empty(),
            )?,
        )
        .await?;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _) = send(
            &t.app,
            request(Method::GET, "/api/v1/alerts?alert_type=bogus", Body::empty())?,
        )
        .await?;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        Ok(())
    }

    #[tokio::test]
    async fn daily_stats_for_empty_day() -> Result<()> {
        let t = test_app()?;
        let (status, stats) = send(
            &t.app,
            request(Method::GET, "/api/v1/stats/daily?date=2024-05-01", Body::empty())?,
        )
        .await?;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(stats["date"], "2024-05-01");
        assert_eq!(stats["total_entries"], 0);
        assert_eq!(stats["currently_parked"], 0);
        assert_eq!(stats["avg_parking_minutes"], 0.0);
        Ok(())
    }

    #[tokio::test]
    async fn snapshot_for_unconfigured_camera_is_not_found() -> Result<()> {
        let t = test_app()?;
        let (status, _) = send(
            &t.app,
            request(Method::POST, "/api/v1/cameras/CAM-99/snapshot", Body::empty())?,
        )
        .await?;
        assert_eq!(status, StatusCode::NOT_FOUND);
        Ok(())
    }
}
