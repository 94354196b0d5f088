//! Races on the two check-then-act paths: slot booking and map activation

use std::sync::Arc;

use gatehouse::auth::JwtValidator;
use gatehouse::db::schemas::{FileFormat, ViewSettings, VisitorType};
use gatehouse::db::Stores;
use gatehouse::logging::AuditLogger;
use gatehouse::policy::{AppointmentWith, DenyReason, House, Policy, Principal, Role};
use gatehouse::services::{BookAppointmentRequest, Services, UploadMapRequest};
use gatehouse::GatehouseError;

const CONTENDERS: usize = 16;

fn services() -> Arc<Services> {
    Arc::new(Services::new(
        Stores::memory(),
        Policy::default(),
        JwtValidator::new_dev(),
        AuditLogger::new(),
        None,
    ))
}

fn visit(visitor: usize, time: &str) -> BookAppointmentRequest {
    BookAppointmentRequest {
        visitor_name: format!("Visitor {visitor}"),
        visitor_email: format!("visitor{visitor}@example.com"),
        visitor_phone: "9000000000".to_string(),
        visitor_type: VisitorType::Visitor,
        appointment_with: AppointmentWith::Principal,
        teacher_id: None,
        purpose: "Admission enquiry".to_string(),
        preferred_date: "2026-12-01".to_string(),
        preferred_time: time.to_string(),
        student_name: None,
        student_class: None,
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_bookings_for_one_slot() {
    let services = services();

    let handles: Vec<_> = (0..CONTENDERS)
        .map(|n| {
            let services = Arc::clone(&services);
            tokio::spawn(async move {
                services
                    .appointments
                    .book(&Principal::Anonymous, visit(n, "14:00"))
                    .await
            })
        })
        .collect();

    let mut committed = 0;
    let mut conflicts = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => committed += 1,
            Err(GatehouseError::Denied(DenyReason::SlotConflict)) => conflicts += 1,
            Err(other) => panic!("unexpected error: {other:?}"),
        }
    }

    assert_eq!(committed, 1);
    assert_eq!(conflicts, CONTENDERS - 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_bookings_for_distinct_slots() {
    let services = services();
    let times = ["09:00", "10:00", "11:00", "12:00", "13:00", "14:00", "15:00", "16:00"];

    let handles: Vec<_> = times
        .iter()
        .enumerate()
        .map(|(n, time)| {
            let services = Arc::clone(&services);
            let time = time.to_string();
            tokio::spawn(async move {
                services
                    .appointments
                    .book(&Principal::Anonymous, visit(n, &time))
                    .await
            })
        })
        .collect();

    for handle in handles {
        assert!(handle.await.unwrap().is_ok());
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_activation_leaves_one_active() {
    let services = services();
    let admin = Principal::user("office", Role::Admin, House::None).unwrap();

    let mut ids = Vec::new();
    for n in 0..8 {
        let uploaded = services
            .maps
            .upload(
                &admin,
                UploadMapRequest {
                    name: format!("Campus {n}"),
                    description: None,
                    model_url: format!("/models/campus-{n}.glb"),
                    thumbnail_url: None,
                    file_size: None,
                    file_format: FileFormat::default(),
                    view: ViewSettings::default(),
                    markers: Vec::new(),
                },
            )
            .await
            .unwrap();
        ids.push(uploaded.map.id);
    }

    let handles: Vec<_> = ids
        .iter()
        .cloned()
        .map(|id| {
            let services = Arc::clone(&services);
            let admin = admin.clone();
            tokio::spawn(async move { services.maps.activate(&admin, &id).await })
        })
        .collect();
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    let maps = services.maps.list(&admin).await.unwrap();
    let active: Vec<_> = maps.iter().filter(|m| m.is_active).collect();
    assert_eq!(active.len(), 1);
    assert_eq!(services.maps.active().await.unwrap().map.id, active[0].map.id);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_delete_never_removes_the_active_map() {
    let services = services();
    let admin = Principal::user("office", Role::Admin, House::None).unwrap();

    let upload = |name: &str| UploadMapRequest {
        name: name.to_string(),
        description: None,
        model_url: format!("/models/{name}.glb"),
        thumbnail_url: None,
        file_size: None,
        file_format: FileFormat::default(),
        view: ViewSettings::default(),
        markers: Vec::new(),
    };
    let target = services.maps.upload(&admin, upload("west")).await.unwrap();
    let id = target.map.id.clone();

    let activate = {
        let services = Arc::clone(&services);
        let admin = admin.clone();
        let id = id.clone();
        tokio::spawn(async move { services.maps.activate(&admin, &id).await })
    };
    let delete = {
        let services = Arc::clone(&services);
        let admin = admin.clone();
        let id = id.clone();
        tokio::spawn(async move { services.maps.delete(&admin, &id).await })
    };

    let activated = activate.await.unwrap();
    let deleted = delete.await.unwrap();

    // Either order is fine, but never an active pointer to a deleted map
    match (activated.is_ok(), deleted.is_ok()) {
        (true, false) => assert_eq!(services.maps.active().await.unwrap().map.id, id),
        (false, true) => assert!(services.maps.active().await.is_err()),
        other => panic!("unexpected outcome {other:?}"),
    }
}
