mod common;

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::watch;

use appointment_cell::models::AppointmentStatus;
use appointment_cell::services::NotificationFeed;

use common::*;

#[tokio::test]
async fn test_poll_returns_pending_newest_first() {
    let clinic = Clinic::new().await;
    let doctor = clinic.add_doctor("Dr. Adhikari").await;
    clinic.add_rule(doctor, 1, t(9, 0), t(11, 0), 30).await;

    let feed = NotificationFeed::new(Arc::new(clinic.appointments.clone()), 10);

    let first = clinic
        .scheduling
        .book_appointment(booking(doctor, monday(), t(9, 0), "Ram"))
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(5)).await;
    let second = clinic
        .scheduling
        .book_appointment(booking(doctor, monday(), t(9, 30), "Hari"))
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(5)).await;
    let third = clinic
        .scheduling
        .book_appointment(booking(doctor, monday(), t(10, 0), "Gita"))
        .await
        .unwrap();
    clinic.scheduling.confirm_appointment(third.id).await.unwrap();

    let page = feed.poll(None).await.unwrap();
    let ids: Vec<_> = page.items.iter().map(|a| a.id).collect();
    assert_eq!(ids, vec![second.id, first.id]);
    assert!(page.items.iter().all(|a| a.status == AppointmentStatus::Pending));
    assert_eq!(page.next_cursor, Some(second.created_at));

    let newer = feed.poll(page.next_cursor).await.unwrap();
    assert!(newer.items.is_empty());
    assert_eq!(newer.next_cursor, page.next_cursor);
}

#[tokio::test]
async fn test_poll_respects_page_size() {
    let clinic = Clinic::new().await;
    let doctor = clinic.add_doctor("Dr. Adhikari").await;
    clinic.add_rule(doctor, 1, t(9, 0), t(11, 0), 30).await;

    for (i, start) in [t(9, 0), t(9, 30), t(10, 0)].into_iter().enumerate() {
        clinic
            .scheduling
            .book_appointment(booking(doctor, monday(), start, &format!("P{}", i)))
            .await
            .unwrap();
    }

    let feed = NotificationFeed::new(Arc::new(clinic.appointments.clone()), 2);
    assert_eq!(feed.poll(None).await.unwrap().items.len(), 2);
}

#[tokio::test]
async fn test_poller_publishes_new_bookings_and_stops() {
    let clinic = Clinic::new().await;
    let doctor = clinic.add_doctor("Dr. Adhikari").await;
    clinic.add_rule(doctor, 1, t(9, 0), t(11, 0), 30).await;

    let feed = Arc::new(NotificationFeed::new(Arc::new(clinic.appointments.clone()), 10));
    let mut receiver = feed.subscribe();
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let started_at = Utc::now();
    let handle = feed.clone().spawn_poller(Duration::from_millis(20), shutdown_rx);

    // Let the poller take its starting cursor first
    tokio::time::sleep(Duration::from_millis(30)).await;
    let booked = clinic
        .scheduling
        .book_appointment(booking(doctor, monday(), t(9, 0), "Sita"))
        .await
        .unwrap();
    assert!(booked.created_at > started_at);

    let published = tokio::time::timeout(Duration::from_secs(2), receiver.recv())
        .await
        .expect("poller should publish within the timeout")
        .unwrap();
    assert_eq!(published.id, booked.id);

    shutdown_tx.send(true).unwrap();
    tokio::time::timeout(Duration::from_secs(2), handle)
        .await
        .expect("poller should stop on shutdown")
        .unwrap();
}
