//! Drives the full cross-role flow against a throwaway store: register the
//! demo accounts, submit a report as the villager, respond and get appointed
//! as the doctor, chat, then soft-delete and show what each role still sees.
//!
//! Run with `RUST_LOG=debug` to watch the event and notification traffic.

use std::sync::Arc;
use village_health_core::auth::AuthContext;
use village_health_core::domains::report::types::{NewHealthReport, ResponseInput, Urgency};
use village_health_core::domains::user::types::Credentials;
use village_health_core::events;
use village_health_core::store::keys;
use village_health_core::globals;
use village_health_core::watch::RecordWatcher;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    village_health_core::initialize(":memory:", None).await?;

    let users = globals::get_user_service()?;
    let reports = globals::get_report_service()?;
    let consultations = globals::get_consultation_service()?;
    let messages = globals::get_message_service()?;
    let notifications = globals::get_notification_service()?;
    let store = globals::get_record_store()?;
    let bus = globals::get_event_bus()?;

    users.initialize_default_accounts().await?;

    // Watch the global report collection the way a mounted dashboard would.
    let mut watcher = RecordWatcher::new(Arc::clone(&store), Arc::clone(&bus))
        .key(keys::ALL_REPORTS)
        .signal(events::ALL_REPORTS_UPDATED)
        .spawn();
    let mut live_notifications = notifications.subscribe();

    // Villager session: submit a report.
    let villager = users
        .login(Credentials {
            email: "villager@test.com".to_string(),
            password: "Villager123!".to_string(),
        })
        .await?;
    let villager_ctx = AuthContext::for_user(&villager);

    // Background scan that would notify Anita about responses every 10s.
    notifications
        .clone()
        .start_monitoring(villager.role, Some(villager.id.clone()));

    let report = reports
        .submit_report(
            &villager_ctx,
            NewHealthReport {
                symptoms: "fever, headache".to_string(),
                description: "started yesterday evening".to_string(),
                urgency: Urgency::High,
                location: None,
            },
        )
        .await?;
    println!("submitted report {} ({})", report.id, report.status.as_str());

    while let Ok(reason) = tokio::time::timeout(
        std::time::Duration::from_millis(200),
        watcher.recv(),
    )
    .await
    {
        println!("watcher: {:?}", reason);
    }

    // Doctor session: respond, then get appointed by the villager.
    let doctor = users
        .login(Credentials {
            email: "doctor@test.com".to_string(),
            password: "Doctor123!".to_string(),
        })
        .await?;
    let doctor_ctx = AuthContext::for_user(&doctor);

    let listed = reports.reports_for_doctor(&doctor_ctx).await?;
    println!(
        "doctor sees {} report(s), top urgency {}",
        listed.len(),
        listed[0].report.urgency.as_str()
    );

    reports
        .respond(
            &doctor_ctx,
            &report.id,
            ResponseInput {
                advice: "rest and fluids".to_string(),
                prescription: Some("paracetamol 500mg".to_string()),
                follow_up_days: Some(7),
            },
        )
        .await?;

    let consultation = reports
        .appoint_doctor(&villager_ctx, &report.id, &doctor.id)
        .await?
        .expect("report is visible, consultation should materialize");
    println!("consultation {} created", consultation.id);

    // A quick exchange on the new thread.
    messages
        .send(&villager_ctx, &consultation.id, "thank you doctor!")
        .await?;
    let thread = messages.messages_for(&doctor_ctx, &consultation.id).await?;
    println!("thread has {} message(s)", thread.len());

    while let Ok(notification) = live_notifications.try_recv() {
        println!(
            "notification -> {}: [{}] {}",
            notification.user_id,
            notification.kind.as_str(),
            notification.title
        );
    }

    // The villager walks away; the admin still sees everything.
    reports.soft_delete_report(&villager_ctx, &report.id).await?;
    println!(
        "after delete: villager sees {} report(s), {} consultation(s)",
        reports.reports_for_owner(&villager_ctx).await?.len(),
        consultations
            .consultations_for_patient(&villager_ctx)
            .await?
            .len()
    );

    let admin = users
        .login(Credentials {
            email: "admin@test.com".to_string(),
            password: "Admin123!".to_string(),
        })
        .await?;
    let admin_ctx = AuthContext::for_user(&admin);
    let stats = reports.system_stats(&admin_ctx).await?;
    println!(
        "admin stats: {} report(s), {} user(s), {} doctor(s)",
        stats.total_reports, stats.total_users, stats.doctors
    );

    watcher.stop();
    notifications.stop_monitoring();
    Ok(())
}
