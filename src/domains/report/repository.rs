use crate::domains::report::types::HealthReport;
use crate::errors::DomainResult;
use crate::store::{keys, RecordStore};
use crate::types::UserRole;
use async_trait::async_trait;
use std::sync::Arc;

/// Health report repository trait.
///
/// Every mutation touches both the global collection and the owner's mirror.
/// The two writes are not atomic; a failure between them leaves the mirrors
/// diverged, which downstream readers tolerate.
#[async_trait]
pub trait ReportRepository: Send + Sync {
    /// The global collection, newest first.
    async fn all_reports(&self) -> DomainResult<Vec<HealthReport>>;

    /// The owner's mirror, newest first.
    async fn reports_for_owner(&self, owner_id: &str) -> DomainResult<Vec<HealthReport>>;

    /// Find a report in the global collection.
    async fn find_global(&self, report_id: &str) -> DomainResult<Option<HealthReport>>;

    /// Prepend a new report to both mirrors.
    async fn insert(&self, report: &HealthReport) -> DomainResult<()>;

    /// Apply `apply` to the matching report in the global collection and in
    /// the owner's mirror independently. Returns whether the global
    /// collection contained the report.
    async fn modify_in_mirrors(
        &self,
        owner_id: &str,
        report_id: &str,
        apply: &(dyn for<'a> Fn(&'a mut HealthReport) + Send + Sync),
    ) -> DomainResult<bool>;

    /// Report ids hidden from this (role, user)'s view.
    async fn hidden_ids(&self, role: UserRole, user_id: &str) -> DomainResult<Vec<String>>;

    /// Add a report id to the (role, user) hidden set.
    async fn hide(&self, role: UserRole, user_id: &str, report_id: &str) -> DomainResult<()>;
}

/// Record-store implementation of ReportRepository
pub struct LocalReportRepository {
    store: Arc<RecordStore>,
}

impl LocalReportRepository {
    pub fn new(store: Arc<RecordStore>) -> Self {
        Self { store }
    }

    async fn modify_collection(
        &self,
        key: &str,
        report_id: &str,
        apply: &(dyn for<'a> Fn(&'a mut HealthReport) + Send + Sync),
    ) -> DomainResult<bool> {
        let mut reports: Vec<HealthReport> = self.store.read_list(key).await?;
        let mut found = false;

        for report in reports.iter_mut() {
            if report.id == report_id {
                apply(report);
                found = true;
            }
        }

        if found {
            self.store.write_list(key, &reports).await?;
        }
        Ok(found)
    }
}

#[async_trait]
impl ReportRepository for LocalReportRepository {
    async fn all_reports(&self) -> DomainResult<Vec<HealthReport>> {
        self.store.read_list(keys::ALL_REPORTS).await
    }

    async fn reports_for_owner(&self, owner_id: &str) -> DomainResult<Vec<HealthReport>> {
        self.store.read_list(&keys::reports(owner_id)).await
    }

    async fn find_global(&self, report_id: &str) -> DomainResult<Option<HealthReport>> {
        let reports = self.all_reports().await?;
        Ok(reports.into_iter().find(|r| r.id == report_id))
    }

    async fn insert(&self, report: &HealthReport) -> DomainResult<()> {
        let owner_key = keys::reports(&report.user_id);

        let mut owned: Vec<HealthReport> = self.store.read_list(&owner_key).await?;
        owned.insert(0, report.clone());
        self.store.write_list(&owner_key, &owned).await?;

        let mut global: Vec<HealthReport> = self.store.read_list(keys::ALL_REPORTS).await?;
        global.insert(0, report.clone());
        self.store.write_list(keys::ALL_REPORTS, &global).await
    }

    async fn modify_in_mirrors(
        &self,
        owner_id: &str,
        report_id: &str,
        apply: &(dyn for<'a> Fn(&'a mut HealthReport) + Send + Sync),
    ) -> DomainResult<bool> {
        let found_global = self
            .modify_collection(keys::ALL_REPORTS, report_id, apply)
            .await?;
        self.modify_collection(&keys::reports(owner_id), report_id, apply)
            .await?;
        Ok(found_global)
    }

    async fn hidden_ids(&self, role: UserRole, user_id: &str) -> DomainResult<Vec<String>> {
        self.store
            .read_list(&keys::hidden_reports(role, user_id))
            .await
    }

    async fn hide(&self, role: UserRole, user_id: &str, report_id: &str) -> DomainResult<()> {
        let key = keys::hidden_reports(role, user_id);
        let mut hidden: Vec<String> = self.store.read_list(&key).await?;

        if !hidden.iter().any(|id| id == report_id) {
            hidden.push(report_id.to_string());
            self.store.write_list(&key, &hidden).await?;
        }
        Ok(())
    }
}
