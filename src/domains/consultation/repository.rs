use crate::domains::consultation::types::Consultation;
use crate::errors::DomainResult;
use crate::store::{keys, RecordStore};
use async_trait::async_trait;
use std::sync::Arc;

/// Consultation repository trait. Consultations live in two collections at
/// once (the patient's and the doctor's); mutations are applied to each
/// collection independently and are not atomic across them.
#[async_trait]
pub trait ConsultationRepository: Send + Sync {
    async fn for_patient(&self, patient_id: &str) -> DomainResult<Vec<Consultation>>;

    async fn for_doctor(&self, doctor_id: &str) -> DomainResult<Vec<Consultation>>;

    /// Prepend into both parties' collections, first dropping any existing
    /// entry with the same id from each.
    async fn upsert_mirrored(&self, consultation: &Consultation) -> DomainResult<()>;

    /// Apply `apply` to every consultation for `report_id` in both parties'
    /// collections.
    async fn modify_for_report(
        &self,
        patient_id: &str,
        doctor_id: &str,
        report_id: &str,
        apply: &(dyn for<'a> Fn(&'a mut Consultation) + Send + Sync),
    ) -> DomainResult<()>;

    /// Apply `apply` to the consultation with `consultation_id` in both
    /// parties' collections. Returns whether either collection matched.
    async fn modify_by_id(
        &self,
        patient_id: &str,
        doctor_id: &str,
        consultation_id: &str,
        apply: &(dyn for<'a> Fn(&'a mut Consultation) + Send + Sync),
    ) -> DomainResult<bool>;

    /// Remove every consultation for `report_id` from the patient's
    /// collection, returning the removed records.
    async fn remove_for_report_from_patient(
        &self,
        patient_id: &str,
        report_id: &str,
    ) -> DomainResult<Vec<Consultation>>;

    /// Remove one consultation from a doctor's collection.
    async fn remove_by_id_from_doctor(
        &self,
        doctor_id: &str,
        consultation_id: &str,
    ) -> DomainResult<()>;

    /// Replace the patient's collection wholesale (lazy repair paths).
    async fn replace_for_patient(
        &self,
        patient_id: &str,
        consultations: &[Consultation],
    ) -> DomainResult<()>;
}

/// Record-store implementation of ConsultationRepository
pub struct LocalConsultationRepository {
    store: Arc<RecordStore>,
}

impl LocalConsultationRepository {
    pub fn new(store: Arc<RecordStore>) -> Self {
        Self { store }
    }

    async fn modify_collection(
        &self,
        key: &str,
        matches: &(dyn for<'a> Fn(&'a Consultation) -> bool + Send + Sync),
        apply: &(dyn for<'a> Fn(&'a mut Consultation) + Send + Sync),
    ) -> DomainResult<bool> {
        let mut consultations: Vec<Consultation> = self.store.read_list(key).await?;
        let mut found = false;

        for consultation in consultations.iter_mut() {
            if matches(consultation) {
                apply(consultation);
                found = true;
            }
        }

        if found {
            self.store.write_list(key, &consultations).await?;
        }
        Ok(found)
    }
}

#[async_trait]
impl ConsultationRepository for LocalConsultationRepository {
    async fn for_patient(&self, patient_id: &str) -> DomainResult<Vec<Consultation>> {
        self.store.read_list(&keys::consultations(patient_id)).await
    }

    async fn for_doctor(&self, doctor_id: &str) -> DomainResult<Vec<Consultation>> {
        self.store
            .read_list(&keys::doctor_consultations(doctor_id))
            .await
    }

    async fn upsert_mirrored(&self, consultation: &Consultation) -> DomainResult<()> {
        let patient_key = keys::consultations(&consultation.patient_id);
        let mut patient_side: Vec<Consultation> = self.store.read_list(&patient_key).await?;
        patient_side.retain(|c| c.id != consultation.id);
        patient_side.insert(0, consultation.clone());
        self.store.write_list(&patient_key, &patient_side).await?;

        let doctor_key = keys::doctor_consultations(&consultation.doctor_id);
        let mut doctor_side: Vec<Consultation> = self.store.read_list(&doctor_key).await?;
        doctor_side.retain(|c| c.id != consultation.id);
        doctor_side.insert(0, consultation.clone());
        self.store.write_list(&doctor_key, &doctor_side).await
    }

    async fn modify_for_report(
        &self,
        patient_id: &str,
        doctor_id: &str,
        report_id: &str,
        apply: &(dyn for<'a> Fn(&'a mut Consultation) + Send + Sync),
    ) -> DomainResult<()> {
        let report_id = report_id.to_string();
        let matches = move |c: &Consultation| c.report_id == report_id;

        self.modify_collection(&keys::consultations(patient_id), &matches, apply)
            .await?;
        self.modify_collection(&keys::doctor_consultations(doctor_id), &matches, apply)
            .await?;
        Ok(())
    }

    async fn modify_by_id(
        &self,
        patient_id: &str,
        doctor_id: &str,
        consultation_id: &str,
        apply: &(dyn for<'a> Fn(&'a mut Consultation) + Send + Sync),
    ) -> DomainResult<bool> {
        let consultation_id = consultation_id.to_string();
        let matches = move |c: &Consultation| c.id == consultation_id;

        let in_patient = self
            .modify_collection(&keys::consultations(patient_id), &matches, apply)
            .await?;
        let in_doctor = self
            .modify_collection(&keys::doctor_consultations(doctor_id), &matches, apply)
            .await?;
        Ok(in_patient || in_doctor)
    }

    async fn remove_for_report_from_patient(
        &self,
        patient_id: &str,
        report_id: &str,
    ) -> DomainResult<Vec<Consultation>> {
        let key = keys::consultations(patient_id);
        let consultations: Vec<Consultation> = self.store.read_list(&key).await?;

        let (removed, remaining): (Vec<_>, Vec<_>) = consultations
            .into_iter()
            .partition(|c| c.report_id == report_id);

        if !removed.is_empty() {
            self.store.write_list(&key, &remaining).await?;
        }
        Ok(removed)
    }

    async fn remove_by_id_from_doctor(
        &self,
        doctor_id: &str,
        consultation_id: &str,
    ) -> DomainResult<()> {
        let key = keys::doctor_consultations(doctor_id);
        let mut consultations: Vec<Consultation> = self.store.read_list(&key).await?;
        let before = consultations.len();
        consultations.retain(|c| c.id != consultation_id);

        if consultations.len() != before {
            self.store.write_list(&key, &consultations).await?;
        }
        Ok(())
    }

    async fn replace_for_patient(
        &self,
        patient_id: &str,
        consultations: &[Consultation],
    ) -> DomainResult<()> {
        self.store
            .write_list(&keys::consultations(patient_id), consultations)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domains::consultation::types::ConsultationStatus;
    use crate::test_support::{sample_consultation, test_store};

    #[tokio::test]
    async fn test_upsert_mirrors_into_both_collections() {
        let store = test_store().await;
        let repo = LocalConsultationRepository::new(store);
        let consultation = sample_consultation("r1", "d1", "v1");

        repo.upsert_mirrored(&consultation).await.unwrap();

        assert_eq!(repo.for_patient("v1").await.unwrap().len(), 1);
        assert_eq!(repo.for_doctor("d1").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_upsert_same_id_does_not_duplicate() {
        let store = test_store().await;
        let repo = LocalConsultationRepository::new(store);
        let consultation = sample_consultation("r1", "d1", "v1");

        repo.upsert_mirrored(&consultation).await.unwrap();
        repo.upsert_mirrored(&consultation).await.unwrap();

        assert_eq!(repo.for_patient("v1").await.unwrap().len(), 1);
        assert_eq!(repo.for_doctor("d1").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_modify_by_id_touches_both_sides() {
        let store = test_store().await;
        let repo = LocalConsultationRepository::new(store);
        let consultation = sample_consultation("r1", "d1", "v1");
        repo.upsert_mirrored(&consultation).await.unwrap();

        let found = repo
            .modify_by_id("v1", "d1", &consultation.id, &|c| {
                c.status = ConsultationStatus::Completed
            })
            .await
            .unwrap();
        assert!(found);

        assert_eq!(
            repo.for_patient("v1").await.unwrap()[0].status,
            ConsultationStatus::Completed
        );
        assert_eq!(
            repo.for_doctor("d1").await.unwrap()[0].status,
            ConsultationStatus::Completed
        );
    }

    #[tokio::test]
    async fn test_remove_for_report_partitions_patient_side() {
        let store = test_store().await;
        let repo = LocalConsultationRepository::new(store);
        repo.upsert_mirrored(&sample_consultation("r1", "d1", "v1"))
            .await
            .unwrap();
        repo.upsert_mirrored(&sample_consultation("r2", "d1", "v1"))
            .await
            .unwrap();

        let removed = repo
            .remove_for_report_from_patient("v1", "r1")
            .await
            .unwrap();
        assert_eq!(removed.len(), 1);
        assert_eq!(removed[0].report_id, "r1");

        let remaining = repo.for_patient("v1").await.unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].report_id, "r2");
    }
}
