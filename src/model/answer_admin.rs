use std::sync::Arc;

use crate::{
    error::{Error, Result},
    model::{
        api::answer_sheet::{AnswerSheetDescription, AnswerSheetPage, ResetSummary},
        common::survey::SurveyId,
        mongodb::Id,
        pagination::Pagination,
        quota::QuotaLedger,
        store::{DefinitionStore, ResponseStore},
    },
};

/// Browsing and removal of stored answer sheets.
pub struct AnswerSheetAdmin {
    definitions: Arc<dyn DefinitionStore>,
    responses: Arc<dyn ResponseStore>,
    ledger: Arc<QuotaLedger>,
}

impl AnswerSheetAdmin {
    pub fn new(
        definitions: Arc<dyn DefinitionStore>,
        responses: Arc<dyn ResponseStore>,
        ledger: Arc<QuotaLedger>,
    ) -> Self {
        Self {
            definitions,
            responses,
            ledger,
        }
    }

    async fn ensure_survey_exists(&self, survey_id: SurveyId) -> Result<()> {
        match self.definitions.survey(survey_id).await? {
            Some(_) => Ok(()),
            None => Err(Error::not_found(format!("Survey with ID '{survey_id}'"))),
        }
    }

    /// A newest-first page of a survey's sheets, optionally only those with an
    /// answer containing `text`.
    pub async fn list(
        &self,
        survey_id: SurveyId,
        pagination: Pagination,
        text: Option<&str>,
    ) -> Result<AnswerSheetPage> {
        self.ensure_survey_exists(survey_id).await?;
        let text = text.map(str::trim).filter(|text| !text.is_empty());
        let (sheets, total) = self
            .responses
            .page_by_survey(
                survey_id,
                text,
                pagination.skip(),
                pagination.page_size() as u64,
            )
            .await?;
        Ok(AnswerSheetPage {
            pagination: pagination.result(total as usize),
            answer_sheets: sheets.into_iter().map(Into::into).collect(),
        })
    }

    pub async fn get(&self, id: Id) -> Result<AnswerSheetDescription> {
        self.responses
            .get(id)
            .await?
            .map(Into::into)
            .ok_or_else(|| Error::not_found(format!("Answer sheet with ID '{id}'")))
    }

    /// Delete one sheet. Quota already consumed by it is not refunded.
    pub async fn delete(&self, id: Id) -> Result<()> {
        if !self.responses.delete_one(id).await? {
            return Err(Error::not_found(format!("Answer sheet with ID '{id}'")));
        }
        info!("Deleted answer sheet {id}");
        Ok(())
    }

    /// Delete every sheet of a survey, reset its response count, and drop all
    /// of its quota counters.
    pub async fn reset_survey(&self, survey_id: SurveyId) -> Result<ResetSummary> {
        self.ensure_survey_exists(survey_id).await?;
        let answer_sheets_deleted = self.responses.delete_by_survey(survey_id).await?;
        self.responses.set_survey_count(survey_id, 0).await?;
        let quota_counters_cleared = self.ledger.clear_survey(survey_id).await?;
        warn!(
            "Reset survey {survey_id}: {answer_sheets_deleted} answer sheets and \
             {quota_counters_cleared} quota counters removed"
        );
        Ok(ResetSummary {
            answer_sheets_deleted,
            quota_counters_cleared,
        })
    }
}

#[cfg(test)]
mod tests {
    use chrono::{FixedOffset, Utc};

    use crate::{
        clock::MockClock,
        model::{
            api::id::SheetId,
            common::survey::Survey,
            db::answer_sheet::AnswerSheet,
            quota::{MemoryCounterCache, WindowKind},
            store::MemoryStore,
        },
    };

    use super::*;

    fn admin() -> (AnswerSheetAdmin, Arc<MemoryStore>, Arc<QuotaLedger>) {
        let store = Arc::new(MemoryStore::new());
        store.add_survey(Survey::example(1, Utc::now()));
        store.add_survey(Survey::example(2, Utc::now()));
        let cache = MemoryCounterCache::new(Arc::new(MockClock::new(Utc::now())));
        let ledger = Arc::new(QuotaLedger::new(
            Arc::new(cache),
            FixedOffset::east_opt(0).unwrap(),
        ));
        let admin = AnswerSheetAdmin::new(store.clone(), store.clone(), ledger.clone());
        (admin, store, ledger)
    }

    #[rocket::async_test]
    async fn lists_with_filter_and_pages() {
        let (admin, store, _) = admin();
        for content in ["apple", "banana", "apricot"] {
            store.add_sheet(AnswerSheet::example(1, &[(1, content)]));
        }
        store.add_sheet(AnswerSheet::example(2, &[(1, "apple")]));

        let page = admin
            .list(1, Pagination::new(1, 2).unwrap(), None)
            .await
            .unwrap();
        assert_eq!(page.answer_sheets.len(), 2);
        assert_eq!(page.pagination.total, 3);
        assert_eq!(page.pagination.total_pages, 2);

        let filtered = admin
            .list(1, Pagination::default(), Some(" ap "))
            .await
            .unwrap();
        assert_eq!(filtered.pagination.total, 2);

        let missing = admin.list(9, Pagination::default(), None).await;
        assert!(matches!(missing, Err(Error::NotFound(_))));
    }

    #[rocket::async_test]
    async fn deletes_one_sheet() {
        let (admin, store, _) = admin();
        let sheet = AnswerSheet::example(1, &[(1, "x")]);
        store.add_sheet(sheet.clone());

        assert_eq!(admin.get(sheet.id).await.unwrap().id, SheetId::from(sheet.id));
        admin.delete(sheet.id).await.unwrap();
        assert_eq!(store.sheet_count(), 0);
        assert!(matches!(
            admin.delete(sheet.id).await,
            Err(Error::NotFound(_))
        ));
        assert!(matches!(admin.get(sheet.id).await, Err(Error::NotFound(_))));
    }

    #[rocket::async_test]
    async fn reset_clears_sheets_and_counters() {
        let (admin, store, ledger) = admin();
        store.add_sheet(AnswerSheet::example(1, &[(1, "x")]));
        store.add_sheet(AnswerSheet::example(2, &[(1, "y")]));
        ledger.increment(1, WindowKind::Daily, "r").await.unwrap();
        ledger.increment(1, WindowKind::Total, "r").await.unwrap();
        ledger.increment(2, WindowKind::Total, "r").await.unwrap();

        let summary = admin.reset_survey(1).await.unwrap();
        assert_eq!(summary.answer_sheets_deleted, 1);
        assert_eq!(summary.quota_counters_cleared, 2);
        assert_eq!(store.sheet_count(), 1);
        assert_eq!(store.survey_count(1), 0);
        assert_eq!(ledger.peek(1, WindowKind::Daily, "r").await.unwrap(), None);
        assert_eq!(ledger.peek(2, WindowKind::Total, "r").await.unwrap(), Some(1));
    }
}
